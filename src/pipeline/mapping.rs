//! Mapping stage: nested hierarchy JSON of clustered topics, sized by a
//! distribution total, for a bubble-layout renderer.

use serde_json::{json, Value};
use tracing::{info, warn};

use super::{paired, timed, StageTime};
use crate::cluster::LinkageTable;
use crate::config::MappingConfig;
use crate::error::{Error, Result};
use crate::hierarchy::{HealthCheck, HierarchyTree};
use crate::topic::{write_json, SubTopicGroups, Topic, TopicSet};

/// Hierarchy JSON of `topics` merged by `table`, sized by the total
/// `total_id` rescaled onto `scale`.
///
/// A group with nothing to map (no topics, or generic topics only) maps to
/// an empty object.
pub fn build_map(topics: &[Topic], table: &LinkageTable, total_id: &str, scale: (f64, f64)) -> Result<Value> {
    if topics.iter().all(|t| t.numeric_cluster_id().is_some_and(|c| c < 0)) {
        return Ok(json!({}));
    }
    let mut tree = HierarchyTree::build(topics, table)?;
    let root_cluster = tree.split_clusters();
    tree.set_values_and_normalise_sizes(total_id, scale.0, scale.1)?;
    tree.sort_children();

    let health = tree.health_check();
    if !health.is_healthy() {
        warn!(report = %health, "hierarchy failed its health check");
    }
    info!(
        leaves = tree.num_leaves(),
        height = health.max_depth,
        clusters = health.cluster_roots,
        root_cluster = root_cluster.as_deref().unwrap_or("-"),
        "built hierarchy"
    );
    Ok(tree.to_json())
}

/// Map every sub-topic group, as `{mainTopicId, map}` objects.
pub fn map_groups(groups: &SubTopicGroups, total_id: &str, scale: (f64, f64)) -> Result<Vec<Value>> {
    groups
        .sub_topic_groups
        .iter()
        .map(|group| {
            let map = build_map(&group.topics, &group.linkage_table, total_id, scale)?;
            Ok(json!({ "mainTopicId": group.main_topic_id, "map": map }))
        })
        .collect()
}

/// Run the stage as configured.
pub fn run(config: &MappingConfig) -> Result<StageTime> {
    let subs = paired("sub_topics", &config.sub_topics, &config.sub_output)?;
    let scale = config.checked_scale();
    let ((), time) = timed("Mapping", || {
        let main = TopicSet::load(&config.main_topics)?;
        let table = main.linkage_table.as_ref().ok_or_else(|| Error::InvalidParameter {
            name: "linkageTable",
            message: format!("{} has not been clustered", config.main_topics.display()),
        })?;
        let map = build_map(&main.topics, table, &config.bubble_size, scale)?;
        write_json(&config.main_output, &map)?;
        info!(path = %config.main_output.display(), "saved main map");

        if let Some((sub_topics, sub_output)) = subs {
            let groups = SubTopicGroups::load(sub_topics)?;
            let maps = map_groups(&groups, &config.bubble_size, scale)?;
            write_json(sub_output, &maps)?;
            info!(path = %sub_output.display(), groups = maps.len(), "saved sub maps");
        }
        Ok(())
    })?;
    Ok(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topic::{TopicGroupRecord, Total};

    fn topic(i: usize, cluster: &str, total: f64) -> Topic {
        let mut t = Topic::new(format!("t{i}"), i).with_words([(format!("w{i}"), 1.0)]);
        t.cluster_id = Some(cluster.to_string());
        t.add_total(Total::new("-", total));
        t
    }

    /// ((0,1),2)
    fn clustered() -> (Vec<Topic>, LinkageTable) {
        let topics = vec![topic(0, "0", 1.0), topic(1, "0", 2.0), topic(2, "1", 4.0)];
        let mut table = LinkageTable::with_leaves(3);
        table.add_merge(0, 1, 0.1);
        table.add_merge(3, 2, 0.5);
        (topics, table)
    }

    #[test]
    fn test_map_is_sized_and_sorted() {
        let (topics, table) = clustered();
        let map = build_map(&topics, &table, "-", (5.0, 40.0)).unwrap();
        assert_eq!(map["value"], 7.0);
        assert_eq!(map["leaf"], false);
        assert!(map.get("clusterId").is_none());
        assert_eq!(map["children"][0]["topicId"], "t2");
        assert_eq!(map["children"][0]["size"], 40.0);
        assert_eq!(map["children"][1]["clusterId"], "0");
        assert_eq!(map["children"][1]["clusterRoot"], true);
    }

    #[test]
    fn test_missing_total_fails() {
        let (topics, table) = clustered();
        let err = build_map(&topics, &table, "year-", (5.0, 40.0)).unwrap_err();
        assert!(matches!(err, Error::MissingTotal { .. }));
    }

    #[test]
    fn test_generic_only_group_maps_to_empty_object() {
        let generic = topic(0, "-1", 1.0);
        assert_eq!(build_map(&[generic], &LinkageTable::default(), "-", (5.0, 40.0)).unwrap(), json!({}));
        assert_eq!(build_map(&[], &LinkageTable::default(), "-", (5.0, 40.0)).unwrap(), json!({}));
    }

    #[test]
    fn test_run_requires_a_clustered_topic_set() {
        let dir = tempfile::tempdir().unwrap();
        let (topics, _) = clustered();
        TopicSet::new(topics).unwrap().save(dir.path().join("main.json")).unwrap();
        let config = MappingConfig {
            main_topics: dir.path().join("main.json"),
            main_output: dir.path().join("map.json"),
            ..MappingConfig::default()
        };
        let err = run(&config).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "linkageTable", .. }));
    }

    #[test]
    fn test_run_writes_main_and_group_maps() {
        let dir = tempfile::tempdir().unwrap();
        let (topics, table) = clustered();
        let mut main = TopicSet::new(topics.clone()).unwrap();
        main.linkage_table = Some(table);
        main.save(dir.path().join("main.json")).unwrap();

        let single = TopicGroupRecord {
            main_topic_id: "t0".into(),
            topics: vec![topic(0, "0", 3.0)],
            similarities: vec![vec![1.0]],
            linkage_table: LinkageTable::with_leaves(1),
        };
        let groups = SubTopicGroups {
            metadata: Default::default(),
            sub_topic_groups: vec![single],
        };
        groups.save(dir.path().join("groups.json")).unwrap();

        let config = MappingConfig {
            main_topics: dir.path().join("main.json"),
            main_output: dir.path().join("maps/main.json"),
            sub_topics: Some(dir.path().join("groups.json")),
            sub_output: Some(dir.path().join("maps/sub.json")),
            ..MappingConfig::default()
        };
        run(&config).unwrap();

        let main_map: Value = serde_json::from_str(&std::fs::read_to_string(dir.path().join("maps/main.json")).unwrap()).unwrap();
        assert_eq!(main_map["value"], 7.0);
        let sub_maps: Value = serde_json::from_str(&std::fs::read_to_string(dir.path().join("maps/sub.json")).unwrap()).unwrap();
        assert_eq!(sub_maps[0]["mainTopicId"], "t0");
        assert_eq!(sub_maps[0]["map"]["leaf"], true);
        assert_eq!(sub_maps[0]["map"]["value"], 3.0);
    }
}
