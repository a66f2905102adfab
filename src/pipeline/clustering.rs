//! Clustering stage: linkage tables and cluster ids for main topics, and for
//! the sub-topics assigned to each main topic.

use tracing::{debug, info};

use super::{paired, timed, StageTime};
use crate::cluster::{AgglomerativeClustering, LinkageTable};
use crate::config::ClusteringConfig;
use crate::error::{Error, Result};
use crate::similarity::SimilarityMatrix;
use crate::topic::{SubTopicGroups, Topic, TopicGroupRecord, TopicSet};

/// Cluster `topics`, whose similarities are `similarity`, into `n_clusters`.
///
/// Generic topics (negative cluster id) stay out: their rows and columns are
/// dropped and they keep their id. Leaf `i` of the returned table is the
/// `i`-th non-generic topic.
pub fn cluster_topics(
    topics: &mut [Topic],
    similarity: &SimilarityMatrix,
    clustering: &AgglomerativeClustering,
    n_clusters: usize,
) -> Result<LinkageTable> {
    if similarity.size() != topics.len() {
        return Err(Error::DimensionMismatch {
            expected: topics.len(),
            found: similarity.size(),
        });
    }
    let generic: Vec<usize> = topics
        .iter()
        .enumerate()
        .filter(|(_, t)| t.numeric_cluster_id().is_some_and(|c| c < 0))
        .map(|(i, _)| i)
        .collect();
    let similarity = if generic.is_empty() {
        similarity.clone()
    } else {
        debug!(generic = generic.len(), "leaving generic topics out of clustering");
        similarity.without_indices(&generic)?
    };

    let table = clustering.perform_clustering(&similarity.get_dissimilarity_matrix())?;
    let ids = table.assign_cluster_ids(similarity.size(), n_clusters)?;
    let kept = topics
        .iter_mut()
        .enumerate()
        .filter(|(i, _)| !generic.contains(i))
        .map(|(_, t)| t);
    for (topic, id) in kept.zip(ids) {
        topic.cluster_id = id;
    }
    Ok(table)
}

/// Sub-topics assigned to each main topic, with group-local indices set and
/// the matching block of the sub similarity matrix. Not clustered yet.
pub fn group_sub_topics(main: &TopicSet, sub: &TopicSet) -> Result<Vec<(TopicGroupRecord, SimilarityMatrix)>> {
    let sub_matrix = sub.similarity_matrix()?;
    main.topics
        .iter()
        .map(|main_topic| {
            let mut members = main_topic
                .sub_topic_ids
                .iter()
                .map(|r| sub.topic(&r.id).cloned().ok_or_else(|| Error::UnknownTopic(r.id.clone())))
                .collect::<Result<Vec<Topic>>>()?;
            members.sort_by_key(|t| t.topic_index);
            members.dedup_by_key(|t| t.topic_index);

            let indices: Vec<usize> = members.iter().map(|t| t.topic_index).collect();
            for (i, t) in members.iter_mut().enumerate() {
                t.group_topic_index = Some(i);
                t.group_topic_id = Some(i.to_string());
            }
            let matrix = sub_matrix.get_sub_matrix(&indices)?;
            let record = TopicGroupRecord {
                main_topic_id: main_topic.topic_id.clone(),
                topics: members,
                similarities: matrix.similarity_rows(),
                linkage_table: LinkageTable::default(),
            };
            Ok((record, matrix))
        })
        .collect()
}

/// Cluster main topics into `n_clusters`, recording the table on the set.
pub fn cluster_main(set: &mut TopicSet, clustering: &AgglomerativeClustering, n_clusters: usize) -> Result<()> {
    let matrix = set.similarity_matrix()?;
    let table = cluster_topics(&mut set.topics, &matrix, clustering, n_clusters)?;
    info!(
        topics = set.len(),
        merges = table.len(),
        clusters = n_clusters,
        linkage = %clustering.linkage(),
        "clustered main topics"
    );
    set.linkage_table = Some(table);
    Ok(())
}

/// Group sub-topics by main topic and cluster each group into one cluster.
pub fn cluster_sub_groups(
    main: &TopicSet,
    sub: &TopicSet,
    clustering: &AgglomerativeClustering,
) -> Result<SubTopicGroups> {
    let mut groups = Vec::with_capacity(main.len());
    for (mut record, matrix) in group_sub_topics(main, sub)? {
        record.linkage_table = cluster_topics(&mut record.topics, &matrix, clustering, 1)?;
        debug!(main_topic = %record.main_topic_id, size = record.topics.len(), "clustered sub-topic group");
        groups.push(record);
    }
    Ok(SubTopicGroups {
        metadata: sub.metadata.clone(),
        sub_topic_groups: groups,
    })
}

/// Run the stage as configured.
pub fn run(config: &ClusteringConfig) -> Result<StageTime> {
    let subs = paired("sub_topics", &config.sub_topics, &config.sub_output)?;
    let ((), time) = timed("Clustering", || {
        let clustering = AgglomerativeClustering::new().with_linkage(config.linkage);
        let mut main = TopicSet::load(&config.main_topics)?;
        cluster_main(&mut main, &clustering, config.clusters)?;
        main.save(&config.main_output)?;

        if let Some((sub_topics, sub_output)) = subs {
            let sub = TopicSet::load(sub_topics)?;
            let groups = cluster_sub_groups(&main, &sub, &clustering)?;
            groups.save(sub_output)?;
            info!(groups = groups.sub_topic_groups.len(), "saved sub-topic groups");
        }
        Ok(())
    })?;
    Ok(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(n: usize, rows: Vec<Vec<f64>>) -> TopicSet {
        let mut set = TopicSet::new((0..n).map(|i| Topic::new(format!("t{i}"), i)).collect()).unwrap();
        set.similarities = rows;
        set
    }

    fn two_pairs() -> Vec<Vec<f64>> {
        vec![
            vec![1.0, 0.9, 0.2, 0.1],
            vec![0.9, 1.0, 0.15, 0.2],
            vec![0.2, 0.15, 1.0, 0.8],
            vec![0.1, 0.2, 0.8, 1.0],
        ]
    }

    fn cluster_ids(set: &TopicSet) -> Vec<Option<&str>> {
        set.topics.iter().map(|t| t.cluster_id.as_deref()).collect()
    }

    #[test]
    fn test_main_topics_get_table_and_ids() {
        let mut main = set(4, two_pairs());
        cluster_main(&mut main, &AgglomerativeClustering::new(), 2).unwrap();
        assert_eq!(main.linkage_table.as_ref().map(LinkageTable::len), Some(3));
        assert_eq!(cluster_ids(&main), vec![Some("0"), Some("0"), Some("1"), Some("1")]);
    }

    #[test]
    fn test_generic_topics_are_left_out() {
        let mut main = set(4, two_pairs());
        main.topics[3].cluster_id = Some("-1".into());
        cluster_main(&mut main, &AgglomerativeClustering::new(), 1).unwrap();
        assert_eq!(main.linkage_table.as_ref().map(LinkageTable::len), Some(2));
        assert_eq!(main.topics[3].cluster_id.as_deref(), Some("-1"));
        assert!(main.topics[..3].iter().all(|t| t.cluster_id.as_deref() == Some("0")));
    }

    #[test]
    fn test_matrix_size_must_match_topics() {
        let mut main = set(3, two_pairs());
        let err = cluster_main(&mut main, &AgglomerativeClustering::new(), 1).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 3, found: 4 }));
    }

    #[test]
    fn test_sub_groups_use_local_indices() {
        let mut main = set(2, vec![vec![1.0, 0.5], vec![0.5, 1.0]]);
        main.topics[0].add_sub_topic_id("t3", 0.9);
        main.topics[0].add_sub_topic_id("t1", 0.8);
        main.topics[1].add_sub_topic_id("t2", 0.7);
        let sub = set(4, two_pairs());

        let groups = cluster_sub_groups(&main, &sub, &AgglomerativeClustering::new()).unwrap();
        assert_eq!(groups.sub_topic_groups.len(), 2);

        let first = &groups.sub_topic_groups[0];
        assert_eq!(first.main_topic_id, "t0");
        let ids: Vec<&str> = first.topics.iter().map(|t| t.topic_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t3"]);
        assert_eq!(first.topics[1].group_topic_index, Some(1));
        assert_eq!(first.topics[1].group_topic_id.as_deref(), Some("1"));
        assert_eq!(first.similarities, vec![vec![1.0, 0.2], vec![0.2, 1.0]]);
        assert_eq!(first.linkage_table.len(), 1);
        assert!(first.topics.iter().all(|t| t.cluster_id.as_deref() == Some("0")));

        let second = &groups.sub_topic_groups[1];
        assert!(second.linkage_table.is_empty());
        assert_eq!(second.topics[0].cluster_id.as_deref(), Some("0"));
    }

    #[test]
    fn test_unknown_sub_topic_is_an_error() {
        let mut main = set(1, vec![vec![1.0]]);
        main.topics[0].add_sub_topic_id("nope", 1.0);
        let sub = set(1, vec![vec![1.0]]);
        let err = cluster_sub_groups(&main, &sub, &AgglomerativeClustering::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownTopic(id) if id == "nope"));
    }

    #[test]
    fn test_run_writes_both_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let mut main = set(2, vec![vec![1.0, 0.5], vec![0.5, 1.0]]);
        main.topics[0].add_sub_topic_id("t0", 0.9);
        main.topics[1].add_sub_topic_id("t1", 0.9);
        main.save(dir.path().join("main.json")).unwrap();
        set(2, vec![vec![1.0, 0.3], vec![0.3, 1.0]]).save(dir.path().join("sub.json")).unwrap();

        let config = ClusteringConfig {
            main_topics: dir.path().join("main.json"),
            main_output: dir.path().join("out/main.json"),
            sub_topics: Some(dir.path().join("sub.json")),
            sub_output: Some(dir.path().join("out/groups.json")),
            ..ClusteringConfig::default()
        };
        run(&config).unwrap();

        let clustered = TopicSet::load(dir.path().join("out/main.json")).unwrap();
        assert_eq!(clustered.linkage_table.map(|t| t.len()), Some(1));
        let groups = SubTopicGroups::load(dir.path().join("out/groups.json")).unwrap();
        assert_eq!(groups.sub_topic_groups.len(), 2);
    }
}
