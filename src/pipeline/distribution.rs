//! Distribution stage: topic totals and field distributions from documents.

use tracing::info;

use super::{timed, StageTime};
use crate::config::DistributionConfig;
use crate::distribution::{
    accumulate, load_domain_data, store_in_topics, validate_specs, DistributionFile, DistributionSpec, TopicSlot,
};
use crate::document::DocumentSet;
use crate::error::Result;
use crate::topic::TopicSet;

/// Compute `specs` over `documents` for the main topics and, when given, for
/// the sub-topics (read from each document's sub slot).
///
/// Specs without an output are stored into the topics; the others are
/// written to their own file. Returns whether any spec changed the topics.
pub fn distribute(
    specs: Vec<DistributionSpec>,
    documents: &DocumentSet,
    main: &mut TopicSet,
    mut sub: Option<&mut TopicSet>,
) -> Result<bool> {
    let specs = validate_specs(specs, documents)?;
    let mut topics_changed = false;
    for spec in &specs {
        info!(%spec, "computing distribution");
        let main_dist = accumulate(spec, documents, main.len(), TopicSlot::Main)?;
        let sub_dist = match sub.as_deref() {
            Some(sub) => Some(accumulate(spec, documents, sub.len(), TopicSlot::Sub)?),
            None => None,
        };

        if spec.saves_in_topics() {
            store_in_topics(spec, &main_dist, &mut main.topics)?;
            if let (Some(sub), Some(dist)) = (sub.as_deref_mut(), &sub_dist) {
                store_in_topics(spec, dist, &mut sub.topics)?;
            }
            topics_changed = true;
        } else {
            let mut file = DistributionFile::for_spec(spec);
            file.main_topics = DistributionFile::entries(spec, &main_dist, &main.topics);
            if let (Some(sub), Some(dist)) = (sub.as_deref(), &sub_dist) {
                file.sub_topics = Some(DistributionFile::entries(spec, dist, &sub.topics));
            }
            if let Some(domain) = &spec.domain_data {
                file.domain_data = Some(load_domain_data(domain)?);
            }
            file.save(&spec.output)?;
            info!(output = %spec.output, "saved distribution file");
        }
    }
    Ok(topics_changed)
}

/// Run the stage as configured.
pub fn run(config: &DistributionConfig) -> Result<StageTime> {
    let ((), time) = timed("Topic distribution", || {
        let documents = DocumentSet::load(&config.documents)?;
        let mut main = TopicSet::load(&config.main_topics)?;
        let mut sub = config.sub_topics.as_ref().map(TopicSet::load).transpose()?;

        let changed = distribute(config.distributions.clone(), &documents, &mut main, sub.as_mut())?;
        if changed {
            main.save(config.main_output.as_ref().unwrap_or(&config.main_topics))?;
            if let (Some(sub), Some(input)) = (&sub, &config.sub_topics) {
                sub.save(config.sub_output.as_ref().unwrap_or(input))?;
            }
        }
        Ok(())
    })?;
    Ok(time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::error::Error;
    use crate::topic::Topic;

    fn documents() -> DocumentSet {
        let mut a = Document::new("a", 0).with_data("year", "2020");
        a.set_main_topic_distribution(&[0.75, 0.25]);
        a.set_sub_topic_distribution(&[0.5, 0.25, 0.25]);
        let mut b = Document::new("b", 1).with_data("year", "2021");
        b.set_main_topic_distribution(&[0.5, 0.5]);
        b.set_sub_topic_distribution(&[0.0, 0.0, 1.0]);
        DocumentSet::new(vec![a, b])
    }

    fn topics(n: usize) -> TopicSet {
        TopicSet::new((0..n).map(|i| Topic::new(format!("t{i}"), i)).collect()).unwrap()
    }

    #[test]
    fn test_stores_main_and_sub_totals() {
        let mut main = topics(2);
        let mut sub = topics(3);
        let changed = distribute(vec![DistributionSpec::over("year")], &documents(), &mut main, Some(&mut sub)).unwrap();
        assert!(changed);
        assert_eq!(main.topics[0].find_total("year-").map(|t| t.weight), Some(1.25));
        assert_eq!(sub.topics[2].find_total("year-").map(|t| t.weight), Some(1.25));
        assert_eq!(sub.topics[2].distributions[0].top_weights[0].id, "2021");
    }

    #[test]
    fn test_separate_output_leaves_topics_alone() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("dist/year.json");
        let spec = DistributionSpec {
            output: output.display().to_string(),
            ..DistributionSpec::over("year")
        };
        let mut main = topics(2);
        let changed = distribute(vec![spec], &documents(), &mut main, None).unwrap();
        assert!(!changed);
        assert!(main.topics[0].totals.is_empty());

        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(written["distributionField"], "year");
        assert_eq!(written["mainTopics"][1]["total"], 0.75);
        assert!(written.get("subTopics").is_none());
    }

    #[test]
    fn test_unusable_specs_fail_the_stage() {
        let mut main = topics(2);
        let err = distribute(vec![DistributionSpec::over("journal")], &documents(), &mut main, None).unwrap_err();
        assert!(matches!(err, Error::NoDistributions));
    }

    #[test]
    fn test_run_overwrites_topic_file_by_default() {
        let dir = tempfile::tempdir().unwrap();
        documents().save(dir.path().join("docs.json")).unwrap();
        topics(2).save(dir.path().join("main.json")).unwrap();
        let config = DistributionConfig {
            documents: dir.path().join("docs.json"),
            main_topics: dir.path().join("main.json"),
            ..DistributionConfig::default()
        };
        run(&config).unwrap();
        let main = TopicSet::load(dir.path().join("main.json")).unwrap();
        assert_eq!(main.topics[1].find_total("-").map(|t| t.weight), Some(0.75));
    }
}
