//! Comparison stage: distribution totals of a re-run model against the
//! previous run.

use tracing::info;

use super::{paired, timed, StageTime};
use crate::config::ComparisonConfig;
use crate::distribution::{compare_distributions, TopicComparisons};
use crate::error::Result;
use crate::export;
use crate::topic::TopicSet;

/// Comparisons of the main topics and, when compared, the sub-topics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonResult {
    /// Main topics, keyed by label.
    pub main: TopicComparisons,
    /// Sub-topics, keyed by label.
    pub sub: Option<TopicComparisons>,
}

impl ComparisonResult {
    /// Main and sub comparisons in one table. Sub labels win on collision.
    pub fn combined(&self) -> TopicComparisons {
        let mut all = self.main.clone();
        if let Some(sub) = &self.sub {
            all.extend(sub.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        all
    }
}

/// Run the stage as configured.
///
/// The current topic files are overwritten so their totals carry the
/// initial weights forward.
pub fn run(config: &ComparisonConfig) -> Result<(ComparisonResult, StageTime)> {
    let subs = paired("sub_topics", &config.sub_topics, &config.previous_sub_topics)?;
    timed("Comparing distributions", || {
        let names = &config.distributions;
        info!(
            current = %config.main_topics.display(),
            previous = %config.previous_main_topics.display(),
            distributions = names.join(", "),
            "comparing distributions"
        );
        let mut main = TopicSet::load(&config.main_topics)?;
        let previous = TopicSet::load(&config.previous_main_topics)?;
        let mut result = ComparisonResult {
            main: compare_distributions(&mut main.topics, &previous.topics, names, config.label_words)?,
            sub: None,
        };

        let mut sub = None;
        if let Some((current_path, previous_path)) = subs {
            let mut current = TopicSet::load(current_path)?;
            let previous = TopicSet::load(previous_path)?;
            result.sub = Some(compare_distributions(
                &mut current.topics,
                &previous.topics,
                names,
                config.label_words,
            )?);
            sub = Some((current, current_path));
        }

        if let Some(path) = &config.main_output {
            export::write_comparisons(path, names, &result.main)?;
        }
        if let (Some(path), Some(cmp)) = (&config.sub_output, &result.sub) {
            export::write_comparisons(path, names, cmp)?;
        }
        if let Some(path) = &config.output {
            export::write_comparisons(path, names, &result.combined())?;
        }

        main.save(&config.main_topics)?;
        if let Some((current, path)) = sub {
            current.save(path)?;
        }
        Ok(result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::topic::{Topic, Total};

    fn topic_set(prefix: &str, weights: &[f64]) -> TopicSet {
        let topics = weights
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let mut t = Topic::new(format!("{prefix}{i}"), i).with_words([(format!("w{i}"), 1.0)]);
                t.add_total(Total::new("-", w));
                t
            })
            .collect();
        TopicSet::new(topics).unwrap()
    }

    #[test]
    fn test_writes_csvs_and_overwrites_current() {
        let dir = tempfile::tempdir().unwrap();
        let path = |name: &str| dir.path().join(name);
        topic_set("m", &[3.0, 4.0]).save(path("main.json")).unwrap();
        topic_set("m", &[2.0, 5.0]).save(path("prev_main.json")).unwrap();
        topic_set("s", &[1.0]).save(path("sub.json")).unwrap();
        topic_set("s", &[1.5]).save(path("prev_sub.json")).unwrap();

        let config = ComparisonConfig {
            main_topics: path("main.json"),
            previous_main_topics: path("prev_main.json"),
            sub_topics: Some(path("sub.json")),
            previous_sub_topics: Some(path("prev_sub.json")),
            distributions: vec!["-".to_string()],
            main_output: Some(path("cmp/main.csv")),
            output: Some(path("cmp/all.csv")),
            ..ComparisonConfig::default()
        };
        let (result, _) = run(&config).unwrap();

        assert_eq!(result.main["w0"]["-"].diff(), 1.0);
        assert_eq!(result.sub.as_ref().map(|s| s["w0"]["-"].previous), Some(1.5));
        assert_eq!(std::fs::read_to_string(path("cmp/main.csv")).unwrap().lines().count(), 3);
        assert!(!path("cmp/sub.csv").exists());

        let rewritten = TopicSet::load(path("main.json")).unwrap();
        assert_eq!(rewritten.topics[1].totals[0].initial, Some(5.0));
        let sub = TopicSet::load(path("sub.json")).unwrap();
        assert_eq!(sub.topics[0].totals[0].initial, Some(1.5));
    }

    #[test]
    fn test_combined_merges_sub_labels() {
        let mut main = topic_set("m", &[1.0]);
        let mut sub = topic_set("s", &[1.0]);
        sub.topics[0].top_words[0].label = "other".into();
        let names = vec!["-".to_string()];
        let result = ComparisonResult {
            main: compare_distributions(&mut main.topics, &topic_set("m", &[1.0]).topics, &names, 3).unwrap(),
            sub: Some({
                let previous = sub.clone();
                compare_distributions(&mut sub.topics, &previous.topics, &names, 3).unwrap()
            }),
        };
        let all = result.combined();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key("w0") && all.contains_key("other"));
    }

    #[test]
    fn test_unpaired_sub_paths_are_rejected() {
        let config = ComparisonConfig {
            sub_topics: Some("sub.json".into()),
            distributions: vec!["-".to_string()],
            ..ComparisonConfig::default()
        };
        assert!(matches!(run(&config), Err(Error::InvalidParameter { .. })));
    }
}
