//! Pipeline configuration.
//!
//! One TOML file configures every stage; each stage reads its own table.
//! Every field has a default, so a file only needs what differs:
//!
//! ```toml
//! [clustering]
//! main_topics = "data/mainTopics.json"
//! main_output = "data/mainTopicsClustered.json"
//! linkage = "avg"
//! clusters = 4
//!
//! [[distribution.distributions]]
//! field = "year"
//! top_per_topic = -1
//!
//! [mapping]
//! bubble_size = "year-"
//! bubble_scale = [5.0, 40.0]
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cluster::Linkage;
use crate::distribution::DistributionSpec;
use crate::document::CleaningOptions;
use crate::error::{Error, Result};
use crate::similarity::{SubToMainMetric, DEFAULT_THRESHOLD};
use crate::topic::LABEL_WORDS;

/// Configuration of every pipeline stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Topic clustering.
    pub clustering: ClusteringConfig,
    /// Sub-to-main assignment of a hierarchical model.
    pub hierarchical: HierarchicalConfig,
    /// Topic distributions.
    pub distribution: DistributionConfig,
    /// Distribution comparison across runs.
    pub comparison: ComparisonConfig,
    /// Hierarchy maps.
    pub mapping: MappingConfig,
    /// Document cleaning.
    pub cleaning: CleaningConfig,
}

impl PipelineConfig {
    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Parse TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// `[clustering]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Main topic-set file.
    pub main_topics: PathBuf,
    /// Clustered main topic-set file.
    pub main_output: PathBuf,
    /// Sub topic-set file, grouped by main topic when set.
    pub sub_topics: Option<PathBuf>,
    /// Sub-topic groups file.
    pub sub_output: Option<PathBuf>,
    /// Linkage between clusters.
    pub linkage: Linkage,
    /// Number of clusters cut from the main dendrogram.
    pub clusters: usize,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            main_topics: PathBuf::from("mainTopics.json"),
            main_output: PathBuf::from("mainTopicsClustered.json"),
            sub_topics: None,
            sub_output: None,
            linkage: Linkage::Average,
            clusters: 1,
        }
    }
}

/// `[hierarchical]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchicalConfig {
    /// Main model topics.
    pub main_topics: PathBuf,
    /// Main model documents.
    pub main_documents: PathBuf,
    /// Sub model topics.
    pub sub_topics: PathBuf,
    /// Sub model documents.
    pub sub_documents: PathBuf,
    /// Merged documents, carrying both distributions.
    pub document_output: PathBuf,
    /// How sub-topics are compared with main topics.
    pub metric: SubToMainMetric,
    /// Document weights below this are ignored by the document metric.
    pub threshold: f64,
    /// Main topics claimed by each sub-topic.
    pub max_assign: usize,
    /// Sub x main similarity CSV.
    pub similarity_output: Option<PathBuf>,
    /// Per-main assignment CSV.
    pub assignment_output: Option<PathBuf>,
    /// Per-sub assignment CSV.
    pub assignment_details_output: Option<PathBuf>,
}

impl Default for HierarchicalConfig {
    fn default() -> Self {
        Self {
            main_topics: PathBuf::from("mainTopics.json"),
            main_documents: PathBuf::from("mainDocuments.json"),
            sub_topics: PathBuf::from("subTopics.json"),
            sub_documents: PathBuf::from("subDocuments.json"),
            document_output: PathBuf::from("documents.json"),
            metric: SubToMainMetric::default(),
            threshold: DEFAULT_THRESHOLD,
            max_assign: 1,
            similarity_output: None,
            assignment_output: None,
            assignment_details_output: None,
        }
    }
}

/// `[distribution]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Documents with topic distributions.
    pub documents: PathBuf,
    /// Main topic-set file.
    pub main_topics: PathBuf,
    /// Where main topics are written; the input file when unset.
    pub main_output: Option<PathBuf>,
    /// Sub topic-set file, distributed over the documents' sub slot when set.
    pub sub_topics: Option<PathBuf>,
    /// Where sub-topics are written; the input file when unset.
    pub sub_output: Option<PathBuf>,
    /// Distributions to compute.
    pub distributions: Vec<DistributionSpec>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            documents: PathBuf::from("documents.json"),
            main_topics: PathBuf::from("mainTopics.json"),
            main_output: None,
            sub_topics: None,
            sub_output: None,
            distributions: vec![DistributionSpec::default()],
        }
    }
}

/// `[comparison]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Current main topics, overwritten with inherited initial totals.
    pub main_topics: PathBuf,
    /// Main topics of the previous run.
    pub previous_main_topics: PathBuf,
    /// Current sub-topics.
    pub sub_topics: Option<PathBuf>,
    /// Sub-topics of the previous run.
    pub previous_sub_topics: Option<PathBuf>,
    /// Total ids to compare.
    pub distributions: Vec<String>,
    /// Top words in the topic label used to match and key topics.
    pub label_words: usize,
    /// Main comparison CSV.
    pub main_output: Option<PathBuf>,
    /// Sub comparison CSV.
    pub sub_output: Option<PathBuf>,
    /// Combined comparison CSV.
    pub output: Option<PathBuf>,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            main_topics: PathBuf::from("mainTopics.json"),
            previous_main_topics: PathBuf::from("previous/mainTopics.json"),
            sub_topics: None,
            previous_sub_topics: None,
            distributions: Vec::new(),
            label_words: LABEL_WORDS,
            main_output: None,
            sub_output: None,
            output: None,
        }
    }
}

/// `[mapping]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Clustered main topic-set file.
    pub main_topics: PathBuf,
    /// Main hierarchy JSON.
    pub main_output: PathBuf,
    /// Sub-topic groups file.
    pub sub_topics: Option<PathBuf>,
    /// Sub hierarchy JSON, one tree per main topic.
    pub sub_output: Option<PathBuf>,
    /// Total id sizing the bubbles.
    pub bubble_size: String,
    /// Range leaf sizes are rescaled onto.
    pub bubble_scale: [f64; 2],
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            main_topics: PathBuf::from("mainTopicsClustered.json"),
            main_output: PathBuf::from("mainMap.json"),
            sub_topics: None,
            sub_output: None,
            bubble_size: "-".to_string(),
            bubble_scale: [5.0, 40.0],
        }
    }
}

impl MappingConfig {
    /// Bubble scale with a lower bound of at least 1 and an upper bound above it.
    pub fn checked_scale(&self) -> (f64, f64) {
        let [mut lower, mut upper] = self.bubble_scale;
        if lower < 1.0 {
            warn!(lower, "bubble_scale lower bound must be at least 1, using 1");
            lower = 1.0;
        }
        if upper < lower {
            warn!(upper, lower, "bubble_scale upper bound below lower bound, using lower + 1");
            upper = lower + 1.0;
        }
        (lower, upper)
    }
}

/// `[cleaning]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Raw document file.
    pub corpus: PathBuf,
    /// Cleaned document file.
    pub output: PathBuf,
    /// `docData` fields holding the text.
    pub text_fields: Vec<String>,
    /// Lemmas dropped everywhere.
    pub stop_words: Vec<String>,
    /// Phrases cut before lemmatising.
    pub stop_phrases: Vec<String>,
    /// Minimum lemmas for a document to be kept.
    pub min_lemmas: usize,
    /// Lemmas occurring this many times or fewer are dropped.
    pub min_lemma_count: usize,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            corpus: PathBuf::from("corpus.json"),
            output: PathBuf::from("documents.json"),
            text_fields: vec!["text".to_string()],
            stop_words: Vec::new(),
            stop_phrases: Vec::new(),
            min_lemmas: 1,
            min_lemma_count: 0,
        }
    }
}

impl CleaningConfig {
    /// Options for [`clean_documents`](crate::document::clean_documents).
    pub fn options(&self) -> Result<CleaningOptions> {
        if self.text_fields.is_empty() {
            return Err(Error::InvalidParameter {
                name: "text_fields",
                message: "at least one text field is required".to_string(),
            });
        }
        Ok(CleaningOptions {
            text_fields: self.text_fields.clone(),
            stop_words: self.stop_words.iter().map(|w| w.to_lowercase()).collect::<HashSet<_>>(),
            stop_phrases: self.stop_phrases.clone(),
            min_lemmas: self.min_lemmas,
            remove_low_counts: self.min_lemma_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.clustering.linkage, Linkage::Average);
        assert_eq!(config.hierarchical.threshold, 0.1);
        assert_eq!(config.distribution.distributions, vec![DistributionSpec::default()]);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            [clustering]
            linkage = "max"
            clusters = 4

            [hierarchical]
            metric = "l1"
            max_assign = 2

            [[distribution.distributions]]
            field = "year"
            value_field = "citations"
            top_per_topic = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.clustering.linkage, Linkage::Max);
        assert_eq!(config.clustering.clusters, 4);
        assert_eq!(config.clustering.main_topics, PathBuf::from("mainTopics.json"));
        assert_eq!(config.hierarchical.metric, SubToMainMetric::LabelsL1);
        assert_eq!(config.hierarchical.max_assign, 2);
        let spec = &config.distribution.distributions[0];
        assert_eq!(spec.total_id(), "year-citations");
        assert_eq!(spec.top_per_topic, 5);
        assert!(spec.separator.is_empty());
    }

    #[test]
    fn test_unknown_linkage_is_rejected() {
        let err = PipelineConfig::from_toml("[clustering]\nlinkage = \"ward\"").unwrap_err();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(&path, "[mapping]\nbubble_size = \"year-\"\n").unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.mapping.bubble_size, "year-");
        assert!(PipelineConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_bubble_scale_is_clamped() {
        let mapping = MappingConfig {
            bubble_scale: [0.0, 0.5],
            ..MappingConfig::default()
        };
        assert_eq!(mapping.checked_scale(), (1.0, 2.0));
        assert_eq!(MappingConfig::default().checked_scale(), (5.0, 40.0));
    }

    #[test]
    fn test_cleaning_options_lowercase_stop_words() {
        let cleaning = CleaningConfig {
            stop_words: vec!["The".into()],
            ..CleaningConfig::default()
        };
        let options = cleaning.options().unwrap();
        assert!(options.stop_words.contains("the"));
        assert_eq!(options.min_lemmas, 1);

        let empty = CleaningConfig {
            text_fields: Vec::new(),
            ..CleaningConfig::default()
        };
        assert!(empty.options().is_err());
    }
}
