//! Topic data model and the topic-set JSON file.
//!
//! A topic-set file is what the topic-model stage hands over to everything
//! downstream:
//!
//! ```text
//! {
//!   "metadata": {...},
//!   "similarities": [[...], ...],          // N x N, row = topicIndex
//!   "topics": [ {topicId, topicIndex, topWords, topDocs, ...} ],
//!   "linkageTable": [{node1, node2, distance}]   // after clustering
//! }
//! ```
//!
//! Topics are kept sorted by `topicIndex`, and the index of a topic is its
//! row/column in `similarities` and its slot in every document's topic
//! distribution.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::cluster::LinkageTable;
use crate::error::{Error, Result};
use crate::similarity::SimilarityMatrix;

/// Number of top words used to label topics in exports.
pub const LABEL_WORDS: usize = 3;

/// A (word, weight) pair from a topic's top words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordWeight {
    /// Word (lemma) label.
    pub label: String,
    /// Weight of the word in the topic.
    pub weight: f64,
}

/// A (document, weight) pair from a topic's top documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocWeight {
    /// Document id.
    pub doc_id: String,
    /// Weight of the topic in the document.
    pub weight: f64,
    /// Document fields copied for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_data: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Generic (id, weight) reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdWeight {
    /// Referenced id.
    pub id: String,
    /// Weight attached to the reference.
    pub weight: f64,
}

/// Total weight of a distribution over one topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Total {
    /// Total id, `field-valueField`.
    pub id: String,
    /// Total weight.
    pub weight: f64,
    /// Weight from the first run of a model, carried across re-runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<f64>,
}

impl Total {
    /// New total with no initial weight.
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
            initial: None,
        }
    }

    /// Initial weight, defaulting to the current weight.
    pub fn initial_weight(&self) -> f64 {
        self.initial.unwrap_or(self.weight)
    }
}

/// Distribution of one topic across the values of a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedDistribution {
    /// Document field the topic is distributed over.
    pub field: String,
    /// Numeric document field used as weight, if not counting documents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Top field values by weight.
    pub top_weights: Vec<IdWeight>,
}

/// One topic of a fitted topic model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Topic id.
    pub topic_id: String,
    /// Position in the similarity matrix and in document distributions.
    pub topic_index: usize,
    /// Top words, heaviest first.
    #[serde(default)]
    pub top_words: Vec<WordWeight>,
    /// Top documents, heaviest first.
    #[serde(default)]
    pub top_docs: Vec<DocWeight>,
    /// Main topics this sub-topic is assigned to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_topic_ids: Vec<IdWeight>,
    /// Sub-topics assigned to this main topic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_topic_ids: Vec<IdWeight>,
    /// Distributions across document fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distributions: Vec<NamedDistribution>,
    /// Distribution totals.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub totals: Vec<Total>,
    /// Cluster id set by clustering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    /// Group-local id when clustered inside a main topic's group.
    #[serde(
        rename = "subTopicId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub group_topic_id: Option<String>,
    /// Group-local index when clustered inside a main topic's group.
    #[serde(
        default,
        serialize_with = "serialize_group_index",
        deserialize_with = "deserialize_group_index"
    )]
    pub group_topic_index: Option<usize>,
}

fn serialize_group_index<S: Serializer>(v: &Option<usize>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match v {
        Some(i) => s.serialize_i64(*i as i64),
        None => s.serialize_i64(-1),
    }
}

fn deserialize_group_index<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<usize>, D::Error> {
    let raw = i64::deserialize(d)?;
    Ok(usize::try_from(raw).ok())
}

impl Topic {
    /// Minimal topic with an id and index.
    pub fn new(topic_id: impl Into<String>, topic_index: usize) -> Self {
        Self {
            topic_id: topic_id.into(),
            topic_index,
            top_words: Vec::new(),
            top_docs: Vec::new(),
            main_topic_ids: Vec::new(),
            sub_topic_ids: Vec::new(),
            distributions: Vec::new(),
            totals: Vec::new(),
            cluster_id: None,
            group_topic_id: None,
            group_topic_index: None,
        }
    }

    /// Set top words from (label, weight) pairs.
    pub fn with_words<S: Into<String>>(mut self, words: impl IntoIterator<Item = (S, f64)>) -> Self {
        self.top_words = words
            .into_iter()
            .map(|(label, weight)| WordWeight {
                label: label.into(),
                weight,
            })
            .collect();
        self
    }

    /// Top `n` words joined with `-`.
    pub fn label(&self, n: usize) -> String {
        self.top_words
            .iter()
            .take(n)
            .map(|w| w.label.as_str())
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Index used inside a topic group, falling back to the model index.
    pub fn group_index(&self) -> usize {
        self.group_topic_index.unwrap_or(self.topic_index)
    }

    /// Numeric cluster id, if the cluster id parses as an integer.
    pub fn numeric_cluster_id(&self) -> Option<i64> {
        self.cluster_id.as_deref().and_then(|c| c.parse().ok())
    }

    /// Find a total by id.
    pub fn find_total(&self, id: &str) -> Option<&Total> {
        self.totals.iter().find(|t| t.id == id)
    }

    /// Find a total by id, mutably.
    pub fn find_total_mut(&mut self, id: &str) -> Option<&mut Total> {
        self.totals.iter_mut().find(|t| t.id == id)
    }

    /// Add a total, replacing an existing one with the same id.
    pub fn add_total(&mut self, total: Total) {
        match self.find_total_mut(&total.id) {
            Some(existing) => {
                existing.weight = total.weight;
                if total.initial.is_some() {
                    existing.initial = total.initial;
                }
            }
            None => self.totals.push(total),
        }
    }

    /// Add a distribution, replacing one over the same field and value.
    pub fn add_distribution(&mut self, distribution: NamedDistribution) {
        match self
            .distributions
            .iter_mut()
            .find(|d| d.field == distribution.field && d.value == distribution.value)
        {
            Some(existing) => *existing = distribution,
            None => self.distributions.push(distribution),
        }
    }

    /// Reference a main topic from this sub-topic.
    pub fn add_main_topic_id(&mut self, id: impl Into<String>, weight: f64) {
        self.main_topic_ids.push(IdWeight {
            id: id.into(),
            weight,
        });
    }

    /// Reference a sub-topic from this main topic.
    pub fn add_sub_topic_id(&mut self, id: impl Into<String>, weight: f64) {
        self.sub_topic_ids.push(IdWeight {
            id: id.into(),
            weight,
        });
    }
}

/// A topic-set file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSet {
    /// Opaque metadata from the topic-model stage.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Topic-topic similarity matrix.
    #[serde(default)]
    pub similarities: Vec<Vec<f64>>,
    /// Topics sorted by index.
    pub topics: Vec<Topic>,
    /// Linkage table, once clustered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkage_table: Option<LinkageTable>,
}

impl TopicSet {
    /// Build from topics, sorting them and checking their indices.
    pub fn new(mut topics: Vec<Topic>) -> Result<Self> {
        topics.sort_by_key(|t| t.topic_index);
        check_indices(&topics)?;
        Ok(Self {
            topics,
            ..Self::default()
        })
    }

    /// Load a topic-set file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut set: TopicSet = read_json(path)?;
        set.topics.sort_by_key(|t| t.topic_index);
        check_indices(&set.topics)?;
        Ok(set)
    }

    /// Save as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_json(path, self)
    }

    /// Number of topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether the set has no topics.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// The stored similarities as a checked matrix.
    pub fn similarity_matrix(&self) -> Result<SimilarityMatrix> {
        SimilarityMatrix::from_rows(self.similarities.clone())
    }

    /// Topic with the given id.
    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.topic_id == id)
    }

    /// Topic with the given id, mutably.
    pub fn topic_mut(&mut self, id: &str) -> Option<&mut Topic> {
        self.topics.iter_mut().find(|t| t.topic_id == id)
    }

    /// Export labels of every topic, in index order.
    pub fn labels(&self, n_words: usize) -> Vec<String> {
        self.topics.iter().map(|t| t.label(n_words)).collect()
    }
}

/// Sub-topics clustered independently within one main topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicGroupRecord {
    /// Main topic owning the group.
    pub main_topic_id: String,
    /// Sub-topics of the group, with group-local indices set.
    pub topics: Vec<Topic>,
    /// Group similarity matrix, in group-local index order.
    pub similarities: Vec<Vec<f64>>,
    /// Linkage table over the group.
    pub linkage_table: LinkageTable,
}

/// Output file of sub-topic clustering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTopicGroups {
    /// Metadata of the sub-topic model.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// One entry per main topic.
    pub sub_topic_groups: Vec<TopicGroupRecord>,
}

impl SubTopicGroups {
    /// Load a sub-topic groups file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path)
    }

    /// Save as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_json(path, self)
    }
}

fn check_indices(topics: &[Topic]) -> Result<()> {
    for (position, topic) in topics.iter().enumerate() {
        if topic.topic_index != position {
            return Err(Error::InvalidParameter {
                name: "topicIndex",
                message: format!(
                    "topic {} has index {} but is at position {} (indices must be unique and contiguous)",
                    topic.topic_id, topic.topic_index, position
                ),
            });
        }
    }
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub(crate) fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let raw = serde_json::to_string_pretty(value)?;
    fs::write(path, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic_json() -> &'static str {
        r#"{
            "topicId": "3",
            "topicIndex": 3,
            "topWords": [{"label": "cell", "weight": 0.5}, {"label": "gene", "weight": 0.3},
                         {"label": "protein", "weight": 0.1}, {"label": "dna", "weight": 0.05}],
            "topDocs": [{"docId": "d1", "weight": 0.9}],
            "totals": [{"id": "year-", "weight": 12.5}],
            "groupTopicIndex": -1
        }"#
    }

    #[test]
    fn test_topic_deserialize_camel_case() {
        let topic: Topic = serde_json::from_str(topic_json()).unwrap();
        assert_eq!(topic.topic_id, "3");
        assert_eq!(topic.topic_index, 3);
        assert_eq!(topic.top_docs[0].doc_id, "d1");
        assert_eq!(topic.group_topic_index, None);
        assert_eq!(topic.group_index(), 3);
        assert_eq!(topic.find_total("year-").map(|t| t.weight), Some(12.5));
    }

    #[test]
    fn test_topic_label_uses_top_words() {
        let topic: Topic = serde_json::from_str(topic_json()).unwrap();
        assert_eq!(topic.label(LABEL_WORDS), "cell-gene-protein");
        assert_eq!(topic.label(1), "cell");
    }

    #[test]
    fn test_group_index_serializes_minus_one() {
        let topic = Topic::new("0", 0);
        let value = serde_json::to_value(&topic).unwrap();
        assert_eq!(value["groupTopicIndex"], serde_json::json!(-1));
        assert!(value.get("clusterId").is_none());
    }

    #[test]
    fn test_add_total_replaces_same_id() {
        let mut topic = Topic::new("0", 0);
        topic.add_total(Total::new("year-", 1.0));
        topic.add_total(Total::new("year-", 2.0));
        assert_eq!(topic.totals.len(), 1);
        assert_eq!(topic.totals[0].weight, 2.0);
        assert_eq!(topic.totals[0].initial_weight(), 2.0);
    }

    #[test]
    fn test_topic_set_rejects_gap_in_indices() {
        let topics = vec![Topic::new("a", 0), Topic::new("b", 2)];
        assert!(matches!(
            TopicSet::new(topics),
            Err(Error::InvalidParameter { name: "topicIndex", .. })
        ));
    }

    #[test]
    fn test_topic_set_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("topics.json");
        let mut set = TopicSet::new(vec![Topic::new("b", 1), Topic::new("a", 0)]).unwrap();
        set.similarities = vec![vec![1.0, 0.2], vec![0.2, 1.0]];
        set.save(&path).unwrap();

        let loaded = TopicSet::load(&path).unwrap();
        assert_eq!(loaded, set);
        assert_eq!(loaded.topics[0].topic_id, "a");
        assert_eq!(loaded.similarity_matrix().unwrap().size(), 2);
    }
}
