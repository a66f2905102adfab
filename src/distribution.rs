//! Topic distributions across document fields, and run-to-run comparisons.
//!
//! A distribution spreads each topic's weight over the values of a
//! document field (`year`, `journal`, ...), optionally weighted by a numeric
//! field (`citations`) instead of counting documents:
//!
//! ```text
//! dist[topic][field value] += topic weight in doc * value
//! ```
//!
//! Every distribution also leaves a total on each topic, stored under
//! `field-valueField`. Totals size the hierarchy bubbles and are what
//! [`compare_distributions`] tracks across re-runs of a model.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::{Document, DocumentSet};
use crate::error::{Error, Result};
use crate::rounding;
use crate::topic::{write_json, IdWeight, NamedDistribution, Topic, Total};

/// One distribution to compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionSpec {
    /// Document field to distribute over. Empty: totals only.
    pub field: String,
    /// Separator for multi-valued fields. Empty: the field is one value.
    pub separator: String,
    /// Numeric document field used as weight. Empty: count documents.
    pub value_field: String,
    /// Entries kept per topic: -1 all, 0 none (total only), k the top k.
    pub top_per_topic: i64,
    /// Separate output file. Empty: store into the topics.
    pub output: String,
    /// Extra per-value data joined into the separate output file.
    pub domain_data: Option<DomainDataSpec>,
}

impl Default for DistributionSpec {
    fn default() -> Self {
        Self {
            field: String::new(),
            separator: String::new(),
            value_field: String::new(),
            top_per_topic: -1,
            output: String::new(),
            domain_data: None,
        }
    }
}

impl DistributionSpec {
    /// Distribution over `field`, counting documents and keeping all entries.
    pub fn over(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            ..Self::default()
        }
    }

    /// Weight documents by a numeric field.
    pub fn weighted_by(mut self, value_field: impl Into<String>) -> Self {
        self.value_field = value_field.into();
        self
    }

    /// Split the field on `separator`.
    pub fn split_on(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Keep only the top `k` entries per topic.
    pub fn top(mut self, k: i64) -> Self {
        self.top_per_topic = k;
        self
    }

    /// Id of the total this distribution stores on each topic.
    pub fn total_id(&self) -> String {
        format!("{}-{}", self.field, self.value_field)
    }

    /// Whether results go into the topic files rather than a separate file.
    pub fn saves_in_topics(&self) -> bool {
        self.output.is_empty()
    }

    fn keeps_entries(&self) -> bool {
        self.top_per_topic != 0 && !self.field.is_empty()
    }

    fn keeps(&self, added: usize) -> bool {
        self.top_per_topic < 0 || (added as i64) < self.top_per_topic
    }

    /// Values of `field` in a document, split and trimmed when a separator is set.
    fn field_values<'a>(&'a self, doc: &'a Document) -> Vec<&'a str> {
        if self.field.is_empty() {
            return vec![""];
        }
        let raw = doc.doc_data.get(&self.field).map(String::as_str).unwrap_or("");
        if self.separator.is_empty() {
            vec![raw]
        } else {
            raw.split(self.separator.as_str()).map(str::trim).collect()
        }
    }

    fn document_value(&self, doc: &Document) -> Option<f64> {
        if self.value_field.is_empty() {
            return Some(1.0);
        }
        doc.doc_data.get(&self.value_field)?.trim().parse().ok()
    }
}

impl fmt::Display for DistributionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "topic totals")?;
        } else {
            write!(f, "distribution across {}", self.field)?;
        }
        if !self.separator.is_empty() {
            write!(f, " split on {:?}", self.separator)?;
        }
        if self.value_field.is_empty() {
            write!(f, ", counting documents")?;
        } else {
            write!(f, ", weighted by {}", self.value_field)?;
        }
        match self.top_per_topic {
            k if k < 0 => write!(f, ", all entries"),
            0 => write!(f, ", totals only"),
            k => write!(f, ", top {k} entries"),
        }
    }
}

/// Domain data joined into a separate distribution file, read from CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDataSpec {
    /// CSV file with a header row.
    pub file: PathBuf,
    /// Column holding the field value each row describes.
    #[serde(default = "default_domain_id")]
    pub id_column: String,
    /// Output key to CSV column.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

fn default_domain_id() -> String {
    "id".to_string()
}

/// Read domain data as `id -> {output key -> value}`.
pub fn load_domain_data(spec: &DomainDataSpec) -> Result<BTreeMap<String, BTreeMap<String, String>>> {
    let mut reader = csv::Reader::from_path(&spec.file)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::InvalidParameter {
                name: "domainData",
                message: format!("column '{name}' not found in {}", spec.file.display()),
            })
    };
    let id_col = column(&spec.id_column)?;
    let field_cols = spec
        .fields
        .iter()
        .map(|(key, col)| Ok((key.clone(), column(col)?)))
        .collect::<Result<Vec<_>>>()?;

    let mut data = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let id = record.get(id_col).unwrap_or_default().to_string();
        let entry = field_cols
            .iter()
            .map(|(key, col)| (key.clone(), record.get(*col).unwrap_or_default().to_string()))
            .collect();
        let _ = data.insert(id, entry);
    }
    Ok(data)
}

/// Drop specs the retained documents cannot support.
///
/// A spec goes when its field or value field is missing from a retained
/// document, or when its value field does not parse as a number. Every spec
/// sharing the offending field (or value field) is dropped with it.
pub fn validate_specs(specs: Vec<DistributionSpec>, documents: &DocumentSet) -> Result<Vec<DistributionSpec>> {
    let mut bad_fields: Vec<String> = Vec::new();
    let mut bad_values: Vec<String> = Vec::new();
    for doc in documents.retained() {
        for spec in &specs {
            if !spec.field.is_empty() && !doc.doc_data.contains_key(&spec.field) && !bad_fields.contains(&spec.field) {
                warn!(field = %spec.field, doc = %doc.doc_id, "distribution field not found, ignoring");
                bad_fields.push(spec.field.clone());
            }
            if spec.value_field.is_empty() || bad_values.contains(&spec.value_field) {
                continue;
            }
            match doc.doc_data.get(&spec.value_field) {
                None => {
                    warn!(value = %spec.value_field, doc = %doc.doc_id, "distribution value not found, ignoring");
                    bad_values.push(spec.value_field.clone());
                }
                Some(raw) if raw.trim().parse::<f64>().is_err() => {
                    warn!(value = %spec.value_field, doc = %doc.doc_id, raw = %raw, "distribution value is not a number, ignoring");
                    bad_values.push(spec.value_field.clone());
                }
                Some(_) => {}
            }
        }
    }

    let kept: Vec<_> = specs
        .into_iter()
        .filter(|s| !bad_fields.contains(&s.field) && !bad_values.contains(&s.value_field))
        .collect();
    if kept.is_empty() {
        return Err(Error::NoDistributions);
    }
    if !bad_fields.is_empty() || !bad_values.is_empty() {
        info!(
            fields = bad_fields.len(),
            values = bad_values.len(),
            kept = kept.len(),
            "distributions dropped during validation"
        );
    }
    Ok(kept)
}

/// Which topic distribution of a document to spread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicSlot {
    /// The main model's distribution.
    Main,
    /// The sub model's distribution, in hierarchical models.
    Sub,
}

impl TopicSlot {
    fn weights(self, doc: &Document) -> Option<&[f64]> {
        match self {
            TopicSlot::Main => doc.main_topic_distribution(),
            TopicSlot::Sub => doc.sub_topic_distribution(),
        }
    }
}

/// Accumulated weights per topic and field value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDistribution {
    per_topic: Vec<HashMap<String, f64>>,
}

impl FieldDistribution {
    fn empty(n_topics: usize) -> Self {
        Self {
            per_topic: vec![HashMap::new(); n_topics],
        }
    }

    fn add_document(mut self, spec: &DistributionSpec, doc: &Document, weights: &[f64]) -> Self {
        let Some(value) = spec.document_value(doc) else {
            return self;
        };
        let keys = spec.field_values(doc);
        for (dist, &topic_weight) in self.per_topic.iter_mut().zip(weights) {
            for key in &keys {
                *dist.entry((*key).to_string()).or_insert(0.0) += topic_weight * value;
            }
        }
        self
    }

    fn merge(mut self, other: Self) -> Self {
        for (dist, other) in self.per_topic.iter_mut().zip(other.per_topic) {
            for (key, w) in other {
                *dist.entry(key).or_insert(0.0) += w;
            }
        }
        self
    }

    /// Number of topics.
    pub fn n_topics(&self) -> usize {
        self.per_topic.len()
    }

    /// Raw accumulated weight of `key` in topic `index`.
    pub fn weight(&self, index: usize, key: &str) -> Option<f64> {
        self.per_topic.get(index)?.get(key).copied()
    }

    /// Summarise topic `index`: kept entries heaviest first, and the total.
    ///
    /// Entries are rounded before summing, so the total matches what a reader
    /// of the full distribution would add up.
    pub fn summarise(&self, index: usize, spec: &DistributionSpec) -> (Vec<IdWeight>, f64) {
        let Some(dist) = self.per_topic.get(index) else {
            return (Vec::new(), 0.0);
        };
        let mut sorted: Vec<(&String, f64)> = dist.iter().map(|(k, &w)| (k, w)).collect();
        sorted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut entries = Vec::new();
        let mut total = 0.0;
        for (key, w) in sorted {
            let w = rounding::weight(w);
            if spec.keeps_entries() && spec.keeps(entries.len()) {
                entries.push(IdWeight {
                    id: key.clone(),
                    weight: w,
                });
            }
            total += w;
        }
        (entries, rounding::weight(total))
    }
}

/// Spread each retained document's topic weights over the spec's field values.
pub fn accumulate(
    spec: &DistributionSpec,
    documents: &DocumentSet,
    n_topics: usize,
    slot: TopicSlot,
) -> Result<FieldDistribution> {
    let docs: Vec<(&Document, &[f64])> = documents
        .retained()
        .filter_map(|doc| slot.weights(doc).map(|w| (doc, w)))
        .collect();
    if let Some((_, w)) = docs.iter().find(|(_, w)| w.len() != n_topics) {
        return Err(Error::DimensionMismatch {
            expected: n_topics,
            found: w.len(),
        });
    }

    #[cfg(feature = "parallel")]
    let dist = docs
        .par_iter()
        .fold(
            || FieldDistribution::empty(n_topics),
            |acc, (doc, w)| acc.add_document(spec, doc, w),
        )
        .reduce(|| FieldDistribution::empty(n_topics), FieldDistribution::merge);

    #[cfg(not(feature = "parallel"))]
    let dist = docs
        .iter()
        .fold(FieldDistribution::empty(n_topics), |acc, (doc, w)| {
            acc.add_document(spec, doc, w)
        });

    Ok(dist)
}

/// Store totals (and kept entries) on the topics, matched by position.
pub fn store_in_topics(spec: &DistributionSpec, dist: &FieldDistribution, topics: &mut [Topic]) -> Result<()> {
    if topics.len() != dist.n_topics() {
        return Err(Error::DimensionMismatch {
            expected: dist.n_topics(),
            found: topics.len(),
        });
    }
    let total_id = spec.total_id();
    for (i, topic) in topics.iter_mut().enumerate() {
        let (entries, total) = dist.summarise(i, spec);
        topic.add_total(Total::new(total_id.clone(), total));
        if spec.keeps_entries() {
            topic.add_distribution(NamedDistribution {
                field: spec.field.clone(),
                value: (!spec.value_field.is_empty()).then(|| spec.value_field.clone()),
                top_weights: entries,
            });
        }
    }
    Ok(())
}

/// One topic in a separate distribution file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDistributionEntry {
    /// Topic id.
    pub topic_id: String,
    /// Total weight.
    pub total: f64,
    /// Kept entries, if any are kept.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Vec<IdWeight>>,
}

/// A separate distribution file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionFile {
    /// Distributed field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_field: Option<String>,
    /// Weighting field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_value: Option<String>,
    /// Main-model topics.
    pub main_topics: Vec<TopicDistributionEntry>,
    /// Sub-model topics, for hierarchical models.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_topics: Option<Vec<TopicDistributionEntry>>,
    /// Domain data keyed by field value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_data: Option<BTreeMap<String, BTreeMap<String, String>>>,
}

impl DistributionFile {
    /// Header for `spec` with no topics yet.
    pub fn for_spec(spec: &DistributionSpec) -> Self {
        Self {
            distribution_field: (!spec.field.is_empty()).then(|| spec.field.clone()),
            distribution_value: (!spec.value_field.is_empty()).then(|| spec.value_field.clone()),
            ..Self::default()
        }
    }

    /// Topic entries for `topics`, matched by position.
    pub fn entries(spec: &DistributionSpec, dist: &FieldDistribution, topics: &[Topic]) -> Vec<TopicDistributionEntry> {
        topics
            .iter()
            .enumerate()
            .map(|(i, topic)| {
                let (entries, total) = dist.summarise(i, spec);
                TopicDistributionEntry {
                    topic_id: topic.topic_id.clone(),
                    total,
                    distribution: spec.keeps_entries().then_some(entries),
                }
            })
            .collect()
    }

    /// Save as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_json(path, self)
    }
}

/// Totals of one distribution across three runs of a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistribComparison {
    /// Total from the first run.
    pub initial: f64,
    /// Total from the previous run.
    pub previous: f64,
    /// Total from the current run.
    pub current: f64,
}

impl DistribComparison {
    /// Change since the first run.
    pub fn initial_diff(&self) -> f64 {
        self.current - self.initial
    }

    /// Change since the previous run.
    pub fn diff(&self) -> f64 {
        self.current - self.previous
    }
}

/// Comparisons keyed by topic label, then by total id.
pub type TopicComparisons = BTreeMap<String, BTreeMap<String, DistribComparison>>;

/// Compare totals of `current` against `previous`, topic by topic.
///
/// Topics are matched by id and must carry the same label. Each current
/// total inherits the previous total's initial weight, so re-running the
/// comparison on the next model keeps measuring against the first run.
pub fn compare_distributions(
    current: &mut [Topic],
    previous: &[Topic],
    names: &[String],
    label_words: usize,
) -> Result<TopicComparisons> {
    if names.is_empty() {
        return Err(Error::InvalidParameter {
            name: "distributions",
            message: "no distributions to compare".to_string(),
        });
    }
    if current.len() != previous.len() {
        return Err(Error::TopicCountMismatch {
            current: current.len(),
            previous: previous.len(),
        });
    }
    let previous_by_id: HashMap<&str, &Topic> = previous.iter().map(|t| (t.topic_id.as_str(), t)).collect();

    let mut comparisons = TopicComparisons::new();
    for topic in current.iter_mut() {
        let prev = previous_by_id
            .get(topic.topic_id.as_str())
            .ok_or_else(|| Error::UnknownTopic(topic.topic_id.clone()))?;
        let label = topic.label(label_words);
        let prev_label = prev.label(label_words);
        if label != prev_label {
            return Err(Error::LabelMismatch {
                current: label,
                previous: prev_label,
            });
        }

        let mut per_distrib = BTreeMap::new();
        for name in names {
            let missing = |id: &str| Error::MissingTotal {
                topic_id: id.to_string(),
                total_id: name.clone(),
            };
            let prev_total = prev.find_total(name).ok_or_else(|| missing(&prev.topic_id))?;
            let topic_id = topic.topic_id.clone();
            let cur_total = topic.find_total_mut(name).ok_or_else(|| missing(&topic_id))?;
            let initial = prev_total.initial_weight();
            let _ = per_distrib.insert(
                name.clone(),
                DistribComparison {
                    initial,
                    previous: prev_total.weight,
                    current: cur_total.weight,
                },
            );
            cur_total.initial = Some(initial);
        }
        let _ = comparisons.insert(label, per_distrib);
    }
    Ok(comparisons)
}
