//! Documents of a corpus and the text-cleaning pass.
//!
//! A document file is `{metadata, documents: [...]}` where each document is
//!
//! ```text
//! {
//!   "docId": "d1", "docIndex": 0,
//!   "docData": {"year": "2020", ...},
//!   "numLemmas": 120, "lemmas": "cell gene ...",
//!   "removed": true, "removeReason": "Too few lemmas",   // only if removed
//!   "mainTopicDistribution": [...],                       // once modelled
//!   "subTopicDistribution": [...],                        // hierarchical models
//!   "inferred": true                                      // inferred after fitting
//! }
//! ```
//!
//! Removed documents stay in the file but are skipped by every later stage.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::Result;
use crate::rounding;
use crate::topic::{read_json, write_json};

/// Why a document was left out of modelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoveReason {
    /// None of the configured text fields is present.
    MissingText,
    /// Fewer lemmas than the configured minimum after cleaning.
    TooFewLemmas,
}

impl RemoveReason {
    /// Text stored in `removeReason`.
    pub fn as_str(self) -> &'static str {
        match self {
            RemoveReason::MissingText => "Missing text field",
            RemoveReason::TooFewLemmas => "Too few lemmas",
        }
    }
}

impl fmt::Display for RemoveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document of the corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Document id.
    pub doc_id: String,
    /// Position in the corpus.
    #[serde(default)]
    pub doc_index: usize,
    /// Metadata fields, used by distributions.
    #[serde(default)]
    pub doc_data: BTreeMap<String, String>,
    /// Number of lemmas.
    #[serde(default)]
    pub num_lemmas: usize,
    /// Lemmas joined with single spaces.
    #[serde(default)]
    pub lemmas: String,
    /// Left out of modelling.
    #[serde(default, alias = "tooShort", skip_serializing_if = "is_false")]
    pub removed: bool,
    /// Why the document was removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_reason: Option<String>,
    /// Inferred after the model was fitted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub inferred: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    main_topic_distribution: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_topic_distribution: Option<Vec<f64>>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Document {
    /// New document with no data.
    pub fn new(doc_id: impl Into<String>, doc_index: usize) -> Self {
        Self {
            doc_id: doc_id.into(),
            doc_index,
            ..Self::default()
        }
    }

    /// Add a metadata field.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.doc_data.insert(key.into(), value.into());
        self
    }

    /// Mark as removed.
    pub fn remove(&mut self, reason: RemoveReason) {
        self.removed = true;
        self.remove_reason = Some(reason.to_string());
    }

    /// Set the lemmas and their count.
    pub fn set_lemmas(&mut self, lemmas: &[String]) {
        self.num_lemmas = lemmas.len();
        self.lemmas = lemmas.join(" ");
    }

    /// Lemmas as a list.
    pub fn lemma_list(&self) -> Vec<String> {
        self.lemmas.split_whitespace().map(str::to_string).collect()
    }

    /// Distribution over the main topics.
    pub fn main_topic_distribution(&self) -> Option<&[f64]> {
        self.main_topic_distribution.as_deref()
    }

    /// Distribution over the sub-topics.
    pub fn sub_topic_distribution(&self) -> Option<&[f64]> {
        self.sub_topic_distribution.as_deref()
    }

    /// Set the main topic distribution, each weight rounded to 4 decimals, up.
    pub fn set_main_topic_distribution(&mut self, distribution: &[f64]) {
        self.main_topic_distribution = Some(distribution.iter().map(|&w| rounding::weight(w)).collect());
    }

    /// Set the sub-topic distribution, each weight rounded to 4 decimals, up.
    pub fn set_sub_topic_distribution(&mut self, distribution: &[f64]) {
        self.sub_topic_distribution = Some(distribution.iter().map(|&w| rounding::weight(w)).collect());
    }
}

/// A document file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSet {
    /// Opaque metadata.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Documents sorted by index.
    pub documents: Vec<Document>,
}

impl DocumentSet {
    /// Build from documents, sorted by index.
    pub fn new(mut documents: Vec<Document>) -> Self {
        documents.sort_by_key(|d| d.doc_index);
        Self {
            metadata: serde_json::Map::new(),
            documents,
        }
    }

    /// Load a document file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut set: DocumentSet = read_json(path)?;
        set.documents.sort_by_key(|d| d.doc_index);
        Ok(set)
    }

    /// Save as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_json(path, self)
    }

    /// Documents not removed, in index order.
    pub fn retained(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|d| !d.removed)
    }

    /// Document with the given id.
    pub fn get(&self, doc_id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.doc_id == doc_id)
    }

    /// Number of documents, removed ones included.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the set has no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Turns cleaned text into lemmas.
///
/// The real lemmatiser is an external NLP model; anything that maps text to
/// tokens can stand in for it.
pub trait Lemmatiser: Send + Sync {
    /// Lemmas of `text`, in order.
    fn lemmatise(&self, text: &str) -> Vec<String>;
}

/// Splits on whitespace and keeps tokens as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceLemmatiser;

impl Lemmatiser for WhitespaceLemmatiser {
    fn lemmatise(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}

/// Options of the cleaning pass.
#[derive(Debug, Clone, Default)]
pub struct CleaningOptions {
    /// `docData` fields whose text is lemmatised, concatenated in order.
    pub text_fields: Vec<String>,
    /// Lemmas dropped everywhere.
    pub stop_words: HashSet<String>,
    /// Phrases cut from the lower-cased text before lemmatising.
    pub stop_phrases: Vec<String>,
    /// Documents with fewer lemmas are removed.
    pub min_lemmas: usize,
    /// Lemmas occurring this many times or fewer in the corpus are dropped (0 keeps all).
    pub remove_low_counts: usize,
}

/// Counts from a cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningSummary {
    /// Documents processed.
    pub total: usize,
    /// Documents removed for having no text.
    pub missing_text: usize,
    /// Documents removed for having too few lemmas.
    pub too_few_lemmas: usize,
    /// Distinct lemmas dropped for being rare.
    pub low_count_lemmas: usize,
}

impl CleaningSummary {
    /// Documents removed for any reason.
    pub fn removed(&self) -> usize {
        self.missing_text + self.too_few_lemmas
    }
}

/// Lower-case, cut stop phrases, replace non-word characters by spaces and
/// collapse whitespace.
fn normalise_text(raw: &str, stop_phrases: &[String]) -> String {
    let mut text = raw.trim().to_lowercase();
    for phrase in stop_phrases {
        let phrase = phrase.to_lowercase();
        if !phrase.is_empty() {
            text = text.replace(&phrase, " ");
        }
    }
    let words: String = text
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();
    words.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lemmatise one document. Returns its lemmas, or why it has none.
fn lemmatise_document(
    doc: &Document,
    lemmatiser: &dyn Lemmatiser,
    options: &CleaningOptions,
) -> std::result::Result<Vec<String>, RemoveReason> {
    let texts: Vec<&str> = options
        .text_fields
        .iter()
        .filter_map(|f| doc.doc_data.get(f).map(String::as_str))
        .collect();
    if texts.is_empty() {
        return Err(RemoveReason::MissingText);
    }
    let text = normalise_text(&texts.join(" "), &options.stop_phrases);
    Ok(lemmatiser
        .lemmatise(&text)
        .into_iter()
        .filter(|l| !options.stop_words.contains(l))
        .collect())
}

/// Lemmatise every document, drop stop words, rare lemmas and short
/// documents.
///
/// Documents already removed are left alone. Each document is processed
/// independently (on the rayon pool with the `parallel` feature); rare-lemma
/// counting is a single sequential pass over the results.
pub fn clean_documents(
    documents: &mut [Document],
    lemmatiser: &dyn Lemmatiser,
    options: &CleaningOptions,
) -> CleaningSummary {
    let mut summary = CleaningSummary {
        total: documents.len(),
        ..CleaningSummary::default()
    };

    #[cfg(feature = "parallel")]
    let mut lemmas: Vec<Option<std::result::Result<Vec<String>, RemoveReason>>> = documents
        .par_iter()
        .map(|d| (!d.removed).then(|| lemmatise_document(d, lemmatiser, options)))
        .collect();

    #[cfg(not(feature = "parallel"))]
    let mut lemmas: Vec<Option<std::result::Result<Vec<String>, RemoveReason>>> = documents
        .iter()
        .map(|d| (!d.removed).then(|| lemmatise_document(d, lemmatiser, options)))
        .collect();

    if options.remove_low_counts > 0 {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for list in lemmas.iter().flatten().flatten() {
            for l in list {
                *counts.entry(l.as_str()).or_default() += 1;
            }
        }
        let rare: HashSet<String> = counts
            .into_iter()
            .filter(|&(_, c)| c <= options.remove_low_counts)
            .map(|(l, _)| l.to_string())
            .collect();
        summary.low_count_lemmas = rare.len();
        for list in lemmas.iter_mut().flatten().flatten() {
            list.retain(|l| !rare.contains(l));
        }
    }

    for (doc, result) in documents.iter_mut().zip(lemmas) {
        match result {
            None => {}
            Some(Err(reason)) => {
                doc.remove(reason);
                summary.missing_text += 1;
            }
            Some(Ok(list)) => {
                doc.set_lemmas(&list);
                if list.len() < options.min_lemmas {
                    doc.remove(RemoveReason::TooFewLemmas);
                    summary.too_few_lemmas += 1;
                }
            }
        }
    }

    info!(
        total = summary.total,
        removed = summary.removed(),
        rare_lemmas = summary.low_count_lemmas,
        "cleaned documents"
    );
    summary
}
