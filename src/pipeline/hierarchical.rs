//! Hierarchical modelling stage: relate the topics of a fine-grained sub
//! model to those of a coarse main model fitted on the same documents.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use super::{timed, StageTime};
use crate::assignment::{Assignment, TopicHierarchyAssignment};
use crate::config::HierarchicalConfig;
use crate::document::DocumentSet;
use crate::error::{Error, Result};
use crate::export;
use crate::similarity::{
    doc_topic_matrix, document_cosine_similarity, labels_l1_similarity, perceptual_similarity,
    topic_cosine_similarity, SimilarityMatrix, SubToMainMetric, DEFAULT_THRESHOLD,
};
use crate::topic::{TopicSet, LABEL_WORDS};

/// A fitted topic model: its topics and the documents it was fitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    /// Topics of the model.
    pub topics: TopicSet,
    /// Documents with the model's distribution in their main slot.
    pub documents: DocumentSet,
}

impl FittedModel {
    /// Load a topic file and its document file.
    pub fn load(topics: impl AsRef<std::path::Path>, documents: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self {
            topics: TopicSet::load(topics)?,
            documents: DocumentSet::load(documents)?,
        })
    }

    /// Topic-topic cosine similarity over the retained documents' topic
    /// distributions.
    pub fn topic_similarity(&self, threshold: f64) -> Result<SimilarityMatrix> {
        let rows: Vec<&[f64]> = self
            .documents
            .retained()
            .filter_map(|d| d.main_topic_distribution())
            .collect();
        let doc_topic = doc_topic_matrix(&rows)?;
        if doc_topic.ncols() != self.topics.len() {
            return Err(Error::DimensionMismatch {
                expected: self.topics.len(),
                found: doc_topic.ncols(),
            });
        }
        topic_cosine_similarity(doc_topic.view(), threshold)
    }

    /// Store the topic similarity on the topic set unless it already has one.
    /// Returns whether it was computed.
    pub fn ensure_similarities(&mut self) -> Result<bool> {
        if !self.topics.similarities.is_empty() {
            return Ok(false);
        }
        let matrix = self.topic_similarity(DEFAULT_THRESHOLD)?;
        self.topics.similarities = matrix.similarity_rows();
        debug!(topics = self.topics.len(), "computed topic similarities");
        Ok(true)
    }
}

/// Sub x main similarity by `metric`.
///
/// The document metric pairs documents by id and only uses documents that
/// both models kept and distributed.
pub fn sub_to_main_similarity(
    metric: SubToMainMetric,
    threshold: f64,
    main: &FittedModel,
    sub: &FittedModel,
) -> Result<Vec<Vec<f64>>> {
    match metric {
        SubToMainMetric::Perceptual => Ok(perceptual_similarity(&sub.topics.topics, &main.topics.topics)),
        SubToMainMetric::LabelsL1 => Ok(labels_l1_similarity(&sub.topics.topics, &main.topics.topics)),
        SubToMainMetric::Document => {
            let sub_docs: HashMap<&str, &[f64]> = sub
                .documents
                .retained()
                .filter_map(|d| d.main_topic_distribution().map(|w| (d.doc_id.as_str(), w)))
                .collect();
            let (main_rows, sub_rows): (Vec<&[f64]>, Vec<&[f64]>) = main
                .documents
                .retained()
                .filter_map(|d| {
                    let m = d.main_topic_distribution()?;
                    let s = sub_docs.get(d.doc_id.as_str())?;
                    Some((m, *s))
                })
                .unzip();
            if main_rows.is_empty() {
                return Err(Error::EmptyInput);
            }
            let main_matrix = doc_topic_matrix(&main_rows)?;
            let sub_matrix = doc_topic_matrix(&sub_rows)?;
            document_cosine_similarity(sub_matrix.view(), main_matrix.view(), threshold)
        }
    }
}

/// Copy each sub document's distribution into the sub slot of the main
/// document with the same id. Returns how many documents were merged.
pub fn merge_documents(main: &mut DocumentSet, sub: &DocumentSet) -> usize {
    let sub_docs: HashMap<&str, &[f64]> = sub
        .documents
        .iter()
        .filter_map(|d| d.main_topic_distribution().map(|w| (d.doc_id.as_str(), w)))
        .collect();
    let mut merged = 0;
    let mut missing = 0;
    for doc in &mut main.documents {
        match sub_docs.get(doc.doc_id.as_str()) {
            Some(w) => {
                doc.set_sub_topic_distribution(w);
                merged += 1;
            }
            None if doc.removed => {}
            None => missing += 1,
        }
    }
    if missing > 0 {
        warn!(missing, "documents without a sub model distribution");
    }
    merged
}

/// Outcome of the stage.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalReport {
    /// Picks of each sub-topic.
    pub assignments: Vec<Assignment>,
    /// Documents given a sub distribution.
    pub merged_documents: usize,
    /// Elapsed time.
    pub time: StageTime,
}

/// Similarity, assignment and document merge on loaded models.
pub fn assign_models(
    config: &HierarchicalConfig,
    main: &mut FittedModel,
    sub: &mut FittedModel,
) -> Result<(Vec<Assignment>, usize)> {
    let _ = main.ensure_similarities()?;
    let _ = sub.ensure_similarities()?;
    let similarity = sub_to_main_similarity(config.metric, config.threshold, main, sub)?;
    info!(
        metric = %config.metric,
        sub_topics = similarity.len(),
        main_topics = main.topics.len(),
        "computed sub-to-main similarity"
    );

    let main_labels = main.topics.labels(LABEL_WORDS);
    let sub_labels = sub.topics.labels(LABEL_WORDS);
    if let Some(path) = &config.similarity_output {
        export::write_labelled_matrix(path, &sub_labels, &main_labels, &similarity)?;
    }

    let assigner = TopicHierarchyAssignment::new(config.max_assign)?;
    let assignments = assigner.assign_topics(&similarity, &mut main.topics.topics, &mut sub.topics.topics)?;
    if let Some(path) = &config.assignment_output {
        export::write_assignment_table(path, &main_labels, &sub_labels, &assignments)?;
    }
    if let Some(path) = &config.assignment_details_output {
        export::write_assignment_details(path, &main_labels, &sub_labels, &assignments)?;
    }

    let merged = merge_documents(&mut main.documents, &sub.documents);
    Ok((assignments, merged))
}

/// Run the stage as configured.
pub fn run(config: &HierarchicalConfig) -> Result<HierarchicalReport> {
    let ((assignments, merged_documents), time) = timed("Hierarchical modelling", || {
        let mut main = FittedModel::load(&config.main_topics, &config.main_documents)?;
        let mut sub = FittedModel::load(&config.sub_topics, &config.sub_documents)?;
        let out = assign_models(config, &mut main, &mut sub)?;
        main.topics.save(&config.main_topics)?;
        sub.topics.save(&config.sub_topics)?;
        main.documents.save(&config.document_output)?;
        Ok(out)
    })?;
    Ok(HierarchicalReport {
        assignments,
        merged_documents,
        time,
    })
}
