//! Cleaning stage: lemmatise raw documents ahead of topic modelling.

use tracing::info;

use super::{timed, StageTime};
use crate::config::CleaningConfig;
use crate::document::{clean_documents, CleaningSummary, DocumentSet, Lemmatiser};
use crate::error::Result;

/// Run the stage as configured, lemmatising with `lemmatiser`.
pub fn run(config: &CleaningConfig, lemmatiser: &dyn Lemmatiser) -> Result<(CleaningSummary, StageTime)> {
    let options = config.options()?;
    timed("Cleaning", || {
        let mut set = DocumentSet::load(&config.corpus)?;
        let summary = clean_documents(&mut set.documents, lemmatiser, &options);
        set.save(&config.output)?;
        info!(path = %config.output.display(), kept = summary.total - summary.removed(), "saved cleaned documents");
        Ok(summary)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, WhitespaceLemmatiser};
    use crate::error::Error;

    #[test]
    fn test_cleans_and_saves_corpus() {
        let dir = tempfile::tempdir().unwrap();
        DocumentSet::new(vec![
            Document::new("a", 0).with_data("text", "The Rivers of Europe flood often"),
            Document::new("b", 1).with_data("text", "the"),
            Document::new("c", 2).with_data("title", "no text field"),
        ])
        .save(dir.path().join("corpus.json"))
        .unwrap();

        let config = CleaningConfig {
            corpus: dir.path().join("corpus.json"),
            output: dir.path().join("out/documents.json"),
            stop_words: vec!["The".into(), "of".into()],
            ..CleaningConfig::default()
        };
        let (summary, _) = run(&config, &WhitespaceLemmatiser).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.missing_text, 1);
        assert_eq!(summary.too_few_lemmas, 1);

        let cleaned = DocumentSet::load(dir.path().join("out/documents.json")).unwrap();
        let a = cleaned.get("a").unwrap();
        assert_eq!(a.lemma_list(), vec!["rivers", "europe", "flood", "often"]);
        assert!(!a.removed);
        assert!(cleaned.get("b").unwrap().removed);
        assert!(cleaned.get("c").unwrap().removed);
    }

    #[test]
    fn test_no_text_fields_is_rejected_before_reading() {
        let config = CleaningConfig {
            text_fields: Vec::new(),
            ..CleaningConfig::default()
        };
        let err = run(&config, &WhitespaceLemmatiser).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "text_fields", .. }));
    }
}
