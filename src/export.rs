//! CSV exports for spreadsheet inspection.
//!
//! Topics are labelled by their top words joined with `-` (see
//! [`Topic::label`](crate::topic::Topic::label)). Every field is quoted.

use std::fs;
use std::path::Path;

use csv::{QuoteStyle, Writer, WriterBuilder};
use tracing::info;

use crate::assignment::{subs_per_main, Assignment};
use crate::distribution::TopicComparisons;
use crate::error::{Error, Result};
use crate::rounding;
use crate::similarity::SimilarityMatrix;

/// Decimal places of comparison cells.
pub const COMPARISON_PLACES: u32 = 6;

fn writer(path: &Path) -> Result<Writer<fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .flexible(true)
        .from_path(path)?)
}

fn label(labels: &[String], i: usize) -> Result<&str> {
    labels
        .get(i)
        .map(String::as_str)
        .ok_or_else(|| Error::UnknownTopic(format!("label #{i}")))
}

/// Labelled rectangular matrix: header `""` then column labels, then one row
/// per row label followed by its values.
pub fn write_labelled_matrix(
    path: impl AsRef<Path>,
    row_labels: &[String],
    col_labels: &[String],
    rows: &[Vec<f64>],
) -> Result<()> {
    let path = path.as_ref();
    if rows.len() != row_labels.len() {
        return Err(Error::DimensionMismatch {
            expected: row_labels.len(),
            found: rows.len(),
        });
    }
    let mut w = writer(path)?;
    w.write_record(std::iter::once("").chain(col_labels.iter().map(String::as_str)))?;
    for (label, row) in row_labels.iter().zip(rows) {
        if row.len() != col_labels.len() {
            return Err(Error::DimensionMismatch {
                expected: col_labels.len(),
                found: row.len(),
            });
        }
        w.write_record(std::iter::once(label.clone()).chain(row.iter().map(f64::to_string)))?;
    }
    w.flush()?;
    info!(path = %path.display(), rows = rows.len(), "saved similarity matrix");
    Ok(())
}

/// Square topic-topic matrix, labelled the same way on both axes.
pub fn write_similarity_matrix(path: impl AsRef<Path>, labels: &[String], matrix: &SimilarityMatrix) -> Result<()> {
    write_labelled_matrix(path, labels, labels, &matrix.similarity_rows())
}

/// One row per main topic: label, number of sub-topics, then their labels.
pub fn write_assignment_table(
    path: impl AsRef<Path>,
    main_labels: &[String],
    sub_labels: &[String],
    assignments: &[Assignment],
) -> Result<()> {
    let path = path.as_ref();
    let mut w = writer(path)?;
    for (main, subs) in subs_per_main(assignments, main_labels.len()).iter().enumerate() {
        let mut record = vec![main_labels[main].clone(), subs.len().to_string()];
        for &sub in subs {
            record.push(label(sub_labels, sub)?.to_string());
        }
        w.write_record(&record)?;
    }
    w.flush()?;
    info!(path = %path.display(), "saved hierarchy assignment table");
    Ok(())
}

/// One row per pick: sub label, main label, similarity. Further picks of the
/// same sub-topic start with an empty cell.
pub fn write_assignment_details(
    path: impl AsRef<Path>,
    main_labels: &[String],
    sub_labels: &[String],
    assignments: &[Assignment],
) -> Result<()> {
    let path = path.as_ref();
    let mut w = writer(path)?;
    for a in assignments {
        let sub = label(sub_labels, a.sub_index)?;
        for (j, pick) in a.picks.iter().enumerate() {
            let first = if j == 0 { sub } else { "" };
            w.write_record([
                first,
                label(main_labels, pick.main_index)?,
                pick.similarity.to_string().as_str(),
            ])?;
        }
    }
    w.flush()?;
    info!(path = %path.display(), "saved hierarchy assignment details");
    Ok(())
}

/// Comparison table: `topic`, then five columns per distribution.
pub fn write_comparisons(path: impl AsRef<Path>, names: &[String], comparisons: &TopicComparisons) -> Result<()> {
    let path = path.as_ref();
    let mut w = writer(path)?;
    let mut header = vec!["topic".to_string()];
    for name in names {
        for suffix in ["initial", "previous", "current", "diffInitial", "diffPrevious"] {
            header.push(format!("{name}_{suffix}"));
        }
    }
    w.write_record(&header)?;

    let cell = |v: f64| rounding::round_up(v, COMPARISON_PLACES).to_string();
    for (topic, per_distrib) in comparisons {
        let mut record = vec![topic.clone()];
        for name in names {
            let c = per_distrib.get(name).ok_or_else(|| Error::MissingTotal {
                topic_id: topic.clone(),
                total_id: name.clone(),
            })?;
            record.extend([
                cell(c.initial),
                cell(c.previous),
                cell(c.current),
                cell(c.initial_diff()),
                cell(c.diff()),
            ]);
        }
        w.write_record(&record)?;
    }
    w.flush()?;
    info!(path = %path.display(), topics = comparisons.len(), "saved distribution comparison");
    Ok(())
}
