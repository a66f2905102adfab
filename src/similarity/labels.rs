//! Word-overlap similarity between topics of two models.
//!
//! Used to place sub-topics under main topics when the two models are
//! compared through their top words rather than through their documents.
//! Both metrics L1-normalise each label vector first and match labels
//! case-insensitively.

use crate::rounding;
use crate::topic::{Topic, WordWeight};

/// Label vector normalised to sum 1, labels lower-cased.
fn normalised(words: &[WordWeight]) -> Vec<(String, f64)> {
    let total: f64 = words.iter().map(|w| w.weight).sum();
    words
        .iter()
        .map(|w| {
            let weight = if total == 0.0 { 0.0 } else { w.weight / total };
            (w.label.to_lowercase(), weight)
        })
        .collect()
}

/// Perceptual distance between two normalised label vectors.
///
/// Shared labels contribute the product of their weights; every label of
/// the longer vector without a match costs 1. The absolute result is
/// divided by the longer vector's length.
fn perceptual_distance(a: &[(String, f64)], b: &[(String, f64)]) -> f64 {
    let size = a.len().max(b.len());
    if size == 0 {
        return 0.0;
    }
    let mut sim = 0.0;
    let mut n_shared = 0usize;
    for (label_a, wa) in a {
        for (label_b, wb) in b {
            if label_a == label_b {
                n_shared += 1;
                sim += wa * wb;
            }
        }
    }
    sim -= size as f64 - n_shared as f64;
    sim.abs() / size as f64
}

/// L1 distance between two normalised label vectors, unmatched labels
/// counting their full weight.
fn labels_l1_distance(a: &[(String, f64)], b: &[(String, f64)]) -> f64 {
    let mut dist = 0.0;
    let mut common: Vec<&str> = Vec::new();
    for (label_a, wa) in a {
        match b.iter().find(|(label_b, _)| label_b == label_a) {
            Some((label_b, wb)) => {
                common.push(label_b.as_str());
                dist += (wa - wb).abs();
            }
            None => dist += wa,
        }
    }
    for (label_b, wb) in b {
        if !common.contains(&label_b.as_str()) {
            dist += wb;
        }
    }
    dist
}

fn pairwise(
    rows: &[Topic],
    cols: &[Topic],
    distance: fn(&[(String, f64)], &[(String, f64)]) -> f64,
) -> Vec<Vec<f64>> {
    let col_vectors: Vec<_> = cols.iter().map(|t| normalised(&t.top_words)).collect();
    rows.iter()
        .map(|row| {
            let rv = normalised(&row.top_words);
            col_vectors
                .iter()
                .map(|cv| rounding::weight(1.0 - distance(cv, &rv)))
                .collect()
        })
        .collect()
}

/// Perceptual similarity, row = topic of `rows`, column = topic of `cols`.
///
/// Cells are `1 - distance`, rounded to 4 decimals, up.
pub fn perceptual_similarity(rows: &[Topic], cols: &[Topic]) -> Vec<Vec<f64>> {
    pairwise(rows, cols, perceptual_distance)
}

/// Label L1-norm similarity, row = topic of `rows`, column = topic of `cols`.
///
/// The distance ranges over [0, 2], so cells range over [-1, 1].
pub fn labels_l1_similarity(rows: &[Topic], cols: &[Topic]) -> Vec<Vec<f64>> {
    pairwise(rows, cols, labels_l1_distance)
}
