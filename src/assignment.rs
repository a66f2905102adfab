//! Assignment of sub-topics to main topics.
//!
//! Each sub-topic row of a sub x main similarity matrix independently claims
//! its `max_assign` most similar main topics. There is no balancing across
//! rows: a popular main topic can collect many sub-topics.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::rounding;
use crate::topic::Topic;

/// One main topic claimed by a sub-topic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pick {
    /// Column of the main topic.
    pub main_index: usize,
    /// Similarity between the two topics.
    pub similarity: f64,
}

/// The picks of one sub-topic, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Row of the sub-topic.
    pub sub_index: usize,
    /// Main topics claimed, in pick order.
    pub picks: Vec<Pick>,
}

/// Greedy per-row top-K assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicHierarchyAssignment {
    max_assign: usize,
}

impl Default for TopicHierarchyAssignment {
    fn default() -> Self {
        Self { max_assign: 1 }
    }
}

impl TopicHierarchyAssignment {
    /// Assign each sub-topic to up to `max_assign` main topics.
    pub fn new(max_assign: usize) -> Result<Self> {
        if max_assign == 0 {
            return Err(Error::InvalidParameter {
                name: "maxAssign",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self { max_assign })
    }

    /// Picks per sub-topic.
    pub fn max_assign(&self) -> usize {
        self.max_assign
    }

    /// Pick main topics for every row of `similarity` (sub x main).
    ///
    /// Each round takes the highest remaining cell of the row whose column
    /// was not picked yet; the first column wins ties. A row stops early once
    /// every column has been picked.
    pub fn assign(&self, similarity: &[Vec<f64>]) -> Result<Vec<Assignment>> {
        let n_main = similarity.first().map_or(0, Vec::len);
        if let Some(row) = similarity.iter().find(|r| r.len() != n_main) {
            return Err(Error::DimensionMismatch {
                expected: n_main,
                found: row.len(),
            });
        }

        let assignments = similarity
            .iter()
            .enumerate()
            .map(|(sub_index, row)| {
                let mut used = vec![false; n_main];
                let mut picks = Vec::with_capacity(self.max_assign.min(n_main));
                for _ in 0..self.max_assign {
                    let best = row
                        .iter()
                        .enumerate()
                        .filter(|(col, _)| !used[*col])
                        .fold(None, |best: Option<(usize, f64)>, (col, &sim)| match best {
                            Some((_, b)) if sim <= b => best,
                            _ => Some((col, sim)),
                        });
                    let Some((main_index, similarity)) = best else {
                        break;
                    };
                    used[main_index] = true;
                    picks.push(Pick {
                        main_index,
                        similarity,
                    });
                }
                debug!(sub = sub_index, picks = picks.len(), "assigned sub-topic");
                Assignment { sub_index, picks }
            })
            .collect();
        Ok(assignments)
    }

    /// Assign and record the references on both sides.
    ///
    /// `sub[i]` is row `i` and `main[j]` column `j` of `similarity`. Each pick
    /// adds the main topic to the sub-topic's `mainTopicIds` and the sub-topic
    /// to the main topic's `subTopicIds`, weighted by the rounded similarity.
    pub fn assign_topics(
        &self,
        similarity: &[Vec<f64>],
        main: &mut [Topic],
        sub: &mut [Topic],
    ) -> Result<Vec<Assignment>> {
        if similarity.len() != sub.len() {
            return Err(Error::DimensionMismatch {
                expected: sub.len(),
                found: similarity.len(),
            });
        }
        if let Some(row) = similarity.first().filter(|r| r.len() != main.len()) {
            return Err(Error::DimensionMismatch {
                expected: main.len(),
                found: row.len(),
            });
        }
        let assignments = self.assign(similarity)?;
        for a in &assignments {
            let sub_topic = &mut sub[a.sub_index];
            for pick in &a.picks {
                let main_topic = &mut main[pick.main_index];
                let weight = rounding::weight(pick.similarity);
                main_topic.add_sub_topic_id(sub_topic.topic_id.clone(), weight);
                sub_topic.add_main_topic_id(main_topic.topic_id.clone(), weight);
            }
        }
        info!(
            sub_topics = sub.len(),
            main_topics = main.len(),
            max_assign = self.max_assign,
            "hierarchy assignments completed"
        );
        Ok(assignments)
    }
}

/// Sub-topic rows assigned to each main column, in row order.
pub fn subs_per_main(assignments: &[Assignment], n_main: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); n_main];
    for a in assignments {
        for pick in &a.picks {
            if let Some(group) = groups.get_mut(pick.main_index) {
                group.push(a.sub_index);
            }
        }
    }
    groups
}
