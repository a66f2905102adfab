//! Pipeline stages over topic and document files.
//!
//! Each stage reads its inputs, runs the library primitives and writes its
//! outputs, as configured by one section of
//! [`PipelineConfig`](crate::config::PipelineConfig):
//!
//! | Stage | Reads | Writes |
//! |-------|-------|--------|
//! | [`cleaning`] | raw documents | documents with lemmas |
//! | [`hierarchical`] | main and sub models | assigned topics, merged documents, CSVs |
//! | [`distribution`] | documents, topics | topic totals and distributions |
//! | [`compare`] | current and previous topics | comparison CSVs, inherited totals |
//! | [`clustering`] | topics | linkage tables, cluster ids |
//! | [`mapping`] | clustered topics | nested hierarchy JSON |

pub mod cleaning;
pub mod clustering;
pub mod compare;
pub mod distribution;
pub mod hierarchical;
pub mod mapping;

use std::fmt;
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::{Error, Result};

/// Wall-clock time of a finished stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTime {
    /// Stage name.
    pub stage: &'static str,
    /// Elapsed time.
    pub elapsed: Duration,
}

impl fmt::Display for StageTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.elapsed.as_secs();
        write!(f, "{}: {} m, {} s", self.stage, secs / 60, secs % 60)
    }
}

/// Run `body` as the named stage, logging its start and elapsed time.
pub(crate) fn timed<T>(stage: &'static str, body: impl FnOnce() -> Result<T>) -> Result<(T, StageTime)> {
    info!(stage, "stage started");
    let start = Instant::now();
    let out = body()?;
    let time = StageTime {
        stage,
        elapsed: start.elapsed(),
    };
    info!(stage, elapsed_ms = time.elapsed.as_millis() as u64, "stage finished");
    Ok((out, time))
}

/// Both paths of an optional pair, or neither.
pub(crate) fn paired<'a, A, B>(
    name: &'static str,
    a: &'a Option<A>,
    b: &'a Option<B>,
) -> Result<Option<(&'a A, &'a B)>> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(Some((a, b))),
        (None, None) => Ok(None),
        _ => Err(Error::InvalidParameter {
            name,
            message: "both the input and its counterpart must be set".to_string(),
        }),
    }
}
