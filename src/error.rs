use thiserror::Error;

/// Result alias for `topic_hierarchy`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the similarity, clustering and hierarchy primitives.
///
/// Every variant here is fatal for the stage that raised it. Per-document
/// failures are not errors: they are recorded on the document itself.
#[derive(Debug, Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Vector or matrix dimension mismatch.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// A matrix row does not have as many cells as there are rows.
    #[error("matrix is not square: row {row} has {found} cells, expected {expected}")]
    NotSquare {
        /// Offending row.
        row: usize,
        /// Expected row length.
        expected: usize,
        /// Actual row length.
        found: usize,
    },

    /// Matrix access outside of its bounds.
    #[error("index out of bounds: ({row}, {col}) in a matrix of size {size}")]
    IndexOutOfBounds {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
        /// Matrix size.
        size: usize,
    },

    /// Similarity matrix is not symmetric.
    #[error("similarity matrix is not symmetric: [{row}][{col}] = {value} but [{col}][{row}] = {mirrored}")]
    AsymmetricMatrix {
        /// Row of the first mismatching cell.
        row: usize,
        /// Column of the first mismatching cell.
        col: usize,
        /// Value at (row, col).
        value: f64,
        /// Value at (col, row).
        mirrored: f64,
    },

    /// Matrix value outside [0, 1].
    #[error("matrix value {value} at [{row}][{col}] is outside [0, 1]")]
    ValueOutOfRange {
        /// Row of the value.
        row: usize,
        /// Column of the value.
        col: usize,
        /// The value.
        value: f64,
    },

    /// Sparse vector passed to Hellinger distance does not sum to 1.
    #[error("sparse vector is not normalised (total = {total})")]
    NotNormalised {
        /// Sum of the vector entries.
        total: f64,
    },

    /// A leaf topic has no total with the requested id.
    #[error("topic {topic_id} has no distribution total '{total_id}' (run the distribution stage first)")]
    MissingTotal {
        /// Topic id.
        topic_id: String,
        /// Requested total id.
        total_id: String,
    },

    /// Compared models have a different number of topics.
    #[error("models have different numbers of topics ({current} / {previous})")]
    TopicCountMismatch {
        /// Topics in the current model.
        current: usize,
        /// Topics in the previous model.
        previous: usize,
    },

    /// Compared topics have different labels.
    #[error("topic labels show differences: {current} / {previous}")]
    LabelMismatch {
        /// Label of the current topic.
        current: String,
        /// Label of the previous topic.
        previous: String,
    },

    /// A referenced topic does not exist.
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Linkage method name not recognised.
    #[error("linkage method '{0}' not recognised, use one of: min, max, avg")]
    UnknownLinkage(String),

    /// Every requested distribution was dropped during validation.
    #[error("no distributions left after validating document data")]
    NoDistributions,

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: String,
    },

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialisation error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// CSV writer error.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// Configuration parse error.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
