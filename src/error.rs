//! Error types for the PCA pipeline.

use thiserror::Error;

/// Typed failures raised by every pipeline stage.
///
/// A failing stage aborts the whole analysis; no partially filled result is
/// ever returned alongside an error.
#[derive(Error, Debug)]
pub enum PcaError {
    /// The feature matrix has no columns.
    #[error("Feature set is empty: the input matrix has zero feature columns.")]
    EmptyFeatureSet,

    /// Requested component count outside `[1, min(n_samples - 1, n_features)]`.
    #[error("Invalid component count: requested {requested}, allowed range is 1..={max}")]
    InvalidComponentCount { requested: usize, max: usize },

    /// Non-finite values, an empty matrix, an empty variance sequence, and similar.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every feature is constant, so no component carries variance.
    #[error("Degenerate dataset: every feature is constant and total variance is zero.")]
    DegenerateDataset,

    /// The linear-algebra backend failed to decompose the matrix.
    #[error("Decomposition failed: {0}")]
    Decomposition(String),

    /// Attached labels do not line up with the samples.
    #[error("Label count mismatch: expected {expected} labels, got {got}")]
    LabelLengthMismatch { expected: usize, got: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for PCA operations.
pub type Result<T> = std::result::Result<T, PcaError>;
