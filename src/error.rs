use thiserror::Error;

/// Fatal, precondition-violation errors that abort clustering outright.
///
/// Per-round degeneracies (empty column, singleton candidate set, a
/// partition below the quality gate) are *not* represented here — those
/// are recovered locally by the caller and never propagate as errors.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("coverage matrix is empty")]
    EmptyCoverageMatrix,

    #[error("coverage profile dimension must be >= 2, got {dim}")]
    CoverageDimensionTooSmall { dim: usize },

    #[error("contig at row {row_index} has a zero-norm coverage vector")]
    ZeroNormCoverageRow { row_index: usize },

    #[error("coverage row {row_index} has {actual} columns, expected {expected}")]
    RaggedCoverageRow {
        row_index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("profile store is missing required column: {column}")]
    MissingColumn { column: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
