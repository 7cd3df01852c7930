use thiserror::Error;

/// Fatal input problems. These are surfaced before any search is attempted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VpError {
    /// Not enough usable segments survived filtering.
    #[error("not enough line segments ({found} < {minimum})")]
    TooFewLines { found: usize, minimum: usize },
    /// Intrinsics matrix is singular or contains non-finite entries.
    #[error("intrinsics matrix is not invertible")]
    SingularIntrinsics,
    /// Endpoints collapse after normalization, so no plane normal exists.
    #[error("segment {index} is degenerate after normalization (|n| = {norm:.3e})")]
    DegenerateLine { index: usize, norm: f64 },
    /// Per-line arrays handed to the search are not index-aligned.
    #[error("line arrays are misaligned (lines={lines}, normals={normals}, weights={weights})")]
    MisalignedInput {
        lines: usize,
        normals: usize,
        weights: usize,
    },
    #[error("invalid search parameters: {0}")]
    InvalidParameters(String),
}
