//! Engine errors.

/// Errors surfaced by engine operations.
///
/// A single frontier point failing to solve is not an error; see
/// [`SolveError`](crate::optimize::SolveError).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// No symbol produced usable history, or alignment left too few rows.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// A weight map that cannot be applied to the return universe.
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// Rejected engine configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
