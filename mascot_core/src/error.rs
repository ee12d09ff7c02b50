// mascot_core/src/error.rs

use thiserror::Error;

/// Errors raised while building or updating the spatial belief.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BeliefError {
    /// The kernel / prior combination cannot produce a valid covariance.
    /// Fatal: there is no usable prior to start the mission from.
    #[error("invalid kernel parameters: {0}")]
    InvalidKernelParameters(String),

    /// The k x k innovation matrix could not be factorized. Only surfaced by
    /// the low-level solve; public update paths recover from it locally.
    #[error("innovation matrix is singular")]
    SingularInnovation,

    /// The conditioned covariance drifted to clearly negative variances.
    /// The offending update is not committed.
    #[error("numerical instability: variance at index {index} became {variance:e}")]
    NumericalInstability { index: usize, variance: f64 },

    #[error("grid index {index} is out of range for a grid of {len} locations")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("selection has {selection} indices but {values} observed values were given")]
    DimensionMismatch { selection: usize, values: usize },
}
