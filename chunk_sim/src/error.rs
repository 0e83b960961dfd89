use thiserror::Error;

/// Fatal configuration errors.
///
/// These are raised before any simulation starts. Degenerate blocks (no
/// transactions, no targets) are valid input and never produce an error.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SimError {
    /// The chunk size must be at least one target.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// At least one proof worker is required.
    #[error("worker count must be greater than zero")]
    ZeroWorkers,

    /// A cost-model constant was negative, NaN or infinite.
    #[error("cost constant `{name}` must be finite and non-negative (got {value})")]
    InvalidCost {
        /// Name of the offending constant.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// There are no blocks to analyze.
    #[error("block set is empty")]
    EmptyBlockSet,

    /// A sweep was requested over an empty candidate list.
    #[error("sweep candidate list is empty")]
    EmptyCandidates,

    /// Weighted profile selection needs at least one profile.
    #[error("transaction profile set is empty")]
    EmptyProfileSet,

    /// A profile carried a weight or distribution parameter that cannot be
    /// sampled from.
    #[error("transaction profile `{profile}` is invalid: {reason}")]
    InvalidProfile {
        /// Name of the offending profile.
        profile: String,
        /// What was wrong with it.
        reason: &'static str,
    },
}
