use thiserror::Error;

/// Errors produced by the rolling-metrics engine.
///
/// This is deliberately narrow: the engine has exactly one failure mode,
/// construction/usage with out-of-range parameters. Higher layers (the
/// `resilience` crate) define their own error type for rejection/timeout/user
/// errors and wrap this one where a lower-level validation failure bubbles up.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A constructor or operation was called with parameters that violate an
    /// invariant: a zero-length store, a window duration that isn't an exact
    /// multiple of the bucket count, or a `reduce` call over mismatched
    /// array lengths.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
}

/// Convenience alias for this crate's fallible operations.
pub type CoreResult<T> = Result<T, CoreError>;
