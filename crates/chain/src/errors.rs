//! Error types for the chain I/O boundary.

use thiserror::Error;

/// Unified error type for the RPC-facing collaborators.
///
/// The transient variants ([`Transport`](Self::Transport), [`RateLimited`](Self::RateLimited),
/// [`ResponseTooLarge`](Self::ResponseTooLarge)) are retried inside this crate per the configured
/// [`RetryPolicy`](crate::retry::RetryPolicy) and only surface as
/// [`RetriesExhausted`](Self::RetriesExhausted) once the policy gives up. Everything else
/// propagates immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainIoError {
    /// Generic transport failure (connection reset, timeout, malformed response).
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider rejected the request due to rate limiting.
    #[error("rate limited by provider")]
    RateLimited,

    /// The provider refused the response as oversized; log queries react by halving the
    /// requested block range.
    #[error("provider response too large")]
    ResponseTooLarge,

    /// A submitted transaction's nonce was superseded before confirmation.
    ///
    /// Surfaced distinctly from plain failure so callers re-derive and resubmit instead of
    /// treating the underlying operation as permanently failed.
    #[error("transaction replaced or dropped before confirmation")]
    ReplacedOrDropped,

    /// The submission wait was aborted by the caller's cancellation signal.
    #[error("operation aborted")]
    Aborted,

    /// A transient failure persisted through every configured retry.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made, including the first.
        attempts: u32,

        /// The error observed on the final attempt.
        last: Box<ChainIoError>,
    },
}

impl ChainIoError {
    /// Whether this error is worth retrying under the configured policy.
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            ChainIoError::Transport(_) | ChainIoError::RateLimited | ChainIoError::ResponseTooLarge
        )
    }
}
