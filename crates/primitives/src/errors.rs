//! Error types for the header codecs and chain-work arithmetic.

use thiserror::Error;

/// Errors produced while (de)serializing headers and stored headers.
///
/// These are always fatal to the single decode operation and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The supplied buffer does not have one of the lengths the codec accepts.
    #[error("invalid buffer length: got {got}, expected one of {expected:?}")]
    InvalidLength {
        /// The length of the buffer that was supplied.
        got: usize,

        /// The lengths the codec would have accepted.
        expected: &'static [usize],
    },

    /// A compact header whose previous blockhash was never resolved from chain context cannot be
    /// fully serialized or hashed.
    #[error("previous blockhash not resolved for compact header")]
    MissingPrevBlockhash,
}

/// Errors produced by the chain-work and retarget computations.
///
/// Either of these signals upstream data corruption or a consensus-rule mismatch bug and must
/// propagate immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderChainError {
    /// The header's nbits field does not decode to a valid compact target.
    #[error("nbits {0:#010x} does not encode a valid target")]
    InvalidDifficultyBits(u32),

    /// Cumulative chain work overflowed 256 bits.
    #[error("chain work accumulation overflowed")]
    ArithmeticOverflow,
}
