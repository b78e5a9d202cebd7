//! Error types for the vault engine.

use alloy_primitives::B256;
use spv_bridge_chain::ChainIoError;
use thiserror::Error;

/// Unified error type for vault state, withdrawal decoding and engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// An OP_RETURN payload had a length outside the four accepted layouts.
    #[error("invalid op_return length {0}, expected 28, 36, 60 or 68")]
    InvalidOpReturnLength(usize),

    /// The recipient field failed address validation.
    #[error("invalid recipient address")]
    InvalidRecipient,

    /// An encode request carried zero or more than two amounts.
    #[error("invalid amount count {0}, expected 1 or 2")]
    InvalidAmountCount(usize),

    /// An amount does not fit the signed 64-bit wire encoding.
    #[error("amount out of range for the 8-byte encoding")]
    AmountOutOfRange,

    /// A present execution hash was not exactly 32 bytes.
    #[error("invalid execution hash length {0}, expected 32")]
    InvalidExecutionHash(usize),

    /// Fetched vault parameters do not hash to the on-chain-recorded commitment.
    ///
    /// Loud and fatal: proceeding would mean acting on stale parameters, e.g. after a vault was
    /// closed and reopened with a different configuration.
    #[error("vault parameter commitment mismatch: expected {expected}, computed {computed}")]
    ParameterCommitmentMismatch {
        /// Commitment recorded on chain.
        expected: B256,

        /// Commitment recomputed from the fetched parameters.
        computed: B256,
    },

    /// Balance or fee arithmetic overflowed.
    #[error("vault arithmetic overflow")]
    Arithmetic,

    /// A collaborator RPC call failed.
    #[error(transparent)]
    ChainIo(#[from] ChainIoError),
}
