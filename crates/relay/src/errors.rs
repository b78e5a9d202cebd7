//! Error types for the relay client.

use spv_bridge_chain::ChainIoError;
use spv_bridge_primitives::errors::{CodecError, HeaderChainError};
use thiserror::Error;

/// Unified error type for relay client operations.
///
/// "Data not yet available" conditions (relay behind the requested height, no matching stored
/// header) are expressed as `Option::None` on the retrieval functions, not as variants here;
/// these variants are protocol violations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The relay contract has no tip yet (queried before its constructor ran or on the wrong
    /// address).
    #[error("relay contract not yet initialized")]
    Uninitialized,

    /// The call trace that produced a commitment could not be parsed back into stored headers.
    #[error("unparseable submission trace: {0}")]
    UnparseableTrace(String),

    /// A fork batch exceeded the length the contract accepts atomically.
    #[error("short fork of {got} headers exceeds the atomic submission limit of {max}")]
    ShortForkTooLong {
        /// Number of headers in the rejected batch.
        got: usize,

        /// Maximum the contract accepts in one short-fork submission.
        max: usize,
    },

    /// An empty header batch was submitted.
    #[error("header batch is empty")]
    EmptyBatch,

    /// Header (de)serialization failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Chain-work or retarget arithmetic failed.
    #[error(transparent)]
    HeaderChain(#[from] HeaderChainError),

    /// A collaborator RPC call failed.
    #[error(transparent)]
    ChainIo(#[from] ChainIoError),
}
