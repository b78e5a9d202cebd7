//! Async interface contracts for the external services the clients consume.

use alloy_primitives::B256;
use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use tokio_util::sync::CancellationToken;

use crate::{
    errors::ChainIoError,
    types::{CallTrace, EventLog, HeaderInfo, LogFilter, MerkleProof, PreparedTx},
};

/// Read-side interface to a Bitcoin full node.
#[async_trait]
pub trait BitcoinRpc: Send + Sync {
    /// Fetches a block header and its height by block hash.
    async fn get_block_header(&self, hash: &BlockHash) -> Result<HeaderInfo, ChainIoError>;

    /// Whether the given block is part of the node's current main chain.
    async fn is_in_main_chain(&self, hash: &BlockHash) -> Result<bool, ChainIoError>;

    /// Fetches the merkle inclusion proof for a confirmed transaction.
    async fn get_merkle_proof(
        &self,
        txid: &Txid,
        block_hash: &BlockHash,
    ) -> Result<MerkleProof, ChainIoError>;
}

/// Interface to the EVM node's transaction tracing endpoint.
#[async_trait]
pub trait TraceService: Send + Sync {
    /// Returns the full call tree executed by the given transaction.
    async fn trace_transaction(&self, tx_hash: B256) -> Result<CallTrace, ChainIoError>;
}

/// Interface to the EVM node's event log endpoint.
///
/// Implementations answer a single range query; splitting oversized ranges is handled by
/// [`fetch_logs_paged`](crate::retry::fetch_logs_paged) on top of this trait.
#[async_trait]
pub trait LogService: Send + Sync {
    /// Returns all logs matching the filter, ordered by (block, log index).
    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<EventLog>, ChainIoError>;
}

/// Callback invoked when an in-flight transaction is about to be replaced (fee bump).
pub type BeforeReplaceFn = Box<dyn Fn(B256, &PreparedTx) + Send + Sync>;

/// Opaque transaction submission service: signing, nonce management and fee bumping live behind
/// this trait.
#[async_trait]
pub trait TransactionService: Send + Sync {
    /// Broadcasts the given transactions in order and optionally waits for confirmation,
    /// returning their hashes.
    ///
    /// Cancelling via `abort` stops the confirmation wait but does not retract anything already
    /// broadcast; registered before-replace callbacks still fire for those transactions.
    async fn send_and_confirm(
        &self,
        txs: &[PreparedTx],
        wait_for_confirmation: bool,
        abort: CancellationToken,
    ) -> Result<Vec<B256>, ChainIoError>;

    /// Registers a callback observing replacement of in-flight transactions.
    fn on_before_replace(&self, callback: BeforeReplaceFn);
}
