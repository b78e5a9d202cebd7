//! ABI surface of the on-chain relay contract and the read-side view trait the client consumes.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::sol;
use async_trait::async_trait;
use spv_bridge_chain::ChainIoError;

sol! {
    /// Extends the recognized main chain. `data` is the parent's 160-byte stored header followed
    /// by one 48-byte compact header per new block.
    function submitMainBlockheaders(bytes data);

    /// Atomically replaces the tip with a short competing chain. Same payload layout as
    /// [`submitMainBlockheaders`].
    function submitShortForkBlockheaders(bytes data);

    /// Extends a long fork tracked under a persistent fork identifier. Same payload layout.
    function submitForkBlockheaders(uint256 forkId, bytes data);

    /// Emitted for every header attached to the main chain.
    event StoreHeader(bytes32 indexed commitHash, bytes32 indexed blockHash);

    /// Emitted for every header attached to a tracked fork.
    event StoreForkHeader(bytes32 indexed commitHash, bytes32 indexed blockHash, uint256 forkId);

    /// Emitted when a fork overtakes the main chain.
    event ChainReorg(bytes32 indexed commitHash, bytes32 indexed blockHash, uint256 forkId);
}

/// Read-side view of the deployed relay contract.
///
/// The contract persists only commit hashes; full stored-header contents are recovered from
/// submission call traces by the client.
#[async_trait]
pub trait RelayContract: Send + Sync {
    /// Address of the deployed relay.
    fn address(&self) -> Address;

    /// Block the relay was deployed in; lower bound for event scans.
    fn deployment_block(&self) -> u64;

    /// Latest block number of the underlying chain.
    async fn latest_block(&self) -> Result<u64, ChainIoError>;

    /// Commit hash of the current chain tip, zero before initialization.
    async fn tip_commit_hash(&self) -> Result<B256, ChainIoError>;

    /// Commit hash recorded at the given Bitcoin block height on the canonical chain, zero if
    /// none.
    async fn commit_hash_at(&self, height: u32) -> Result<B256, ChainIoError>;

    /// Cumulative chain work of the current main tip.
    async fn chain_work(&self) -> Result<U256, ChainIoError>;

    /// Bitcoin block height of the current main tip.
    async fn block_height(&self) -> Result<u32, ChainIoError>;
}
