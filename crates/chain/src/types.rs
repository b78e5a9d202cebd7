//! DTOs exchanged with the chain collaborators.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use spv_bridge_primitives::BtcHeader;

/// A Bitcoin block header together with its height, as answered by the Bitcoin RPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
    /// The block header.
    pub header: BtcHeader,

    /// Height of the block in the chain the RPC node follows.
    pub height: u32,
}

/// A merkle inclusion proof for a transaction within a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    /// Position of the transaction within the block.
    pub pos: u32,

    /// Sibling hashes from the transaction up to the merkle root, natural byte order.
    pub merkle: Vec<[u8; 32]>,
}

/// The call-type discriminator reported by the trace service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallType {
    /// Plain message call.
    Call,

    /// Delegate call executing in the caller's storage context.
    DelegateCall,

    /// Read-only call.
    StaticCall,

    /// Contract creation; the input holds the init code followed by the constructor arguments.
    Create,
}

/// One node of a transaction's call tree as returned by the trace service.
///
/// Owned and immutable; the relay walks it as a pure tree search (no replaying against a node).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTrace {
    /// Callee address; `None` for contract creations.
    pub to: Option<Address>,

    /// Full calldata (or init code) of this frame.
    pub input: Bytes,

    /// Kind of call this frame represents.
    #[serde(rename = "type")]
    pub call_type: CallType,

    /// Child frames in execution order.
    #[serde(default)]
    pub calls: Vec<CallTrace>,
}

/// A decoded event log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    /// Address of the emitting contract.
    pub address: Address,

    /// Indexed topics, the event signature hash first.
    pub topics: Vec<B256>,

    /// ABI-encoded non-indexed data.
    pub data: Bytes,

    /// Block the event was emitted in.
    pub block_number: u64,

    /// Hash of the transaction that emitted the event.
    pub transaction_hash: B256,

    /// Index of the log within its block.
    pub log_index: u64,
}

/// Filter for a log query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Emitting contract address.
    pub address: Address,

    /// Topic filters; `None` entries match any value at that position.
    pub topics: Vec<Option<B256>>,

    /// First block of the queried range, inclusive.
    pub from_block: u64,

    /// Last block of the queried range, inclusive.
    pub to_block: u64,
}

/// An unsigned transaction prepared by a client, ready for the submission service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTx {
    /// Destination contract.
    pub to: Address,

    /// ABI-encoded calldata.
    pub data: Bytes,

    /// Native-currency value attached to the call.
    pub value: U256,

    /// Gas limit the estimator arrived at.
    pub gas_limit: u64,

    /// Fee rate (wei per gas) the caller priced the transaction at; the submission service may
    /// bump it while the transaction is in flight.
    pub max_fee_per_gas: u128,
}
