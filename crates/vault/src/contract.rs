//! ABI surface of the on-chain SPV vault contract: entry points, the event taxonomy the
//! reconciler consumes, and the read-side view trait.

use alloy_primitives::{Address, LogData, B256, U256};
use alloy_sol_types::{sol, SolEvent};
use async_trait::async_trait;
use spv_bridge_chain::{types::EventLog, ChainIoError};

use crate::{
    errors::VaultError,
    state::{Utxo, VaultEvent},
};

sol! {
    /// Opens a vault anchored at the given Bitcoin UTXO.
    function open(uint256 vaultId, address btcRelay, address token0, address token1, uint64 multiplier0, uint64 multiplier1, uint32 confirmations, bytes32 utxoTxHash, uint32 utxoVout);

    /// Deposits raw token amounts into an opened vault.
    function deposit(address owner, uint256 vaultId, uint64 rawToken0, uint64 rawToken1);

    /// Fronts a pending withdrawal: the caller advances the recipient's funds immediately and is
    /// reimbursed (plus the fronting fee) when the claim finalizes.
    function front(address owner, uint256 vaultId, uint32 withdrawSequence, bytes32 frontingId, bytes btcTx);

    /// Claims a confirmed Bitcoin withdrawal against a relay inclusion proof.
    function claim(address owner, uint256 vaultId, bytes btcTx, bytes32 blockhash, uint256 position, bytes32[] merkleProof);

    /// Emitted when a vault opens.
    event Opened(address indexed owner, uint256 indexed vaultId, bytes32 btcTxHash, uint32 vout);

    /// Emitted for every deposit; `depositCount` is the monotonic replay guard.
    event Deposited(address indexed owner, uint256 indexed vaultId, uint64 rawToken0, uint64 rawToken1, uint32 depositCount);

    /// Emitted when a withdrawal is fronted.
    event Fronted(address indexed owner, uint256 indexed vaultId, bytes32 frontingId, address recipient, uint64 rawToken0, uint64 rawToken1);

    /// Emitted when a withdrawal claim finalizes; `withdrawCount` is the monotonic replay guard.
    event Claimed(address indexed owner, uint256 indexed vaultId, bytes32 btcTxHash, uint32 vout, uint64 rawToken0, uint64 rawToken1, uint32 withdrawCount);

    /// Emitted when a vault closes, zeroing its balances.
    event Closed(address indexed owner, uint256 indexed vaultId);
}

/// Raw vault record as fetched from the contract, untrusted until its parameters are verified
/// against the on-chain commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultSnapshot {
    /// Relay contract address the vault validates proofs against.
    pub btc_relay: Address,

    /// First token address.
    pub token0: Address,

    /// Second token address.
    pub token1: Address,

    /// Fixed-point multiplier for token0.
    pub multiplier0: u64,

    /// Fixed-point multiplier for token1.
    pub multiplier1: u64,

    /// Confirmations the vault requires on withdrawal transactions.
    pub confirmations: u32,

    /// Current raw balances.
    pub balances: [u64; 2],

    /// Current UTXO pointer.
    pub utxo: Utxo,

    /// Monotonic withdrawal counter.
    pub withdraw_count: u32,

    /// Monotonic deposit counter.
    pub deposit_count: u32,
}

/// Read-side view of the deployed vault contract.
#[async_trait]
pub trait VaultContract: Send + Sync {
    /// Address of the deployed vault contract.
    fn address(&self) -> Address;

    /// Block the contract was deployed in; lower bound for event scans.
    fn deployment_block(&self) -> u64;

    /// Latest block number of the underlying chain.
    async fn latest_block(&self) -> Result<u64, ChainIoError>;

    /// The parameter commitment the contract records for a vault, zero if the vault does not
    /// exist.
    async fn vault_commitment(&self, owner: Address, vault_id: U256) -> Result<B256, ChainIoError>;

    /// Fetches the current vault record.
    async fn vault_snapshot(
        &self,
        owner: Address,
        vault_id: U256,
    ) -> Result<VaultSnapshot, ChainIoError>;

    /// Whether a fronting id has already been claimed by some fronter.
    async fn fronting_exists(&self, fronting_id: B256) -> Result<bool, ChainIoError>;
}

/// Decodes a raw event log into a vault event, returning the (owner, vaultId) scope alongside.
///
/// Logs from other contracts or with unknown signatures decode to `None`; a log that matches a
/// known signature but fails ABI decoding is a protocol violation.
pub fn decode_vault_event(
    log: &EventLog,
) -> Result<Option<(Address, U256, VaultEvent)>, VaultError> {
    let Some(&signature) = log.topics.first() else {
        return Ok(None);
    };
    let data = LogData::new_unchecked(log.topics.clone(), log.data.clone());
    let decode_err =
        |e: alloy_sol_types::Error| VaultError::ChainIo(ChainIoError::Transport(e.to_string()));

    let decoded = match signature {
        s if s == Opened::SIGNATURE_HASH => {
            let ev = Opened::decode_log_data(&data, true).map_err(decode_err)?;
            (
                ev.owner,
                ev.vaultId,
                VaultEvent::Opened {
                    utxo: Utxo::new(ev.btcTxHash.0, ev.vout),
                },
            )
        }
        s if s == Deposited::SIGNATURE_HASH => {
            let ev = Deposited::decode_log_data(&data, true).map_err(decode_err)?;
            (
                ev.owner,
                ev.vaultId,
                VaultEvent::Deposited {
                    amounts: [ev.rawToken0, ev.rawToken1],
                    deposit_count: ev.depositCount,
                },
            )
        }
        s if s == Fronted::SIGNATURE_HASH => {
            let ev = Fronted::decode_log_data(&data, true).map_err(decode_err)?;
            (
                ev.owner,
                ev.vaultId,
                VaultEvent::Fronted {
                    fronting_id: ev.frontingId.0,
                    recipient: ev.recipient,
                    amounts: [ev.rawToken0, ev.rawToken1],
                },
            )
        }
        s if s == Claimed::SIGNATURE_HASH => {
            let ev = Claimed::decode_log_data(&data, true).map_err(decode_err)?;
            (
                ev.owner,
                ev.vaultId,
                VaultEvent::Claimed {
                    amounts: [ev.rawToken0, ev.rawToken1],
                    new_utxo: Utxo::new(ev.btcTxHash.0, ev.vout),
                    withdraw_count: ev.withdrawCount,
                },
            )
        }
        s if s == Closed::SIGNATURE_HASH => {
            let ev = Closed::decode_log_data(&data, true).map_err(decode_err)?;
            (ev.owner, ev.vaultId, VaultEvent::Closed)
        }
        _ => return Ok(None),
    };

    Ok(Some(decoded))
}
