//! The vault engine: builds open/deposit/front/claim transactions, fetches and verifies vault
//! state, and prices each action by the state diff it is about to produce.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use futures::future::join_all;
use spv_bridge_chain::types::{MerkleProof, PreparedTx};
use spv_bridge_params::gas::GasCostTable;
use spv_bridge_primitives::BtcStoredHeader;
use tracing::debug;

use crate::{
    contract::{claimCall, depositCall, frontCall, openCall, VaultContract},
    errors::VaultError,
    fee::StateDiff,
    state::{SpvVaultState, Utxo, VaultParams},
    withdrawal::SpvWithdrawalData,
};

/// A priced gas budget for one pending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeEstimate {
    /// Gas limit the estimator arrived at.
    pub gas_limit: u64,

    /// Fee rate in wei per gas.
    pub max_fee_per_gas: u128,
}

impl FeeEstimate {
    /// Worst-case total fee in wei.
    pub fn total_fee(&self) -> u128 {
        self.gas_limit as u128 * self.max_fee_per_gas
    }
}

/// Client for the on-chain SPV vault contract.
///
/// Stateless between calls: every operation fetches what it needs, verifies parameter
/// commitments before trusting anything, and returns prepared transactions for the submission
/// service rather than broadcasting itself.
#[derive(Clone)]
pub struct SpvVaultEngine {
    contract: Arc<dyn VaultContract>,
    gas: GasCostTable,
}

impl std::fmt::Debug for SpvVaultEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpvVaultEngine")
            .field("contract", &self.contract.address())
            .field("gas", &self.gas)
            .finish()
    }
}

impl SpvVaultEngine {
    /// Creates an engine over the given contract view and gas-cost table.
    pub fn new(contract: Arc<dyn VaultContract>, gas: GasCostTable) -> Self {
        Self { contract, gas }
    }

    /// The gas-cost table in use.
    pub const fn gas_table(&self) -> &GasCostTable {
        &self.gas
    }

    /// Fetches one vault's state, or `None` if the vault does not exist on chain.
    ///
    /// The fetched parameters are re-hashed and compared against the contract's recorded
    /// commitment; a mismatch is fatal, never silently accepted.
    pub async fn fetch_vault_state(
        &self,
        owner: Address,
        vault_id: U256,
    ) -> Result<Option<SpvVaultState>, VaultError> {
        let commitment = self.contract.vault_commitment(owner, vault_id).await?;
        if commitment == B256::ZERO {
            return Ok(None);
        }

        let snapshot = self.contract.vault_snapshot(owner, vault_id).await?;
        let params = VaultParams {
            btc_relay: snapshot.btc_relay,
            token0: snapshot.token0,
            token1: snapshot.token1,
            multiplier0: snapshot.multiplier0,
            multiplier1: snapshot.multiplier1,
            confirmations: snapshot.confirmations,
        };
        params.verify_commitment(commitment)?;

        debug!(%owner, %vault_id, balances = ?snapshot.balances, "fetched vault state");
        Ok(Some(SpvVaultState::from_parts(
            owner,
            vault_id,
            params,
            snapshot.balances,
            snapshot.utxo,
            snapshot.withdraw_count,
            snapshot.deposit_count,
        )))
    }

    /// Fetches several vaults' states concurrently. Results preserve input order.
    pub async fn fetch_vault_states(
        &self,
        keys: &[(Address, U256)],
    ) -> Vec<Result<Option<SpvVaultState>, VaultError>> {
        join_all(
            keys.iter()
                .map(|&(owner, vault_id)| self.fetch_vault_state(owner, vault_id)),
        )
        .await
    }

    /// Builds the transaction opening a vault anchored at `utxo`.
    pub fn open_tx(
        &self,
        vault_id: U256,
        params: &VaultParams,
        utxo: Utxo,
        fee_rate: u128,
    ) -> PreparedTx {
        let data = openCall {
            vaultId: vault_id,
            btcRelay: params.btc_relay,
            token0: params.token0,
            token1: params.token1,
            multiplier0: params.multiplier0,
            multiplier1: params.multiplier1,
            confirmations: params.confirmations,
            utxoTxHash: B256::from(utxo.txid),
            utxoVout: utxo.vout,
        }
        .abi_encode();

        self.prepare(
            data,
            FeeEstimate {
                gas_limit: self.gas.open,
                max_fee_per_gas: fee_rate,
            },
        )
    }

    /// Builds a deposit transaction and its fee estimate.
    pub fn deposit_tx(
        &self,
        caller: Address,
        owner: Address,
        vault_id: U256,
        params: &VaultParams,
        amounts: [u64; 2],
        fee_rate: u128,
    ) -> PreparedTx {
        let mut diff = StateDiff::new();
        let tokens = [params.token0, params.token1];
        for (i, &amount) in amounts.iter().enumerate() {
            if amount > 0 {
                // The caller's balance and the contract's both move.
                diff.record_transfer(caller, caller, tokens[i]);
                diff.record_transfer(caller, self.contract.address(), tokens[i]);
            }
        }

        let data = depositCall {
            owner,
            vaultId: vault_id,
            rawToken0: amounts[0],
            rawToken1: amounts[1],
        }
        .abi_encode();

        self.prepare(
            data,
            FeeEstimate {
                gas_limit: self.gas.deposit + diff.gas(&self.gas),
                max_fee_per_gas: fee_rate,
            },
        )
    }

    /// Builds a fronting transaction: the caller advances the recipient's funds immediately and
    /// registers the withdrawal's fronting id.
    pub fn front_tx(
        &self,
        caller: Address,
        owner: Address,
        vault_id: U256,
        params: &VaultParams,
        withdrawal: &SpvWithdrawalData,
        withdraw_sequence: u32,
        btc_tx: Bytes,
        fee_rate: u128,
    ) -> Result<PreparedTx, VaultError> {
        let fronting = withdrawal.fronting_amounts()?;
        let mut diff = StateDiff::new();
        let tokens = [params.token0, params.token1];
        let recipient = withdrawal.payload().recipient;
        for (i, &amount) in fronting.iter().enumerate() {
            if amount > 0 {
                diff.record_transfer(caller, caller, tokens[i]);
                diff.record_transfer(caller, recipient, tokens[i]);
            }
        }

        let data = frontCall {
            owner,
            vaultId: vault_id,
            withdrawSequence: withdraw_sequence,
            frontingId: withdrawal.fronting_id(),
            btcTx: btc_tx,
        }
        .abi_encode();

        Ok(self.prepare(
            data,
            FeeEstimate {
                gas_limit: self.gas.front + diff.gas(&self.gas),
                max_fee_per_gas: fee_rate,
            },
        ))
    }

    /// Builds a claim transaction against a relay inclusion proof.
    ///
    /// `fronter` carries the address to reimburse when the withdrawal was already fronted;
    /// otherwise the payout goes straight to the withdrawal's recipient.
    #[allow(clippy::too_many_arguments)]
    pub fn claim_tx(
        &self,
        caller: Address,
        owner: Address,
        vault_id: U256,
        params: &VaultParams,
        withdrawal: &SpvWithdrawalData,
        fronter: Option<Address>,
        btc_tx: Bytes,
        stored_header: &BtcStoredHeader,
        proof: &MerkleProof,
        fee_rate: u128,
    ) -> Result<PreparedTx, VaultError> {
        let data = claimCall {
            owner,
            vaultId: vault_id,
            btcTx: btc_tx,
            blockhash: B256::from(stored_header.block_hash()),
            position: U256::from(proof.pos),
            merkleProof: proof.merkle.iter().map(|h| B256::from(*h)).collect(),
        }
        .abi_encode();

        let estimate = self.estimate_claim_fee(caller, params, withdrawal, fronter, fee_rate)?;
        Ok(self.prepare(data, estimate))
    }

    /// Prices a claim without building the transaction.
    pub fn estimate_claim_fee(
        &self,
        caller: Address,
        params: &VaultParams,
        withdrawal: &SpvWithdrawalData,
        fronter: Option<Address>,
        fee_rate: u128,
    ) -> Result<FeeEstimate, VaultError> {
        let payload = withdrawal.payload();
        let payout = fronter.unwrap_or(payload.recipient);
        let tokens = [params.token0, params.token1];

        let mut diff = StateDiff::new();
        let caller_fee = withdrawal.caller_fee();
        let fronting_fee = withdrawal.fronting_fee();
        for i in 0..2 {
            if payload.amounts[i] > 0 {
                diff.record_transfer(caller, payout, tokens[i]);
            }
            if caller_fee[i] > 0 {
                diff.record_transfer(caller, caller, tokens[i]);
            }
            // The fronting fee only moves when a fronter exists to collect it.
            if fronter.is_some() && fronting_fee[i] > 0 {
                diff.record_transfer(caller, payout, tokens[i]);
            }
        }

        let mut gas_limit = self.gas.claim + diff.gas(&self.gas);
        if payload.execution_hash.is_some() {
            gas_limit += self.gas.execution_schedule;
        }

        Ok(FeeEstimate {
            gas_limit,
            max_fee_per_gas: fee_rate,
        })
    }

    fn prepare(&self, data: Vec<u8>, estimate: FeeEstimate) -> PreparedTx {
        PreparedTx {
            to: self.contract.address(),
            data: data.into(),
            value: U256::ZERO,
            gas_limit: estimate.gas_limit,
            max_fee_per_gas: estimate.max_fee_per_gas,
        }
    }
}
