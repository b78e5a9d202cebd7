//! Gas-cost tables for the vault engine's fee estimation.
//!
//! These are injected configuration, not globals: per-chain specializations (e.g. rollups that
//! price L1 state-diff bytes on top of execution gas) are expressed as alternate values of
//! [`GasCostTable`] and [`StateDiffPricing`], never as subclasses or mutable statics.

use serde::{Deserialize, Serialize};

use super::default::{
    EXECUTION_SCHEDULE_GAS, TRANSFER_ERC20_GAS, TRANSFER_NATIVE_GAS, TRANSFER_NATIVE_SELF_GAS,
    VAULT_CLAIM_GAS, VAULT_DEPOSIT_GAS, VAULT_FRONT_GAS, VAULT_OPEN_GAS,
};

/// The kind of token-state change a pending action is about to make.
///
/// Each distinct (address, token) pair touched by an action is priced by its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Native-currency balance change on the transaction sender itself.
    NativeSelf,

    /// Native-currency transfer to another account.
    Native,

    /// ERC20-style token transfer.
    Erc20,
}

/// Additional per-byte L1 pricing applied by some chains to every state diff the transaction
/// produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StateDiffPricing {
    /// Bytes charged per touched storage slot.
    pub bytes_per_slot: u64,

    /// Gas charged per state-diff byte.
    pub gas_per_byte: u64,
}

impl StateDiffPricing {
    /// Gas charged for `slots` touched storage slots.
    pub const fn gas_for_slots(&self, slots: u64) -> u64 {
        slots * self.bytes_per_slot * self.gas_per_byte
    }
}

/// Base and marginal gas costs for each vault action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasCostTable {
    /// Base gas for opening a vault.
    pub open: u64,

    /// Base gas for a deposit.
    pub deposit: u64,

    /// Base gas for fronting a withdrawal.
    pub front: u64,

    /// Base gas for claiming a withdrawal.
    pub claim: u64,

    /// Marginal gas for a [`TransferKind::NativeSelf`] balance change.
    pub transfer_native_self: u64,

    /// Marginal gas for a [`TransferKind::Native`] transfer.
    pub transfer_native: u64,

    /// Marginal gas for a [`TransferKind::Erc20`] transfer.
    pub transfer_erc20: u64,

    /// Surcharge for scheduling an execution handler call.
    pub execution_schedule: u64,

    /// Per-chain L1 state-diff pricing, zero on chains that only charge execution gas.
    pub state_diff: StateDiffPricing,
}

impl Default for GasCostTable {
    fn default() -> Self {
        Self {
            open: VAULT_OPEN_GAS,
            deposit: VAULT_DEPOSIT_GAS,
            front: VAULT_FRONT_GAS,
            claim: VAULT_CLAIM_GAS,
            transfer_native_self: TRANSFER_NATIVE_SELF_GAS,
            transfer_native: TRANSFER_NATIVE_GAS,
            transfer_erc20: TRANSFER_ERC20_GAS,
            execution_schedule: EXECUTION_SCHEDULE_GAS,
            state_diff: StateDiffPricing::default(),
        }
    }
}

impl GasCostTable {
    /// Marginal gas for a single transfer of the given kind.
    pub const fn transfer_gas(&self, kind: TransferKind) -> u64 {
        match kind {
            TransferKind::NativeSelf => self.transfer_native_self,
            TransferKind::Native => self.transfer_native,
            TransferKind::Erc20 => self.transfer_erc20,
        }
    }
}
