//! The per-(owner, vault) balance state machine.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use tracing::{debug, warn};

use crate::{errors::VaultError, withdrawal::SpvWithdrawalData};

/// A Bitcoin UTXO pointer (txid in natural byte order, output index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Utxo {
    /// Transaction id, natural byte order.
    pub txid: [u8; 32],

    /// Output index.
    pub vout: u32,
}

impl Utxo {
    /// The all-zero sentinel marking a closed vault.
    pub const SENTINEL: Utxo = Utxo {
        txid: [0u8; 32],
        vout: 0,
    };

    /// Creates a UTXO pointer.
    pub const fn new(txid: [u8; 32], vout: u32) -> Self {
        Self { txid, vout }
    }

    /// Whether this is the closed-vault sentinel.
    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

/// One token position: the token address, its fixed-point multiplier and the raw balance.
///
/// All mutation is checked; the raw unit is what the contract stores, `scaled` is what the EVM
/// token contract moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    /// Token contract address, zero for the native currency.
    pub token: Address,

    /// Fixed-point multiplier from raw units to token units.
    pub multiplier: u64,

    /// Raw balance.
    pub raw: u64,
}

impl TokenBalance {
    /// Creates a zero balance.
    pub const fn new(token: Address, multiplier: u64) -> Self {
        Self {
            token,
            multiplier,
            raw: 0,
        }
    }

    /// Adds raw units.
    pub fn checked_add(&mut self, amount: u64) -> Result<(), VaultError> {
        self.raw = self.raw.checked_add(amount).ok_or(VaultError::Arithmetic)?;
        Ok(())
    }

    /// Subtracts raw units.
    pub fn checked_sub(&mut self, amount: u64) -> Result<(), VaultError> {
        self.raw = self.raw.checked_sub(amount).ok_or(VaultError::Arithmetic)?;
        Ok(())
    }

    /// The balance in token units: raw times the multiplier, widened so the product cannot wrap.
    pub fn scaled(&self) -> U256 {
        U256::from(self.raw) * U256::from(self.multiplier)
    }
}

/// The parameter set a vault was opened with.
///
/// The contract records only `keccak256` of the ABI-packed tuple; fetched parameters must be
/// re-hashed and compared against that commitment before anything trusts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaultParams {
    /// Relay contract the vault validates inclusion proofs against.
    pub btc_relay: Address,

    /// First token address.
    pub token0: Address,

    /// Second token address.
    pub token1: Address,

    /// Fixed-point multiplier applied to raw token0 amounts.
    pub multiplier0: u64,

    /// Fixed-point multiplier applied to raw token1 amounts.
    pub multiplier1: u64,

    /// Confirmations required on withdrawal transactions.
    pub confirmations: u32,
}

impl VaultParams {
    /// Computes the parameter commitment: `keccak256` of the ABI-packed
    /// (relay, token0, token1, multiplier0, multiplier1, confirmations) tuple.
    pub fn commitment(&self) -> B256 {
        let packed = (
            self.btc_relay,
            self.token0,
            self.token1,
            self.multiplier0,
            self.multiplier1,
            self.confirmations,
        )
            .abi_encode_packed();
        keccak256(packed)
    }

    /// Verifies these parameters against the on-chain-recorded commitment.
    pub fn verify_commitment(&self, expected: B256) -> Result<(), VaultError> {
        let computed = self.commitment();
        if computed != expected {
            warn!(%expected, %computed, "vault parameter commitment mismatch");
            return Err(VaultError::ParameterCommitmentMismatch { expected, computed });
        }
        Ok(())
    }
}

/// One on-chain vault event, scoped to a single vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultEvent {
    /// The vault was opened and anchored at a Bitcoin UTXO.
    Opened {
        /// The anchoring UTXO.
        utxo: Utxo,
    },

    /// Tokens were deposited.
    Deposited {
        /// Raw amounts added per token.
        amounts: [u64; 2],

        /// Monotonic deposit counter after this deposit.
        deposit_count: u32,
    },

    /// A withdrawal was fronted by a third party; vault balances are unaffected until the claim.
    Fronted {
        /// Idempotency key of the fronting.
        fronting_id: [u8; 32],

        /// Recipient whose funds were advanced.
        recipient: Address,

        /// Raw amounts advanced per token.
        amounts: [u64; 2],
    },

    /// A withdrawal claim finalized.
    Claimed {
        /// Raw amounts removed per token.
        amounts: [u64; 2],

        /// The spending transaction's output that becomes the new vault UTXO.
        new_utxo: Utxo,

        /// Monotonic withdrawal counter after this claim.
        withdraw_count: u32,
    },

    /// The vault was closed.
    Closed,
}

/// Outcome of feeding an event to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// The event advanced the state.
    Advanced,

    /// The event was a replay or out-of-order delivery and changed nothing.
    Ignored,
}

/// Replicated state of one on-chain vault.
///
/// Opened/closed is implicit: a vault is open exactly when its UTXO pointer differs from the
/// all-zero sentinel. Every balance-affecting transition is gated on a monotonic counter, so
/// replaying an already-applied event is a guaranteed no-op and reconciliation can safely re-run
/// over an overlapping event window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpvVaultState {
    owner: Address,
    vault_id: U256,
    params: VaultParams,
    balances: [u64; 2],
    utxo: Utxo,
    withdraw_count: u32,
    deposit_count: u32,
}

impl SpvVaultState {
    /// Creates a closed vault replica with the given verified parameters.
    pub fn new(owner: Address, vault_id: U256, params: VaultParams) -> Self {
        Self {
            owner,
            vault_id,
            params,
            balances: [0; 2],
            utxo: Utxo::SENTINEL,
            withdraw_count: 0,
            deposit_count: 0,
        }
    }

    /// Restores a replica from a fetched snapshot whose parameters already passed commitment
    /// verification.
    pub fn from_parts(
        owner: Address,
        vault_id: U256,
        params: VaultParams,
        balances: [u64; 2],
        utxo: Utxo,
        withdraw_count: u32,
        deposit_count: u32,
    ) -> Self {
        Self {
            owner,
            vault_id,
            params,
            balances,
            utxo,
            withdraw_count,
            deposit_count,
        }
    }

    /// Returns the vault owner.
    pub const fn owner(&self) -> Address {
        self.owner
    }

    /// Returns the vault identifier.
    pub const fn vault_id(&self) -> U256 {
        self.vault_id
    }

    /// Returns the vault parameters.
    pub const fn params(&self) -> &VaultParams {
        &self.params
    }

    /// Returns the raw balances.
    pub const fn balances(&self) -> [u64; 2] {
        self.balances
    }

    /// Returns the current UTXO pointer.
    pub const fn utxo(&self) -> Utxo {
        self.utxo
    }

    /// Returns the monotonic withdrawal counter.
    pub const fn withdraw_count(&self) -> u32 {
        self.withdraw_count
    }

    /// Returns the monotonic deposit counter.
    pub const fn deposit_count(&self) -> u32 {
        self.deposit_count
    }

    /// Whether the vault is currently open.
    pub fn is_opened(&self) -> bool {
        !self.utxo.is_sentinel()
    }

    /// Scaled balance of one token: raw balance times the fixed-point multiplier.
    pub fn scaled_balance(&self, index: usize) -> U256 {
        let multiplier = match index {
            0 => self.params.multiplier0,
            _ => self.params.multiplier1,
        };
        U256::from(self.balances[index]) * U256::from(multiplier)
    }

    /// Feeds one on-chain event to the state machine.
    ///
    /// Replays and out-of-order deliveries are ignored, never errors: the event-polling
    /// collaborator re-delivers a trailing window on every poll to tolerate reorgs.
    pub fn apply(&mut self, event: &VaultEvent) -> Result<Applied, VaultError> {
        match *event {
            VaultEvent::Opened { utxo } => {
                if self.is_opened() {
                    return Ok(Applied::Ignored);
                }
                self.utxo = utxo;
                debug!(vault = %self.vault_id, ?utxo, "vault opened");
                Ok(Applied::Advanced)
            }
            VaultEvent::Deposited {
                amounts,
                deposit_count,
            } => {
                if deposit_count <= self.deposit_count {
                    return Ok(Applied::Ignored);
                }
                self.balances = checked_add(self.balances, amounts)?;
                self.deposit_count = deposit_count;
                Ok(Applied::Advanced)
            }
            VaultEvent::Claimed {
                amounts,
                new_utxo,
                withdraw_count,
            } => {
                if withdraw_count <= self.withdraw_count {
                    return Ok(Applied::Ignored);
                }
                self.balances = checked_sub(self.balances, amounts)?;
                self.withdraw_count = withdraw_count;
                self.utxo = new_utxo;
                Ok(Applied::Advanced)
            }
            VaultEvent::Fronted { .. } => {
                // Fronting moves the fronter's funds, not the vault's.
                Ok(Applied::Ignored)
            }
            VaultEvent::Closed => {
                self.balances = [0; 2];
                self.utxo = Utxo::SENTINEL;
                debug!(vault = %self.vault_id, "vault closed");
                Ok(Applied::Advanced)
            }
        }
    }

    /// Applies a just-observed spending transaction that has not been eventized on chain yet.
    ///
    /// Only applies when the transaction spends the vault's current UTXO; the vault balance
    /// drops by the withdrawal's total debit (amounts plus all fee shares) and the pointer moves
    /// to the spending transaction's first output.
    pub fn apply_withdrawal(&mut self, withdrawal: &SpvWithdrawalData) -> Result<Applied, VaultError> {
        if withdrawal.spent_utxo() != self.utxo {
            return Ok(Applied::Ignored);
        }

        let debit = withdrawal.total_debit()?;
        self.balances = checked_sub(self.balances, debit)?;
        self.withdraw_count += 1;
        self.utxo = Utxo::new(withdrawal.txid(), 0);
        Ok(Applied::Advanced)
    }
}

fn checked_add(lhs: [u64; 2], rhs: [u64; 2]) -> Result<[u64; 2], VaultError> {
    Ok([
        lhs[0].checked_add(rhs[0]).ok_or(VaultError::Arithmetic)?,
        lhs[1].checked_add(rhs[1]).ok_or(VaultError::Arithmetic)?,
    ])
}

fn checked_sub(lhs: [u64; 2], rhs: [u64; 2]) -> Result<[u64; 2], VaultError> {
    Ok([
        lhs[0].checked_sub(rhs[0]).ok_or(VaultError::Arithmetic)?,
        lhs[1].checked_sub(rhs[1]).ok_or(VaultError::Arithmetic)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_params() -> VaultParams {
        VaultParams {
            btc_relay: Address::new([0x11; 20]),
            token0: Address::ZERO,
            token1: Address::new([0x22; 20]),
            multiplier0: 1,
            multiplier1: 10_000,
            confirmations: 3,
        }
    }

    fn opened_vault() -> SpvVaultState {
        let mut vault = SpvVaultState::new(Address::new([0xaa; 20]), U256::from(1), test_params());
        vault
            .apply(&VaultEvent::Opened {
                utxo: Utxo::new([0x01; 32], 0),
            })
            .unwrap();
        vault
    }

    #[test]
    fn test_open_is_idempotent() {
        let mut vault = opened_vault();
        assert!(vault.is_opened());

        let replay = vault
            .apply(&VaultEvent::Opened {
                utxo: Utxo::new([0x02; 32], 1),
            })
            .unwrap();
        assert_eq!(replay, Applied::Ignored);
        assert_eq!(vault.utxo(), Utxo::new([0x01; 32], 0));
    }

    #[test]
    fn test_deposit_counter_gates_replay() {
        let mut vault = opened_vault();

        for _ in 0..5 {
            let count = vault.deposit_count() + 1;
            vault
                .apply(&VaultEvent::Deposited {
                    amounts: [100, 0],
                    deposit_count: count,
                })
                .unwrap();
        }
        assert_eq!(vault.balances(), [500, 0]);
        assert_eq!(vault.deposit_count(), 5);

        // Stale counter: no change.
        let stale = vault
            .apply(&VaultEvent::Deposited {
                amounts: [100, 0],
                deposit_count: 5,
            })
            .unwrap();
        assert_eq!(stale, Applied::Ignored);
        assert_eq!(vault.balances(), [500, 0]);

        // Next counter advances.
        let fresh = vault
            .apply(&VaultEvent::Deposited {
                amounts: [100, 50],
                deposit_count: 6,
            })
            .unwrap();
        assert_eq!(fresh, Applied::Advanced);
        assert_eq!(vault.balances(), [600, 50]);
        assert_eq!(vault.deposit_count(), 6);
    }

    #[test]
    fn test_claim_applies_exactly_once() {
        let mut vault = opened_vault();
        vault
            .apply(&VaultEvent::Deposited {
                amounts: [1000, 500],
                deposit_count: 1,
            })
            .unwrap();

        let claim = VaultEvent::Claimed {
            amounts: [400, 100],
            new_utxo: Utxo::new([0x03; 32], 0),
            withdraw_count: 1,
        };
        assert_eq!(vault.apply(&claim).unwrap(), Applied::Advanced);
        assert_eq!(vault.balances(), [600, 400]);
        assert_eq!(vault.utxo(), Utxo::new([0x03; 32], 0));

        // Identical event replayed: state changes exactly once.
        assert_eq!(vault.apply(&claim).unwrap(), Applied::Ignored);
        assert_eq!(vault.balances(), [600, 400]);
    }

    #[test]
    fn test_closed_zeroes_state() {
        let mut vault = opened_vault();
        vault
            .apply(&VaultEvent::Deposited {
                amounts: [1000, 500],
                deposit_count: 1,
            })
            .unwrap();

        vault.apply(&VaultEvent::Closed).unwrap();
        assert!(!vault.is_opened());
        assert_eq!(vault.balances(), [0, 0]);
        assert_eq!(vault.utxo(), Utxo::SENTINEL);
    }

    #[test]
    fn test_claim_underflow_is_an_error() {
        let mut vault = opened_vault();
        let result = vault.apply(&VaultEvent::Claimed {
            amounts: [1, 0],
            new_utxo: Utxo::new([0x03; 32], 0),
            withdraw_count: 1,
        });
        assert_eq!(result, Err(VaultError::Arithmetic));
    }

    #[test]
    fn test_commitment_roundtrip_and_mismatch() {
        let params = test_params();
        let commitment = params.commitment();
        params.verify_commitment(commitment).unwrap();

        let mut other = params;
        other.confirmations = 4;
        assert!(matches!(
            other.verify_commitment(commitment),
            Err(VaultError::ParameterCommitmentMismatch { .. })
        ));
    }

    #[test]
    fn test_token_balance_checked_math() {
        let mut balance = TokenBalance::new(Address::ZERO, 10_000);
        balance.checked_add(7).unwrap();
        assert_eq!(balance.scaled(), U256::from(70_000));

        assert_eq!(balance.checked_sub(8), Err(VaultError::Arithmetic));
        balance.raw = u64::MAX;
        assert_eq!(balance.checked_add(1), Err(VaultError::Arithmetic));
    }

    #[test]
    fn test_scaled_balance() {
        let mut vault = opened_vault();
        vault
            .apply(&VaultEvent::Deposited {
                amounts: [7, 3],
                deposit_count: 1,
            })
            .unwrap();
        assert_eq!(vault.scaled_balance(0), U256::from(7));
        assert_eq!(vault.scaled_balance(1), U256::from(30_000));
    }
}
