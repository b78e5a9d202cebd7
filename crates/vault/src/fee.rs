//! Fee estimation by state-diff accounting.
//!
//! Instead of a flat per-action gas guess, each pending action records the set of
//! (account, token) balances it is about to touch; the gas cost is the sum of the marginal
//! transfer cost per distinct pair plus the chain's L1 state-diff charge for the touched slots.

use std::collections::BTreeMap;

use alloy_primitives::Address;
use spv_bridge_params::gas::{GasCostTable, TransferKind};

/// Classifies the balance change a transfer to `account` of `token` causes, from the point of
/// view of `caller` (the transaction sender).
pub fn classify_transfer(caller: Address, account: Address, token: Address) -> TransferKind {
    if token == Address::ZERO {
        if account == caller {
            TransferKind::NativeSelf
        } else {
            TransferKind::Native
        }
    } else {
        TransferKind::Erc20
    }
}

/// The set of distinct (account, token) balance slots a pending action touches.
///
/// Recording the same pair twice keeps only the most expensive kind, matching how the EVM
/// charges a slot once however many times a transaction writes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDiff {
    touched: BTreeMap<(Address, Address), TransferKind>,
}

impl StateDiff {
    /// Creates an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a balance change on `(account, token)`.
    pub fn record(&mut self, account: Address, token: Address, kind: TransferKind) {
        self.touched
            .entry((account, token))
            .and_modify(|existing| {
                if rank(kind) > rank(*existing) {
                    *existing = kind;
                }
            })
            .or_insert(kind);
    }

    /// Records a transfer classified relative to the transaction sender.
    pub fn record_transfer(&mut self, caller: Address, account: Address, token: Address) {
        self.record(account, token, classify_transfer(caller, account, token));
    }

    /// Number of distinct touched slots.
    pub fn slots(&self) -> u64 {
        self.touched.len() as u64
    }

    /// Total marginal gas of this diff under the given cost table: per-slot transfer gas plus
    /// the L1 state-diff charge.
    pub fn gas(&self, table: &GasCostTable) -> u64 {
        let transfers: u64 = self
            .touched
            .values()
            .map(|&kind| table.transfer_gas(kind))
            .sum();
        transfers + table.state_diff.gas_for_slots(self.slots())
    }
}

const fn rank(kind: TransferKind) -> u8 {
    match kind {
        TransferKind::NativeSelf => 0,
        TransferKind::Native => 1,
        TransferKind::Erc20 => 2,
    }
}

#[cfg(test)]
mod tests {
    use spv_bridge_params::gas::StateDiffPricing;

    use super::*;

    const CALLER: Address = Address::new([0x01; 20]);
    const OTHER: Address = Address::new([0x02; 20]);
    const TOKEN: Address = Address::new([0xee; 20]);

    #[test]
    fn test_classify_transfer() {
        assert_eq!(
            classify_transfer(CALLER, CALLER, Address::ZERO),
            TransferKind::NativeSelf
        );
        assert_eq!(
            classify_transfer(CALLER, OTHER, Address::ZERO),
            TransferKind::Native
        );
        assert_eq!(classify_transfer(CALLER, OTHER, TOKEN), TransferKind::Erc20);
    }

    #[test]
    fn test_duplicate_pairs_counted_once() {
        let mut diff = StateDiff::new();
        diff.record_transfer(CALLER, OTHER, TOKEN);
        diff.record_transfer(CALLER, OTHER, TOKEN);
        diff.record_transfer(CALLER, OTHER, Address::ZERO);
        assert_eq!(diff.slots(), 2);
    }

    #[test]
    fn test_duplicate_pair_keeps_most_expensive_kind() {
        let mut diff = StateDiff::new();
        diff.record(CALLER, Address::ZERO, TransferKind::Native);
        diff.record(CALLER, Address::ZERO, TransferKind::NativeSelf);
        assert_eq!(diff.slots(), 1);

        let table = GasCostTable::default();
        assert_eq!(diff.gas(&table), table.transfer_native);
    }

    #[test]
    fn test_gas_sums_transfers_and_state_diff() {
        let mut table = GasCostTable::default();
        table.state_diff = StateDiffPricing {
            bytes_per_slot: 34,
            gas_per_byte: 16,
        };

        let mut diff = StateDiff::new();
        diff.record_transfer(CALLER, CALLER, Address::ZERO);
        diff.record_transfer(CALLER, OTHER, TOKEN);

        let expected =
            table.transfer_native_self + table.transfer_erc20 + table.state_diff.gas_for_slots(2);
        assert_eq!(diff.gas(&table), expected);
    }
}
