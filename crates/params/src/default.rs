//! Default values for the relay and vault gas/pricing parameters.

/// Default number of blocks between difficulty retargets (Bitcoin mainnet cadence).
pub(crate) const RETARGET_PERIOD: u32 = 2016;

/// Default size of the median-time-past window tracked per stored header.
pub(crate) const MTP_WINDOW: usize = 10;

/// Default maximum number of headers that may be submitted as a short (atomic) fork.
pub(crate) const MAX_SHORT_FORK_LEN: usize = 10;

/// Default base gas cost of a header submission transaction.
pub(crate) const SUBMIT_BASE_GAS: u64 = 100_000;

/// Default marginal gas cost per submitted header.
pub(crate) const SUBMIT_PER_HEADER_GAS: u64 = 35_000;

/// Default base gas cost of opening a vault.
pub(crate) const VAULT_OPEN_GAS: u64 = 80_000;

/// Default base gas cost of depositing into a vault.
pub(crate) const VAULT_DEPOSIT_GAS: u64 = 65_000;

/// Default base gas cost of fronting a withdrawal.
pub(crate) const VAULT_FRONT_GAS: u64 = 90_000;

/// Default base gas cost of claiming a withdrawal against an inclusion proof.
pub(crate) const VAULT_CLAIM_GAS: u64 = 120_000;

/// Default marginal gas cost of a native-currency transfer back to the caller itself.
pub(crate) const TRANSFER_NATIVE_SELF_GAS: u64 = 6_000;

/// Default marginal gas cost of a native-currency transfer to a third party.
pub(crate) const TRANSFER_NATIVE_GAS: u64 = 21_000;

/// Default marginal gas cost of an ERC20-style token transfer.
pub(crate) const TRANSFER_ERC20_GAS: u64 = 40_000;

/// Default surcharge for scheduling an execution handler call (execution hash present).
pub(crate) const EXECUTION_SCHEDULE_GAS: u64 = 30_000;
