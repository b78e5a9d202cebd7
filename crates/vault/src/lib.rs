//! The SPV vault engine: a deterministic state machine over per-(owner, vault) balances driven
//! by Bitcoin-transaction-encoded withdrawal instructions, reconciled against on-chain events
//! with idempotent, replay-safe transitions.

pub mod contract;
pub mod engine;
pub mod errors;
pub mod fee;
pub mod reconciler;
pub mod state;
pub mod withdrawal;

pub use engine::SpvVaultEngine;
pub use errors::VaultError;
pub use reconciler::EventReconciler;
pub use state::SpvVaultState;
pub use withdrawal::SpvWithdrawalData;
