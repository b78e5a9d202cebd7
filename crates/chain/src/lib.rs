//! Interface contracts for the external chain collaborators the relay and vault clients consume
//! (Bitcoin RPC, EVM call traces, event logs, transaction submission), together with the shared
//! retry policy and the single-flight block-timestamp cache.
//!
//! Nothing in this crate implements a transport. Concrete JSON-RPC bindings live with the
//! deployment wiring; the clients only ever see these traits.

pub mod cache;
pub mod errors;
pub mod retry;
pub mod traits;
pub mod types;

pub use errors::ChainIoError;
