//! Client for the on-chain BTC relay: header batch submission (main chain, short forks, long
//! forks), chain-tip recovery by call-trace replay, and proof-of-inclusion retrieval with
//! catch-up synchronization.

pub mod client;
pub mod contract;
pub mod errors;
pub mod trace;

pub use client::BtcRelayClient;
pub use errors::RelayError;
