//! This crate contains the consensus-critical and pricing parameters that dictate the behavior of
//! the relay and vault clients in a way that keeps them in agreement with the on-chain verifier.

pub mod default;
pub mod gas;
pub mod prelude;
pub mod relay;
