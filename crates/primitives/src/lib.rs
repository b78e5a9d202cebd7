//! Value types shared by the relay and vault clients: Bitcoin block headers, the chain-work
//! augmented stored-header record mirrored by the on-chain relay, and their exact binary codecs.
//!
//! Everything in this crate is pure data and pure functions. The byte layouts here are
//! consensus-critical: the on-chain verifier independently recomputes every serialization and
//! hash, so a single endianness mistake desynchronizes the client from the contract.

pub mod errors;
pub mod header;
pub mod stored;
pub mod work;

pub use header::BtcHeader;
pub use stored::BtcStoredHeader;
