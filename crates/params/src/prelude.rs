//! Re-exports of the commonly used parameter types.

pub use crate::{
    gas::{GasCostTable, StateDiffPricing, TransferKind},
    relay::RelayParams,
};
