//! Recovery of full stored-header contents from submission call traces.
//!
//! The relay contract persists only `keccak256` commitments, so the literal 160-byte stored
//! header behind a commit hash exists nowhere on chain. It does exist in the calldata of the
//! transaction that produced the commitment: every submission carries the parent stored header
//! plus the compact serializations of the new headers. Walking the transaction's call tree and
//! replaying [`BtcStoredHeader::compute_next`] over those bytes reconstructs each committed
//! record until one matches the target hash.

use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use spv_bridge_chain::types::{CallTrace, CallType};
use spv_bridge_params::prelude::RelayParams;
use spv_bridge_primitives::{
    header::COMPACT_HEADER_LEN, stored::STORED_HEADER_LEN, BtcHeader, BtcStoredHeader,
};

use crate::{
    contract::{
        submitForkBlockheadersCall, submitMainBlockheadersCall, submitShortForkBlockheadersCall,
    },
    errors::RelayError,
};

/// Searches a transaction call tree for the stored header committing to `target`.
///
/// Pure function over the owned tree: visits frames in execution order, extracts the header
/// payload from every relay submission frame (or the constructor frame for the genesis
/// commitment) and hash-chains through it. Returns `None` when no frame produces the target
/// commitment, which callers treat as "this transaction did not store that header".
pub fn find_stored_header(
    trace: &CallTrace,
    relay: Address,
    target: [u8; 32],
    params: &RelayParams,
) -> Result<Option<BtcStoredHeader>, RelayError> {
    let mut stack = vec![trace];

    while let Some(node) = stack.pop() {
        if let Some(payload) = submission_payload(node, relay) {
            if let Some(found) = replay_payload(&payload, target, params)? {
                return Ok(Some(found));
            }
        }

        // Children pushed in reverse so execution order is preserved.
        for child in node.calls.iter().rev() {
            stack.push(child);
        }
    }

    Ok(None)
}

/// Extracts the `storedHeader ‖ compactHeaders` payload from a frame, if it is a relay
/// submission or the relay constructor.
fn submission_payload(node: &CallTrace, relay: Address) -> Option<Vec<u8>> {
    match node.call_type {
        CallType::Create => {
            // The constructor takes the genesis stored header as its sole `bytes` argument,
            // ABI-encoded at the tail of the init code. 160 is a multiple of 32 so there is no
            // padding to strip.
            let input = node.input.as_ref();
            if input.len() >= STORED_HEADER_LEN {
                Some(input[input.len() - STORED_HEADER_LEN..].to_vec())
            } else {
                None
            }
        }
        CallType::Call | CallType::DelegateCall => {
            if node.to != Some(relay) {
                return None;
            }
            let input = node.input.as_ref();
            if input.len() < 4 {
                return None;
            }
            let selector: [u8; 4] = input[..4].try_into().expect("4 bytes");
            match selector {
                s if s == submitMainBlockheadersCall::SELECTOR => {
                    submitMainBlockheadersCall::abi_decode(input, true)
                        .ok()
                        .map(|call| call.data.to_vec())
                }
                s if s == submitShortForkBlockheadersCall::SELECTOR => {
                    submitShortForkBlockheadersCall::abi_decode(input, true)
                        .ok()
                        .map(|call| call.data.to_vec())
                }
                s if s == submitForkBlockheadersCall::SELECTOR => {
                    submitForkBlockheadersCall::abi_decode(input, true)
                        .ok()
                        .map(|call| call.data.to_vec())
                }
                _ => None,
            }
        }
        CallType::StaticCall => None,
    }
}

/// Hash-chains through one submission payload, returning the stored header whose commitment
/// equals `target`, if any.
fn replay_payload(
    payload: &[u8],
    target: [u8; 32],
    params: &RelayParams,
) -> Result<Option<BtcStoredHeader>, RelayError> {
    if payload.len() < STORED_HEADER_LEN
        || (payload.len() - STORED_HEADER_LEN) % COMPACT_HEADER_LEN != 0
    {
        return Err(RelayError::UnparseableTrace(format!(
            "submission payload of {} bytes is not 160 + 48k",
            payload.len()
        )));
    }

    let mut stored = BtcStoredHeader::deserialize(&payload[..STORED_HEADER_LEN])?;
    if stored.commit_hash() == target {
        return Ok(Some(stored));
    }

    for compact in payload[STORED_HEADER_LEN..].chunks_exact(COMPACT_HEADER_LEN) {
        let header = BtcHeader::deserialize(compact)?;
        stored = stored.compute_next(header, params)?;
        if stored.commit_hash() == target {
            return Ok(Some(stored));
        }
    }

    Ok(None)
}
