//! The chain-work augmented stored-header record mirrored by the on-chain relay.

use alloy_primitives::keccak256;
use bitcoin::pow::Work;
use spv_bridge_params::prelude::RelayParams;

use crate::{
    errors::{CodecError, HeaderChainError},
    header::{BtcHeader, FULL_HEADER_LEN},
    work::{checked_add_work, work_from_nbits},
};

/// Length of the stored-header serialization.
pub const STORED_HEADER_LEN: usize = 160;

/// Number of previous block timestamps tracked per stored header.
pub const TIMESTAMP_WINDOW: usize = 10;

/// A Bitcoin block header augmented with the chain state the on-chain relay tracks per block:
/// cumulative chain work, height, the timestamp of the last difficulty-adjustment boundary and a
/// sliding window of recent block timestamps.
///
/// The contract only persists `keccak256` of the 160-byte serialization (the commit hash), so
/// this struct is the client-side source of truth for the full contents. Its header always has a
/// resolved previous blockhash; the constructors enforce that invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BtcStoredHeader {
    /// The underlying block header, previous blockhash resolved.
    header: BtcHeader,

    /// Double-SHA256 of the header, natural byte order.
    block_hash: [u8; 32],

    /// Cumulative proof-of-work of the chain up to and including this block.
    chain_work: Work,

    /// Height of this block.
    block_height: u32,

    /// Timestamp of the last difficulty-adjustment boundary block.
    last_diff_adjustment: u32,

    /// The last [`TIMESTAMP_WINDOW`] block timestamps, oldest first.
    prev_block_timestamps: [u32; TIMESTAMP_WINDOW],
}

impl BtcStoredHeader {
    /// Bootstraps a stored header from a trusted header and its chain state.
    ///
    /// Used once per deployment to anchor the local chain at the same block the contract was
    /// constructed with; every subsequent stored header derives via [`Self::compute_next`].
    pub fn new(
        header: BtcHeader,
        chain_work: Work,
        block_height: u32,
        last_diff_adjustment: u32,
        prev_block_timestamps: [u32; TIMESTAMP_WINDOW],
    ) -> Result<Self, CodecError> {
        let block_hash = header.block_hash()?;
        Ok(Self {
            header,
            block_hash,
            chain_work,
            block_height,
            last_diff_adjustment,
            prev_block_timestamps,
        })
    }

    /// Returns the underlying header.
    pub const fn header(&self) -> &BtcHeader {
        &self.header
    }

    /// Returns the block hash in natural byte order.
    pub const fn block_hash(&self) -> [u8; 32] {
        self.block_hash
    }

    /// Returns the cumulative chain work.
    pub const fn chain_work(&self) -> Work {
        self.chain_work
    }

    /// Returns the block height.
    pub const fn block_height(&self) -> u32 {
        self.block_height
    }

    /// Returns the timestamp of the last difficulty-adjustment boundary.
    pub const fn last_diff_adjustment(&self) -> u32 {
        self.last_diff_adjustment
    }

    /// Returns the tracked timestamp window, oldest first.
    pub const fn prev_block_timestamps(&self) -> &[u32; TIMESTAMP_WINDOW] {
        &self.prev_block_timestamps
    }

    /// Returns the median of the tracked timestamp window.
    ///
    /// The on-chain verifier enforces the median-time-past rule; the client exposes it so callers
    /// can reject headers before paying for a submission the contract would revert.
    pub fn median_time_past(&self) -> u32 {
        let mut sorted = self.prev_block_timestamps;
        sorted.sort_unstable();
        sorted[TIMESTAMP_WINDOW / 2]
    }

    /// Derives the stored header for the next block in the chain.
    ///
    /// This is a pure function: the previous blockhash of `next` is resolved from this header's
    /// block hash, chain work accumulates by the work encoded in `next`'s nbits, the timestamp
    /// window shifts by one, and the last difficulty adjustment moves only when the new height
    /// lands exactly on a retarget boundary.
    pub fn compute_next(
        &self,
        next: BtcHeader,
        params: &RelayParams,
    ) -> Result<Self, HeaderChainError> {
        let header = next.with_previous_blockhash(self.block_hash);
        let block_hash = header
            .block_hash()
            .expect("previous blockhash was just resolved");

        let chain_work = checked_add_work(self.chain_work, work_from_nbits(header.nbits())?)?;

        let block_height = self.block_height + 1;
        let last_diff_adjustment = if block_height % params.retarget_period == 0 {
            header.timestamp()
        } else {
            self.last_diff_adjustment
        };

        let mut prev_block_timestamps = self.prev_block_timestamps;
        prev_block_timestamps.copy_within(1.., 0);
        prev_block_timestamps[TIMESTAMP_WINDOW - 1] = header.timestamp();

        Ok(Self {
            header,
            block_hash,
            chain_work,
            block_height,
            last_diff_adjustment,
            prev_block_timestamps,
        })
    }

    /// Serializes the stored header into the exact 160-byte layout the contract hashes:
    /// header (80, little-endian fields), chain work (32, big-endian), height (4, big-endian),
    /// last difficulty adjustment (4, big-endian), timestamp window (10x4, big-endian).
    pub fn serialize(&self) -> [u8; STORED_HEADER_LEN] {
        let mut buf = [0u8; STORED_HEADER_LEN];
        buf[0..FULL_HEADER_LEN].copy_from_slice(
            &self
                .header
                .serialize()
                .expect("stored headers always have a resolved previous blockhash"),
        );
        buf[80..112].copy_from_slice(&self.chain_work.to_be_bytes());
        buf[112..116].copy_from_slice(&self.block_height.to_be_bytes());
        buf[116..120].copy_from_slice(&self.last_diff_adjustment.to_be_bytes());
        for (i, ts) in self.prev_block_timestamps.iter().enumerate() {
            buf[120 + i * 4..124 + i * 4].copy_from_slice(&ts.to_be_bytes());
        }
        buf
    }

    /// Deserializes a stored header from its 160-byte serialization.
    pub fn deserialize(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() != STORED_HEADER_LEN {
            return Err(CodecError::InvalidLength {
                got: data.len(),
                expected: &[STORED_HEADER_LEN],
            });
        }

        let header = BtcHeader::deserialize(&data[0..FULL_HEADER_LEN])?;
        let block_hash = header.block_hash()?;

        let mut work = [0u8; 32];
        work.copy_from_slice(&data[80..112]);

        let mut prev_block_timestamps = [0u32; TIMESTAMP_WINDOW];
        for (i, ts) in prev_block_timestamps.iter_mut().enumerate() {
            *ts = u32::from_be_bytes(data[120 + i * 4..124 + i * 4].try_into().expect("4 bytes"));
        }

        Ok(Self {
            header,
            block_hash,
            chain_work: Work::from_be_bytes(work),
            block_height: u32::from_be_bytes(data[112..116].try_into().expect("4 bytes")),
            last_diff_adjustment: u32::from_be_bytes(data[116..120].try_into().expect("4 bytes")),
            prev_block_timestamps,
        })
    }

    /// Computes the cross-chain commitment for this stored header: `keccak256` of the 160-byte
    /// serialization. This is the value the contract stores as its chain-tip pointer.
    pub fn commit_hash(&self) -> [u8; 32] {
        keccak256(self.serialize()).0
    }
}
