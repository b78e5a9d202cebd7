//! Deterministic generators for headers, stored-header chains and OP_RETURN payloads used across
//! the workspace's test suites.

use std::sync::Once;

use bitcoin::pow::Work;
use rand::{rngs::StdRng, Rng, SeedableRng};
use spv_bridge_common::logging::{self, LoggerConfig};
use spv_bridge_params::prelude::RelayParams;
use spv_bridge_primitives::{
    stored::TIMESTAMP_WINDOW, work::work_from_nbits, BtcHeader, BtcStoredHeader,
};

/// Initializes the workspace logging stack once per test binary, so `RUST_LOG` works in tests.
pub fn init_test_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| logging::init(LoggerConfig::with_base_name("spv-bridge-tests")));
}

/// A difficulty-1 nbits value used throughout the test suites.
pub const TEST_NBITS: u32 = 0x1d00ffff;

/// Base timestamp for generated chains.
pub const TEST_GENESIS_TS: u32 = 1_600_000_000;

/// Builds a header with deterministic merkle root and nonce derived from `seed`.
pub fn test_header(timestamp: u32, seed: u64) -> BtcHeader {
    let mut rng = StdRng::seed_from_u64(seed);
    let merkle: [u8; 32] = rng.gen();
    BtcHeader::new(2, [0u8; 32], merkle, timestamp, TEST_NBITS, rng.gen())
}

/// Bootstraps an anchor stored header at the given height.
pub fn anchor_at(height: u32) -> BtcStoredHeader {
    BtcStoredHeader::new(
        test_header(TEST_GENESIS_TS, u64::from(height)),
        work_from_nbits(TEST_NBITS).unwrap(),
        height,
        TEST_GENESIS_TS - 1_000_000,
        [TEST_GENESIS_TS; TIMESTAMP_WINDOW],
    )
    .unwrap()
}

/// Generates `len` consecutive headers extending `anchor`, ten minutes apart, together with the
/// stored-header chain the relay should compute for them.
///
/// The returned raw headers have unresolved previous blockhashes, matching what a submission
/// batch decoded from compact serializations looks like.
pub fn header_chain(anchor: &BtcStoredHeader, len: usize) -> (Vec<BtcHeader>, Vec<BtcStoredHeader>) {
    let params = RelayParams::default();
    let mut headers = Vec::with_capacity(len);
    let mut stored = Vec::with_capacity(len);

    let mut parent = *anchor;
    for i in 0..len {
        let ts = parent.header().timestamp() + 600;
        let header = test_header(ts, u64::from(anchor.block_height()) * 1000 + i as u64);
        let next = parent.compute_next(header, &params).unwrap();
        // Strip the placeholder prevhash so the batch looks like decoded compact headers.
        headers.push(BtcHeader::deserialize(&header.serialize_compact()).unwrap());
        stored.push(next);
        parent = next;
    }

    (headers, stored)
}

/// Sums the per-block work of `n` difficulty-1 blocks on top of `base`.
pub fn accumulated_work(base: Work, n: usize) -> Work {
    let per_block = work_from_nbits(TEST_NBITS).unwrap();
    let mut acc = base;
    for _ in 0..n {
        acc = spv_bridge_primitives::work::checked_add_work(acc, per_block).unwrap();
    }
    acc
}
