//! The 80-byte Bitcoin block header value type and its wire codecs.

use bitcoin::{hashes::Hash, BlockHash};
use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

/// Length of the full header serialization.
pub const FULL_HEADER_LEN: usize = 80;

/// Length of the compact serialization, which omits the previous blockhash.
pub const COMPACT_HEADER_LEN: usize = 48;

/// A Bitcoin block header, byte-compatible with the wire format.
///
/// The previous blockhash may be absent when the header was decoded from its compact form; chain
/// context (the parent stored header) resolves it before the header can be fully serialized or
/// hashed. All hashes are kept in natural (internal) byte order, not the reversed display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcHeader {
    /// Block version.
    version: u32,

    /// Hash of the previous block, absent in compact form until resolved.
    previous_blockhash: Option<[u8; 32]>,

    /// Merkle root over the block's transactions.
    merkle_root: [u8; 32],

    /// Block timestamp.
    timestamp: u32,

    /// Compact difficulty target.
    nbits: u32,

    /// Proof-of-work nonce.
    nonce: u32,
}

impl BtcHeader {
    /// Creates a header with all fields known.
    pub const fn new(
        version: u32,
        previous_blockhash: [u8; 32],
        merkle_root: [u8; 32],
        timestamp: u32,
        nbits: u32,
        nonce: u32,
    ) -> Self {
        Self {
            version,
            previous_blockhash: Some(previous_blockhash),
            merkle_root,
            timestamp,
            nbits,
            nonce,
        }
    }

    /// Returns the block version.
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the previous blockhash, if resolved.
    pub const fn previous_blockhash(&self) -> Option<[u8; 32]> {
        self.previous_blockhash
    }

    /// Returns the merkle root.
    pub const fn merkle_root(&self) -> [u8; 32] {
        self.merkle_root
    }

    /// Returns the block timestamp.
    pub const fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Returns the compact difficulty target.
    pub const fn nbits(&self) -> u32 {
        self.nbits
    }

    /// Returns the proof-of-work nonce.
    pub const fn nonce(&self) -> u32 {
        self.nonce
    }

    /// Resolves the previous blockhash from chain context, consuming the header.
    pub fn with_previous_blockhash(mut self, prev: [u8; 32]) -> Self {
        self.previous_blockhash = Some(prev);
        self
    }

    /// Serializes the header into the 80-byte Bitcoin wire format: version, previous blockhash,
    /// merkle root, timestamp, nbits, nonce, all integers little-endian.
    pub fn serialize(&self) -> Result<[u8; FULL_HEADER_LEN], CodecError> {
        let prev = self
            .previous_blockhash
            .ok_or(CodecError::MissingPrevBlockhash)?;

        let mut buf = [0u8; FULL_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..36].copy_from_slice(&prev);
        buf[36..68].copy_from_slice(&self.merkle_root);
        buf[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[72..76].copy_from_slice(&self.nbits.to_le_bytes());
        buf[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        Ok(buf)
    }

    /// Serializes the header into the 48-byte compact form, omitting the previous blockhash.
    ///
    /// Used in submission calldata where the previous header is inferable from chain context.
    pub fn serialize_compact(&self) -> [u8; COMPACT_HEADER_LEN] {
        let mut buf = [0u8; COMPACT_HEADER_LEN];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..36].copy_from_slice(&self.merkle_root);
        buf[36..40].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[40..44].copy_from_slice(&self.nbits.to_le_bytes());
        buf[44..48].copy_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    /// Deserializes a header, dispatching on buffer length: 80 bytes for the full form, 48 bytes
    /// for the compact form.
    pub fn deserialize(data: &[u8]) -> Result<Self, CodecError> {
        match data.len() {
            FULL_HEADER_LEN => {
                let mut prev = [0u8; 32];
                let mut merkle = [0u8; 32];
                prev.copy_from_slice(&data[4..36]);
                merkle.copy_from_slice(&data[36..68]);
                Ok(Self {
                    version: u32::from_le_bytes(data[0..4].try_into().expect("4 bytes")),
                    previous_blockhash: Some(prev),
                    merkle_root: merkle,
                    timestamp: u32::from_le_bytes(data[68..72].try_into().expect("4 bytes")),
                    nbits: u32::from_le_bytes(data[72..76].try_into().expect("4 bytes")),
                    nonce: u32::from_le_bytes(data[76..80].try_into().expect("4 bytes")),
                })
            }
            COMPACT_HEADER_LEN => {
                let mut merkle = [0u8; 32];
                merkle.copy_from_slice(&data[4..36]);
                Ok(Self {
                    version: u32::from_le_bytes(data[0..4].try_into().expect("4 bytes")),
                    previous_blockhash: None,
                    merkle_root: merkle,
                    timestamp: u32::from_le_bytes(data[36..40].try_into().expect("4 bytes")),
                    nbits: u32::from_le_bytes(data[40..44].try_into().expect("4 bytes")),
                    nonce: u32::from_le_bytes(data[44..48].try_into().expect("4 bytes")),
                })
            }
            got => Err(CodecError::InvalidLength {
                got,
                expected: &[FULL_HEADER_LEN, COMPACT_HEADER_LEN],
            }),
        }
    }

    /// Computes the block hash: double-SHA256 over the full serialization, natural byte order.
    pub fn block_hash(&self) -> Result<[u8; 32], CodecError> {
        let serialized = self.serialize()?;
        Ok(*BlockHash::hash(&serialized).as_byte_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The Bitcoin mainnet genesis header.
    fn genesis() -> BtcHeader {
        let merkle: [u8; 32] =
            hex::decode("3ba3edfd7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a")
                .unwrap()
                .try_into()
                .unwrap();
        BtcHeader::new(1, [0u8; 32], merkle, 1231006505, 0x1d00ffff, 2083236893)
    }

    #[test]
    fn test_genesis_hash() {
        // Natural byte order, so the display hash reversed.
        let mut expected: [u8; 32] =
            hex::decode("000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f")
                .unwrap()
                .try_into()
                .unwrap();
        expected.reverse();

        assert_eq!(genesis().block_hash().unwrap(), expected);
    }

    #[test]
    fn test_full_roundtrip() {
        let header = genesis();
        let bytes = header.serialize().unwrap();
        assert_eq!(BtcHeader::deserialize(&bytes).unwrap(), header);
    }

    #[test]
    fn test_compact_roundtrip() {
        let header = genesis();
        let bytes = header.serialize_compact();

        let decoded = BtcHeader::deserialize(&bytes).unwrap();
        assert_eq!(decoded.previous_blockhash(), None);
        assert_eq!(decoded.with_previous_blockhash([0u8; 32]), header);
    }

    #[test]
    fn test_invalid_length_rejected() {
        assert_eq!(
            BtcHeader::deserialize(&[0u8; 79]),
            Err(CodecError::InvalidLength {
                got: 79,
                expected: &[80, 48]
            })
        );
    }

    #[test]
    fn test_unresolved_compact_header_cannot_hash() {
        let header = BtcHeader::deserialize(&genesis().serialize_compact()).unwrap();
        assert_eq!(header.block_hash(), Err(CodecError::MissingPrevBlockhash));
    }
}
