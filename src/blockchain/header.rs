use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::work::{CompactError, U256, decode_compact};

/// A 32-byte double-SHA-256 digest, kept in internal (little-endian) byte
/// order and displayed byte-reversed as block explorers do.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Double SHA-256 of `data`.
    pub fn digest(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        let second = Sha256::digest(first);
        let mut out = [0u8; 32];
        out.copy_from_slice(&second[..]);
        Hash256(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The digest read as a little-endian 256-bit number.
    pub fn to_u256(&self) -> U256 {
        U256::from_little_endian(&self.0)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        f.write_str(&hex::encode(reversed))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({self})")
    }
}

impl FromStr for Hash256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Hash256(bytes))
    }
}

impl From<Hash256> for String {
    fn from(hash: Hash256) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for Hash256 {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Serialized size of a header on the wire and in the hash preimage.
pub const HEADER_SIZE: usize = 80;

/// An immutable proof-of-work block header. Its identity is the hash of
/// its 80-byte serialization and is never stored alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub time: u32, // Unix timestamp (UTC)
    pub bits: u32, // compact difficulty target
    pub nonce: u32,
}

impl BlockHeader {
    /// Canonical serialization: little-endian integers, hashes in internal order.
    pub fn serialize(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        out[4..36].copy_from_slice(&self.prev_hash.0);
        out[36..68].copy_from_slice(&self.merkle_root.0);
        out[68..72].copy_from_slice(&self.time.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    pub fn hash(&self) -> Hash256 {
        Hash256::digest(&self.serialize())
    }

    /// The full target this header claims to meet.
    pub fn target(&self) -> Result<U256, CompactError> {
        decode_compact(self.bits)
    }

    /// True when the header hash does not exceed its own claimed target.
    /// Whether that target is the *right* one is a chain-level question.
    pub fn meets_target(&self) -> Result<bool, CompactError> {
        let target = self.target()?;
        Ok(self.hash().to_u256() <= target)
    }

    /// Grind the nonce until the header meets its own target.
    /// Only practical for regression and unit-test difficulties.
    pub fn solve(&mut self) -> Result<Hash256, CompactError> {
        let target = self.target()?;
        loop {
            let hash = self.hash();
            if hash.to_u256() <= target {
                return Ok(hash);
            }
            self.nonce = self.nonce.wrapping_add(1);
        }
    }
}
