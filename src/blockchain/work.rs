use serde::{Deserialize, Serialize};
use thiserror::Error;
use uint::construct_uint;

construct_uint! {
    /// 256-bit unsigned integer used for targets and hash values.
    #[derive(Serialize, Deserialize)]
    pub struct U256(4);
}

construct_uint! {
    /// 512-bit unsigned integer used for chain work, wide enough that
    /// summing per-block work can never overflow in practice.
    #[derive(Serialize, Deserialize)]
    pub struct U512(8);
}

impl From<U256> for U512 {
    fn from(value: U256) -> Self {
        let mut words = [0u64; 8];
        words[..4].copy_from_slice(&value.0);
        U512(words)
    }
}

/// Why a compact ("nBits") value could not be turned into a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompactError {
    #[error("compact target {0:#010x} has the sign bit set")]
    Negative(u32),
    #[error("compact target {0:#010x} overflows 256 bits")]
    Overflow(u32),
    #[error("compact target {0:#010x} decodes to zero")]
    Zero(u32),
}

/// Decode the 32-bit compact representation of a target.
pub fn decode_compact(bits: u32) -> Result<U256, CompactError> {
    let size = bits >> 24;
    let mut word = bits & 0x007f_ffff;

    if word != 0 && bits & 0x0080_0000 != 0 {
        return Err(CompactError::Negative(bits));
    }
    if word != 0 && (size > 34 || (word > 0xff && size > 33) || (word > 0xffff && size > 32)) {
        return Err(CompactError::Overflow(bits));
    }

    let target = if size <= 3 {
        word >>= 8 * (3 - size);
        U256::from(word)
    } else {
        U256::from(word) << (8 * (size - 3) as usize)
    };

    if target.is_zero() {
        return Err(CompactError::Zero(bits));
    }
    Ok(target)
}

/// Encode a target into its 32-bit compact representation.
/// Precision below the top three significant bytes is truncated.
pub fn encode_compact(target: U256) -> u32 {
    let mut size = (target.bits() + 7) / 8;
    let mut compact = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3))).low_u64() as u32
    };

    // The mantissa's top bit is the sign bit; shift into the next byte.
    if compact & 0x0080_0000 != 0 {
        compact >>= 8;
        size += 1;
    }
    compact | ((size as u32) << 24)
}

/// Expected number of hashes needed to meet `target`: 2^256 / (target + 1).
pub fn work_for_target(target: U256) -> U512 {
    let numerator = U512::one() << 256;
    numerator / (U512::from(target) + U512::one())
}

/// Shorthand for decoding `bits` and computing its work.
pub fn work_for_bits(bits: u32) -> Result<U512, CompactError> {
    decode_compact(bits).map(work_for_target)
}
