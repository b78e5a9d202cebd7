//! Chain-work arithmetic on top of [`bitcoin::pow`].

use alloy_primitives::U256;
use bitcoin::{pow::Work, CompactTarget, Target};

use crate::errors::HeaderChainError;

/// Computes the proof-of-work contribution of a header with the given nbits.
///
/// This is the standard Bitcoin difficulty-to-work conversion, `2^256 / (target + 1)`. The nbits
/// value is validated the way Bitcoin Core's `SetCompact` does: a zero mantissa, a set sign bit
/// or an exponent that shifts the mantissa past 256 bits all fail with
/// [`HeaderChainError::InvalidDifficultyBits`].
pub fn work_from_nbits(nbits: u32) -> Result<Work, HeaderChainError> {
    let exponent = nbits >> 24;
    let mantissa = nbits & 0x007f_ffff;

    if mantissa == 0 || nbits & 0x0080_0000 != 0 {
        return Err(HeaderChainError::InvalidDifficultyBits(nbits));
    }

    // Overflow rule from Bitcoin Core's arith_uint256::SetCompact.
    let overflow = exponent > 34
        || (mantissa > 0xff && exponent > 33)
        || (mantissa > 0xffff && exponent > 32);
    if overflow {
        return Err(HeaderChainError::InvalidDifficultyBits(nbits));
    }

    let target = Target::from_compact(CompactTarget::from_consensus(nbits));
    if target == Target::ZERO {
        return Err(HeaderChainError::InvalidDifficultyBits(nbits));
    }

    Ok(target.to_work())
}

/// Adds two work values, failing with [`HeaderChainError::ArithmeticOverflow`] when the sum does
/// not fit in 256 bits.
///
/// [`Work`]'s own `Add` panics on overflow; accumulation across an arbitrarily long header chain
/// must surface the condition as an error instead.
pub fn checked_add_work(lhs: Work, rhs: Work) -> Result<Work, HeaderChainError> {
    let sum = U256::from_be_bytes(lhs.to_be_bytes())
        .checked_add(U256::from_be_bytes(rhs.to_be_bytes()))
        .ok_or(HeaderChainError::ArithmeticOverflow)?;

    Ok(Work::from_be_bytes(sum.to_be_bytes()))
}
