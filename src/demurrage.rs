//! Fixed-point demurrage: time adjustment of amounts by block distance
//!
//! A Freicoin amount loses 1/2^20 of its value every block. Adjusting a value
//! forward by `d` blocks multiplies it by `(1 - 2^-20)^d`; adjusting it in
//! reverse divides by the same factor.
//!
//! All arithmetic is integer: the factor is a Q64 fixed-point number (64
//! fractional bits held in a `u128`) raised to the distance by
//! square-and-multiply, truncating after every product. Amounts are scaled
//! by their magnitude and the sign is reapplied, so every transform is odd
//! and rounds toward zero. For non-negative values that is rounding down,
//! which never creates value.
//!
//! Every result lies in `[-MAX_MONEY, MAX_MONEY]` regardless of the input.
//!
//! Round trip: for `0 <= v <= MAX_MONEY`,
//! `r = time_adjust_value_reverse(time_adjust_value_forward(v, d), d)`
//! satisfies `r <= v` and `v - r <= time_adjust_value_reverse(1, d) + 1`.
//! That is at most 2 kria below roughly 726,000 blocks and at most 3 kria up
//! to 1,000,000 blocks. At `d == 0` the round trip is exact.

use crate::constants::{MAX_MONEY, PER_BLOCK_DEMURRAGE_FACTOR};
use crate::params::ConsensusParams;
use crate::types::Amount;

const Q64_ONE: u128 = 1 << 64;

/// Per-block retention factor `1 - 1/PER_BLOCK_DEMURRAGE_FACTOR` in Q64
const PER_BLOCK_RETENTION: u128 = Q64_ONE - Q64_ONE / PER_BLOCK_DEMURRAGE_FACTOR as u128;

/// Truncating Q64 multiply. Callers keep at least one operand below 1.0 so the
/// product fits in 128 bits.
#[inline]
fn mul_q64(a: u128, b: u128) -> u128 {
    (a * b) >> 64
}

/// Retention factor `(1 - 2^-20)^distance` in Q64.
///
/// Returns exactly `1 << 64` for distance 0. Non-increasing in `distance`.
pub fn demurrage_factor(distance: u32) -> u128 {
    let mut result = Q64_ONE;
    let mut base = PER_BLOCK_RETENTION;
    let mut exp = distance;
    while exp != 0 {
        if exp & 1 == 1 {
            result = mul_q64(result, base);
        }
        exp >>= 1;
        if exp != 0 {
            base = mul_q64(base, base);
        }
    }
    result
}

/// TimeAdjustValueForward: ℤ × ℕ → ℤ
///
/// Decay `initial_value` by `distance` blocks.
pub fn time_adjust_value_forward(initial_value: Amount, distance: u32) -> Amount {
    let value = initial_value.clamp(-MAX_MONEY, MAX_MONEY);
    if distance == 0 || value == 0 {
        return value;
    }
    let magnitude = value.unsigned_abs() as u128;
    let adjusted = mul_q64(magnitude, demurrage_factor(distance)) as i64;
    value.signum() * adjusted
}

/// TimeAdjustValueReverse: ℤ × ℕ → ℤ
///
/// Undo `distance` blocks of decay. Saturates at `MAX_MONEY` in magnitude.
pub fn time_adjust_value_reverse(initial_value: Amount, distance: u32) -> Amount {
    let value = initial_value.clamp(-MAX_MONEY, MAX_MONEY);
    if distance == 0 || value == 0 {
        return value;
    }
    let factor = demurrage_factor(distance);
    if factor == 0 {
        return value.signum() * MAX_MONEY;
    }
    let magnitude = value.unsigned_abs() as u128;
    let adjusted = ((magnitude << 64) / factor).min(MAX_MONEY as u128) as i64;
    value.signum() * adjusted
}

/// GetTimeAdjustedValue: ℤ × ℤ → ℤ
///
/// Forward for non-negative depth, reverse for negative depth. When
/// `params.disable_time_adjust` is set the value is returned untouched.
pub fn get_time_adjusted_value(
    params: &ConsensusParams,
    initial_value: Amount,
    relative_depth: i64,
) -> Amount {
    if params.disable_time_adjust {
        return initial_value;
    }
    let distance = saturating_distance(relative_depth.unsigned_abs());
    if relative_depth < 0 {
        time_adjust_value_reverse(initial_value, distance)
    } else {
        time_adjust_value_forward(initial_value, distance)
    }
}

/// Convert a demurrage-currency amount at `height` into scrip pinned to the
/// scrip epoch.
pub fn freicoin_to_scrip(params: &ConsensusParams, freicoin: Amount, height: u32) -> Amount {
    get_time_adjusted_value(params, freicoin, params.scrip_epoch - height as i64)
}

/// Convert scrip pinned to the scrip epoch back into demurrage currency
/// present value at `height`.
pub fn scrip_to_freicoin(params: &ConsensusParams, scrip: Amount, height: u32) -> Amount {
    get_time_adjusted_value(params, scrip, height as i64 - params.scrip_epoch)
}

fn saturating_distance(distance: u64) -> u32 {
    u32::try_from(distance).unwrap_or(u32::MAX)
}
