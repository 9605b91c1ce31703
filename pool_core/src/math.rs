//! Integer fixed-point math for pool accounting.
//!
//! Monetary amounts are `u128` in the settlement token's smallest unit
//! (6 decimals). Shares are `u128`. Intermediate products are widened
//! through `BigUint` so a `u128 * u128` numerator can never wrap; only a
//! quotient that does not fit back into `u128` is an overflow.

use num_bigint::BigUint;
use num_traits::ToPrimitive;

use crate::errors::MathError;
use crate::{BPS_DENOMINATOR, SHARE_SCALE};

/// floor(a * b / d) with a widened intermediate product.
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    if d == 0 {
        return Err(MathError::DivisionByZero);
    }
    let numerator = BigUint::from(a) * BigUint::from(b);
    let quotient = numerator / BigUint::from(d);
    quotient.to_u128().ok_or(MathError::ArithmeticOverflow)
}

/// floor(amount * bps / 10_000).
pub fn bps_of(amount: u128, bps: u32) -> Result<u128, MathError> {
    mul_div(amount, bps as u128, BPS_DENOMINATOR)
}

/// Ratio of `part` to `whole` in basis points, floor-rounded.
///
/// An empty `whole` yields the full 10_000 bps: a ratio over nothing is
/// treated as unconstrained rather than as zero coverage.
pub fn ratio_bps(part: u128, whole: u128) -> u32 {
    if whole == 0 {
        return BPS_DENOMINATOR as u32;
    }
    // part <= whole in every call site, so the result fits u32.
    match mul_div(part, BPS_DENOMINATOR, whole) {
        Ok(bps) => bps.min(BPS_DENOMINATOR) as u32,
        Err(_) => BPS_DENOMINATOR as u32,
    }
}

/// Assets -> shares at the tranche's current NAV, floor rounding.
///
/// An empty tranche (no shares) bootstraps 1:1. A tranche whose NAV was
/// wiped to zero while shares remain also mints 1:1; the surviving shares
/// are worth nothing, so the new deposit cannot be diluted by them.
pub fn convert_to_shares(
    assets: u128,
    tranche_nav: u128,
    total_shares: u128,
) -> Result<u128, MathError> {
    if total_shares == 0 || tranche_nav == 0 {
        return Ok(assets);
    }
    mul_div(assets, total_shares, tranche_nav)
}

/// Shares -> assets at the tranche's current NAV, floor rounding.
pub fn convert_to_assets(
    shares: u128,
    tranche_nav: u128,
    total_shares: u128,
) -> Result<u128, MathError> {
    if total_shares == 0 {
        return Ok(shares);
    }
    mul_div(shares, tranche_nav, total_shares)
}

/// Price of one share in 18-decimal fixed point.
pub fn share_price(tranche_nav: u128, total_shares: u128) -> Result<u128, MathError> {
    if total_shares == 0 {
        return Ok(SHARE_SCALE);
    }
    mul_div(tranche_nav, SHARE_SCALE, total_shares)
}

/// Checked add that surfaces the overflow as a math error.
pub fn checked_add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::ArithmeticOverflow)
}

/// Checked sub; callers guard the ordering, so underflow is a hard error.
pub fn checked_sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::ArithmeticOverflow)
}
