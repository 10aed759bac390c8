//! Conversion between human decimal amounts and integer base units.

use alloy_primitives::U256;
use rust_decimal::Decimal;

/// Largest scale a [`Decimal`] can carry.
const MAX_DECIMALS: u8 = 28;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
    #[error("negative amount: {0}")]
    Negative(Decimal),
    #[error("amount {amount} has more than {decimals} fractional digits")]
    ExcessPrecision { amount: Decimal, decimals: u8 },
    #[error("amount does not fit the target representation")]
    Overflow,
    #[error("unsupported token precision: {0} decimals")]
    UnsupportedDecimals(u8),
}

/// `amount * 10^decimals`, rejecting amounts finer than the token's precision.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, UnitError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(UnitError::Negative(amount));
    }
    if decimals > MAX_DECIMALS {
        return Err(UnitError::UnsupportedDecimals(decimals));
    }
    let normalized = amount.normalize();
    let scale = normalized.scale();
    if scale > u32::from(decimals) {
        return Err(UnitError::ExcessPrecision { amount, decimals });
    }
    let mantissa = u128::try_from(normalized.mantissa()).map_err(|_| UnitError::Overflow)?;
    let mut value = U256::from(mantissa);
    let ten = U256::from(10u8);
    for _ in scale..u32::from(decimals) {
        value = value.checked_mul(ten).ok_or(UnitError::Overflow)?;
    }
    Ok(value)
}

/// `value / 10^decimals` as an exact decimal.
pub fn from_base_units(value: U256, decimals: u8) -> Result<Decimal, UnitError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitError::UnsupportedDecimals(decimals));
    }
    let raw = u128::try_from(value).map_err(|_| UnitError::Overflow)?;
    let raw = i128::try_from(raw).map_err(|_| UnitError::Overflow)?;
    Decimal::try_from_i128_with_scale(raw, u32::from(decimals))
        .map(|d| d.normalize())
        .map_err(|_| UnitError::Overflow)
}

/// Round to `digits` significant digits for display.
pub fn format_significant(value: Decimal, digits: u32) -> String {
    value
        .round_sf(digits)
        .unwrap_or(value)
        .normalize()
        .to_string()
}

/// Grow `amount` by `bps` basis points, rounding down.
pub fn apply_buffer_bps(amount: U256, bps: u32) -> U256 {
    let factor = U256::from(10_000u32 + bps);
    amount.saturating_mul(factor) / U256::from(10_000u32)
}

/// `ceil(value * numerator / denominator)`; `None` on a zero denominator or
/// overflow.
pub fn mul_div_ceil(value: U256, numerator: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    let product = value.checked_mul(numerator)?;
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        Some(quotient)
    } else {
        quotient.checked_add(U256::from(1u8))
    }
}
