//! Fixed-point arithmetic for the 18-decimal accounting precision.
//!
//! All value math multiplies before dividing, widened through `U256`, so the
//! only rounding the engine ever performs is the final integer truncation.

use ethers::types::U256;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::errors::FundError;

/// Scale of the accounting currency and of ownership units.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Decimal places behind [`PRECISION`].
pub const ACCOUNTING_DECIMALS: u32 = 18;

/// 100% expressed in basis points.
pub const BPS_DENOMINATOR: u128 = 10_000;

pub const SECONDS_PER_YEAR: u64 = 31_536_000;

pub fn pow10(exp: u32) -> Result<u128, FundError> {
    10u128.checked_pow(exp).ok_or(FundError::MathOverflow("pow10"))
}

/// floor(a * b / denom) with a 256-bit intermediate.
pub fn mul_div(a: u128, b: u128, denom: u128) -> Result<u128, FundError> {
    if denom == 0 {
        return Err(FundError::MathOverflow("mul_div: division by zero"));
    }
    let wide = U256::from(a) * U256::from(b);
    let out = wide / U256::from(denom);
    if out > U256::from(u128::MAX) {
        return Err(FundError::MathOverflow("mul_div: result exceeds 128 bits"));
    }
    Ok(out.as_u128())
}

/// floor(a * b * c / denom). The three-way product is checked in 256 bits.
pub fn mul3_div(a: u128, b: u128, c: u128, denom: u128) -> Result<u128, FundError> {
    if denom == 0 {
        return Err(FundError::MathOverflow("mul3_div: division by zero"));
    }
    let wide = (U256::from(a) * U256::from(b))
        .checked_mul(U256::from(c))
        .ok_or(FundError::MathOverflow("mul3_div: product exceeds 256 bits"))?;
    let out = wide / U256::from(denom);
    if out > U256::from(u128::MAX) {
        return Err(FundError::MathOverflow("mul3_div: result exceeds 128 bits"));
    }
    Ok(out.as_u128())
}

/// Signed mul_div, truncating toward zero like the unsigned variant.
pub fn mul_div_signed(a: i128, b: i128, denom: i128) -> Result<i128, FundError> {
    if denom == 0 {
        return Err(FundError::MathOverflow("mul_div_signed: division by zero"));
    }
    let negative = (a < 0) ^ (b < 0) ^ (denom < 0);
    let magnitude = mul_div(a.unsigned_abs(), b.unsigned_abs(), denom.unsigned_abs())?;
    if magnitude > i128::MAX as u128 {
        return Err(FundError::MathOverflow("mul_div_signed: result exceeds 127 bits"));
    }
    let out = magnitude as i128;
    Ok(if negative { -out } else { out })
}

/// Rescale an amount between decimal precisions. Scaling down truncates.
pub fn scale_amount(amount: u128, from_decimals: u32, to_decimals: u32) -> Result<u128, FundError> {
    if from_decimals == to_decimals {
        return Ok(amount);
    }
    if to_decimals > from_decimals {
        let factor = pow10(to_decimals - from_decimals)?;
        amount.checked_mul(factor).ok_or(FundError::MathOverflow("scale_amount"))
    } else {
        let factor = pow10(from_decimals - to_decimals)?;
        Ok(amount / factor)
    }
}

/// Internal fixed-point amount to a display decimal, for logs and clients.
pub fn to_display(amount: u128, decimals: u32) -> Option<Decimal> {
    let divisor = Decimal::from_u128(pow10(decimals).ok()?)?;
    let value = Decimal::from_u128(amount)?;
    Some(value / divisor)
}

/// Parse a display decimal back into an internal fixed-point amount.
///
/// Rejects values with more fractional digits than the target precision,
/// matching the input validation the client boundary performs.
pub fn from_display(amount: Decimal, decimals: u32) -> Result<u128, FundError> {
    if amount.is_sign_negative() {
        return Err(FundError::InvalidAmount(format!("{} is negative", amount)));
    }
    if amount.normalize().scale() > decimals {
        return Err(FundError::InvalidAmount(format!(
            "{} exceeds max precision {}",
            amount, decimals
        )));
    }
    let multiplier = Decimal::from_u128(pow10(decimals)?)
        .ok_or(FundError::MathOverflow("from_display: multiplier"))?;
    (amount * multiplier)
        .trunc()
        .to_u128()
        .ok_or(FundError::MathOverflow("from_display: amount"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_wide_intermediate() {
        // 1.1e18 * 1e21 / 1e18 would overflow u128 in the intermediate
        let price = 1_100_000_000_000_000_000u128;
        let supply = 1_000_000_000_000_000_000_000u128;
        let value = mul_div(price, supply, PRECISION).unwrap();
        assert_eq!(value, 1_100_000_000_000_000_000_000);
    }

    #[test]
    fn test_mul_div_truncates() {
        assert_eq!(mul_div(10, 1, 3).unwrap(), 3);
        assert_eq!(mul_div(0, 5, 3).unwrap(), 0);
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert!(matches!(mul_div(1, 1, 0), Err(FundError::MathOverflow(_))));
    }

    #[test]
    fn test_mul_div_result_overflow() {
        assert!(mul_div(u128::MAX, u128::MAX, 1).is_err());
    }

    #[test]
    fn test_mul_div_signed() {
        assert_eq!(mul_div_signed(-10, 4, 2).unwrap(), -20);
        assert_eq!(mul_div_signed(-10, -4, 2).unwrap(), 20);
        // truncation toward zero
        assert_eq!(mul_div_signed(-10, 1, 3).unwrap(), -3);
    }

    #[test]
    fn test_scale_amount() {
        // 6-decimal asset amount to 18-decimal accounting precision
        assert_eq!(scale_amount(1_500_000, 6, 18).unwrap(), 1_500_000_000_000_000_000);
        // back down, truncating
        assert_eq!(scale_amount(1_500_000_000_000_000_999, 18, 6).unwrap(), 1_500_000);
        assert_eq!(scale_amount(42, 8, 8).unwrap(), 42);
    }

    #[test]
    fn test_display_round_trip() {
        let internal = 1_234_500_000_000_000_000u128; // 1.2345
        let display = to_display(internal, ACCOUNTING_DECIMALS).unwrap();
        assert_eq!(display.to_string(), "1.2345");
        assert_eq!(from_display(display, ACCOUNTING_DECIMALS).unwrap(), internal);
    }

    #[test]
    fn test_from_display_precision_limit() {
        let amount: Decimal = "1.2345".parse().unwrap();
        let result = from_display(amount, 3);
        assert!(matches!(result, Err(FundError::InvalidAmount(_))));
    }
}
