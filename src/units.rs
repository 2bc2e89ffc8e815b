//! Token unit conversion
//!
//! Raw on-chain integers <-> human decimals, e.g. 1_000_000 USDC raw = 1.0.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use std::str::FromStr;

pub const WETH_DECIMALS: u32 = 18;
pub const USDC_DECIMALS: u32 = 6;

/// Raw amount as a decimal with `decimals` places.
/// Amounts beyond Decimal's 96-bit mantissa come back as None.
pub fn format_units(amount: U256, decimals: u32) -> Option<Decimal> {
    let mut value = Decimal::from_str(&amount.to_string()).ok()?;
    value.set_scale(decimals).ok()?;
    Some(value.normalize())
}

/// Display helper for logs; falls back to the raw integer
pub fn display_units(amount: U256, decimals: u32) -> String {
    match format_units(amount, decimals) {
        Some(value) => value.to_string(),
        None => format!("{} (raw)", amount),
    }
}

/// Decimal amount to raw units. Rejects negatives and sub-unit precision.
pub fn parse_units(value: Decimal, decimals: u32) -> Option<U256> {
    if value.is_sign_negative() {
        return None;
    }
    let scale = Decimal::from(10u64.checked_pow(decimals)?);
    let raw = value.checked_mul(scale)?;
    if !raw.fract().is_zero() {
        return None;
    }
    let raw = raw.trunc();
    U256::from_str(&raw.to_string()).ok()
}
