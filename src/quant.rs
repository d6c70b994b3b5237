// Fixed-point amount conversion
// This file converts between human-readable decimal amounts and integer token units
// using each asset's own precision
//
// Numan Thabit 2025 Nov

use alloy_primitives::U256;
use anyhow::{anyhow, ensure, Context, Result};

/// Precision assumed when an asset's decimals cannot be read.
pub const DEFAULT_DECIMALS: u8 = 18;

fn scale(decimals: u8) -> U256 {
    U256::from(10u64).pow(U256::from(decimals))
}

/// Parse a decimal string such as `"0.05"` into integer units of an asset with `decimals`.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    ensure!(!amount.is_empty(), "amount must not be empty");

    let (whole, frac) = amount.split_once('.').unwrap_or((amount, ""));
    ensure!(
        !(whole.is_empty() && frac.is_empty()),
        "amount {amount} has no digits"
    );
    ensure!(
        whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()),
        "amount {amount} is not a non-negative decimal number"
    );
    ensure!(
        frac.len() <= decimals as usize,
        "amount {amount} has more than {decimals} fractional digits"
    );

    let whole = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10).map_err(|e| anyhow!("parse {whole}: {e}"))?
    };
    let frac = if decimals == 0 {
        U256::ZERO
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        U256::from_str_radix(&padded, 10).map_err(|e| anyhow!("parse {padded}: {e}"))?
    };

    whole
        .checked_mul(scale(decimals))
        .and_then(|w| w.checked_add(frac))
        .with_context(|| format!("amount {amount} overflows 256 bits"))
}

/// Render integer units as a decimal string, trimming trailing fractional zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let scale = scale(decimals);
    let whole = value / scale;
    let frac = value % scale;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// `part` as basis points of `whole`, saturating at zero when `whole` is zero.
pub fn share_bps(part: U256, whole: U256) -> u64 {
    if whole.is_zero() {
        return 0;
    }
    let bps = part.saturating_mul(U256::from(10_000u64)) / whole;
    bps.try_into().unwrap_or(u64::MAX)
}
