//! 18-decimal fixed-point token amounts.
//!
//! Token amounts travel as integer wei (`U256`). Users type decimal strings
//! such as `"1.5"`; dashboards print the trimmed decimal form.

use alloy_primitives::U256;
use thiserror::Error;

/// Number of fractional digits in an FLX amount.
pub const DECIMALS: usize = 18;

/// 10^18, the number of wei in one whole token.
pub const WEI_PER_TOKEN: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount `{0}` is not a decimal number")]
    NotNumeric(String),
    #[error("amount `{0}` has more than 18 fractional digits")]
    TooPrecise(String),
    #[error("amount `{0}` does not fit in 256 bits")]
    Overflow(String),
}

/// Parse a user-typed decimal amount into wei.
///
/// Accepts `"1"`, `"1.5"`, `".5"` and `"1."`. Signs, exponents, separators
/// and more than 18 fractional digits are rejected.
pub fn parse_ether(input: &str) -> Result<U256, AmountError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(AmountError::Empty);
    }
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    let numeric = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !numeric(whole) || !numeric(frac) {
        return Err(AmountError::NotNumeric(input.to_string()));
    }
    if frac.len() > DECIMALS {
        return Err(AmountError::TooPrecise(input.to_string()));
    }

    let overflow = || AmountError::Overflow(input.to_string());
    let whole_wei = if whole.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(whole, 10)
            .map_err(|_| overflow())?
            .checked_mul(WEI_PER_TOKEN)
            .ok_or_else(overflow)?
    };
    let frac_wei = if frac.is_empty() {
        U256::ZERO
    } else {
        let padded = format!("{frac:0<width$}", width = DECIMALS);
        U256::from_str_radix(&padded, 10).map_err(|_| overflow())?
    };
    whole_wei.checked_add(frac_wei).ok_or_else(overflow)
}

/// Parse an amount that must be strictly positive. Zero yields `None`.
pub fn parse_positive(input: &str) -> Option<U256> {
    parse_ether(input).ok().filter(|wei| !wei.is_zero())
}

/// Render wei as a decimal token string with trailing zeros trimmed.
pub fn format_ether(wei: U256) -> String {
    let whole = wei / WEI_PER_TOKEN;
    let frac = wei % WEI_PER_TOKEN;
    if frac.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = DECIMALS);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}
