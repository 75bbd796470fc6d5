//! Parser for the relative TTLs carried by decisions.
//!
//! LAPI serializes durations the way Go's `time.Duration` prints them:
//! `1h`, `4h0m0s`, `3h59m58.654321s`, `-1.5s`. Each component is a decimal
//! number (with optional fraction) followed by a unit.

use crate::error::DecisionError;
use std::time::Duration;

/// Maximum fractional digits kept per component. Anything past nanosecond
/// precision for the smallest unit is truncated.
const MAX_FRACTION_DIGITS: usize = 18;

/// Parse a decision TTL.
///
/// Returns `AlreadyExpired` for zero or negative durations, which LAPI sends
/// for decisions whose lifetime ended before delivery.
pub fn parse_ttl(input: &str) -> Result<Duration, DecisionError> {
    let invalid = || DecisionError::InvalidDuration(input.to_string());

    let s = input.trim();
    let (negative, mut rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    if rest.is_empty() {
        return Err(invalid());
    }
    // Go prints a zero duration as a bare "0".
    if rest == "0" {
        return Err(DecisionError::AlreadyExpired(input.to_string()));
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(number_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let scale = unit_nanos(unit).ok_or_else(invalid)?;
        let component = scaled_nanos(number, scale).ok_or_else(invalid)?;
        total_nanos = total_nanos.checked_add(component).ok_or_else(invalid)?;
        rest = tail;
    }

    if negative || total_nanos == 0 {
        return Err(DecisionError::AlreadyExpired(input.to_string()));
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| invalid())?;
    let nanos = (total_nanos % 1_000_000_000) as u32;
    Ok(Duration::new(secs, nanos))
}

/// Nanoseconds per unit, or `None` for an unknown or missing unit.
fn unit_nanos(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(1_000_000_000),
        "m" => Some(60 * 1_000_000_000),
        "h" => Some(3_600 * 1_000_000_000),
        _ => None,
    }
}

/// Convert `"12.5"` in a unit of `scale` nanoseconds to whole nanoseconds.
fn scaled_nanos(number: &str, scale: u128) -> Option<u128> {
    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let whole_value: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole_value.checked_mul(scale)?;

    if !fraction.is_empty() {
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let digits = &fraction[..fraction.len().min(MAX_FRACTION_DIGITS)];
        let fraction_value: u128 = digits.parse().ok()?;
        let divisor = 10u128.pow(digits.len() as u32);
        nanos = nanos.checked_add(fraction_value.checked_mul(scale)? / divisor)?;
    }

    Some(nanos)
}
