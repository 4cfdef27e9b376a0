//! Fixed-point token amounts.
//!
//! Amounts are integers scaled by `10^decimals`. These helpers convert
//! between that representation and decimal text.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

/// `10^decimals`, the integer value of one whole token.
pub fn unit_value(decimals: u8) -> BigInt {
    BigInt::from(10u8).pow(u32::from(decimals))
}

/// Parses decimal text such as `"0.1"` or `"-12.5"` into a scaled amount.
///
/// Returns `None` for malformed text or more fractional digits than
/// `decimals` allows.
pub fn parse_decimal(text: &str, decimals: u8) -> Option<BigInt> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if fraction.len() > decimals as usize {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return None;
    }

    let mut scaled = String::with_capacity(whole.len() + decimals as usize);
    scaled.push_str(if whole.is_empty() { "0" } else { whole });
    scaled.push_str(fraction);
    scaled.extend(std::iter::repeat('0').take(decimals as usize - fraction.len()));
    let value: BigInt = scaled.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Formats a scaled amount as decimal text with trailing zeros trimmed.
pub fn format_decimal(amount: &BigInt, decimals: u8) -> String {
    let unit = unit_value(decimals);
    let magnitude = amount.abs();
    let whole = &magnitude / &unit;
    let fraction = &magnitude % &unit;
    let sign = if amount.is_negative() { "-" } else { "" };
    if fraction.is_zero() {
        return format!("{sign}{whole}");
    }
    let padded = format!("{:0>width$}", fraction.to_string(), width = decimals as usize);
    format!("{sign}{whole}.{}", padded.trim_end_matches('0'))
}

/// Rescales an amount between two decimal precisions, truncating.
pub fn convert_decimals(amount: &BigInt, from: u8, to: u8) -> BigInt {
    if from == to {
        amount.clone()
    } else if from < to {
        amount * unit_value(to - from)
    } else {
        amount / unit_value(from - to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_value_is_power_of_ten() {
        assert_eq!(unit_value(0), BigInt::from(1));
        assert_eq!(unit_value(8), BigInt::from(100_000_000u64));
    }

    #[test]
    fn parse_decimal_scales_fraction() {
        assert_eq!(parse_decimal("0.1", 10), Some(BigInt::from(1_000_000_000u64)));
        assert_eq!(parse_decimal("2", 2), Some(BigInt::from(200)));
        assert_eq!(parse_decimal(".5", 1), Some(BigInt::from(5)));
        assert_eq!(parse_decimal("-1.25", 2), Some(BigInt::from(-125)));
    }

    #[test]
    fn parse_decimal_rejects_bad_input() {
        assert_eq!(parse_decimal("0.123", 2), None);
        assert_eq!(parse_decimal("1a", 2), None);
        assert_eq!(parse_decimal(".", 2), None);
    }

    #[test]
    fn format_decimal_trims_trailing_zeros() {
        assert_eq!(format_decimal(&BigInt::from(150_000_000u64), 8), "1.5");
        assert_eq!(format_decimal(&BigInt::from(5), 8), "0.00000005");
        assert_eq!(format_decimal(&BigInt::from(300), 2), "3");
        assert_eq!(format_decimal(&BigInt::from(-125), 2), "-1.25");
    }

    #[test]
    fn convert_decimals_truncates_down() {
        assert_eq!(convert_decimals(&BigInt::from(123_456), 4, 2), BigInt::from(1_234));
        assert_eq!(convert_decimals(&BigInt::from(12), 2, 4), BigInt::from(1_200));
    }
}
