//! Fixed-point money. All amounts in the pipeline are i64 cents so that
//! tolerance comparisons are exact and two fractional digits hold by
//! construction.

use serde::{Deserialize, Serialize};

pub type Cents = i64;

/// Maximum digits (integer + fractional) accepted without a penalty.
const MAX_DIGITS: usize = 15;

/// A parsed statement amount. `penalty` marks values that violated the
/// formatting contract (wrong decimal count, too many digits) but were kept
/// anyway; the confidence aggregator charges for it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAmount {
    pub cents: Cents,
    pub negative: bool,
    pub parenthesized: bool,
    pub penalty: bool,
}

/// Parses an amount as it appears in a financial statement:
/// thousands separators, optional leading `$`, negatives as a minus prefix
/// or parentheses. Returns `None` only when the token is not numeric at all;
/// a numeric value outside the contract (not exactly 2 decimals, more than
/// 15 digits) is retained with `penalty = true`.
pub fn parse_amount(raw: &str) -> Option<ParsedAmount> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parenthesized = trimmed.starts_with('(') && trimmed.ends_with(')');
    let inner = if parenthesized {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    let inner = inner.trim().trim_start_matches('$').trim();
    let minus = inner.starts_with('-');
    let inner = inner.trim_start_matches('-').trim();

    let cleaned: String = inner.chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match cleaned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (cleaned.as_str(), ""),
    };

    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
        || (int_part.is_empty() && frac_part.is_empty())
    {
        return None;
    }

    let digit_count = int_part.len() + frac_part.len();
    let mut penalty = frac_part.len() != 2 || digit_count > MAX_DIGITS;

    let int_value: i64 = if int_part.is_empty() {
        0
    } else {
        match int_part.parse() {
            Ok(v) => v,
            Err(_) => {
                // Past i64 range; clamp and penalize rather than drop.
                penalty = true;
                i64::MAX / 100
            }
        }
    };

    let frac_cents = match frac_part.len() {
        0 => 0,
        1 => frac_part.parse::<i64>().unwrap_or(0) * 10,
        2 => frac_part.parse::<i64>().unwrap_or(0),
        _ => {
            // Round extra precision away to the nearest cent.
            let head: i64 = frac_part[..2].parse().unwrap_or(0);
            let next = frac_part.as_bytes()[2] - b'0';
            if next >= 5 {
                head + 1
            } else {
                head
            }
        }
    };

    let magnitude = int_value.saturating_mul(100).saturating_add(frac_cents);
    let negative = parenthesized || minus;
    let cents = if negative { -magnitude } else { magnitude };

    Some(ParsedAmount {
        cents,
        negative,
        parenthesized,
        penalty,
    })
}

/// Formats cents as `1,234.56` / `-1,234.56` for messages and reports.
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let whole = abs / 100;
    let frac = abs % 100;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}.{:02}", sign, grouped, frac)
}

pub fn to_dollars(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_standard_amount() {
        let amount = parse_amount("210,365.06").unwrap();
        assert_eq!(amount.cents, 21_036_506);
        assert!(!amount.negative);
        assert!(!amount.penalty);
    }

    #[test]
    fn test_parse_parenthesized_negative() {
        let amount = parse_amount("(1,250.00)").unwrap();
        assert_eq!(amount.cents, -125_000);
        assert!(amount.negative);
        assert!(amount.parenthesized);
        assert!(!amount.penalty);
    }

    #[test]
    fn test_parse_minus_prefixed() {
        let amount = parse_amount("-482.19").unwrap();
        assert_eq!(amount.cents, -48_219);
        assert!(amount.negative);
        assert!(!amount.parenthesized);
    }

    #[test]
    fn test_parse_dollar_sign() {
        let amount = parse_amount("$5,000,100.00").unwrap();
        assert_eq!(amount.cents, 500_010_000);
        assert!(!amount.penalty);
    }

    #[test]
    fn test_wrong_decimal_count_penalized_not_dropped() {
        let amount = parse_amount("1234.5").unwrap();
        assert_eq!(amount.cents, 123_450);
        assert!(amount.penalty);

        let amount = parse_amount("1234").unwrap();
        assert_eq!(amount.cents, 123_400);
        assert!(amount.penalty);

        let amount = parse_amount("10.999").unwrap();
        assert_eq!(amount.cents, 1_100);
        assert!(amount.penalty);
    }

    #[test]
    fn test_too_many_digits_penalized() {
        let amount = parse_amount("1234567890123456.00").unwrap();
        assert!(amount.penalty);
    }

    #[test]
    fn test_non_numeric_rejected() {
        assert!(parse_amount("Assets").is_none());
        assert!(parse_amount("").is_none());
        assert!(parse_amount("--").is_none());
        assert!(parse_amount("12a.00").is_none());
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(21_036_506), "210,365.06");
        assert_eq!(format_cents(-125_000), "-1,250.00");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(0), "0.00");
        assert_eq!(format_cents(2_388_995_333), "23,889,953.33");
    }
}
