//! Text scanning for rate and threshold strings.
//!
//! Contracts carry rates as free text ("8% of Net Sales") and tier bounds in
//! currency notation ("$0-$2,000,000", "$5,000,000+"). Everything that reads
//! numbers out of such text lives here.

use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while reading rate text.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    /// No number directly followed by '%' in the text.
    #[error("no percentage found in {0:?}")]
    NoPercentage(String),
    /// A threshold amount that is malformed or too large to represent.
    #[error("amount in {0:?} is out of range")]
    AmountOutOfRange(String),
}

/// Parse the first "<number>%" token in `text` into a fraction.
///
/// Example:
/// assert_eq!(parse_percentage("8% of Net Sales").unwrap(), Decimal::new(8, 2));
pub fn parse_percentage(text: &str) -> Result<Decimal, ParseError> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if !is_number_byte(bytes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && is_number_byte(bytes[i]) {
            i += 1;
        }
        if bytes.get(i) == Some(&b'%') {
            // start..i only spans ASCII bytes, so the slice is on char boundaries
            if let Some(value) = parse_number(&text[start..i]) {
                return Ok(value / Decimal::ONE_HUNDRED);
            }
        }
    }
    Err(ParseError::NoPercentage(text.to_string()))
}

/// Lower bound of a tier threshold; zero when the text has no number.
pub fn parse_threshold_lower_bound(text: &str) -> Result<Decimal, ParseError> {
    Ok(first_amount(&clean_threshold(text), text)?.unwrap_or(Decimal::ZERO))
}

/// Upper bound of a tier threshold, `None` for open-ended tiers.
///
/// Only a "-" separator makes a tier bounded: "$0-$2,000,000" ends at
/// 2,000,000 while "$5,000,000+" and "Over $5M" have no upper bound.
pub fn parse_threshold_upper_bound(text: &str) -> Result<Option<Decimal>, ParseError> {
    let cleaned = clean_threshold(text);
    match cleaned.split_once('-') {
        Some((_, rest)) => first_amount(rest, text),
        None => Ok(None),
    }
}

fn is_number_byte(b: u8) -> bool {
    b.is_ascii_digit() || b == b'.'
}

fn parse_number(token: &str) -> Option<Decimal> {
    let token = token.trim_end_matches('.');
    if !token.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    if token.starts_with('.') {
        Decimal::from_str(&format!("0{token}")).ok()
    } else {
        Decimal::from_str(token).ok()
    }
}

fn clean_threshold(text: &str) -> String {
    text.chars()
        .filter(|c| !(c.is_whitespace() || matches!(c, '$' | '€' | '£' | '¥' | ',')))
        .collect()
}

/// First numeric run in already-cleaned text, scaled by a K/M/B suffix.
fn first_amount(cleaned: &str, text: &str) -> Result<Option<Decimal>, ParseError> {
    let bytes = cleaned.as_bytes();
    let Some(start) = bytes.iter().position(|b| b.is_ascii_digit()) else {
        return Ok(None);
    };
    let len = bytes[start..]
        .iter()
        .take_while(|b| is_number_byte(**b))
        .count();
    let end = start + len;
    let out_of_range = || ParseError::AmountOutOfRange(text.to_string());
    // a digit run that fails to parse is malformed ("1.2.3") or too long
    let value = parse_number(&cleaned[start..end]).ok_or_else(out_of_range)?;
    value
        .checked_mul(magnitude(&cleaned[end..]))
        .map(Some)
        .ok_or_else(out_of_range)
}

fn magnitude(suffix: &str) -> Decimal {
    const WORDS: [(&str, i64); 3] = [
        ("thousand", 1_000),
        ("million", 1_000_000),
        ("billion", 1_000_000_000),
    ];
    let lower = suffix.to_ascii_lowercase();
    for (word, scale) in WORDS {
        if lower.starts_with(word) {
            return Decimal::from(scale);
        }
    }
    let mut chars = lower.chars();
    let scale: i64 = match chars.next() {
        Some('k') => 1_000,
        Some('m') => 1_000_000,
        Some('b') => 1_000_000_000,
        _ => return Decimal::ONE,
    };
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => Decimal::ONE,
        _ => Decimal::from(scale),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn percentage_in_free_text() {
        assert_eq!(parse_percentage("8% of Net Sales").unwrap(), dec!(0.08));
        assert_eq!(parse_percentage("7.5%").unwrap(), dec!(0.075));
        assert_eq!(parse_percentage("Tier 2: 12.25% thereafter").unwrap(), dec!(0.1225));
        assert_eq!(parse_percentage("rate of .5%").unwrap(), dec!(0.005));
        assert_eq!(parse_percentage("0%").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn percentage_requires_percent_sign() {
        assert_eq!(
            parse_percentage("net sales only"),
            Err(ParseError::NoPercentage("net sales only".to_string()))
        );
        assert!(parse_percentage("8 percent").is_err());
        assert!(parse_percentage("8 %").is_err());
        assert!(parse_percentage("").is_err());
        assert!(parse_percentage("%").is_err());
    }

    #[test]
    fn percentage_skips_numbers_without_sign() {
        assert_eq!(
            parse_percentage("first 1,000 units at 6% then").unwrap(),
            dec!(0.06)
        );
        assert_eq!(parse_percentage("€5 fee, 3% royalty").unwrap(), dec!(0.03));
    }

    #[test]
    fn threshold_bounds() {
        assert_eq!(parse_threshold_lower_bound("$0-$2,000,000").unwrap(), dec!(0));
        assert_eq!(parse_threshold_upper_bound("$0-$2,000,000").unwrap(), Some(dec!(2000000)));
        assert_eq!(parse_threshold_lower_bound("$2,000,000 - $5,000,000").unwrap(), dec!(2000000));
        assert_eq!(parse_threshold_upper_bound("$2,000,000 - $5,000,000").unwrap(), Some(dec!(5000000)));
        assert_eq!(parse_threshold_lower_bound("$5,000,000+").unwrap(), dec!(5000000));
        assert_eq!(parse_threshold_upper_bound("$5,000,000+").unwrap(), None);
    }

    #[test]
    fn threshold_without_numbers_is_zero_floor() {
        assert_eq!(parse_threshold_lower_bound("all remaining sales").unwrap(), Decimal::ZERO);
        assert_eq!(parse_threshold_upper_bound("all remaining sales").unwrap(), None);
        assert_eq!(parse_threshold_upper_bound("$1,000,000-").unwrap(), None);
    }

    #[test]
    fn threshold_magnitude_suffixes() {
        assert_eq!(parse_threshold_lower_bound("$1M-$5M").unwrap(), dec!(1000000));
        assert_eq!(parse_threshold_upper_bound("$1M-$5M").unwrap(), Some(dec!(5000000)));
        assert_eq!(parse_threshold_lower_bound("$250K+").unwrap(), dec!(250000));
        assert_eq!(parse_threshold_lower_bound("1.5 million and above").unwrap(), dec!(1500000));
        assert_eq!(parse_threshold_lower_bound("$2B+").unwrap(), dec!(2000000000));
        assert_eq!(parse_threshold_lower_bound("500 more").unwrap(), dec!(500));
    }

    #[test]
    fn oversized_thresholds_are_errors() {
        let scaled = "$79,228,162,514,264,337,593,543,950,335B+";
        assert_eq!(
            parse_threshold_lower_bound(scaled),
            Err(ParseError::AmountOutOfRange(scaled.to_string()))
        );
        let digits = "$0-$999,999,999,999,999,999,999,999,999,999";
        assert_eq!(parse_threshold_lower_bound(digits).unwrap(), Decimal::ZERO);
        assert_eq!(
            parse_threshold_upper_bound(digits),
            Err(ParseError::AmountOutOfRange(digits.to_string()))
        );
        assert_eq!(
            parse_threshold_lower_bound("$79,228,162,514,264,337,593,543,950,335+").unwrap(),
            Decimal::MAX
        );
    }

    proptest! {
        #[test]
        fn whole_percentages_divide_by_hundred(n in 0u32..10_000) {
            let text = format!("{n}% of Net Sales");
            prop_assert_eq!(parse_percentage(&text).unwrap(), Decimal::from(n) / Decimal::ONE_HUNDRED);
        }

        #[test]
        fn formatted_thresholds_read_back(dollars in 0u64..10_000_000_000) {
            let grouped = group_thousands(dollars);
            let text = format!("${grouped}-${grouped}");
            prop_assert_eq!(parse_threshold_lower_bound(&text).unwrap(), Decimal::from(dollars));
            prop_assert_eq!(parse_threshold_upper_bound(&text).unwrap(), Some(Decimal::from(dollars)));
        }
    }

    fn group_thousands(n: u64) -> String {
        let digits = n.to_string();
        let mut out = String::new();
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(c);
        }
        out
    }
}
