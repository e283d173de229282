//! Free-text numeric input handling and token unit conversion.

use alloy::primitives::{
    utils::{self, ParseUnits},
    U256,
};
use thiserror::Error;

/// Error message shown for any unparsable amount.
pub const INVALID_NUMBER: &str = "Invalid number";

/// Longest accepted input. Anything longer is cut off before it reaches
/// big-number parsing.
pub const MAX_INPUT_LENGTH: usize = 40;

/// Most fractional digits kept while typing.
pub const MAX_DECIMALS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid number")]
pub struct InvalidNumber;

/// Normalize a free-text numeric field.
///
/// Leading zeros are stripped (`"007"` -> `"7"`, `"00.5"` -> `"0.5"`), a bare
/// leading dot becomes `"0."`, a trailing dot is kept so the user can keep
/// typing, and over-long input is cut down to [`MAX_DECIMALS`] fractional
/// digits and [`MAX_INPUT_LENGTH`] characters. Anything other than digits and
/// a single dot is rejected.
pub fn sanitize_numeric_input(input: &str) -> Result<String, InvalidNumber> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(String::new());
    }

    let (whole, fraction) = match input.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (input, None),
    };

    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(whole) || !fraction.map_or(true, is_digits) {
        return Err(InvalidNumber);
    }

    let whole = whole.trim_start_matches('0');
    let whole = if whole.is_empty() { "0" } else { whole };

    let mut output = whole.to_owned();
    if let Some(fraction) = fraction {
        output.push('.');
        output.push_str(&fraction[..fraction.len().min(MAX_DECIMALS)]);
    }
    output.truncate(MAX_INPUT_LENGTH);

    Ok(output)
}

/// Parse a decimal string into base units, e.g. `"1.5"` with 18 decimals.
pub fn parse_units(text: &str, decimals: u8) -> Result<U256, InvalidNumber> {
    let text = sanitize_numeric_input(text)?;
    let text = text.trim_end_matches('.');
    if text.is_empty() {
        return Err(InvalidNumber);
    }

    // More fractional digits than the token has would be silently truncated.
    if text
        .split_once('.')
        .is_some_and(|(_, fraction)| fraction.len() > decimals as usize)
    {
        return Err(InvalidNumber);
    }

    utils::parse_units(text, decimals)
        .map(ParseUnits::get_absolute)
        .map_err(|_| InvalidNumber)
}

/// Format base units as a decimal string without trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> Result<String, InvalidNumber> {
    let formatted = utils::format_units(value, decimals).map_err(|_| InvalidNumber)?;

    if !formatted.contains('.') {
        return Ok(formatted);
    }
    Ok(formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_owned())
}

/// Lossy conversion of base units into a float, for display-only math.
pub fn to_f64(value: U256, decimals: u8) -> f64 {
    f64::from(value) / 10f64.powi(decimals as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_leading_zeros() {
        assert_eq!(sanitize_numeric_input("007").unwrap(), "7");
        assert_eq!(sanitize_numeric_input("00.5").unwrap(), "0.5");
        assert_eq!(sanitize_numeric_input("000").unwrap(), "0");
        assert_eq!(sanitize_numeric_input("0").unwrap(), "0");
    }

    #[test]
    fn test_sanitize_keeps_trailing_dot() {
        assert_eq!(sanitize_numeric_input("12.").unwrap(), "12.");
        assert_eq!(sanitize_numeric_input(".").unwrap(), "0.");
        assert_eq!(sanitize_numeric_input(".25").unwrap(), "0.25");
    }

    #[test]
    fn test_sanitize_rejects_garbage() {
        assert_eq!(sanitize_numeric_input("12a"), Err(InvalidNumber));
        assert_eq!(sanitize_numeric_input("1.2.3"), Err(InvalidNumber));
        assert_eq!(sanitize_numeric_input("-1"), Err(InvalidNumber));
        assert_eq!(sanitize_numeric_input("1e18"), Err(InvalidNumber));
    }

    #[test]
    fn test_sanitize_caps_length() {
        let long = "9".repeat(100);
        assert_eq!(sanitize_numeric_input(&long).unwrap().len(), MAX_INPUT_LENGTH);

        let decimals = format!("1.{}", "3".repeat(30));
        assert_eq!(
            sanitize_numeric_input(&decimals).unwrap(),
            format!("1.{}", "3".repeat(MAX_DECIMALS))
        );
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let inputs = [
            "", "0", "007", "00.5", ".", "12.", "12.5", "0.000001", " 42 ",
            "1.333333333333333333333333", "000000000000000000000000000000000000000000000001",
        ];
        let long = "12345678901234567890".repeat(5);

        for input in inputs.iter().copied().chain([long.as_str()]) {
            let once = sanitize_numeric_input(input).unwrap();
            let twice = sanitize_numeric_input(&once).unwrap();
            assert_eq!(once, twice, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(
            parse_units("12.5", 18).unwrap(),
            U256::from(12_500_000_000_000_000_000u128)
        );
        assert_eq!(parse_units("1000", 0).unwrap(), U256::from(1000u64));
        assert_eq!(parse_units("0.", 18).unwrap(), U256::ZERO);
        assert_eq!(parse_units("", 18), Err(InvalidNumber));
        assert_eq!(parse_units("abc", 18), Err(InvalidNumber));
        assert_eq!(parse_units("0.001", 2), Err(InvalidNumber));
    }

    #[test]
    fn test_parse_units_accepts_longest_input() {
        let whole = "9".repeat(MAX_INPUT_LENGTH);
        let expected = U256::from_str_radix(&format!("{whole}{}", "0".repeat(18)), 10).unwrap();
        assert_eq!(parse_units(&whole, 18).unwrap(), expected);
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(12_500_000_000_000_000_000u128), 18).unwrap(), "12.5");
        assert_eq!(
            format_units(U256::from(1000u64) * U256::from(10u64).pow(U256::from(18u8)), 18).unwrap(),
            "1000"
        );
        assert_eq!(format_units(U256::from(1u8), 18).unwrap(), "0.000000000000000001");
        assert_eq!(format_units(U256::from(1000u64), 0).unwrap(), "1000");
        assert_eq!(format_units(U256::ZERO, 18).unwrap(), "0");
    }

    #[test]
    fn test_to_f64() {
        assert!((to_f64(U256::from(1_500_000u64), 6) - 1.5).abs() < f64::EPSILON);
        assert!(to_f64(U256::MAX, 0) > 1e77);
    }
}
