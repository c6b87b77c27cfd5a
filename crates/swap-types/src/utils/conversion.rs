//! Conversion utilities for amounts and loosely typed quote fields.
//!
//! Quote providers are inconsistent about whether numeric values arrive as JSON
//! numbers, decimal strings or `0x` hex strings. The helpers here accept all
//! three and normalise them.

use super::formatting::without_0x_prefix;
use alloy_primitives::U256;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors produced while converting amounts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
	/// The value is not a valid unsigned integer.
	#[error("Invalid number '{0}'")]
	InvalidNumber(String),
	/// The formatted amount has more fractional digits than the token supports.
	#[error("Amount '{amount}' has more than {decimals} decimal places")]
	TooManyDecimals { amount: String, decimals: u8 },
	/// The value does not fit into 256 bits.
	#[error("Amount '{0}' overflows uint256")]
	Overflow(String),
}

/// Parses a decimal or `0x`-prefixed hex string into a `U256`.
pub fn parse_u256(value: &str) -> Result<U256, ConversionError> {
	let trimmed = value.trim();
	if trimmed.is_empty() {
		return Err(ConversionError::InvalidNumber(value.to_string()));
	}

	let is_hex = trimmed.len() > 2
		&& trimmed
			.get(..2)
			.is_some_and(|prefix| prefix.eq_ignore_ascii_case("0x"));
	let parsed = if is_hex {
		U256::from_str_radix(without_0x_prefix(trimmed), 16)
	} else {
		U256::from_str_radix(trimmed, 10)
	};

	parsed.map_err(|_| ConversionError::InvalidNumber(value.to_string()))
}

/// Converts a human readable token amount into its smallest unit.
///
/// `"1.5"` with 6 decimals becomes `1500000`. Fractional digits beyond the
/// token's precision are rejected rather than truncated.
pub fn parse_token_amount(amount: &str, decimals: u8) -> Result<U256, ConversionError> {
	let trimmed = amount.trim();
	let (integer_part, fraction_part) = match trimmed.split_once('.') {
		Some((int, frac)) => (int, frac),
		None => (trimmed, ""),
	};

	if integer_part.is_empty() && fraction_part.is_empty() {
		return Err(ConversionError::InvalidNumber(amount.to_string()));
	}
	let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
	if !all_digits(integer_part) || !all_digits(fraction_part) {
		return Err(ConversionError::InvalidNumber(amount.to_string()));
	}

	let fraction_trimmed = fraction_part.trim_end_matches('0');
	if fraction_trimmed.len() > decimals as usize {
		return Err(ConversionError::TooManyDecimals {
			amount: amount.to_string(),
			decimals,
		});
	}

	let digits = format!(
		"{}{:0<width$}",
		integer_part,
		fraction_trimmed,
		width = decimals as usize
	);
	let digits = digits.trim_start_matches('0');
	if digits.is_empty() {
		return Ok(U256::ZERO);
	}

	U256::from_str_radix(digits, 10).map_err(|_| ConversionError::Overflow(amount.to_string()))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
	Number(u64),
	Text(String),
}

/// Deserializes an optional numeric field into its decimal string form.
///
/// Accepts JSON numbers as well as decimal or hex strings. Hex strings are kept
/// as-is and parsed later with [`parse_u256`].
pub fn deserialize_optional_numeric<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<NumberOrString>::deserialize(deserializer)?;
	Ok(value.map(|v| match v {
		NumberOrString::Number(n) => n.to_string(),
		NumberOrString::Text(s) => s,
	}))
}

/// Deserializes an optional chain id given as a number, decimal string or hex string.
pub fn deserialize_optional_chain_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<NumberOrString>::deserialize(deserializer)?;
	match value {
		None => Ok(None),
		Some(NumberOrString::Number(n)) => Ok(Some(n)),
		Some(NumberOrString::Text(s)) => {
			let parsed = parse_u256(&s).map_err(serde::de::Error::custom)?;
			u64::try_from(parsed)
				.map(Some)
				.map_err(|_| serde::de::Error::custom(format!("chain id '{}' out of range", s)))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[test]
	fn test_parse_u256() {
		assert_eq!(parse_u256("1000000").unwrap(), U256::from(1_000_000u64));
		assert_eq!(parse_u256("0x0f4240").unwrap(), U256::from(1_000_000u64));
		assert_eq!(parse_u256(" 42 ").unwrap(), U256::from(42u64));
		assert!(parse_u256("").is_err());
		assert!(parse_u256("12abc").is_err());
		assert!(parse_u256("-1").is_err());
	}

	#[test]
	fn test_parse_token_amount() {
		assert_eq!(
			parse_token_amount("1.5", 6).unwrap(),
			U256::from(1_500_000u64)
		);
		assert_eq!(
			parse_token_amount("1", 18).unwrap(),
			U256::from(1_000_000_000_000_000_000u128)
		);
		assert_eq!(parse_token_amount("0.000001", 6).unwrap(), U256::from(1u64));
		assert_eq!(parse_token_amount("0.0", 6).unwrap(), U256::ZERO);
		assert_eq!(parse_token_amount(".5", 1).unwrap(), U256::from(5u64));
		assert_eq!(parse_token_amount("2.50", 1).unwrap(), U256::from(25u64));
	}

	#[test]
	fn test_parse_token_amount_rejects_bad_input() {
		assert_eq!(
			parse_token_amount("0.0000001", 6),
			Err(ConversionError::TooManyDecimals {
				amount: "0.0000001".to_string(),
				decimals: 6
			})
		);
		assert!(parse_token_amount("abc", 6).is_err());
		assert!(parse_token_amount(".", 6).is_err());
		assert!(parse_token_amount("1.2.3", 6).is_err());
	}

	#[derive(Deserialize)]
	struct Sample {
		#[serde(default, deserialize_with = "deserialize_optional_numeric")]
		amount: Option<String>,
		#[serde(default, deserialize_with = "deserialize_optional_chain_id")]
		chain_id: Option<u64>,
	}

	#[test]
	fn test_loose_numeric_fields() {
		let sample: Sample =
			serde_json::from_str(r#"{"amount": 250000, "chain_id": "0x2105"}"#).unwrap();
		assert_eq!(sample.amount.as_deref(), Some("250000"));
		assert_eq!(sample.chain_id, Some(8453));

		let sample: Sample =
			serde_json::from_str(r#"{"amount": "0x10", "chain_id": "137"}"#).unwrap();
		assert_eq!(sample.amount.as_deref(), Some("0x10"));
		assert_eq!(sample.chain_id, Some(137));

		let sample: Sample = serde_json::from_str(r#"{"amount": null}"#).unwrap();
		assert_eq!(sample.amount, None);
		assert_eq!(sample.chain_id, None);
	}
}
