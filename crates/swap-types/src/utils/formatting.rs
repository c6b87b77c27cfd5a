//! String formatting utilities.
//!
//! Hex prefix handling for addresses, hashes and signatures, base-unit amount
//! formatting, and truncation of long identifiers in log fields.

/// Shortens a hash or address for log output.
///
/// Keeps the first 10 characters (`0x` plus 8 hex digits) followed by "..".
pub fn truncate_id(id: &str) -> String {
	match id.get(..10) {
		Some(head) if id.len() > 10 => format!("{}..", head),
		_ => id.to_string(),
	}
}

/// Adds "0x" prefix to a hex string if it doesn't already have one.
pub fn with_0x_prefix(hex_str: &str) -> String {
	if hex_str.starts_with("0x") || hex_str.starts_with("0X") {
		hex_str.to_string()
	} else {
		format!("0x{}", hex_str)
	}
}

/// Removes "0x" prefix from a hex string if present.
pub fn without_0x_prefix(hex_str: &str) -> &str {
	hex_str
		.strip_prefix("0x")
		.or_else(|| hex_str.strip_prefix("0X"))
		.unwrap_or(hex_str)
}

/// Formats an amount given in the token's smallest unit for display.
///
/// `"1500000"` with 6 decimals becomes `"1.5"`. Trailing fractional zeros are
/// dropped and a whole amount is printed without a decimal point. Leading
/// zeros in the input are ignored.
pub fn format_token_amount(amount: &str, decimals: u8) -> String {
	let amount = match amount.trim_start_matches('0') {
		"" => "0",
		stripped => stripped,
	};

	if decimals == 0 {
		return amount.to_string();
	}

	let decimal_places = decimals as usize;

	let (integer_part, decimal_part) = if amount.len() <= decimal_places {
		let decimal_str = format!("{:0>width$}", amount, width = decimal_places);
		("0".to_string(), decimal_str)
	} else {
		let split_pos = amount.len() - decimal_places;
		(
			amount[..split_pos].to_string(),
			amount[split_pos..].to_string(),
		)
	};

	let decimal_trimmed = decimal_part.trim_end_matches('0');

	if decimal_trimmed.is_empty() {
		integer_part
	} else {
		format!("{}.{}", integer_part, decimal_trimmed)
	}
}
