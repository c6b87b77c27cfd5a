//! Permit signature embedding.
//!
//! The settlement contract reads a Permit2 signature from the tail of the swap
//! calldata: `calldata ‖ uint256(65) ‖ r ‖ s ‖ v`.

use alloy_primitives::{hex, Bytes, U256};
use swap_types::{without_0x_prefix, SignatureBytes, SignatureError, SIGNATURE_LENGTH};
use thiserror::Error;

/// Length of the trailer appended to the calldata: length word plus signature.
pub const EMBEDDED_SIGNATURE_TRAILER: usize = 32 + SIGNATURE_LENGTH;

/// Errors raised while embedding or extracting a signature.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalldataError {
	#[error("Invalid signature length: expected 65 bytes, got {0}")]
	InvalidSignatureLength(usize),
	#[error("Invalid hex: {0}")]
	InvalidHex(String),
	#[error("Calldata carries no embedded signature")]
	MissingSignature,
}

impl From<SignatureError> for CalldataError {
	fn from(err: SignatureError) -> Self {
		match err {
			SignatureError::InvalidLength(len) => CalldataError::InvalidSignatureLength(len),
			SignatureError::InvalidHex(message) => CalldataError::InvalidHex(message),
		}
	}
}

fn signature_length_word() -> [u8; 32] {
	U256::from(SIGNATURE_LENGTH).to_be_bytes::<32>()
}

/// Appends the length word and `signature` to `calldata`.
///
/// Fails with `InvalidSignatureLength` unless the signature is exactly 65 bytes.
pub fn embed_signature(calldata: &[u8], signature: &[u8]) -> Result<Bytes, CalldataError> {
	let signature = SignatureBytes::try_from(signature)?;

	let mut data = Vec::with_capacity(calldata.len() + EMBEDDED_SIGNATURE_TRAILER);
	data.extend_from_slice(calldata);
	data.extend_from_slice(&signature_length_word());
	data.extend_from_slice(signature.as_bytes());
	Ok(data.into())
}

/// Hex form of [`embed_signature`]. Both inputs may carry a `0x` prefix.
pub fn embed_signature_hex(calldata: &str, signature: &str) -> Result<Bytes, CalldataError> {
	let calldata = hex::decode(without_0x_prefix(calldata.trim()))
		.map_err(|e| CalldataError::InvalidHex(e.to_string()))?;
	let signature = hex::decode(without_0x_prefix(signature.trim()))
		.map_err(|e| CalldataError::InvalidHex(e.to_string()))?;
	embed_signature(&calldata, &signature)
}

/// Splits calldata produced by [`embed_signature`] into the original calldata
/// and the signature.
pub fn decode_embedded_signature(data: &[u8]) -> Result<(Bytes, SignatureBytes), CalldataError> {
	let Some(split) = data.len().checked_sub(EMBEDDED_SIGNATURE_TRAILER) else {
		return Err(CalldataError::MissingSignature);
	};

	let (original, trailer) = data.split_at(split);
	let (length_word, signature) = trailer.split_at(32);
	if length_word != signature_length_word() {
		return Err(CalldataError::MissingSignature);
	}

	Ok((
		Bytes::copy_from_slice(original),
		SignatureBytes::try_from(signature)?,
	))
}
