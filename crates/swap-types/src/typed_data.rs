//! EIP-712 typed-data payloads and the signatures produced over them.
//!
//! Payloads arrive from the quote provider as JSON in the `eth_signTypedData_v4`
//! shape. They are kept close to that wire shape here; the signer reduces the
//! type graph and hashes them.

use crate::utils::{deserialize_optional_chain_id, with_0x_prefix, without_0x_prefix};
use alloy_primitives::{hex, Address, B256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of the reserved domain type. It is never part of a signed type set.
pub const EIP712_DOMAIN_TYPE: &str = "EIP712Domain";

/// Length of an ECDSA signature in `r || s || v` form.
pub const SIGNATURE_LENGTH: usize = 65;

/// A single member of an EIP-712 struct type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeField {
	pub name: String,
	#[serde(rename = "type")]
	pub field_type: String,
}

impl TypeField {
	pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			field_type: field_type.into(),
		}
	}
}

/// Type definitions keyed by type name.
///
/// A `BTreeMap` keeps iteration order independent of insertion order.
pub type Eip712Types = BTreeMap<String, Vec<TypeField>>;

/// The `domain` object of a typed-data payload.
///
/// Every member is optional, as in EIP-712; the domain separator is derived
/// from whichever members are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataDomain {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub version: Option<String>,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_optional_chain_id"
	)]
	pub chain_id: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub verifying_contract: Option<Address>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub salt: Option<B256>,
}

/// An EIP-712 typed-data payload: `{ domain, types, primaryType, message }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedDataPayload {
	#[serde(default)]
	pub domain: TypedDataDomain,
	pub types: Eip712Types,
	pub primary_type: String,
	#[serde(default)]
	pub message: serde_json::Value,
}

/// Upstream wrapper around a typed-data payload.
///
/// Used for the `permit2` object of a direct quote and for the `approval` and
/// `trade` objects of a gasless quote. `eip712` is optional on the wire so that
/// its absence can be reported as a malformed payload instead of a parse error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Eip712Envelope {
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hash: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub eip712: Option<TypedDataPayload>,
}

/// Errors raised when constructing a [`SignatureBytes`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
	#[error("Invalid signature length: expected 65 bytes, got {0}")]
	InvalidLength(usize),
	#[error("Invalid signature hex: {0}")]
	InvalidHex(String),
}

/// A 65-byte ECDSA signature (`r:32 || s:32 || v:1`).
///
/// The only constructors check the length, so a value of this type is always
/// exactly 65 bytes long.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignatureBytes([u8; SIGNATURE_LENGTH]);

impl SignatureBytes {
	pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
		&self.0
	}

	pub fn r(&self) -> B256 {
		B256::from_slice(&self.0[..32])
	}

	pub fn s(&self) -> B256 {
		B256::from_slice(&self.0[32..64])
	}

	pub fn v(&self) -> u8 {
		self.0[64]
	}

	/// Lowercase hex with a `0x` prefix.
	pub fn to_hex(&self) -> String {
		with_0x_prefix(&hex::encode(self.0))
	}
}

impl TryFrom<&[u8]> for SignatureBytes {
	type Error = SignatureError;

	fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
		let array: [u8; SIGNATURE_LENGTH] = bytes
			.try_into()
			.map_err(|_| SignatureError::InvalidLength(bytes.len()))?;
		Ok(Self(array))
	}
}

impl TryFrom<Vec<u8>> for SignatureBytes {
	type Error = SignatureError;

	fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
		Self::try_from(bytes.as_slice())
	}
}

impl FromStr for SignatureBytes {
	type Err = SignatureError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let bytes = hex::decode(without_0x_prefix(s.trim()))
			.map_err(|e| SignatureError::InvalidHex(e.to_string()))?;
		Self::try_from(bytes)
	}
}

impl AsRef<[u8]> for SignatureBytes {
	fn as_ref(&self) -> &[u8] {
		&self.0
	}
}

impl fmt::Debug for SignatureBytes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SignatureBytes({})", self.to_hex())
	}
}

impl fmt::Display for SignatureBytes {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl Serialize for SignatureBytes {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.to_hex())
	}
}

impl<'de> Deserialize<'de> for SignatureBytes {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}

/// A typed-data payload together with the signature produced over it.
///
/// `kind` and `hash` are copied from the envelope the payload arrived in so that
/// the relayer receives the same shape it issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedPayload {
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub hash: Option<String>,
	pub eip712: TypedDataPayload,
	pub signature: SignatureBytes,
}
