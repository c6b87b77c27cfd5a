//! Signing account for the swap pipeline.
//!
//! The process holds at most one credential. [`AccountService`] turns EIP-712
//! payloads into 65-byte signatures with it: the payload's type graph is
//! reduced to what the primary type references, hashed, and the hash signed by
//! the [`AccountInterface`] implementation.

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use std::sync::Arc;
use swap_types::{
	truncate_id, Eip712Envelope, SecretString, SignatureBytes, SignatureError, SignedPayload,
	TypedDataPayload,
};
use thiserror::Error;

pub mod eip712;

/// Re-export implementations
pub mod implementations {
	pub mod local;
}

/// Errors that can occur during account operations.
#[derive(Debug, Error)]
pub enum AccountError {
	/// No credential is configured.
	#[error("No private key configured")]
	NoCredential,
	/// The typed-data payload is missing or structurally invalid.
	#[error("Malformed typed data: {0}")]
	MalformedPayload(String),
	/// The signing primitive returned something other than 65 bytes.
	#[error("Invalid signature length: expected 65 bytes, got {0}")]
	InvalidSignatureLength(usize),
	/// Error that occurs when signing operations fail.
	#[error("Signing failed: {0}")]
	SigningFailed(String),
	/// Error that occurs when a cryptographic key is invalid or malformed.
	#[error("Invalid key: {0}")]
	InvalidKey(String),
}

impl From<SignatureError> for AccountError {
	fn from(err: SignatureError) -> Self {
		match err {
			SignatureError::InvalidLength(len) => AccountError::InvalidSignatureLength(len),
			SignatureError::InvalidHex(message) => AccountError::SigningFailed(message),
		}
	}
}

/// Trait defining the interface for signing key implementations.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Retrieves the address associated with this account.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Signs a 32-byte prehash, returning the raw `r || s || v` bytes.
	async fn sign_hash(&self, hash: &B256) -> Result<Vec<u8>, AccountError>;

	/// The key with a 0x prefix, handed to chain connections that sign
	/// transaction envelopes.
	fn private_key(&self) -> SecretString;
}

/// Service that signs typed data with the process credential.
///
/// Cloning is cheap; clones share the credential.
#[derive(Clone)]
pub struct AccountService {
	/// The underlying implementation, absent when no credential is configured.
	implementation: Option<Arc<dyn AccountInterface>>,
}

impl AccountService {
	pub fn new(implementation: Arc<dyn AccountInterface>) -> Self {
		Self {
			implementation: Some(implementation),
		}
	}

	/// A service with no credential. Every signing request fails with
	/// [`AccountError::NoCredential`].
	pub fn without_credential() -> Self {
		Self {
			implementation: None,
		}
	}

	/// Creates the service from an optional hex private key.
	pub fn from_private_key(private_key: Option<&SecretString>) -> Result<Self, AccountError> {
		match private_key.filter(|key| !key.is_blank()) {
			Some(key) => Ok(Self::new(Arc::new(
				implementations::local::LocalAccount::new(key)?,
			))),
			None => Ok(Self::without_credential()),
		}
	}

	pub fn has_credential(&self) -> bool {
		self.implementation.is_some()
	}

	fn credential(&self) -> Result<&Arc<dyn AccountInterface>, AccountError> {
		self.implementation.as_ref().ok_or(AccountError::NoCredential)
	}

	/// Address of the signing account.
	pub async fn address(&self) -> Result<Address, AccountError> {
		self.credential()?.address().await
	}

	/// Returns the private key, used by delivery to sign transaction envelopes.
	pub fn private_key(&self) -> Result<SecretString, AccountError> {
		Ok(self.credential()?.private_key())
	}

	/// Signs a typed-data payload.
	///
	/// The hash covers the payload's domain and the types reachable from
	/// `primaryType`; other type definitions are ignored.
	pub async fn sign_typed_data(
		&self,
		payload: &TypedDataPayload,
	) -> Result<SignatureBytes, AccountError> {
		let account = self.credential()?;

		let types = eip712::minimal_type_closure(&payload.types, &payload.primary_type)?;
		let hash = eip712::signing_hash(payload, &types)?;

		tracing::debug!(
			primary_type = %payload.primary_type,
			chain_id = ?payload.domain.chain_id,
			signing_hash = %truncate_id(&hash.to_string()),
			"Signing typed data"
		);

		let raw = account.sign_hash(&hash).await?;
		Ok(SignatureBytes::try_from(raw)?)
	}

	/// Signs the Permit2 payload of a direct-swap quote.
	pub async fn sign_permit2(
		&self,
		envelope: &Eip712Envelope,
	) -> Result<SignatureBytes, AccountError> {
		self.credential()?;
		let payload = payload_of(envelope, "permit2")?;
		self.sign_typed_data(payload).await
	}

	/// Signs the token approval of a gasless quote.
	pub async fn sign_gasless_approval(
		&self,
		envelope: &Eip712Envelope,
	) -> Result<SignedPayload, AccountError> {
		self.sign_envelope(envelope, "approval").await
	}

	/// Signs the trade of a gasless quote.
	///
	/// The trade's own `primaryType` selects the struct; it is never inferred
	/// from the type set.
	pub async fn sign_gasless_trade(
		&self,
		envelope: &Eip712Envelope,
	) -> Result<SignedPayload, AccountError> {
		self.sign_envelope(envelope, "trade").await
	}

	async fn sign_envelope(
		&self,
		envelope: &Eip712Envelope,
		label: &str,
	) -> Result<SignedPayload, AccountError> {
		self.credential()?;
		let payload = payload_of(envelope, label)?;
		let signature = self.sign_typed_data(payload).await?;

		Ok(SignedPayload {
			kind: envelope.kind.clone(),
			hash: envelope.hash.clone(),
			eip712: payload.clone(),
			signature,
		})
	}
}

fn payload_of<'a>(
	envelope: &'a Eip712Envelope,
	label: &str,
) -> Result<&'a TypedDataPayload, AccountError> {
	envelope
		.eip712
		.as_ref()
		.ok_or_else(|| AccountError::MalformedPayload(format!("{} has no eip712 payload", label)))
}
