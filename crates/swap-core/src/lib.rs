//! Core pipeline of the swap tool.
//!
//! Coordinates the signer, the chain registry and the allowance manager to turn
//! a quote into either a broadcast transaction (direct swaps) or a pair of
//! signatures for an external relayer (gasless swaps). [`SwapEngine`] is the
//! entry point; it is built once from a [`swap_config::Config`] and shared.

use swap_account::AccountError;
use swap_delivery::DeliveryError;
use swap_types::{ConversionError, QuoteError};
use thiserror::Error;

pub mod allowance;
pub mod assembler;
pub mod calldata;
pub mod engine;
pub mod gasless;

pub use allowance::{AllowanceError, AllowanceManager};
pub use assembler::{SwapExecution, TransactionAssembler};
pub use calldata::{decode_embedded_signature, embed_signature, CalldataError};
pub use engine::{QuoteOutcome, SwapEngine};
pub use gasless::{GaslessSigner, GaslessSubmission};

/// Classification of a pipeline failure, independent of which component raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	UnsupportedChain,
	NoCredential,
	MalformedPayload,
	MalformedQuote,
	InvalidSignatureLength,
	AllowanceCheckFailed,
	ConfirmationTimeout,
	NetworkError,
	UnsupportedTransactionType,
	Configuration,
}

/// Errors that can occur while executing a quote.
#[derive(Debug, Error)]
pub enum SwapError {
	/// A signing step failed.
	#[error("Failed to {operation}: {source}")]
	Account {
		operation: &'static str,
		#[source]
		source: AccountError,
	},
	/// A chain access or delivery step failed.
	#[error("Failed to {operation}: {source}")]
	Delivery {
		operation: &'static str,
		#[source]
		source: DeliveryError,
	},
	/// The quote lacks something the flow requires.
	#[error("Malformed quote: {0}")]
	MalformedQuote(String),
	/// A signature could not be embedded into the calldata.
	#[error("Failed to embed permit signature: {0}")]
	Calldata(#[from] CalldataError),
	/// A token amount could not be converted.
	#[error("Invalid amount: {0}")]
	Amount(#[from] ConversionError),
	/// Raising an allowance failed.
	#[error("Allowance check failed: {0}")]
	Allowance(#[from] AllowanceError),
	/// Error related to configuration issues.
	#[error("Configuration error: {0}")]
	Config(String),
}

impl SwapError {
	pub(crate) fn account(operation: &'static str) -> impl FnOnce(AccountError) -> Self {
		move |source| SwapError::Account { operation, source }
	}

	pub(crate) fn delivery(operation: &'static str) -> impl FnOnce(DeliveryError) -> Self {
		move |source| SwapError::Delivery { operation, source }
	}

	/// The failure class of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			SwapError::Account { source, .. } => account_kind(source),
			SwapError::Delivery { source, .. } => delivery_kind(source),
			SwapError::MalformedQuote(_) => ErrorKind::MalformedQuote,
			SwapError::Calldata(CalldataError::InvalidSignatureLength(_)) => {
				ErrorKind::InvalidSignatureLength
			},
			SwapError::Calldata(_) | SwapError::Amount(_) => ErrorKind::MalformedQuote,
			SwapError::Allowance(_) => ErrorKind::AllowanceCheckFailed,
			SwapError::Config(_) => ErrorKind::Configuration,
		}
	}
}

impl From<QuoteError> for SwapError {
	fn from(err: QuoteError) -> Self {
		SwapError::MalformedQuote(err.to_string())
	}
}

fn account_kind(err: &AccountError) -> ErrorKind {
	match err {
		AccountError::NoCredential => ErrorKind::NoCredential,
		AccountError::MalformedPayload(_) => ErrorKind::MalformedPayload,
		AccountError::InvalidSignatureLength(_) => ErrorKind::InvalidSignatureLength,
		AccountError::SigningFailed(_) | AccountError::InvalidKey(_) => ErrorKind::Configuration,
	}
}

fn delivery_kind(err: &DeliveryError) -> ErrorKind {
	match err {
		DeliveryError::UnsupportedChain(_) => ErrorKind::UnsupportedChain,
		DeliveryError::NoCredential => ErrorKind::NoCredential,
		DeliveryError::UnsupportedTransactionType(_) => ErrorKind::UnsupportedTransactionType,
		DeliveryError::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
		DeliveryError::Network(_) => ErrorKind::NetworkError,
		DeliveryError::Configuration(_) => ErrorKind::Configuration,
	}
}
