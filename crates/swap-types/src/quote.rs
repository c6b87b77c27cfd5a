//! Quotes as handed over by the quote provider.
//!
//! A quote is opaque to the pipeline apart from the fields modelled here. The
//! two flows are told apart once, at the boundary, by [`Quote::from_value`]:
//! a quote carrying a `trade` object is gasless, one carrying a `transaction`
//! object is a direct swap.

use crate::typed_data::Eip712Envelope;
use crate::utils::{deserialize_optional_chain_id, deserialize_optional_numeric};
use alloy_primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while classifying or decoding a quote.
#[derive(Debug, Error)]
pub enum QuoteError {
	/// The quote is missing a required substructure or has the wrong shape.
	#[error("Malformed quote: {0}")]
	Malformed(String),
	/// The quote matched a flow but its fields failed to decode.
	#[error("Malformed quote: {0}")]
	Decode(#[from] serde_json::Error),
}

/// The transaction template of a direct-swap quote.
///
/// Gas values are taken verbatim from the quote; the pipeline never estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteTransaction {
	pub to: Address,
	#[serde(default)]
	pub data: Bytes,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_optional_numeric"
	)]
	pub value: Option<String>,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_optional_numeric"
	)]
	pub gas: Option<String>,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_optional_numeric"
	)]
	pub gas_price: Option<String>,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_optional_chain_id"
	)]
	pub chain_id: Option<u64>,
}

/// Allowance issue reported by the quote provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllowanceIssue {
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_optional_numeric"
	)]
	pub actual: Option<String>,
	pub spender: Address,
}

/// Issues section of a direct-swap quote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteIssues {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub allowance: Option<AllowanceIssue>,
}

/// A quote for a swap the signing account submits and pays gas for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectSwapQuote {
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_optional_chain_id"
	)]
	pub chain_id: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction: Option<QuoteTransaction>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub permit2: Option<Eip712Envelope>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub sell_token: Option<Address>,
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_optional_numeric"
	)]
	pub sell_amount: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issues: Option<QuoteIssues>,
}

impl DirectSwapQuote {
	/// Chain to submit on: the explicit argument, then the quote, then its transaction.
	pub fn resolve_chain_id(&self, explicit: Option<u64>) -> Option<u64> {
		explicit.or(self.chain_id).or_else(|| {
			self.transaction
				.as_ref()
				.and_then(|transaction| transaction.chain_id)
		})
	}

	/// Spender named by the quote's allowance issue, if any.
	pub fn allowance_spender(&self) -> Option<Address> {
		self.issues
			.as_ref()
			.and_then(|issues| issues.allowance.as_ref())
			.map(|allowance| allowance.spender)
	}
}

/// A quote for a swap a relayer submits; the account only signs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaslessSwapQuote {
	#[serde(
		default,
		skip_serializing_if = "Option::is_none",
		deserialize_with = "deserialize_optional_chain_id"
	)]
	pub chain_id: Option<u64>,
	#[serde(default)]
	pub approval: Option<Eip712Envelope>,
	#[serde(default)]
	pub trade: Option<Eip712Envelope>,
}

impl GaslessSwapQuote {
	/// Chain id the trade signature is bound to, from its EIP-712 domain.
	pub fn signed_chain_id(&self) -> Option<u64> {
		self.trade
			.as_ref()
			.and_then(|trade| trade.eip712.as_ref())
			.and_then(|payload| payload.domain.chain_id)
	}

	/// Chain of the swap: the trade's domain, then the explicit argument, then the quote.
	pub fn resolve_chain_id(&self, explicit: Option<u64>) -> Option<u64> {
		self.signed_chain_id().or(explicit).or(self.chain_id)
	}
}

/// A quote, classified by flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Quote {
	Direct(DirectSwapQuote),
	Gasless(GaslessSwapQuote),
}

impl Quote {
	/// Classifies and decodes a quote received as JSON.
	pub fn from_value(value: serde_json::Value) -> Result<Self, QuoteError> {
		let object = value
			.as_object()
			.ok_or_else(|| QuoteError::Malformed("quote must be a JSON object".to_string()))?;
		let is_gasless = object.contains_key("trade");
		let is_direct = object.contains_key("transaction");

		if is_gasless {
			Ok(Quote::Gasless(serde_json::from_value(value)?))
		} else if is_direct {
			Ok(Quote::Direct(serde_json::from_value(value)?))
		} else {
			Err(QuoteError::Malformed(
				"quote carries neither a transaction nor a gasless trade".to_string(),
			))
		}
	}

	pub fn is_gasless(&self) -> bool {
		matches!(self, Quote::Gasless(_))
	}
}
