//! Direct-swap transaction assembly.
//!
//! Turns a [`DirectSwapQuote`] into a signed legacy transaction: raises the
//! Permit2 allowance if needed, signs the Permit2 payload into the calldata,
//! fetches the pending nonce and broadcasts. Gas values come from the quote.

use crate::allowance::AllowanceManager;
use crate::calldata::embed_signature;
use crate::SwapError;
use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use swap_account::AccountService;
use swap_delivery::DeliveryService;
use swap_types::{
	parse_u256, truncate_id, AllowanceOutcome, AssembledTransaction, DirectSwapQuote,
	QuoteTransaction, TransactionFormat, TransactionRecord, PERMIT2_ADDRESS,
};
use tracing::instrument;

/// Result of a direct swap: the broadcast transaction plus what was done for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapExecution {
	#[serde(flatten)]
	pub record: TransactionRecord,
	/// Whether a Permit2 signature was embedded into the calldata.
	pub permit2_signed: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub permit2_hash: Option<String>,
	/// Allowance step outcome; absent when skipped or when it failed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub allowance: Option<AllowanceOutcome>,
}

/// Gas parameters of a quote transaction, validated up front.
struct GasTerms {
	gas_limit: u64,
	gas_price: u128,
	value: U256,
}

impl GasTerms {
	fn from_quote(transaction: &QuoteTransaction) -> Result<Self, SwapError> {
		let gas = transaction
			.gas
			.as_deref()
			.ok_or_else(|| SwapError::MalformedQuote("transaction has no gas".to_string()))?;
		let gas_price = transaction
			.gas_price
			.as_deref()
			.ok_or_else(|| SwapError::MalformedQuote("transaction has no gasPrice".to_string()))?;

		let gas_limit = parse_u256(gas)
			.ok()
			.and_then(|gas| u64::try_from(gas).ok())
			.ok_or_else(|| SwapError::MalformedQuote(format!("invalid gas '{}'", gas)))?;
		let gas_price = parse_u256(gas_price)
			.ok()
			.and_then(|price| u128::try_from(price).ok())
			.ok_or_else(|| SwapError::MalformedQuote(format!("invalid gasPrice '{}'", gas_price)))?;
		let value = match transaction.value.as_deref() {
			Some(value) => parse_u256(value)
				.map_err(|e| SwapError::MalformedQuote(format!("invalid value: {}", e)))?,
			None => U256::ZERO,
		};

		Ok(Self {
			gas_limit,
			gas_price,
			value,
		})
	}
}

/// Builds, signs and broadcasts direct-swap transactions.
pub struct TransactionAssembler {
	account: AccountService,
	delivery: Arc<DeliveryService>,
	allowance: Arc<AllowanceManager>,
}

impl TransactionAssembler {
	pub fn new(
		account: AccountService,
		delivery: Arc<DeliveryService>,
		allowance: Arc<AllowanceManager>,
	) -> Self {
		Self {
			account,
			delivery,
			allowance,
		}
	}

	/// Executes a direct-swap quote on `chain_id`, or on the chain the quote names.
	///
	/// Returns once the swap is accepted by the node. An approval raised on the
	/// way is broadcast first and not waited for.
	#[instrument(skip_all, fields(chain_id))]
	pub async fn execute(
		&self,
		chain_id: Option<u64>,
		quote: &DirectSwapQuote,
	) -> Result<SwapExecution, SwapError> {
		let chain_id = quote
			.resolve_chain_id(chain_id)
			.ok_or_else(|| SwapError::MalformedQuote("no chain id".to_string()))?;
		tracing::Span::current().record("chain_id", chain_id);

		// Everything that can be rejected locally is, before touching the network
		let owner = self
			.account
			.address()
			.await
			.map_err(SwapError::account("sign swap transaction"))?;
		let transaction = quote
			.transaction
			.as_ref()
			.ok_or_else(|| SwapError::MalformedQuote("quote has no transaction".to_string()))?;
		let terms = GasTerms::from_quote(transaction)?;
		self.delivery
			.ensure_legacy_supported(chain_id)
			.map_err(SwapError::delivery("assemble swap transaction"))?;

		let allowance = self
			.raise_permit2_allowance(chain_id, owner, quote, terms.gas_price)
			.await;

		let (data, permit2_signed, permit2_hash) = self.embed_permit2(quote, transaction).await?;

		let nonce = self
			.delivery
			.get_nonce(chain_id, owner)
			.await
			.map_err(SwapError::delivery("get nonce"))?;

		let tx = AssembledTransaction {
			to: transaction.to,
			data,
			value: terms.value,
			gas_limit: terms.gas_limit,
			gas_price: terms.gas_price,
			nonce,
			chain_id,
			tx_type: TransactionFormat::Legacy,
		};

		tracing::debug!(
			to = %truncate_id(&tx.to.to_string()),
			nonce = nonce,
			gas_limit = tx.gas_limit,
			permit2_signed = permit2_signed,
			"Assembled swap transaction"
		);

		let record = self
			.delivery
			.broadcast(tx)
			.await
			.map_err(SwapError::delivery("broadcast swap transaction"))?;

		Ok(SwapExecution {
			record,
			permit2_signed,
			permit2_hash,
			allowance,
		})
	}

	/// Raises the allowance the Permit2 flow needs.
	///
	/// Skipped unless the quote carries a Permit2 payload and names the sell
	/// token and amount. Failures are logged and dropped; the swap proceeds.
	async fn raise_permit2_allowance(
		&self,
		chain_id: u64,
		owner: Address,
		quote: &DirectSwapQuote,
		gas_price: u128,
	) -> Option<AllowanceOutcome> {
		quote.permit2.as_ref()?;
		let (Some(token), Some(amount)) = (quote.sell_token, quote.sell_amount.as_deref()) else {
			return None;
		};
		let spender = quote.allowance_spender().unwrap_or(PERMIT2_ADDRESS);

		let result = match parse_u256(amount) {
			Ok(required) => {
				self.allowance
					.ensure_allowance(chain_id, token, owner, spender, required, gas_price)
					.await
			},
			Err(e) => Err(crate::AllowanceError::InvalidAmount(e.to_string())),
		};

		match result {
			Ok(outcome) => Some(outcome),
			Err(e) => {
				tracing::warn!(
					chain_id = chain_id,
					token = %truncate_id(&token.to_string()),
					error = %e,
					"Allowance check failed, continuing with swap"
				);
				None
			},
		}
	}

	/// Signs the quote's Permit2 payload, if any, and appends it to the calldata.
	async fn embed_permit2(
		&self,
		quote: &DirectSwapQuote,
		transaction: &QuoteTransaction,
	) -> Result<(Bytes, bool, Option<String>), SwapError> {
		let Some(permit2) = quote
			.permit2
			.as_ref()
			.filter(|permit2| permit2.eip712.is_some())
		else {
			return Ok((transaction.data.clone(), false, None));
		};

		let signature = self
			.account
			.sign_permit2(permit2)
			.await
			.map_err(SwapError::account("sign permit2"))?;
		let data = embed_signature(&transaction.data, signature.as_bytes())?;

		Ok((data, true, permit2.hash.clone()))
	}
}
