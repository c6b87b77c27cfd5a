//! Swap engine: the entry point of the pipeline.
//!
//! The engine owns the signing account, the chain registry and the allowance
//! manager, all built from one [`Config`]. Every operation is an independent
//! async call; the engine holds no per-request state and is shared behind `Arc`.

use crate::allowance::AllowanceManager;
use crate::assembler::{SwapExecution, TransactionAssembler};
use crate::calldata::embed_signature_hex;
use crate::gasless::{GaslessSigner, GaslessSubmission};
use crate::SwapError;
use alloy_primitives::{Address, Bytes, U256};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use swap_account::AccountService;
use swap_config::{Config, ConfirmationConfig, ResolvedNetwork};
use swap_delivery::implementations::evm::alloy::AlloyDelivery;
use swap_delivery::DeliveryService;
use swap_types::{
	format_token_amount, parse_token_amount, truncate_id, AllowanceOutcome, DirectSwapQuote,
	GaslessSwapQuote, Quote, SecretString, SignatureBytes, StatusReport, TransactionHash,
	TransactionRecord, TypedDataPayload,
};
use tracing::instrument;

/// Outcome of executing a quote of either flow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QuoteOutcome {
	Direct(SwapExecution),
	Gasless(GaslessSubmission),
}

/// Orchestrates signing, allowance management and delivery of swaps.
pub struct SwapEngine {
	/// Signing account; may hold no credential.
	account: AccountService,
	/// Chain registry and delivery operations.
	delivery: Arc<DeliveryService>,
	/// Allowance checks and approvals.
	allowance: Arc<AllowanceManager>,
	/// Direct-swap assembly.
	assembler: TransactionAssembler,
	/// Gasless signing.
	gasless: GaslessSigner,
	/// Defaults for confirmation waits.
	confirmation: ConfirmationConfig,
}

impl SwapEngine {
	/// Builds the engine from configuration.
	///
	/// Connects to every effective network. Connections are lazy, so no RPC
	/// call is made here.
	pub fn new(config: &Config) -> Result<Self, SwapError> {
		let account = AccountService::from_private_key(config.credential())
			.map_err(|e| SwapError::Config(format!("Failed to load signing key: {}", e)))?;

		// Chain connections sign with the account's key.
		let private_key = account.private_key().ok();
		let mut delivery = DeliveryService::new(config.confirmation.poll_interval());
		for (chain_id, network) in config.effective_networks() {
			let connection = connect_chain(chain_id, &network, private_key.as_ref())?;
			tracing::debug!(
				chain_id = chain_id,
				legacy_transactions = network.legacy_transactions,
				"Registered chain"
			);
			delivery.register(chain_id, Arc::new(connection), network.legacy_transactions);
		}

		tracing::info!(
			chains = delivery.supported_chains().len(),
			has_credential = account.has_credential(),
			"Swap engine initialized"
		);

		Ok(Self::from_parts(
			account,
			Arc::new(delivery),
			config.confirmation.clone(),
			config.allowance.approval_gas_limit,
		))
	}

	/// Builds the engine from already constructed services.
	pub fn from_parts(
		account: AccountService,
		delivery: Arc<DeliveryService>,
		confirmation: ConfirmationConfig,
		approval_gas_limit: u64,
	) -> Self {
		let allowance = Arc::new(AllowanceManager::new(delivery.clone(), approval_gas_limit));
		let assembler =
			TransactionAssembler::new(account.clone(), delivery.clone(), allowance.clone());
		let gasless = GaslessSigner::new(account.clone());

		Self {
			account,
			delivery,
			allowance,
			assembler,
			gasless,
			confirmation,
		}
	}

	/// Executes a direct-swap quote and returns once it is broadcast.
	pub async fn execute_swap(
		&self,
		chain_id: Option<u64>,
		quote: &DirectSwapQuote,
	) -> Result<SwapExecution, SwapError> {
		self.assembler.execute(chain_id, quote).await
	}

	/// Signs a gasless quote for the relayer.
	pub async fn submit_gasless(
		&self,
		chain_id: Option<u64>,
		quote: &GaslessSwapQuote,
	) -> Result<GaslessSubmission, SwapError> {
		self.gasless.sign(chain_id, quote).await
	}

	/// Classifies a quote received as JSON and runs the matching flow.
	#[instrument(skip_all)]
	pub async fn execute_quote(
		&self,
		chain_id: Option<u64>,
		quote: serde_json::Value,
	) -> Result<QuoteOutcome, SwapError> {
		match Quote::from_value(quote)? {
			Quote::Direct(quote) => Ok(QuoteOutcome::Direct(
				self.execute_swap(chain_id, &quote).await?,
			)),
			Quote::Gasless(quote) => Ok(QuoteOutcome::Gasless(
				self.submit_gasless(chain_id, &quote).await?,
			)),
		}
	}

	/// Signs an arbitrary typed-data payload with the configured key.
	pub async fn sign_typed_data(
		&self,
		payload: &TypedDataPayload,
	) -> Result<SignatureBytes, SwapError> {
		self.account
			.sign_typed_data(payload)
			.await
			.map_err(SwapError::account("sign typed data"))
	}

	/// Ensures `spender` may move `required` of `owner`'s `token`, approving
	/// the maximum at `gas_price` when it may not.
	#[instrument(skip_all, fields(chain_id = chain_id))]
	pub async fn ensure_allowance(
		&self,
		chain_id: u64,
		token: Address,
		owner: Address,
		spender: Address,
		required: U256,
		gas_price: u128,
	) -> Result<AllowanceOutcome, SwapError> {
		Ok(self
			.allowance
			.ensure_allowance(chain_id, token, owner, spender, required, gas_price)
			.await?)
	}

	/// Polls the status of a transaction once.
	pub async fn get_transaction_status(
		&self,
		chain_id: u64,
		hash: TransactionHash,
	) -> Result<StatusReport, SwapError> {
		self.delivery
			.get_transaction_status(chain_id, hash)
			.await
			.map_err(SwapError::delivery("get transaction status"))
	}

	/// Waits for a transaction to be confirmed.
	///
	/// `confirmations` and `timeout` default to the configured values.
	#[instrument(skip_all, fields(chain_id = chain_id, tx_hash = %truncate_id(&hash.to_string())))]
	pub async fn wait_for_confirmation(
		&self,
		chain_id: u64,
		hash: TransactionHash,
		confirmations: Option<u64>,
		timeout: Option<Duration>,
	) -> Result<TransactionRecord, SwapError> {
		self.delivery
			.wait_for_confirmation(
				chain_id,
				hash,
				confirmations.unwrap_or(self.confirmation.confirmations),
				timeout.unwrap_or_else(|| self.confirmation.timeout()),
			)
			.await
			.map_err(SwapError::delivery("wait for confirmation"))
	}

	/// Address of the signing account.
	pub async fn wallet_address(&self) -> Result<Address, SwapError> {
		self.account
			.address()
			.await
			.map_err(SwapError::account("get wallet address"))
	}

	/// Renders a base-unit amount with `decimals` places, e.g. `"1500000"` at 6 is `"1.5"`.
	pub fn format_token_amount(&self, amount: &str, decimals: u8) -> String {
		format_token_amount(amount, decimals)
	}

	/// Converts a display amount into base units. Excess fractional digits are an error.
	pub fn parse_token_amount(&self, amount: &str, decimals: u8) -> Result<U256, SwapError> {
		Ok(parse_token_amount(amount, decimals)?)
	}

	/// Appends a hex signature to hex calldata in the Permit2 trailer layout.
	pub fn embed_signature(&self, calldata: &str, signature: &str) -> Result<Bytes, SwapError> {
		Ok(embed_signature_hex(calldata, signature)?)
	}

	/// Supported chain ids in ascending order.
	pub fn supported_chains(&self) -> Vec<u64> {
		self.delivery.supported_chains()
	}

	pub fn is_chain_supported(&self, chain_id: u64) -> bool {
		self.delivery.is_chain_supported(chain_id)
	}
}

fn connect_chain(
	chain_id: u64,
	network: &ResolvedNetwork,
	private_key: Option<&SecretString>,
) -> Result<AlloyDelivery, SwapError> {
	AlloyDelivery::new(chain_id, &network.endpoints, private_key)
		.map_err(|e| SwapError::Config(format!("Failed to connect to chain {}: {}", chain_id, e)))
}
