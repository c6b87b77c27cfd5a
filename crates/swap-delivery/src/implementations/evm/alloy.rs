//! Alloy-based EVM chain connection.
//!
//! Reads go through a plain HTTP provider. Transactions are signed locally into
//! a legacy envelope and submitted raw, so the provider never fills or
//! estimates anything: every field comes from the assembled transaction.

use crate::{DeliveryError, DeliveryInterface};
use alloy_consensus::Transaction as _;
use alloy_network::{EthereumWallet, TransactionBuilder};
use alloy_primitives::{Address, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{sol, SolCall};
use alloy_transport_http::Http;
use async_trait::async_trait;
use std::sync::Arc;
use swap_types::{
	AssembledTransaction, LogRecord, ReceiptDetails, RpcEndpoints, SecretString,
	TransactionHash, TransactionRecord,
};

sol! {
	function allowance(address owner, address spender) external view returns (uint256);
}

type HttpProvider = Arc<dyn Provider<Http<reqwest::Client>> + Send + Sync>;

/// Connection to a single EVM chain over JSON-RPC.
pub struct AlloyDelivery {
	chain_id: u64,
	/// Endpoint in use, kept for diagnostics.
	endpoint: String,
	provider: HttpProvider,
	/// Signing wallet, absent when no credential is configured.
	wallet: Option<(Address, EthereumWallet)>,
}

impl AlloyDelivery {
	/// Connects to a chain.
	///
	/// The preferred endpoint is used unless its URL is invalid, in which case
	/// the fallback is. The choice is fixed for the lifetime of the connection.
	pub fn new(
		chain_id: u64,
		endpoints: &RpcEndpoints,
		private_key: Option<&SecretString>,
	) -> Result<Self, DeliveryError> {
		let (endpoint, url) = match endpoints.preferred.parse::<reqwest::Url>() {
			Ok(url) => (endpoints.preferred.clone(), url),
			Err(preferred_error) => {
				let fallback = endpoints.fallback.as_ref().ok_or_else(|| {
					DeliveryError::Configuration(format!(
						"Invalid RPC URL for chain {}: {}",
						chain_id, preferred_error
					))
				})?;
				tracing::warn!(
					chain_id = chain_id,
					"Preferred RPC URL is invalid, using fallback endpoint"
				);
				let url = fallback.parse::<reqwest::Url>().map_err(|e| {
					DeliveryError::Configuration(format!(
						"Invalid fallback RPC URL for chain {}: {}",
						chain_id, e
					))
				})?;
				(fallback.clone(), url)
			},
		};

		let wallet = match private_key.filter(|key| !key.is_blank()) {
			Some(key) => {
				let signer: PrivateKeySigner = key.with_exposed(|key| {
					key.trim().parse().map_err(|_| {
						DeliveryError::Configuration("Invalid private key format".to_string())
					})
				})?;
				let signer = signer.with_chain_id(Some(chain_id));
				Some((signer.address(), EthereumWallet::from(signer)))
			},
			None => None,
		};

		let provider = ProviderBuilder::new().on_http(url);

		Ok(Self {
			chain_id,
			endpoint,
			provider: Arc::new(provider),
			wallet,
		})
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Address transactions are signed with, if a key was given.
	pub fn signer_address(&self) -> Option<Address> {
		self.wallet.as_ref().map(|(address, _)| *address)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	async fn get_nonce(&self, address: Address) -> Result<u64, DeliveryError> {
		self.provider
			.get_transaction_count(address)
			.pending()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get nonce: {}", e)))
	}

	async fn get_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, DeliveryError> {
		let request = TransactionRequest::default()
			.with_to(token)
			.with_input(allowanceCall { owner, spender }.abi_encode());

		let result = self
			.provider
			.call(&request)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to call allowance: {}", e)))?;

		allowanceCall::abi_decode_returns(&result, true)
			.map(|decoded| decoded._0)
			.map_err(|e| DeliveryError::Network(format!("Invalid allowance response: {}", e)))
	}

	async fn get_transaction(
		&self,
		hash: TransactionHash,
	) -> Result<Option<TransactionRecord>, DeliveryError> {
		let transaction = self
			.provider
			.get_transaction_by_hash(hash.0)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get transaction: {}", e)))?;

		Ok(transaction.map(|tx| TransactionRecord {
			hash,
			from: tx.from,
			to: tx.to(),
			value: tx.value(),
			gas_limit: tx.gas_limit(),
			gas_price: tx.gas_price(),
			nonce: tx.nonce(),
			chain_id: tx.chain_id().unwrap_or(self.chain_id),
			receipt: None,
		}))
	}

	async fn get_receipt(
		&self,
		hash: TransactionHash,
	) -> Result<Option<ReceiptDetails>, DeliveryError> {
		let receipt = self
			.provider
			.get_transaction_receipt(hash.0)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))?;

		let Some(receipt) = receipt else {
			return Ok(None);
		};
		// A receipt without block number belongs to a pending block
		let Some(block_number) = receipt.block_number else {
			return Ok(None);
		};

		let logs = receipt
			.inner
			.logs()
			.iter()
			.map(|log| LogRecord {
				address: log.address(),
				topics: log.topics().to_vec(),
				data: log.data().data.clone(),
				log_index: log.log_index,
			})
			.collect();

		Ok(Some(ReceiptDetails {
			block_number,
			block_hash: receipt.block_hash,
			success: receipt.status(),
			gas_used: u64::try_from(receipt.gas_used).unwrap_or(u64::MAX),
			effective_gas_price: u128::from(receipt.effective_gas_price),
			logs,
			confirmations: 0,
		}))
	}

	async fn get_block_number(&self) -> Result<u64, DeliveryError> {
		self.provider
			.get_block_number()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get block number: {}", e)))
	}

	async fn send_transaction(
		&self,
		tx: AssembledTransaction,
	) -> Result<TransactionRecord, DeliveryError> {
		let (from, wallet) = self.wallet.as_ref().ok_or(DeliveryError::NoCredential)?;

		let request = TransactionRequest::default()
			.with_from(*from)
			.with_to(tx.to)
			.with_input(tx.data.clone())
			.with_value(tx.value)
			.with_gas_limit(tx.gas_limit)
			.with_gas_price(tx.gas_price)
			.with_nonce(tx.nonce)
			.with_chain_id(tx.chain_id);

		let envelope = request
			.build(wallet)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to sign transaction: {}", e)))?;

		let pending = self
			.provider
			.send_tx_envelope(envelope)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to send transaction: {}", e)))?;

		let hash = TransactionHash(*pending.tx_hash());
		Ok(TransactionRecord::broadcast(hash, *from, &tx))
	}
}
