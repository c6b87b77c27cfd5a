//! Chain access and transaction delivery for the swap pipeline.
//!
//! [`DeliveryService`] is the chain registry: it maps each supported chain id
//! to a [`DeliveryInterface`] connection chosen once at construction, and
//! builds the nonce, allowance, broadcast and status operations on top of it.
//! A broadcast returns as soon as the node accepts the transaction; waiting
//! for confirmations is a separate call that never re-broadcasts.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use swap_types::{
	truncate_id, AssembledTransaction, ReceiptDetails, StatusReport, TransactionHash,
	TransactionRecord, TransactionStatus,
};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

/// Errors that can occur during chain access and transaction delivery.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// The chain id is not in the registry.
	#[error("Unsupported chain: {0}")]
	UnsupportedChain(u64),
	/// A transaction must be signed but no private key is configured.
	#[error("No private key configured")]
	NoCredential,
	/// The chain does not accept the legacy transaction format.
	#[error("Chain {0} does not accept legacy transactions")]
	UnsupportedTransactionType(u64),
	/// The transaction did not reach the requested confirmations in time.
	#[error("Timed out after {timeout_ms}ms waiting for transaction {hash}")]
	ConfirmationTimeout { hash: TransactionHash, timeout_ms: u64 },
	/// Error that occurs during network communication.
	#[error("Network error: {0}")]
	Network(String),
	/// The connection could not be set up.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A connection to one chain.
///
/// Implementations hold the endpoint and, when a credential is configured, the
/// wallet used to sign transaction envelopes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeliveryInterface: Send + Sync {
	/// Transaction count of `address`, including pending transactions.
	async fn get_nonce(&self, address: Address) -> Result<u64, DeliveryError>;

	/// ERC-20 `allowance(owner, spender)` of `token`.
	async fn get_allowance(
		&self,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, DeliveryError>;

	/// The transaction as the node knows it, without receipt.
	async fn get_transaction(
		&self,
		hash: TransactionHash,
	) -> Result<Option<TransactionRecord>, DeliveryError>;

	/// The receipt of a mined transaction. `confirmations` is left at zero.
	async fn get_receipt(
		&self,
		hash: TransactionHash,
	) -> Result<Option<ReceiptDetails>, DeliveryError>;

	/// Latest block number.
	async fn get_block_number(&self) -> Result<u64, DeliveryError>;

	/// Signs and broadcasts `tx`, returning once the node has accepted it.
	async fn send_transaction(
		&self,
		tx: AssembledTransaction,
	) -> Result<TransactionRecord, DeliveryError>;
}

struct ChainEntry {
	provider: Arc<dyn DeliveryInterface>,
	legacy_transactions: bool,
}

/// Registry of chain connections and the delivery operations built on them.
pub struct DeliveryService {
	/// Map of chain IDs to their connections.
	chains: HashMap<u64, ChainEntry>,
	/// Delay between polls while waiting for confirmations.
	poll_interval: Duration,
}

impl DeliveryService {
	pub fn new(poll_interval: Duration) -> Self {
		Self {
			chains: HashMap::new(),
			poll_interval,
		}
	}

	/// Registers the connection of a chain, replacing any earlier one.
	pub fn register(
		&mut self,
		chain_id: u64,
		provider: Arc<dyn DeliveryInterface>,
		legacy_transactions: bool,
	) {
		self.chains.insert(
			chain_id,
			ChainEntry {
				provider,
				legacy_transactions,
			},
		);
	}

	/// Builder form of [`DeliveryService::register`].
	pub fn with_chain(
		mut self,
		chain_id: u64,
		provider: Arc<dyn DeliveryInterface>,
		legacy_transactions: bool,
	) -> Self {
		self.register(chain_id, provider, legacy_transactions);
		self
	}

	fn entry(&self, chain_id: u64) -> Result<&ChainEntry, DeliveryError> {
		self.chains
			.get(&chain_id)
			.ok_or(DeliveryError::UnsupportedChain(chain_id))
	}

	/// The connection of a chain.
	pub fn chain(&self, chain_id: u64) -> Result<&Arc<dyn DeliveryInterface>, DeliveryError> {
		Ok(&self.entry(chain_id)?.provider)
	}

	/// Fails with `UnsupportedTransactionType` when the chain rejects legacy transactions.
	pub fn ensure_legacy_supported(&self, chain_id: u64) -> Result<(), DeliveryError> {
		if self.entry(chain_id)?.legacy_transactions {
			Ok(())
		} else {
			Err(DeliveryError::UnsupportedTransactionType(chain_id))
		}
	}

	/// Supported chain ids in ascending order.
	pub fn supported_chains(&self) -> Vec<u64> {
		let mut chains: Vec<u64> = self.chains.keys().copied().collect();
		chains.sort_unstable();
		chains
	}

	pub fn is_chain_supported(&self, chain_id: u64) -> bool {
		self.chains.contains_key(&chain_id)
	}

	/// Next nonce of `address`, counting its pending transactions.
	pub async fn get_nonce(&self, chain_id: u64, address: Address) -> Result<u64, DeliveryError> {
		self.chain(chain_id)?.get_nonce(address).await
	}

	pub async fn get_allowance(
		&self,
		chain_id: u64,
		token: Address,
		owner: Address,
		spender: Address,
	) -> Result<U256, DeliveryError> {
		self.chain(chain_id)?
			.get_allowance(token, owner, spender)
			.await
	}

	/// Signs and broadcasts a legacy transaction on its chain without waiting for it.
	pub async fn broadcast(
		&self,
		tx: AssembledTransaction,
	) -> Result<TransactionRecord, DeliveryError> {
		let chain_id = tx.chain_id;
		self.ensure_legacy_supported(chain_id)?;
		let provider = self.chain(chain_id)?;

		let nonce = tx.nonce;
		let record = provider.send_transaction(tx).await?;
		tracing::info!(
			chain_id = chain_id,
			tx_hash = %truncate_id(&record.hash.to_string()),
			nonce = nonce,
			"Submitted transaction"
		);

		Ok(record)
	}

	/// Polls the node once for the status of a transaction.
	///
	/// Unknown to the node is `not_found`, known without receipt is `pending`,
	/// and a receipt decides between `success` and `failed`.
	pub async fn get_transaction_status(
		&self,
		chain_id: u64,
		hash: TransactionHash,
	) -> Result<StatusReport, DeliveryError> {
		let provider = self.chain(chain_id)?;

		let Some(mut record) = provider.get_transaction(hash).await? else {
			return Ok(StatusReport::not_found());
		};

		let status = match provider.get_receipt(hash).await? {
			None => TransactionStatus::Pending,
			Some(mut receipt) => {
				let head = provider.get_block_number().await?;
				receipt.confirmations = confirmations_at(head, receipt.block_number);
				let status = if receipt.success {
					TransactionStatus::Success
				} else {
					TransactionStatus::Failed
				};
				record.receipt = Some(receipt);
				status
			},
		};

		Ok(StatusReport {
			status,
			transaction: Some(record),
		})
	}

	/// Waits until a transaction has `confirmations` blocks, counting its own.
	///
	/// Polls every `poll_interval`. A reverted transaction is returned like a
	/// successful one; the receipt's `success` flag tells them apart. Timing out
	/// leaves the transaction in flight.
	pub async fn wait_for_confirmation(
		&self,
		chain_id: u64,
		hash: TransactionHash,
		confirmations: u64,
		timeout: Duration,
	) -> Result<TransactionRecord, DeliveryError> {
		let provider = self.chain(chain_id)?;
		let start_time = tokio::time::Instant::now();
		let hash_str = truncate_id(&hash.to_string());

		tracing::info!(
			chain_id = chain_id,
			tx_hash = %hash_str,
			confirmations = confirmations,
			timeout_ms = timeout.as_millis() as u64,
			"Waiting for confirmations"
		);

		loop {
			if let Some(mut receipt) = provider.get_receipt(hash).await? {
				let head = provider.get_block_number().await?;
				let current = confirmations_at(head, receipt.block_number);

				if current >= confirmations {
					if let Some(mut record) = provider.get_transaction(hash).await? {
						receipt.confirmations = current;
						tracing::info!(
							chain_id = chain_id,
							tx_hash = %hash_str,
							block_number = receipt.block_number,
							success = receipt.success,
							"Transaction confirmed"
						);
						record.receipt = Some(receipt);
						return Ok(record);
					}
				} else {
					tracing::debug!(
						tx_hash = %hash_str,
						remaining = confirmations - current,
						"Waiting for more confirmations"
					);
				}
			}

			let elapsed = start_time.elapsed();
			if elapsed >= timeout {
				tracing::warn!(
					chain_id = chain_id,
					tx_hash = %hash_str,
					"Timed out waiting for confirmations"
				);
				return Err(DeliveryError::ConfirmationTimeout {
					hash,
					timeout_ms: timeout.as_millis() as u64,
				});
			}

			tokio::time::sleep(self.poll_interval.min(timeout - elapsed)).await;
		}
	}
}

/// Blocks on top of and including `block_number` when the head is at `head`.
fn confirmations_at(head: u64, block_number: u64) -> u64 {
	head.saturating_sub(block_number) + 1
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::{Bytes, B256};
	use swap_types::TransactionFormat;

	fn record(hash: TransactionHash) -> TransactionRecord {
		TransactionRecord {
			hash,
			from: Address::repeat_byte(0x01),
			to: Some(Address::repeat_byte(0x02)),
			value: U256::ZERO,
			gas_limit: 250_000,
			gas_price: Some(1_000_000_000),
			nonce: 4,
			chain_id: 8453,
			receipt: None,
		}
	}

	fn receipt(block_number: u64, success: bool) -> ReceiptDetails {
		ReceiptDetails {
			block_number,
			block_hash: Some(B256::repeat_byte(0xbb)),
			success,
			gas_used: 120_000,
			effective_gas_price: 1_000_000_000,
			logs: Vec::new(),
			confirmations: 0,
		}
	}

	fn assembled(chain_id: u64) -> AssembledTransaction {
		AssembledTransaction {
			to: Address::repeat_byte(0x02),
			data: Bytes::from_static(&[0xde, 0xad]),
			value: U256::ZERO,
			gas_limit: 250_000,
			gas_price: 1_000_000_000,
			nonce: 4,
			chain_id,
			tx_type: TransactionFormat::Legacy,
		}
	}

	fn service(mock: MockDeliveryInterface) -> DeliveryService {
		DeliveryService::new(Duration::from_millis(200)).with_chain(8453, Arc::new(mock), true)
	}

	#[tokio::test]
	async fn test_unsupported_chain() {
		let service = service(MockDeliveryInterface::new());
		assert!(service.is_chain_supported(8453));
		assert!(!service.is_chain_supported(1));
		assert!(matches!(
			service.get_nonce(1, Address::ZERO).await,
			Err(DeliveryError::UnsupportedChain(1))
		));
		assert!(matches!(
			service.broadcast(assembled(1)).await,
			Err(DeliveryError::UnsupportedChain(1))
		));
	}

	#[tokio::test]
	async fn test_supported_chains_sorted() {
		let service = DeliveryService::new(Duration::from_secs(1))
			.with_chain(8453, Arc::new(MockDeliveryInterface::new()), true)
			.with_chain(1, Arc::new(MockDeliveryInterface::new()), true)
			.with_chain(137, Arc::new(MockDeliveryInterface::new()), false);
		assert_eq!(service.supported_chains(), vec![1, 137, 8453]);
		assert!(service.ensure_legacy_supported(1).is_ok());
		assert!(matches!(
			service.ensure_legacy_supported(137),
			Err(DeliveryError::UnsupportedTransactionType(137))
		));
	}

	#[tokio::test]
	async fn test_broadcast_rejected_without_legacy_support() {
		// No expectations: any call on the mock would panic
		let service = DeliveryService::new(Duration::from_secs(1)).with_chain(
			10,
			Arc::new(MockDeliveryInterface::new()),
			false,
		);
		assert!(matches!(
			service.broadcast(assembled(10)).await,
			Err(DeliveryError::UnsupportedTransactionType(10))
		));
	}

	#[tokio::test]
	async fn test_status_not_found() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_get_transaction().returning(|_| Ok(None));

		let hash = TransactionHash(B256::repeat_byte(0x11));
		let report = service(mock).get_transaction_status(8453, hash).await.unwrap();
		assert_eq!(report.status, TransactionStatus::NotFound);
		assert!(report.transaction.is_none());
	}

	#[tokio::test]
	async fn test_status_success_and_failed() {
		for success in [true, false] {
			let mut mock = MockDeliveryInterface::new();
			mock.expect_get_transaction()
				.returning(|hash| Ok(Some(record(hash))));
			mock.expect_get_receipt()
				.returning(move |_| Ok(Some(receipt(100, success))));
			mock.expect_get_block_number().returning(|| Ok(102));

			let hash = TransactionHash(B256::repeat_byte(0x11));
			let report = service(mock).get_transaction_status(8453, hash).await.unwrap();
			let expected = if success {
				TransactionStatus::Success
			} else {
				TransactionStatus::Failed
			};
			assert_eq!(report.status, expected);

			let receipt = report.transaction.unwrap().receipt.unwrap();
			assert_eq!(receipt.confirmations, 3);
		}
	}

	#[tokio::test]
	async fn test_wait_counts_inclusion_block() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_get_receipt()
			.returning(|_| Ok(Some(receipt(100, true))));
		let mut head = 99;
		mock.expect_get_block_number().returning(move || {
			head += 1;
			Ok(head)
		});
		mock.expect_get_transaction()
			.returning(|hash| Ok(Some(record(hash))));

		let hash = TransactionHash(B256::repeat_byte(0x22));
		let confirmed = service(mock)
			.wait_for_confirmation(8453, hash, 1, Duration::from_secs(10))
			.await
			.unwrap();

		let receipt = confirmed.receipt.unwrap();
		assert_eq!(receipt.block_number, 100);
		assert_eq!(receipt.confirmations, 1);
	}

	#[tokio::test(start_paused = true)]
	async fn test_wait_polls_until_enough_confirmations() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_get_receipt()
			.returning(|_| Ok(Some(receipt(100, true))));
		let mut head = 99;
		mock.expect_get_block_number().times(3).returning(move || {
			head += 1;
			Ok(head)
		});
		mock.expect_get_transaction()
			.times(1)
			.returning(|hash| Ok(Some(record(hash))));

		let hash = TransactionHash(B256::repeat_byte(0x33));
		let confirmed = service(mock)
			.wait_for_confirmation(8453, hash, 3, Duration::from_secs(10))
			.await
			.unwrap();
		assert_eq!(confirmed.receipt.unwrap().confirmations, 3);
	}

	#[tokio::test(start_paused = true)]
	async fn test_wait_times_out_and_leaves_transaction_pending() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_get_receipt().returning(|_| Ok(None));
		mock.expect_get_transaction()
			.returning(|hash| Ok(Some(record(hash))));
		mock.expect_send_transaction().never();

		let service = service(mock);
		let hash = TransactionHash(B256::repeat_byte(0x44));

		let start = tokio::time::Instant::now();
		let result = service
			.wait_for_confirmation(8453, hash, 1, Duration::from_millis(1000))
			.await;
		assert!(matches!(
			result,
			Err(DeliveryError::ConfirmationTimeout { timeout_ms: 1000, .. })
		));
		assert!(start.elapsed() >= Duration::from_millis(1000));

		let report = service.get_transaction_status(8453, hash).await.unwrap();
		assert_eq!(report.status, TransactionStatus::Pending);
		assert!(report.transaction.unwrap().receipt.is_none());
	}

	#[tokio::test]
	async fn test_network_errors_propagate() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_get_receipt()
			.returning(|_| Err(DeliveryError::Network("connection refused".to_string())));

		let result = service(mock)
			.wait_for_confirmation(
				8453,
				TransactionHash(B256::ZERO),
				1,
				Duration::from_secs(5),
			)
			.await;
		assert!(matches!(result, Err(DeliveryError::Network(_))));
	}
}
