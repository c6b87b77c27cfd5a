//! ERC-20 allowance management for direct swaps.
//!
//! Before a Permit2 swap the signing account must have approved the Permit2
//! contract (or the spender the quote names) for at least the sell amount.
//! [`AllowanceManager`] reads the current allowance and, when it falls short,
//! submits a maximal `approve` from the signing account.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};
use std::sync::Arc;
use swap_delivery::{DeliveryError, DeliveryService};
use swap_types::{
	truncate_id, AllowanceOutcome, AllowanceState, AssembledTransaction, TransactionFormat,
	MAX_APPROVAL_AMOUNT,
};
use thiserror::Error;

sol! {
	function approve(address spender, uint256 amount) external returns (bool);
}

/// Errors that can occur while ensuring an allowance.
#[derive(Debug, Error)]
pub enum AllowanceError {
	/// The current allowance could not be read.
	#[error("Failed to read allowance: {0}")]
	Read(#[source] DeliveryError),
	/// The approval transaction could not be submitted.
	#[error("Failed to submit approval: {0}")]
	Approval(#[source] DeliveryError),
	/// The required amount is not a valid integer.
	#[error("Invalid amount: {0}")]
	InvalidAmount(String),
}

/// Checks and raises ERC-20 allowances of the signing account.
pub struct AllowanceManager {
	delivery: Arc<DeliveryService>,
	/// Gas limit of approval transactions.
	approval_gas_limit: u64,
}

impl AllowanceManager {
	pub fn new(delivery: Arc<DeliveryService>, approval_gas_limit: u64) -> Self {
		Self {
			delivery,
			approval_gas_limit,
		}
	}

	/// Reads the allowance of `spender` over `owner`'s `token`.
	pub async fn check_allowance(
		&self,
		chain_id: u64,
		token: Address,
		owner: Address,
		spender: Address,
		required: U256,
	) -> Result<AllowanceState, AllowanceError> {
		let current = self
			.delivery
			.get_allowance(chain_id, token, owner, spender)
			.await
			.map_err(AllowanceError::Read)?;

		Ok(AllowanceState {
			owner,
			spender,
			token,
			current,
			required,
		})
	}

	/// Makes sure `spender` may move at least `required` of `owner`'s `token`.
	///
	/// When the allowance already covers the requirement nothing is sent.
	/// Otherwise a maximal approval is broadcast at `gas_price` and returned
	/// without waiting for it to be mined.
	pub async fn ensure_allowance(
		&self,
		chain_id: u64,
		token: Address,
		owner: Address,
		spender: Address,
		required: U256,
		gas_price: u128,
	) -> Result<AllowanceOutcome, AllowanceError> {
		let state = self
			.check_allowance(chain_id, token, owner, spender, required)
			.await?;

		if state.is_sufficient() {
			tracing::debug!(
				chain_id = chain_id,
				token = %truncate_id(&token.to_string()),
				current = %state.current,
				"Allowance already sufficient"
			);
			return Ok(AllowanceOutcome {
				raised: false,
				previous: state.current,
				required,
				approval: None,
			});
		}

		tracing::info!(
			chain_id = chain_id,
			token = %truncate_id(&token.to_string()),
			spender = %truncate_id(&spender.to_string()),
			current = %state.current,
			required = %required,
			"Raising allowance"
		);

		let nonce = self
			.delivery
			.get_nonce(chain_id, owner)
			.await
			.map_err(AllowanceError::Read)?;

		let tx = AssembledTransaction {
			to: token,
			data: approveCall {
				spender,
				amount: MAX_APPROVAL_AMOUNT,
			}
			.abi_encode()
			.into(),
			value: U256::ZERO,
			gas_limit: self.approval_gas_limit,
			gas_price,
			nonce,
			chain_id,
			tx_type: TransactionFormat::Legacy,
		};

		let approval = self
			.delivery
			.broadcast(tx)
			.await
			.map_err(AllowanceError::Approval)?;

		Ok(AllowanceOutcome {
			raised: true,
			previous: state.current,
			required,
			approval: Some(approval),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::B256;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::sync::Mutex;
	use std::time::Duration;
	use swap_delivery::MockDeliveryInterface;
	use swap_types::{TransactionHash, TransactionRecord};

	const CHAIN: u64 = 8453;
	const TOKEN: Address = Address::repeat_byte(0xaa);
	const OWNER: Address = Address::repeat_byte(0x01);
	const SPENDER: Address = Address::repeat_byte(0x22);

	fn manager(mock: MockDeliveryInterface) -> AllowanceManager {
		let delivery =
			DeliveryService::new(Duration::from_millis(10)).with_chain(CHAIN, Arc::new(mock), true);
		AllowanceManager::new(Arc::new(delivery), 100_000)
	}

	#[tokio::test]
	async fn test_sufficient_allowance_sends_nothing() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_get_allowance()
			.times(2)
			.returning(|_, _, _| Ok(U256::from(1_000_000u64)));
		mock.expect_get_nonce().never();
		mock.expect_send_transaction().never();
		let manager = manager(mock);

		for required in [U256::from(1_000_000u64), U256::from(10u64)] {
			let outcome = manager
				.ensure_allowance(CHAIN, TOKEN, OWNER, SPENDER, required, 1)
				.await
				.unwrap();
			assert!(!outcome.raised);
			assert!(outcome.approval.is_none());
			assert_eq!(outcome.previous, U256::from(1_000_000u64));
		}
	}

	#[tokio::test]
	async fn test_short_allowance_submits_max_approval() {
		let sent = Arc::new(Mutex::new(Vec::new()));
		let captured = sent.clone();

		let mut mock = MockDeliveryInterface::new();
		mock.expect_get_allowance()
			.withf(|token, owner, spender| *token == TOKEN && *owner == OWNER && *spender == SPENDER)
			.returning(|_, _, _| Ok(U256::from(500_000u64)));
		mock.expect_get_nonce().returning(|_| Ok(12));
		mock.expect_send_transaction().times(1).returning(move |tx| {
			captured.lock().unwrap().push(tx.clone());
			Ok(TransactionRecord::broadcast(
				TransactionHash(B256::repeat_byte(0x0a)),
				OWNER,
				&tx,
			))
		});

		let outcome = manager(mock)
			.ensure_allowance(
				CHAIN,
				TOKEN,
				OWNER,
				SPENDER,
				U256::from(1_000_000u64),
				2_000_000_000,
			)
			.await
			.unwrap();

		assert!(outcome.raised);
		assert_eq!(outcome.previous, U256::from(500_000u64));
		assert_eq!(outcome.approval.as_ref().unwrap().nonce, 12);

		let sent = sent.lock().unwrap();
		let tx = &sent[0];
		assert_eq!(tx.to, TOKEN);
		assert_eq!(tx.gas_limit, 100_000);
		assert_eq!(tx.gas_price, 2_000_000_000);
		assert_eq!(tx.value, U256::ZERO);
		assert_eq!(tx.tx_type, TransactionFormat::Legacy);

		let call = approveCall::abi_decode(&tx.data, true).unwrap();
		assert_eq!(&tx.data[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
		assert_eq!(call.spender, SPENDER);
		assert_eq!(call.amount, U256::MAX);
	}

	#[tokio::test]
	async fn test_read_failure_is_reported() {
		let mut mock = MockDeliveryInterface::new();
		mock.expect_get_allowance()
			.returning(|_, _, _| Err(DeliveryError::Network("connection refused".into())));
		mock.expect_send_transaction().never();

		let result = manager(mock)
			.ensure_allowance(CHAIN, TOKEN, OWNER, SPENDER, U256::from(1u64), 1)
			.await;
		assert!(matches!(result, Err(AllowanceError::Read(_))));
	}

	#[tokio::test]
	async fn test_unknown_chain() {
		let result = manager(MockDeliveryInterface::new())
			.ensure_allowance(1, TOKEN, OWNER, SPENDER, U256::from(1u64), 1)
			.await;
		assert!(matches!(
			result,
			Err(AllowanceError::Read(DeliveryError::UnsupportedChain(1)))
		));
	}

	#[tokio::test]
	async fn test_raised_allowance_is_not_raised_again() {
		let approved = Arc::new(AtomicBool::new(false));
		let read_approved = approved.clone();

		let mut mock = MockDeliveryInterface::new();
		mock.expect_get_allowance().times(2).returning(move |_, _, _| {
			if read_approved.load(Ordering::SeqCst) {
				Ok(U256::MAX)
			} else {
				Ok(U256::from(500_000u64))
			}
		});
		mock.expect_get_nonce().times(1).returning(|_| Ok(3));
		mock.expect_send_transaction().times(1).returning(move |tx| {
			approved.store(true, Ordering::SeqCst);
			Ok(TransactionRecord::broadcast(
				TransactionHash(B256::repeat_byte(0x0b)),
				OWNER,
				&tx,
			))
		});
		let manager = manager(mock);
		let required = U256::from(1_000_000u64);

		let first = manager
			.ensure_allowance(CHAIN, TOKEN, OWNER, SPENDER, required, 1)
			.await
			.unwrap();
		assert!(first.raised);
		assert_eq!(first.previous, U256::from(500_000u64));

		let second = manager
			.ensure_allowance(CHAIN, TOKEN, OWNER, SPENDER, required, 1)
			.await
			.unwrap();
		assert!(!second.raised);
		assert!(second.approval.is_none());
		assert_eq!(second.previous, U256::MAX);
	}
}
