//! Transaction delivery types.
//!
//! Covers a transaction from the moment it is assembled from a quote, through
//! broadcast, to the receipt observed once it is mined.

use crate::utils::with_0x_prefix;
use alloy_primitives::{hex, Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Blockchain transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionHash(pub B256);

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&with_0x_prefix(&hex::encode(self.0)))
	}
}

impl FromStr for TransactionHash {
	type Err = hex::FromHexError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		B256::from_str(s.trim()).map(Self)
	}
}

impl From<B256> for TransactionHash {
	fn from(hash: B256) -> Self {
		Self(hash)
	}
}

/// Envelope format of an assembled transaction.
///
/// Only the legacy (type-0) format is produced: the quote supplies a single gas
/// price scalar and it is used as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionFormat {
	#[default]
	Legacy,
}

/// A fully specified transaction, ready to be signed and broadcast.
///
/// Built fresh for every submission attempt and never reused across chains or
/// nonces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledTransaction {
	pub to: Address,
	pub data: Bytes,
	pub value: U256,
	pub gas_limit: u64,
	pub gas_price: u128,
	pub nonce: u64,
	pub chain_id: u64,
	pub tx_type: TransactionFormat,
}

/// A log emitted by a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub log_index: Option<u64>,
}

/// Receipt details attached to a record once the transaction is mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDetails {
	pub block_number: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub block_hash: Option<B256>,
	/// Whether the transaction executed successfully.
	pub success: bool,
	pub gas_used: u64,
	pub effective_gas_price: u128,
	pub logs: Vec<LogRecord>,
	/// Blocks on top of and including the inclusion block when observed.
	pub confirmations: u64,
}

/// A broadcast transaction, optionally with its receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
	pub hash: TransactionHash,
	pub from: Address,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub to: Option<Address>,
	pub value: U256,
	pub gas_limit: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub gas_price: Option<u128>,
	pub nonce: u64,
	pub chain_id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub receipt: Option<ReceiptDetails>,
}

impl TransactionRecord {
	/// Record of a transaction that was just broadcast, echoing the assembled fields.
	pub fn broadcast(hash: TransactionHash, from: Address, tx: &AssembledTransaction) -> Self {
		Self {
			hash,
			from,
			to: Some(tx.to),
			value: tx.value,
			gas_limit: tx.gas_limit,
			gas_price: Some(tx.gas_price),
			nonce: tx.nonce,
			chain_id: tx.chain_id,
			receipt: None,
		}
	}
}

/// Coarse transaction status reported by a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
	/// The node does not know the transaction.
	NotFound,
	/// Known but not yet mined.
	Pending,
	/// Mined and executed successfully.
	Success,
	/// Mined and reverted.
	Failed,
}

impl fmt::Display for TransactionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let label = match self {
			TransactionStatus::NotFound => "not_found",
			TransactionStatus::Pending => "pending",
			TransactionStatus::Success => "success",
			TransactionStatus::Failed => "failed",
		};
		f.write_str(label)
	}
}

/// Result of a status poll: the status plus whatever the node returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
	pub status: TransactionStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub transaction: Option<TransactionRecord>,
}

impl StatusReport {
	pub fn not_found() -> Self {
		Self {
			status: TransactionStatus::NotFound,
			transaction: None,
		}
	}
}
