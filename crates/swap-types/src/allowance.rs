//! ERC-20 allowance snapshots and the outcome of raising one.

use crate::delivery::TransactionRecord;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Allowance of `spender` over `owner`'s `token`, compared against a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceState {
	pub owner: Address,
	pub spender: Address,
	pub token: Address,
	pub current: U256,
	pub required: U256,
}

impl AllowanceState {
	pub fn is_sufficient(&self) -> bool {
		self.current >= self.required
	}
}

/// What happened when an allowance was ensured.
///
/// `raised` is false when the existing allowance already covered the
/// requirement, in which case no transaction was sent and `approval` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowanceOutcome {
	pub raised: bool,
	pub previous: U256,
	pub required: U256,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub approval: Option<TransactionRecord>,
}
