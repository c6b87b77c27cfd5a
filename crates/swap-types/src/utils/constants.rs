//! Constants shared across the pipeline.

use alloy_primitives::{address, Address, U256};

/// Canonical Permit2 deployment, identical on every supported EVM chain.
///
/// Used as the allowance spender when a quote does not name one explicitly.
pub const PERMIT2_ADDRESS: Address = address!("000000000022D473030F116dDEE9F6B43aC78BA3");

/// Amount approved when an allowance has to be raised.
///
/// A maximal approval is granted instead of the exact requirement so that later
/// swaps of the same token do not need another approval transaction.
pub const MAX_APPROVAL_AMOUNT: U256 = U256::MAX;

/// Default upper bound for a confirmation wait, in milliseconds (5 minutes).
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 300_000;
