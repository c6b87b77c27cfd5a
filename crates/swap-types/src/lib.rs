//! Common types module for the swap signing pipeline.
//!
//! This module defines the data model shared by the signer, the chain registry,
//! the allowance manager and the transaction assembler: typed-data payloads,
//! quotes as delivered by the quote provider, assembled transactions and the
//! records produced once they are broadcast.

/// Allowance snapshots and the outcome of raising one.
pub mod allowance;
/// Transaction assembly, broadcast and status types.
pub mod delivery;
/// Network configuration and the built-in endpoint table.
pub mod networks;
/// Quotes as handed over by the quote provider.
pub mod quote;
/// Secret handling for the signing credential.
pub mod secret_string;
/// EIP-712 typed-data payloads and signatures.
pub mod typed_data;
/// Utility functions for conversions and formatting.
pub mod utils;

pub use allowance::*;
pub use delivery::*;
pub use networks::{
	default_networks, DefaultNetwork, NetworkConfig, NetworksConfig, RpcEndpoints,
	DEFAULT_NETWORKS,
};
pub use quote::*;
pub use secret_string::SecretString;
pub use typed_data::*;
pub use utils::{
	format_token_amount, parse_token_amount, parse_u256, truncate_id, with_0x_prefix,
	without_0x_prefix, ConversionError, DEFAULT_CONFIRMATION_TIMEOUT_MS, MAX_APPROVAL_AMOUNT, PERMIT2_ADDRESS,
};

pub use alloy_primitives::{Address, Bytes, B256, U256};
