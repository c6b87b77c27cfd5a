//! Utility functions for common type conversions and transformations.
//!
//! This module provides helper functions for converting between different
//! data formats and string formatting commonly used throughout the pipeline.

pub mod constants;
pub mod conversion;
pub mod formatting;

pub use constants::{DEFAULT_CONFIRMATION_TIMEOUT_MS, MAX_APPROVAL_AMOUNT, PERMIT2_ADDRESS};
pub use conversion::{
	deserialize_optional_chain_id, deserialize_optional_numeric, parse_token_amount, parse_u256,
	ConversionError,
};
pub use formatting::{format_token_amount, truncate_id, with_0x_prefix, without_0x_prefix};
