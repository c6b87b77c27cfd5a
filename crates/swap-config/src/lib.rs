//! Configuration module for the swap pipeline.
//!
//! Configuration is loaded from TOML, with `${VAR}` and `${VAR:-default}`
//! references resolved from the environment before parsing, and validated
//! before it is handed to the pipeline.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["file1.toml", "file2.toml"]` to include other config files
//! - Each top-level section must be unique across all files (no duplicates allowed)

mod loader;

pub use loader::ConfigLoader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use swap_types::{
	default_networks, networks::deserialize_networks, without_0x_prefix, NetworksConfig,
	RpcEndpoints, SecretString, DEFAULT_CONFIRMATION_TIMEOUT_MS,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, not the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the swap pipeline.
///
/// Every section is optional in the file; an empty document yields a
/// configuration without a credential that serves the built-in networks.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
	/// The signing credential.
	#[serde(default)]
	pub signer: SignerConfig,
	/// RPC provider settings.
	#[serde(default)]
	pub rpc: RpcConfig,
	/// Per-chain overrides and additional chains, keyed by chain id.
	#[serde(default, deserialize_with = "deserialize_networks")]
	pub networks: NetworksConfig,
	/// Confirmation wait defaults.
	#[serde(default)]
	pub confirmation: ConfirmationConfig,
	/// Approval transaction settings.
	#[serde(default)]
	pub allowance: AllowanceConfig,
}

/// The single signing credential of the process.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SignerConfig {
	/// Hex-encoded secp256k1 private key. Absent or empty means no credential.
	#[serde(default)]
	pub private_key: Option<SecretString>,
}

/// RPC provider settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RpcConfig {
	/// Alchemy API key. When set, chains with an Alchemy slug prefer Alchemy.
	#[serde(default)]
	pub alchemy_api_key: Option<SecretString>,
	/// Whether the built-in public networks are served.
	#[serde(default = "default_include_default_networks")]
	pub include_default_networks: bool,
}

impl Default for RpcConfig {
	fn default() -> Self {
		Self {
			alchemy_api_key: None,
			include_default_networks: default_include_default_networks(),
		}
	}
}

fn default_include_default_networks() -> bool {
	true
}

/// Confirmation wait defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmationConfig {
	/// Blocks required on top of and including the inclusion block.
	#[serde(default = "default_confirmations")]
	pub confirmations: u64,
	/// Maximum time to wait for the confirmations, in milliseconds.
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	/// Delay between receipt polls, in milliseconds.
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
}

impl ConfirmationConfig {
	pub fn timeout(&self) -> Duration {
		Duration::from_millis(self.timeout_ms)
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}
}

impl Default for ConfirmationConfig {
	fn default() -> Self {
		Self {
			confirmations: default_confirmations(),
			timeout_ms: default_timeout_ms(),
			poll_interval_ms: default_poll_interval_ms(),
		}
	}
}

fn default_confirmations() -> u64 {
	1
}

fn default_timeout_ms() -> u64 {
	DEFAULT_CONFIRMATION_TIMEOUT_MS
}

fn default_poll_interval_ms() -> u64 {
	2_000
}

/// Approval transaction settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AllowanceConfig {
	/// Gas limit of ERC-20 approval transactions.
	#[serde(default = "default_approval_gas_limit")]
	pub approval_gas_limit: u64,
}

impl Default for AllowanceConfig {
	fn default() -> Self {
		Self {
			approval_gas_limit: default_approval_gas_limit(),
		}
	}
}

fn default_approval_gas_limit() -> u64 {
	100_000
}

/// A chain the pipeline can reach, with its endpoints resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNetwork {
	pub chain_id: u64,
	pub endpoints: RpcEndpoints,
	pub legacy_transactions: bool,
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = input.to_string();
	let mut replacements = Vec::new();

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let var_name = var_name.as_str();
		let default_value = cap.get(2).map(|m| m.as_str());

		let value = match std::env::var(var_name) {
			Ok(v) => v,
			Err(_) => match default_value {
				Some(default) => default.to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name
					)))
				},
			},
		};

		replacements.push((full_match.start(), full_match.end(), value));
	}

	// Apply replacements in reverse order to maintain positions
	for (start, end, value) in replacements.iter().rev() {
		result.replace_range(start..end, value);
	}

	Ok(result)
}

impl Config {
	/// Loads configuration from a file, following `include` directives.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = loader::ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// The configured credential, if any. A blank key counts as absent.
	pub fn credential(&self) -> Option<&SecretString> {
		self.signer
			.private_key
			.as_ref()
			.filter(|key| !key.is_blank())
	}

	/// Network configurations after layering explicit entries over the built-in table.
	pub fn merged_networks(&self) -> NetworksConfig {
		let mut merged = if self.rpc.include_default_networks {
			default_networks()
		} else {
			NetworksConfig::new()
		};

		for (chain_id, network) in &self.networks {
			let entry = match merged.get(chain_id) {
				Some(base) => network.clone().merged_over(base),
				None => network.clone(),
			};
			merged.insert(*chain_id, entry);
		}

		merged
	}

	/// Every reachable chain with its preferred and fallback endpoint.
	///
	/// Chains without any usable endpoint are left out.
	pub fn effective_networks(&self) -> BTreeMap<u64, ResolvedNetwork> {
		let alchemy_api_key = self.rpc.alchemy_api_key.as_ref();

		self.merged_networks()
			.into_iter()
			.filter_map(|(chain_id, network)| {
				let endpoints = network.resolve_endpoints(alchemy_api_key)?;
				Some((
					chain_id,
					ResolvedNetwork {
						chain_id,
						endpoints,
						legacy_transactions: network.legacy_transactions,
					},
				))
			})
			.collect()
	}

	/// Validates the configuration.
	///
	/// - The private key, when present and non-empty, is 32 bytes of hex
	/// - Every explicitly configured network can be reached
	/// - At least one network is available
	/// - Confirmation and allowance settings are within bounds
	fn validate(&self) -> Result<(), ConfigError> {
		if let Some(key) = self.credential() {
			key.with_exposed(validate_private_key)?;
		}

		let alchemy_api_key = self.rpc.alchemy_api_key.as_ref();
		let merged = self.merged_networks();
		for chain_id in self.networks.keys() {
			let reachable = merged
				.get(chain_id)
				.and_then(|network| network.resolve_endpoints(alchemy_api_key))
				.is_some();
			if !reachable {
				return Err(ConfigError::Validation(format!(
					"Network {} has no usable RPC endpoint",
					chain_id
				)));
			}
		}
		if merged.is_empty() {
			return Err(ConfigError::Validation(
				"No networks configured and default networks are disabled".into(),
			));
		}

		if self.confirmation.confirmations == 0 {
			return Err(ConfigError::Validation(
				"confirmations must be at least 1".into(),
			));
		}
		if self.confirmation.confirmations > 100 {
			return Err(ConfigError::Validation(
				"confirmations cannot exceed 100".into(),
			));
		}
		if self.confirmation.timeout_ms == 0 {
			return Err(ConfigError::Validation(
				"Confirmation timeout_ms must be greater than 0".into(),
			));
		}
		if self.confirmation.poll_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"Confirmation poll_interval_ms must be greater than 0".into(),
			));
		}

		if self.allowance.approval_gas_limit == 0 {
			return Err(ConfigError::Validation(
				"approval_gas_limit must be greater than 0".into(),
			));
		}

		Ok(())
	}
}

fn validate_private_key(key: &str) -> Result<(), ConfigError> {
	let digits = without_0x_prefix(key.trim());
	if digits.len() != 64 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
		return Err(ConfigError::Validation(
			"Signer private_key must be 32 bytes of hex".into(),
		));
	}
	Ok(())
}

/// Parses a TOML document, resolving environment variables and validating the result.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}

/// Builds a validated configuration for tests, serving one local chain.
#[cfg(any(test, feature = "testing"))]
pub fn local_test_config(chain_id: u64, rpc_url: &str, private_key: Option<&str>) -> Config {
	let mut networks = NetworksConfig::new();
	networks.insert(
		chain_id,
		swap_types::NetworkConfig {
			rpc_url: Some(rpc_url.to_string()),
			fallback_rpc_url: None,
			alchemy_network: None,
			legacy_transactions: true,
		},
	);

	Config {
		signer: SignerConfig {
			private_key: private_key.map(SecretString::from),
		},
		rpc: RpcConfig {
			alchemy_api_key: None,
			include_default_networks: false,
		},
		networks,
		confirmation: ConfirmationConfig::default(),
		allowance: AllowanceConfig::default(),
	}
}
