//! Network configuration types.
//!
//! Each supported chain maps to the RPC endpoints used to reach it. Endpoint
//! selection is static: it is resolved once when the chain registry is built
//! and not revisited per call.

use crate::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Configuration for a single blockchain network.
///
/// # Fields
///
/// * `rpc_url` - Explicit preferred endpoint, overrides everything else
/// * `fallback_rpc_url` - Endpoint used when the preferred one is unavailable
/// * `alchemy_network` - Alchemy network slug (e.g. "base-mainnet"), used when an
///   Alchemy API key is configured and no explicit `rpc_url` is set
/// * `legacy_transactions` - Whether the chain accepts type-0 transactions
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NetworkConfig {
	#[serde(default)]
	pub rpc_url: Option<String>,
	#[serde(default)]
	pub fallback_rpc_url: Option<String>,
	#[serde(default)]
	pub alchemy_network: Option<String>,
	#[serde(default = "default_legacy_transactions")]
	pub legacy_transactions: bool,
}

fn default_legacy_transactions() -> bool {
	true
}

/// Preferred and fallback endpoint of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoints {
	pub preferred: String,
	pub fallback: Option<String>,
}

impl NetworkConfig {
	/// Resolves the endpoints of this network.
	///
	/// Candidates in order of preference: the explicit `rpc_url`, the Alchemy
	/// endpoint (only with an API key and a known slug), the `fallback_rpc_url`.
	/// The first becomes the preferred endpoint, the next distinct one the
	/// fallback. Returns `None` when the network has no usable endpoint.
	pub fn resolve_endpoints(&self, alchemy_api_key: Option<&SecretString>) -> Option<RpcEndpoints> {
		let alchemy = match (alchemy_api_key, self.alchemy_network.as_deref()) {
			(Some(key), Some(slug)) if !key.is_blank() => Some(key.with_exposed(|key| {
				format!("https://{}.g.alchemy.com/v2/{}", slug, key.trim())
			})),
			_ => None,
		};

		let mut candidates = [self.rpc_url.clone(), alchemy, self.fallback_rpc_url.clone()]
			.into_iter()
			.flatten()
			.filter(|url| !url.trim().is_empty());

		let preferred = candidates.next()?;
		let fallback = candidates.find(|url| *url != preferred);

		Some(RpcEndpoints {
			preferred,
			fallback,
		})
	}

	/// Layers an explicitly configured network over a built-in default.
	///
	/// Explicit values win; missing ones are taken from `base`.
	pub fn merged_over(self, base: &NetworkConfig) -> NetworkConfig {
		NetworkConfig {
			rpc_url: self.rpc_url.or_else(|| base.rpc_url.clone()),
			fallback_rpc_url: self
				.fallback_rpc_url
				.or_else(|| base.fallback_rpc_url.clone()),
			alchemy_network: self
				.alchemy_network
				.or_else(|| base.alchemy_network.clone()),
			legacy_transactions: self.legacy_transactions,
		}
	}
}

/// Networks configuration mapping chain IDs to their configurations.
pub type NetworksConfig = HashMap<u64, NetworkConfig>;

/// Deserializes network configurations keyed by chain id.
///
/// TOML table keys are strings, so chain ids arrive as `"8453"` and are parsed
/// into `u64` here.
pub fn deserialize_networks<'de, D>(deserializer: D) -> Result<NetworksConfig, D::Error>
where
	D: Deserializer<'de>,
{
	let string_map: HashMap<String, NetworkConfig> = HashMap::deserialize(deserializer)?;
	let mut result = HashMap::new();

	for (key, value) in string_map {
		let chain_id = key
			.parse::<u64>()
			.map_err(|e| serde::de::Error::custom(format!("Invalid chain_id '{}': {}", key, e)))?;
		result.insert(chain_id, value);
	}

	Ok(result)
}

/// Built-in public endpoint of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultNetwork {
	pub chain_id: u64,
	pub name: &'static str,
	pub public_rpc_url: &'static str,
	pub alchemy_network: Option<&'static str>,
}

/// Chains available without any network configuration.
pub const DEFAULT_NETWORKS: &[DefaultNetwork] = &[
	DefaultNetwork {
		chain_id: 1,
		name: "Ethereum",
		public_rpc_url: "https://rpc.flashbots.net",
		alchemy_network: None,
	},
	DefaultNetwork {
		chain_id: 10,
		name: "Optimism",
		public_rpc_url: "https://mainnet.optimism.io",
		alchemy_network: Some("opt-mainnet"),
	},
	DefaultNetwork {
		chain_id: 56,
		name: "BSC",
		public_rpc_url: "https://bsc-dataseed.binance.org",
		alchemy_network: Some("bnb-mainnet"),
	},
	DefaultNetwork {
		chain_id: 130,
		name: "Unichain",
		public_rpc_url: "https://rpc.unichain.org",
		alchemy_network: None,
	},
	DefaultNetwork {
		chain_id: 137,
		name: "Polygon",
		public_rpc_url: "https://polygon.llamarpc.com",
		alchemy_network: Some("polygon-mainnet"),
	},
	DefaultNetwork {
		chain_id: 480,
		name: "Worldchain",
		public_rpc_url: "https://worldchain-mainnet.g.alchemy.com/public",
		alchemy_network: Some("worldchain-mainnet"),
	},
	DefaultNetwork {
		chain_id: 5000,
		name: "Mantle",
		public_rpc_url: "https://rpc.mantle.xyz",
		alchemy_network: Some("mantle-mainnet"),
	},
	DefaultNetwork {
		chain_id: 8453,
		name: "Base",
		public_rpc_url: "https://mainnet.base.org",
		alchemy_network: Some("base-mainnet"),
	},
	DefaultNetwork {
		chain_id: 10143,
		name: "Monad Testnet",
		public_rpc_url: "https://testnet1.monad.xyz",
		alchemy_network: Some("monad-testnet"),
	},
	DefaultNetwork {
		chain_id: 34443,
		name: "Mode",
		public_rpc_url: "https://mainnet.mode.network",
		alchemy_network: None,
	},
	DefaultNetwork {
		chain_id: 42161,
		name: "Arbitrum",
		public_rpc_url: "https://arb1.arbitrum.io/rpc",
		alchemy_network: Some("arb-mainnet"),
	},
	DefaultNetwork {
		chain_id: 43114,
		name: "Avalanche",
		public_rpc_url: "https://api.avax.network/ext/bc/C/rpc",
		alchemy_network: Some("avax-mainnet"),
	},
	DefaultNetwork {
		chain_id: 57073,
		name: "Ink",
		public_rpc_url: "https://rpc-gel.inkonchain.com",
		alchemy_network: Some("ink-mainnet"),
	},
	DefaultNetwork {
		chain_id: 59144,
		name: "Linea",
		public_rpc_url: "https://rpc.linea.build",
		alchemy_network: Some("linea-mainnet"),
	},
	DefaultNetwork {
		chain_id: 80094,
		name: "Berachain",
		public_rpc_url: "https://rpc.berachain.com",
		alchemy_network: Some("berachain-mainnet"),
	},
	DefaultNetwork {
		chain_id: 81457,
		name: "Blast",
		public_rpc_url: "https://rpc.blast.io",
		alchemy_network: Some("blast-mainnet"),
	},
	DefaultNetwork {
		chain_id: 534352,
		name: "Scroll",
		public_rpc_url: "https://rpc.scroll.io",
		alchemy_network: Some("scroll-mainnet"),
	},
];

/// The built-in networks as configuration entries.
///
/// The public endpoint is registered as the fallback, so an Alchemy endpoint
/// (when a key is configured) takes precedence over it.
pub fn default_networks() -> NetworksConfig {
	DEFAULT_NETWORKS
		.iter()
		.map(|network| {
			(
				network.chain_id,
				NetworkConfig {
					rpc_url: None,
					fallback_rpc_url: Some(network.public_rpc_url.to_string()),
					alchemy_network: network.alchemy_network.map(str::to_string),
					legacy_transactions: true,
				},
			)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_public_endpoint_without_alchemy_key() {
		let base = &default_networks()[&8453];
		let endpoints = base.resolve_endpoints(None).unwrap();
		assert_eq!(endpoints.preferred, "https://mainnet.base.org");
		assert_eq!(endpoints.fallback, None);

		let blank = SecretString::from("");
		let endpoints = base.resolve_endpoints(Some(&blank)).unwrap();
		assert_eq!(endpoints.preferred, "https://mainnet.base.org");
	}

	#[test]
	fn test_alchemy_endpoint_preferred_with_key() {
		let key = SecretString::from("demo-key");
		let networks = default_networks();

		let endpoints = networks[&42161].resolve_endpoints(Some(&key)).unwrap();
		assert_eq!(
			endpoints.preferred,
			"https://arb-mainnet.g.alchemy.com/v2/demo-key"
		);
		assert_eq!(
			endpoints.fallback.as_deref(),
			Some("https://arb1.arbitrum.io/rpc")
		);

		// Ethereum has no Alchemy slug in the table and keeps its public endpoint.
		let endpoints = networks[&1].resolve_endpoints(Some(&key)).unwrap();
		assert_eq!(endpoints.preferred, "https://rpc.flashbots.net");
	}

	#[test]
	fn test_explicit_rpc_url_wins() {
		let explicit = NetworkConfig {
			rpc_url: Some("http://localhost:8545".to_string()),
			fallback_rpc_url: None,
			alchemy_network: None,
			legacy_transactions: true,
		};
		let merged = explicit.merged_over(&default_networks()[&10]);
		let key = SecretString::from("demo-key");
		let endpoints = merged.resolve_endpoints(Some(&key)).unwrap();
		assert_eq!(endpoints.preferred, "http://localhost:8545");
		assert_eq!(
			endpoints.fallback.as_deref(),
			Some("https://opt-mainnet.g.alchemy.com/v2/demo-key")
		);
	}

	#[test]
	fn test_network_without_endpoint() {
		let empty = NetworkConfig {
			rpc_url: Some("  ".to_string()),
			fallback_rpc_url: None,
			alchemy_network: Some("base-mainnet".to_string()),
			legacy_transactions: true,
		};
		assert_eq!(empty.resolve_endpoints(None), None);
	}

	#[test]
	fn test_default_table_is_complete() {
		let networks = default_networks();
		assert_eq!(networks.len(), DEFAULT_NETWORKS.len());
		assert_eq!(networks.len(), 17);
		assert!(networks.values().all(|n| n.legacy_transactions));
	}
}
