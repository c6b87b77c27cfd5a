//! Gasless swap signing.
//!
//! In the gasless flow the account never sends a transaction. The optional
//! token approval and the trade are signed independently and handed back for
//! an external relayer to submit.

use crate::SwapError;
use serde::{Deserialize, Serialize};
use swap_account::AccountService;
use swap_types::{GaslessSwapQuote, SignedPayload};
use tracing::instrument;

/// Signed payloads of a gasless quote, ready for the relayer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaslessSubmission {
	pub chain_id: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub approval: Option<SignedPayload>,
	pub trade: SignedPayload,
}

/// Signs the payloads of gasless quotes.
#[derive(Clone)]
pub struct GaslessSigner {
	account: AccountService,
}

impl GaslessSigner {
	pub fn new(account: AccountService) -> Self {
		Self { account }
	}

	/// Signs the approval, when the quote carries one, and the trade.
	#[instrument(skip_all, fields(chain_id))]
	pub async fn sign(
		&self,
		chain_id: Option<u64>,
		quote: &GaslessSwapQuote,
	) -> Result<GaslessSubmission, SwapError> {
		if !self.account.has_credential() {
			return Err(SwapError::account("sign gasless trade")(
				swap_account::AccountError::NoCredential,
			));
		}

		let trade = quote
			.trade
			.as_ref()
			.ok_or_else(|| SwapError::MalformedQuote("gasless quote has no trade".to_string()))?;
		if let (Some(explicit), Some(signed)) = (chain_id, quote.signed_chain_id()) {
			if explicit != signed {
				return Err(SwapError::MalformedQuote(format!(
					"chain id {} does not match the trade domain chain id {}",
					explicit, signed
				)));
			}
		}
		let chain_id = quote
			.resolve_chain_id(chain_id)
			.ok_or_else(|| SwapError::MalformedQuote("no chain id".to_string()))?;
		tracing::Span::current().record("chain_id", chain_id);

		let approval = match &quote.approval {
			Some(approval) => Some(
				self.account
					.sign_gasless_approval(approval)
					.await
					.map_err(SwapError::account("sign gasless approval"))?,
			),
			None => None,
		};

		let trade = self
			.account
			.sign_gasless_trade(trade)
			.await
			.map_err(SwapError::account("sign gasless trade"))?;

		tracing::info!(
			chain_id = chain_id,
			primary_type = %trade.eip712.primary_type,
			approval_signed = approval.is_some(),
			"Signed gasless quote"
		);

		Ok(GaslessSubmission {
			chain_id,
			approval,
			trade,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ErrorKind;
	use serde_json::json;
	use swap_types::{Quote, SecretString};

	const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn signer() -> GaslessSigner {
		GaslessSigner::new(
			AccountService::from_private_key(Some(&SecretString::from(ANVIL_KEY))).unwrap(),
		)
	}

	fn trade() -> serde_json::Value {
		json!({
			"type": "settler_metatransaction",
			"hash": "0x4f0e4b8c5a3d5e2b1f7c9d8e6a4b2c0d1e3f5a7b9c8d6e4f2a0b1c3d5e7f9a8b",
			"eip712": {
				"types": {
					"EIP712Domain": [
						{ "name": "name", "type": "string" },
						{ "name": "chainId", "type": "uint256" },
						{ "name": "verifyingContract", "type": "address" }
					],
					"MetaTransaction": [
						{ "name": "operator", "type": "address" },
						{ "name": "nonce", "type": "uint256" }
					],
					"Trade": [
						{ "name": "recipient", "type": "address" },
						{ "name": "buyToken", "type": "address" },
						{ "name": "minAmountOut", "type": "uint256" },
						{ "name": "permitted", "type": "TokenPermissions" }
					],
					"TokenPermissions": [
						{ "name": "token", "type": "address" },
						{ "name": "amount", "type": "uint256" }
					]
				},
				"domain": {
					"name": "Settler",
					"chainId": 8453,
					"verifyingContract": "0x0000000000005e88410ccdfade4a5efae4b49562"
				},
				"message": {
					"recipient": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
					"buyToken": "0x4200000000000000000000000000000000000006",
					"minAmountOut": "297501468237512",
					"permitted": {
						"token": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913",
						"amount": "1000000"
					}
				},
				"primaryType": "Trade"
			}
		})
	}

	fn approval() -> serde_json::Value {
		json!({
			"type": "permit",
			"hash": "0x11",
			"eip712": {
				"types": {
					"Permit": [
						{ "name": "owner", "type": "address" },
						{ "name": "spender", "type": "address" },
						{ "name": "value", "type": "uint256" },
						{ "name": "nonce", "type": "uint256" },
						{ "name": "deadline", "type": "uint256" }
					]
				},
				"domain": {
					"name": "USD Coin",
					"version": "2",
					"chainId": 8453,
					"verifyingContract": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
				},
				"message": {
					"owner": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
					"spender": "0x000000000022d473030f116ddee9f6b43ac78ba3",
					"value": "1000000",
					"nonce": "0",
					"deadline": "1733763572"
				},
				"primaryType": "Permit"
			}
		})
	}

	fn gasless(value: serde_json::Value) -> GaslessSwapQuote {
		match Quote::from_value(value).unwrap() {
			Quote::Gasless(quote) => quote,
			Quote::Direct(_) => panic!("expected gasless quote"),
		}
	}

	#[tokio::test]
	async fn test_trade_only() {
		let quote = gasless(json!({ "approval": null, "trade": trade() }));
		let submission = signer().sign(None, &quote).await.unwrap();

		assert_eq!(submission.chain_id, 8453);
		assert!(submission.approval.is_none());
		assert_eq!(submission.trade.eip712.primary_type, "Trade");
		assert_eq!(submission.trade.kind.as_deref(), Some("settler_metatransaction"));

		let value = serde_json::to_value(&submission).unwrap();
		assert!(value.get("approval").is_none());
		assert_eq!(value["chainId"], json!(8453));
		assert_eq!(value["trade"]["type"], json!("settler_metatransaction"));
		assert_eq!(
			value["trade"]["signature"].as_str().unwrap().len(),
			2 + 65 * 2
		);
	}

	#[tokio::test]
	async fn test_approval_and_trade_signed_independently() {
		let quote = gasless(json!({
			"chainId": 8453,
			"approval": approval(),
			"trade": trade()
		}));
		let submission = signer().sign(None, &quote).await.unwrap();

		let approval = submission.approval.unwrap();
		assert_eq!(approval.eip712.primary_type, "Permit");
		assert_ne!(approval.signature, submission.trade.signature);

		// Signing the trade alone yields the same trade signature
		let alone = gasless(json!({ "trade": trade() }));
		let trade_only = signer().sign(None, &alone).await.unwrap();
		assert_eq!(trade_only.trade.signature, submission.trade.signature);
	}

	#[tokio::test]
	async fn test_trade_domain_chain_wins() {
		let quote = gasless(json!({ "chainId": 1, "trade": trade() }));
		assert_eq!(signer().sign(None, &quote).await.unwrap().chain_id, 8453);
		assert_eq!(signer().sign(Some(8453), &quote).await.unwrap().chain_id, 8453);
	}

	#[tokio::test]
	async fn test_explicit_chain_must_match_trade_domain() {
		let quote = gasless(json!({ "trade": trade() }));
		let err = signer().sign(Some(10), &quote).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::MalformedQuote);
		assert!(err.to_string().contains("8453"));
	}

	#[tokio::test]
	async fn test_missing_trade() {
		let quote = GaslessSwapQuote {
			chain_id: Some(8453),
			approval: None,
			trade: None,
		};
		let err = signer().sign(None, &quote).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::MalformedQuote);
	}

	#[tokio::test]
	async fn test_trade_without_payload() {
		let quote = gasless(json!({
			"chainId": 8453,
			"trade": { "type": "settler_metatransaction" }
		}));
		let err = signer().sign(None, &quote).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::MalformedPayload);
		assert!(err.to_string().starts_with("Failed to sign gasless trade"));
	}

	#[tokio::test]
	async fn test_no_credential() {
		let quote = gasless(json!({ "trade": trade() }));
		let err = GaslessSigner::new(AccountService::without_credential())
			.sign(None, &quote)
			.await
			.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NoCredential);
		assert_eq!(
			err.to_string(),
			"Failed to sign gasless trade: No private key configured"
		);
	}
}
