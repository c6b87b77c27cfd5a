//! Type-graph reduction and hashing of EIP-712 payloads.
//!
//! Quote providers ship more type definitions than a message needs, and the
//! `EIP712Domain` definition alongside them. Only the types reachable from the
//! primary type take part in the struct hash, so the graph is reduced first.

use crate::AccountError;
use alloy_dyn_abi::TypedData;
use alloy_primitives::{B256, U256};
use alloy_sol_types::Eip712Domain;
use std::collections::BTreeSet;
use swap_types::{Eip712Types, TypedDataDomain, TypedDataPayload, EIP712_DOMAIN_TYPE};

/// Strips every array suffix: `Order[]` and `Order[3][]` both become `Order`.
fn base_type(field_type: &str) -> &str {
	match field_type.find('[') {
		Some(index) => &field_type[..index],
		None => field_type,
	}
}

fn is_sized(suffix: &str, valid: impl Fn(u16) -> bool) -> bool {
	suffix.is_empty() || suffix.parse::<u16>().is_ok_and(valid)
}

/// Whether `ty` is an atomic or dynamic Solidity type rather than a struct.
fn is_primitive(ty: &str) -> bool {
	match ty {
		"bool" | "address" | "string" | "bytes" => true,
		_ => {
			if let Some(size) = ty.strip_prefix("bytes") {
				!size.is_empty() && is_sized(size, |n| (1..=32).contains(&n))
			} else if let Some(bits) = ty.strip_prefix("uint").or_else(|| ty.strip_prefix("int")) {
				is_sized(bits, |n| n > 0 && n <= 256 && n % 8 == 0)
			} else {
				false
			}
		},
	}
}

/// Computes the set of struct types reachable from `primary_type`.
///
/// Each type is visited once, so cyclic references terminate. `EIP712Domain`
/// is never part of the result, even when a field names it.
pub fn minimal_type_closure(
	types: &Eip712Types,
	primary_type: &str,
) -> Result<Eip712Types, AccountError> {
	if primary_type == EIP712_DOMAIN_TYPE {
		return Err(AccountError::MalformedPayload(format!(
			"primary type cannot be {}",
			EIP712_DOMAIN_TYPE
		)));
	}
	if !types.contains_key(primary_type) {
		return Err(AccountError::MalformedPayload(format!(
			"primary type '{}' is not defined",
			primary_type
		)));
	}

	let mut visited = BTreeSet::new();
	let mut worklist = vec![primary_type.to_string()];
	let mut closure = Eip712Types::new();

	while let Some(type_name) = worklist.pop() {
		if !visited.insert(type_name.clone()) {
			continue;
		}

		let fields = types.get(&type_name).ok_or_else(|| {
			AccountError::MalformedPayload(format!("type '{}' is referenced but not defined", type_name))
		})?;

		for field in fields {
			let referenced = base_type(&field.field_type);
			if is_primitive(referenced)
				|| referenced == EIP712_DOMAIN_TYPE
				|| visited.contains(referenced)
			{
				continue;
			}
			worklist.push(referenced.to_string());
		}

		closure.insert(type_name, fields.clone());
	}

	Ok(closure)
}

fn domain_of(domain: &TypedDataDomain) -> Eip712Domain {
	Eip712Domain::new(
		domain.name.clone().map(Into::into),
		domain.version.clone().map(Into::into),
		domain.chain_id.map(U256::from),
		domain.verifying_contract,
		domain.salt,
	)
}

/// EIP-712 signing hash of `payload`, computed over its domain and `types`.
///
/// `types` must already be reduced with [`minimal_type_closure`].
pub fn signing_hash(payload: &TypedDataPayload, types: &Eip712Types) -> Result<B256, AccountError> {
	let document = serde_json::json!({
		"domain": domain_of(&payload.domain),
		"types": types,
		"primaryType": payload.primary_type,
		"message": payload.message,
	});

	let typed_data: TypedData = serde_json::from_value(document)
		.map_err(|e| AccountError::MalformedPayload(e.to_string()))?;

	typed_data
		.eip712_signing_hash()
		.map_err(|e| AccountError::MalformedPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use swap_types::TypeField;

	fn types(entries: &[(&str, &[(&str, &str)])]) -> Eip712Types {
		entries
			.iter()
			.map(|(name, fields)| {
				(
					name.to_string(),
					fields
						.iter()
						.map(|(field, ty)| TypeField::new(*field, *ty))
						.collect(),
				)
			})
			.collect()
	}

	#[test]
	fn test_primitive_detection() {
		for ty in ["bool", "address", "string", "bytes", "bytes1", "bytes32", "uint", "uint8", "uint256", "int128"] {
			assert!(is_primitive(ty), "{ty} should be primitive");
		}
		for ty in ["bytes0", "bytes33", "uint7", "uint264", "int0", "Order", "TokenPermissions", "uintx"] {
			assert!(!is_primitive(ty), "{ty} should not be primitive");
		}
	}

	#[test]
	fn test_array_suffixes_are_stripped() {
		assert_eq!(base_type("Order[]"), "Order");
		assert_eq!(base_type("Order[3][]"), "Order");
		assert_eq!(base_type("uint256[2]"), "uint256");
		assert_eq!(base_type("address"), "address");
	}

	#[test]
	fn test_closure_excludes_domain_and_unrelated_types() {
		let all = types(&[
			("EIP712Domain", &[("name", "string"), ("chainId", "uint256")]),
			("PermitTransferFrom", &[("permitted", "TokenPermissions"), ("spender", "address"), ("nonce", "uint256")]),
			("TokenPermissions", &[("token", "address"), ("amount", "uint256")]),
			("Unrelated", &[("x", "uint8")]),
		]);

		let closure = minimal_type_closure(&all, "PermitTransferFrom").unwrap();
		assert_eq!(
			closure.keys().collect::<Vec<_>>(),
			vec!["PermitTransferFrom", "TokenPermissions"]
		);
	}

	#[test]
	fn test_closure_follows_arrays_and_cycles() {
		let all = types(&[
			("Batch", &[("orders", "Order[2][]"), ("domain", "EIP712Domain")]),
			("Order", &[("parent", "Batch"), ("legs", "Leg[]")]),
			("Leg", &[("next", "Leg"), ("amount", "uint256")]),
		]);

		let closure = minimal_type_closure(&all, "Batch").unwrap();
		assert_eq!(closure.len(), 3);
		assert_eq!(closure["Order"], all["Order"]);
	}

	#[test]
	fn test_closure_is_deterministic() {
		let first = types(&[
			("A", &[("b", "B"), ("c", "C")]),
			("B", &[("c", "C")]),
			("C", &[("v", "uint256")]),
		]);
		// Same graph, different construction order
		let second = types(&[
			("C", &[("v", "uint256")]),
			("B", &[("c", "C")]),
			("A", &[("b", "B"), ("c", "C")]),
		]);

		assert_eq!(
			minimal_type_closure(&first, "A").unwrap(),
			minimal_type_closure(&second, "A").unwrap()
		);
	}

	#[test]
	fn test_missing_types_are_malformed() {
		let all = types(&[("Trade", &[("order", "Order")])]);
		assert!(matches!(
			minimal_type_closure(&all, "Trade"),
			Err(AccountError::MalformedPayload(_))
		));
		assert!(matches!(
			minimal_type_closure(&all, "Absent"),
			Err(AccountError::MalformedPayload(_))
		));
		assert!(matches!(
			minimal_type_closure(&all, "EIP712Domain"),
			Err(AccountError::MalformedPayload(_))
		));
	}

	#[test]
	fn test_domain_definition_does_not_change_hash() {
		let message = serde_json::json!({ "token": "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913", "amount": "1000000" });
		let domain = TypedDataDomain {
			name: Some("Permit2".to_string()),
			chain_id: Some(8453),
			verifying_contract: Some(swap_types::utils::PERMIT2_ADDRESS),
			..Default::default()
		};
		let with_domain = TypedDataPayload {
			domain: domain.clone(),
			types: types(&[
				("EIP712Domain", &[("name", "string"), ("chainId", "uint256"), ("verifyingContract", "address")]),
				("TokenPermissions", &[("token", "address"), ("amount", "uint256")]),
			]),
			primary_type: "TokenPermissions".to_string(),
			message: message.clone(),
		};
		let without_domain = TypedDataPayload {
			types: types(&[("TokenPermissions", &[("token", "address"), ("amount", "uint256")])]),
			..with_domain.clone()
		};

		let hash = |payload: &TypedDataPayload| {
			let closure = minimal_type_closure(&payload.types, &payload.primary_type).unwrap();
			signing_hash(payload, &closure).unwrap()
		};
		assert_eq!(hash(&with_domain), hash(&without_domain));

		// The domain separator does depend on the domain values
		let other_chain = TypedDataPayload {
			domain: TypedDataDomain {
				chain_id: Some(1),
				..domain
			},
			..without_domain.clone()
		};
		assert_ne!(hash(&other_chain), hash(&without_domain));
	}

	#[test]
	fn test_message_not_matching_types_is_malformed() {
		let payload = TypedDataPayload {
			domain: TypedDataDomain::default(),
			types: types(&[("Trade", &[("amount", "uint256")])]),
			primary_type: "Trade".to_string(),
			message: serde_json::json!({ "amount": "not a number" }),
		};
		let closure = minimal_type_closure(&payload.types, "Trade").unwrap();
		assert!(matches!(
			signing_hash(&payload, &closure),
			Err(AccountError::MalformedPayload(_))
		));
	}
}
