//! Starknet contract calls as accepted by a wallet's multi-call `execute`.

use alloy_primitives::{U256, keccak256};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use super::Felt;

/// One contract invocation inside a multi-call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub contract_address: Felt,
    pub entrypoint: CompactString,
    pub calldata: Vec<Felt>,
}

impl Call {
    /// `approve(spender, amount: u256)` on an ERC-20 style token.
    pub fn approve(token: Felt, spender: Felt, amount: U256) -> Self {
        let [low, high] = uint256_calldata(amount);
        Self {
            contract_address: token,
            entrypoint: CompactString::const_new("approve"),
            calldata: vec![spender, low, high],
        }
    }

    /// `deposit(id, amount: u256)` on the session's deposit contract.
    pub fn deposit(deposit_address: Felt, id: u64, amount: U256) -> Self {
        let [low, high] = uint256_calldata(amount);
        Self {
            contract_address: deposit_address,
            entrypoint: CompactString::const_new("deposit"),
            calldata: vec![Felt::from(id), low, high],
        }
    }

    pub fn selector(&self) -> Felt {
        entry_point_selector(&self.entrypoint)
    }
}

/// Encode a `u256` as its `(low, high)` 128-bit halves.
pub fn uint256_calldata(amount: U256) -> [Felt; 2] {
    let mask = U256::from(u128::MAX);
    let low = u128::try_from(amount & mask).unwrap_or(u128::MAX);
    let high = u128::try_from(amount >> 128usize).unwrap_or(u128::MAX);
    [Felt::from(low), Felt::from(high)]
}

/// Starknet entry point selector: keccak-256 of the name truncated to 250
/// bits.
pub fn entry_point_selector(name: &str) -> Felt {
    let mut hash = keccak256(name.as_bytes()).0;
    hash[0] &= 0x03;
    // Below 2^250, so always inside the field.
    Felt(U256::from_be_bytes(hash))
}
