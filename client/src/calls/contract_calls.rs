use alloy_primitives::{Address, Bytes, U256};

use super::abi::{encode_call, Arg};

/// Deployment addresses of the three contracts this client talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractAddresses {
    pub staking: Address,
    pub token: Address,
    pub nft: Address,
}

/// A read-only `eth_call`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRequest {
    pub to: Address,
    pub data: Bytes,
}

/// A state-changing call handed to the wallet provider for signing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

// --- token reads ---

pub fn balance_of_call(contracts: &ContractAddresses, owner: Address) -> CallRequest {
    CallRequest {
        to: contracts.token,
        data: encode_call("balanceOf(address)", &[Arg::Address(owner)]),
    }
}

/// Token balance held by the staking contract: the reward pool.
pub fn pool_total_call(contracts: &ContractAddresses) -> CallRequest {
    balance_of_call(contracts, contracts.staking)
}

pub fn allowance_call(contracts: &ContractAddresses, owner: Address) -> CallRequest {
    CallRequest {
        to: contracts.token,
        data: encode_call(
            "allowance(address,address)",
            &[Arg::Address(owner), Arg::Address(contracts.staking)],
        ),
    }
}

// --- staking reads ---

pub fn user_info_call(contracts: &ContractAddresses, user: Address) -> CallRequest {
    CallRequest {
        to: contracts.staking,
        data: encode_call("userInfo(address)", &[Arg::Address(user)]),
    }
}

pub fn pending_rewards_call(contracts: &ContractAddresses, user: Address) -> CallRequest {
    CallRequest {
        to: contracts.staking,
        data: encode_call("pendingRewards(address)", &[Arg::Address(user)]),
    }
}

// --- nft reads ---

pub fn sale_active_call(contracts: &ContractAddresses) -> CallRequest {
    CallRequest {
        to: contracts.nft,
        data: encode_call("saleActive()", &[]),
    }
}

pub fn owner_of_call(contracts: &ContractAddresses, token_id: u64) -> CallRequest {
    CallRequest {
        to: contracts.nft,
        data: encode_call("ownerOf(uint256)", &[Arg::Uint(U256::from(token_id))]),
    }
}

pub fn token_price_call(contracts: &ContractAddresses, token_id: u64) -> CallRequest {
    CallRequest {
        to: contracts.nft,
        data: encode_call("tokenPrice(uint256)", &[Arg::Uint(U256::from(token_id))]),
    }
}

pub fn mint_price_call(contracts: &ContractAddresses) -> CallRequest {
    CallRequest {
        to: contracts.nft,
        data: encode_call("mintPrice()", &[]),
    }
}

// --- writes ---

/// Approve the staking contract for exactly `amount`, never an unbounded allowance.
pub fn approve_call(contracts: &ContractAddresses, amount: U256) -> TxRequest {
    TxRequest {
        to: contracts.token,
        data: encode_call(
            "approve(address,uint256)",
            &[Arg::Address(contracts.staking), Arg::Uint(amount)],
        ),
        value: U256::ZERO,
    }
}

pub fn stake_call(contracts: &ContractAddresses, amount: U256) -> TxRequest {
    TxRequest {
        to: contracts.staking,
        data: encode_call("stake(uint256)", &[Arg::Uint(amount)]),
        value: U256::ZERO,
    }
}

pub fn unstake_call(contracts: &ContractAddresses, amount: U256) -> TxRequest {
    TxRequest {
        to: contracts.staking,
        data: encode_call("unstake(uint256)", &[Arg::Uint(amount)]),
        value: U256::ZERO,
    }
}

pub fn claim_rewards_call(contracts: &ContractAddresses) -> TxRequest {
    TxRequest {
        to: contracts.staking,
        data: encode_call("claimRewards()", &[]),
        value: U256::ZERO,
    }
}

pub fn mint_call(contracts: &ContractAddresses, token_id: u64, price: U256) -> TxRequest {
    TxRequest {
        to: contracts.nft,
        data: encode_call("mint(uint256)", &[Arg::Uint(U256::from(token_id))]),
        value: price,
    }
}
