use std::str::FromStr;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use anyhow::{format_err, Context, Result};
use configparser::ini::Ini;

use crate::amount::parse_ether;
use crate::calls::contract_calls::ContractAddresses;
use crate::nft::{DEFAULT_IMAGE_BASE_URL, DEFAULT_NFT_CONTRACT};

const SECTION: &str = "Global";

#[derive(Clone, Debug, PartialEq)]
pub struct ClientConfig {
    pub http_url: String,
    pub contracts: ContractAddresses,
    /// Wallet account; `None` runs the client disconnected (reads only).
    pub account: Option<Address>,
    pub chain_id: u64,
    pub explorer_url: String,
    pub token_symbol: String,
    pub poll_interval: Duration,
    pub notice_duration: Duration,
    pub receipt_poll: Duration,
    pub rpc_timeout: Duration,
    pub mint_price: U256,
    pub nft_image_base_url: String,
}

pub fn load_cfg(client_config: &str) -> Result<ClientConfig> {
    let mut config = Ini::new();
    config
        .load(client_config)
        .map_err(|e| format_err!("failed to load {}: {}", client_config, e))?;
    from_ini(&config)
}

pub fn parse_cfg(contents: &str) -> Result<ClientConfig> {
    let mut config = Ini::new();
    config
        .read(contents.to_string())
        .map_err(|e| format_err!("malformed config: {}", e))?;
    from_ini(&config)
}

fn from_ini(config: &Ini) -> Result<ClientConfig> {
    let http_url = required(config, "http_url")?;
    let staking = address(&required(config, "staking_contract")?, "staking_contract")?;
    let token = address(&required(config, "token_contract")?, "token_contract")?;
    let nft = address(
        &optional(config, "nft_contract").unwrap_or_else(|| DEFAULT_NFT_CONTRACT.to_string()),
        "nft_contract",
    )?;
    let account = optional(config, "account")
        .map(|raw| address(&raw, "account"))
        .transpose()?;

    let mint_price = match optional(config, "mint_price") {
        Some(raw) => parse_ether(&raw).with_context(|| format!("mint_price {raw:?}"))?,
        None => parse_ether("0.01")?,
    };

    Ok(ClientConfig {
        http_url,
        contracts: ContractAddresses {
            staking,
            token,
            nft,
        },
        account,
        chain_id: number(config, "chain_id", 137)?,
        explorer_url: optional(config, "explorer_url")
            .unwrap_or_else(|| "https://polygonscan.com".to_string()),
        token_symbol: optional(config, "token_symbol").unwrap_or_else(|| "FLX".to_string()),
        poll_interval: millis(config, "poll_interval_ms", 5000)?,
        notice_duration: millis(config, "notice_duration_ms", 6000)?,
        receipt_poll: millis(config, "receipt_poll_ms", 1000)?,
        rpc_timeout: millis(config, "rpc_timeout_ms", 10_000)?,
        mint_price,
        nft_image_base_url: optional(config, "nft_image_base_url")
            .unwrap_or_else(|| DEFAULT_IMAGE_BASE_URL.to_string()),
    })
}

fn optional(config: &Ini, key: &str) -> Option<String> {
    config
        .get(SECTION, key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(config: &Ini, key: &str) -> Result<String> {
    optional(config, key).ok_or_else(|| format_err!("{} must not be empty", key))
}

fn address(raw: &str, key: &str) -> Result<Address> {
    Address::from_str(raw).map_err(|e| format_err!("{} is not an address ({}): {}", key, raw, e))
}

fn number(config: &Ini, key: &str, default: u64) -> Result<u64> {
    match optional(config, key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| format_err!("{} is not a number ({}): {}", key, raw, e)),
        None => Ok(default),
    }
}

fn millis(config: &Ini, key: &str, default: u64) -> Result<Duration> {
    number(config, key, default).map(Duration::from_millis)
}
