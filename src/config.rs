// Configuration management module
// This file handles loading settings from the environment and turning them into
// the immutable per-network configuration handed to the router at construction
//
// Numan Thabit 2025 Nov

use crate::sponsorship::SponsorRef;
use crate::venues::amm::FeeRate;
use crate::venues::pools::{AssetEntry, Pool, PoolRegistry};
use alloy_primitives::{address, Address, U256};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

pub const SOPHON_CHAIN_ID: u64 = 50104;

const GWEI: u64 = 1_000_000_000;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// JSON-RPC endpoint, e.g. https://rpc.sophon.xyz
    pub rpc_endpoint: Url,
    /// Hex-encoded secp256k1 key of the trading account (do not use in prod; replace with HSM)
    pub private_key_hex: String,
    /// Expected chain id; checked against the node at startup
    pub chain_id: Option<u64>,
    pub router: Option<Address>,
    pub factory: Option<Address>,
    /// Sponsor (paymaster) override
    pub sponsor: Option<SponsorOverride>,
    /// YAML pool registry replacing the built-in one
    pub registry_path: Option<PathBuf>,
    /// Serve the HTTP API on this address instead of running a one-shot swap
    pub api_listen: Option<SocketAddr>,
    /// One-shot swap order (APP__SWAP__SOURCE, APP__SWAP__DESTINATION, APP__SWAP__AMOUNT)
    pub swap: Option<SwapOrder>,
    #[serde(default)]
    pub policy: ExecutionPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SponsorOverride {
    pub address: Address,
}

/// Swap requested from the environment. Assets are symbols or addresses; the amount is a
/// human decimal string in the source asset's units.
#[derive(Debug, Clone, Deserialize)]
pub struct SwapOrder {
    pub source: String,
    pub destination: String,
    pub amount: String,
    #[serde(default)]
    pub dry_run: bool,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }

    /// Built-in Sophon network with the configured overrides applied.
    pub fn network(&self) -> Result<NetworkConfig> {
        let mut network = NetworkConfig::sophon_mainnet();
        if let Some(chain_id) = self.chain_id {
            network.chain_id = chain_id;
        }
        if let Some(router) = self.router {
            network.router = router;
        }
        if let Some(factory) = self.factory {
            network.factory = Some(factory);
        }
        if let Some(sponsor) = &self.sponsor {
            network.sponsor = SponsorRef::general(sponsor.address);
        }
        if let Some(path) = &self.registry_path {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read pool registry {}", path.display()))?;
            network.registry = PoolRegistry::from_yaml(&text)
                .with_context(|| format!("parse pool registry {}", path.display()))?;
        }
        network.policy = self.policy.clone();
        network.validate()?;
        Ok(network)
    }
}

/// Knobs of a single swap attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionPolicy {
    /// Share of the best quote accepted as minimum output, in percent
    pub slippage_floor_pct: u64,
    pub deadline_secs: u64,
    /// Safety factor applied to the network's suggested max fee
    pub fee_multiplier: u64,
    pub fallback_max_fee_gwei: u64,
    pub gas_limit: u64,
    /// Estimate the gas limit instead of using `gas_limit`
    pub estimate_gas_limit: bool,
    pub gas_margin_pct: u64,
    pub fallback_gas_limit: u64,
    pub gas_per_pubdata: u64,
    pub confirmation_timeout_secs: u64,
    /// Deliver the wrapped native destination as the native asset
    pub unwrap_native: bool,
}

impl Default for ExecutionPolicy {
    fn default() -> Self {
        Self {
            slippage_floor_pct: 80,
            deadline_secs: 1200,
            fee_multiplier: 2,
            fallback_max_fee_gwei: 2100,
            gas_limit: 3_000_000,
            estimate_gas_limit: false,
            gas_margin_pct: 30,
            fallback_gas_limit: 10_000_000,
            gas_per_pubdata: 50_000,
            confirmation_timeout_secs: 120,
            unwrap_native: true,
        }
    }
}

impl ExecutionPolicy {
    pub fn min_amount_out(&self, expected: U256) -> U256 {
        expected * U256::from(self.slippage_floor_pct) / U256::from(100u64)
    }

    pub fn deadline(&self, now_secs: u64) -> U256 {
        U256::from(now_secs.saturating_add(self.deadline_secs))
    }

    pub fn fallback_max_fee(&self) -> U256 {
        U256::from(self.fallback_max_fee_gwei) * U256::from(GWEI)
    }

    pub fn with_gas_margin(&self, estimate: U256) -> U256 {
        estimate * U256::from(100 + self.gas_margin_pct) / U256::from(100u64)
    }
}

/// Everything the router needs to know about one network. Immutable once built; each
/// router instance owns its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub router: Address,
    pub factory: Option<Address>,
    pub wrapped_native: Address,
    pub sponsor: SponsorRef,
    pub registry: PoolRegistry,
    pub policy: ExecutionPolicy,
}

impl NetworkConfig {
    pub fn sophon_mainnet() -> Self {
        let weth = address!("72af9f169b619d85a47dfa8fefbcd39de55c567d");
        let usdc = address!("9Aa0F72392B5784Ad86c6f3E899bCc053D00Db4F");
        let usdt = address!("6386dA73545ae4E2B2E0393688fA8B65Bb9a7169");
        let pool = |address, token_a, token_b| Pool {
            address,
            token_a,
            token_b,
            fee: FeeRate::STANDARD,
        };
        let asset = |address, symbol: &str, decimals| AssetEntry {
            address,
            symbol: symbol.to_string(),
            decimals: Some(decimals),
        };
        Self {
            name: "sophon-mainnet".to_string(),
            chain_id: SOPHON_CHAIN_ID,
            router: address!("455FFfa180D50D8a1AdaaA46Eb2bfb4C1bb28602"),
            factory: Some(address!("fe146Ec9863C9A7AF38c75216DE19CFA82E560B6")),
            wrapped_native: weth,
            sponsor: SponsorRef::general(address!("98546B226dbbA8230cf620635a1e4ab01F6A99B2")),
            registry: PoolRegistry {
                assets: vec![
                    asset(weth, "WETH", 18),
                    asset(usdc, "USDC", 6),
                    asset(usdt, "USDT", 6),
                ],
                pools: vec![
                    pool(address!("353B35a3362Dff8174cd9679BC4a46365CcD4dA7"), usdc, weth),
                    pool(address!("61a87fa6Dd89a23c78F0754EF3372d35ccde5935"), usdc, usdt),
                    pool(address!("c6B9d3814b5A32e41Eb778C0E5b742a8d9E5E94b"), usdt, weth),
                ],
                bridges: vec![usdt],
            },
            policy: ExecutionPolicy::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.policy.slippage_floor_pct == 0 || self.policy.slippage_floor_pct > 100 {
            bail!(
                "APP__POLICY__SLIPPAGE_FLOOR_PCT must be within 1..=100, got {}",
                self.policy.slippage_floor_pct
            );
        }
        if self.policy.fee_multiplier == 0 {
            bail!("APP__POLICY__FEE_MULTIPLIER must be positive");
        }
        for pool in &self.registry.pools {
            if pool.token_a == pool.token_b {
                bail!("pool {} lists the same asset twice", pool.address);
            }
        }
        Ok(())
    }

    /// Resolve a symbol (case-insensitive) or a hex address.
    pub fn asset_address(&self, name: &str) -> Result<Address> {
        if let Some(entry) = self
            .registry
            .assets
            .iter()
            .find(|a| a.symbol.eq_ignore_ascii_case(name))
        {
            return Ok(entry.address);
        }
        Address::from_str(name).with_context(|| format!("unknown asset: {name}"))
    }
}
