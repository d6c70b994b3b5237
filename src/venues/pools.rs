// Pool registry
// Known assets and classic pools for a network, plus the optional factory lookup
// for pairs the registry does not list
//
// Numan Thabit 2025 Nov

use crate::quant::DEFAULT_DECIMALS;
use crate::transport::ChainClient;
use crate::venues::amm::FeeRate;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fungible token identity and precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
}

/// Classic pool over an unordered pair of assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub address: Address,
    pub token_a: Address,
    pub token_b: Address,
    #[serde(default)]
    pub fee: FeeRate,
}

impl Pool {
    pub fn connects(&self, x: Address, y: Address) -> bool {
        (self.token_a == x && self.token_b == y) || (self.token_a == y && self.token_b == x)
    }
}

/// Registry entry for an asset; decimals may be left for the chain to answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    pub address: Address,
    pub symbol: String,
    pub decimals: Option<u8>,
}

/// Hand-curated topology: assets, pools and the bridge assets used for two-hop routes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRegistry {
    #[serde(default)]
    pub assets: Vec<AssetEntry>,
    #[serde(default)]
    pub pools: Vec<Pool>,
    #[serde(default)]
    pub bridges: Vec<Address>,
}

impl PoolRegistry {
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn pool_for(&self, x: Address, y: Address) -> Option<&Pool> {
        self.pools.iter().find(|p| p.connects(x, y))
    }

    pub fn asset_entry(&self, address: Address) -> Option<&AssetEntry> {
        self.assets.iter().find(|a| a.address == address)
    }

    pub fn symbol(&self, address: Address) -> String {
        self.asset_entry(address)
            .map(|a| a.symbol.clone())
            .unwrap_or_else(|| address.to_string())
    }

    /// Registry pool for the pair, else the factory's pool when one is configured.
    pub async fn find_pool(
        &self,
        chain: &dyn ChainClient,
        factory: Option<Address>,
        x: Address,
        y: Address,
    ) -> Option<Pool> {
        if let Some(pool) = self.pool_for(x, y) {
            return Some(pool.clone());
        }
        let factory = factory?;
        match chain.get_pool(factory, x, y).await {
            Ok(address) if address != Address::ZERO => {
                debug!(pool = %address, token_a = %x, token_b = %y, "pool resolved via factory");
                Some(Pool {
                    address,
                    token_a: x,
                    token_b: y,
                    fee: FeeRate::STANDARD,
                })
            }
            Ok(_) => None,
            Err(err) => {
                warn!(error = %err, token_a = %x, token_b = %y, "factory lookup failed");
                None
            }
        }
    }

    /// Precision from the registry, else from the token contract, else the default.
    pub async fn resolve_asset(&self, chain: &dyn ChainClient, address: Address) -> Asset {
        let entry = self.asset_entry(address);
        let symbol = entry
            .map(|e| e.symbol.clone())
            .unwrap_or_else(|| address.to_string());
        let decimals = match entry.and_then(|e| e.decimals) {
            Some(d) => d,
            None => match chain.decimals(address).await {
                Ok(d) => d,
                Err(err) => {
                    warn!(
                        asset = %address,
                        error = %err,
                        default = DEFAULT_DECIMALS,
                        "decimals unavailable; using default"
                    );
                    DEFAULT_DECIMALS
                }
            },
        };
        Asset {
            address,
            symbol,
            decimals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChain;
    use alloy_primitives::address;

    const A: Address = address!("1000000000000000000000000000000000000001");
    const B: Address = address!("2000000000000000000000000000000000000002");
    const P: Address = address!("3000000000000000000000000000000000000003");

    #[test]
    fn parses_registry_yaml() {
        let yaml = r#"
assets:
  - address: "0x1000000000000000000000000000000000000001"
    symbol: USDC
    decimals: 6
  - address: "0x2000000000000000000000000000000000000002"
    symbol: WETH
pools:
  - address: "0x3000000000000000000000000000000000000003"
    token_a: "0x1000000000000000000000000000000000000001"
    token_b: "0x2000000000000000000000000000000000000002"
bridges: []
"#;
        let registry = PoolRegistry::from_yaml(yaml).unwrap();
        assert_eq!(registry.assets.len(), 2);
        assert_eq!(registry.assets[1].decimals, None);
        assert_eq!(registry.pool_for(B, A).map(|p| p.address), Some(P));
        assert_eq!(registry.pools[0].fee, FeeRate::STANDARD);
    }

    #[tokio::test]
    async fn falls_back_to_factory() {
        let factory = address!("4000000000000000000000000000000000000004");
        let chain = FakeChain::default();
        chain.set_factory_pool(A, B, P);
        let registry = PoolRegistry::default();

        let found = registry.find_pool(&chain, Some(factory), A, B).await;
        assert_eq!(found.map(|p| p.address), Some(P));
        assert!(registry.find_pool(&chain, None, A, B).await.is_none());
    }

    #[tokio::test]
    async fn resolves_decimals_with_default() {
        let chain = FakeChain::default();
        chain.set_decimals(A, 6);
        let registry = PoolRegistry::default();
        assert_eq!(registry.resolve_asset(&chain, A).await.decimals, 6);
        assert_eq!(
            registry.resolve_asset(&chain, B).await.decimals,
            DEFAULT_DECIMALS
        );
    }
}
