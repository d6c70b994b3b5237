// Fee market adapter
// Derives a safety-margined fee bid from the network's fee signals, with a static
// fallback so a bid is always available
//
// Numan Thabit 2025 Nov

use crate::config::ExecutionPolicy;
use crate::errors::SwapError;
use crate::transport::ChainClient;
use alloy_primitives::U256;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeeSource {
    Network,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub max_fee_per_gas: U256,
    /// Equal to the max fee: the network has no separate tip market
    pub max_priority_fee_per_gas: U256,
    pub source: FeeSource,
}

pub struct FeeMarket {
    multiplier: U256,
    fallback: U256,
}

impl FeeMarket {
    pub fn new(policy: &ExecutionPolicy) -> Self {
        Self {
            multiplier: U256::from(policy.fee_multiplier),
            fallback: policy.fallback_max_fee(),
        }
    }

    /// Never fails; an unreadable fee market degrades to the static fallback.
    pub async fn fee_params(&self, chain: &dyn ChainClient) -> FeeQuote {
        match self.network_fee(chain).await {
            Ok(suggested) => {
                let bid = suggested.saturating_mul(self.multiplier);
                debug!(suggested = %suggested, bid = %bid, "fee bid from network");
                FeeQuote {
                    max_fee_per_gas: bid,
                    max_priority_fee_per_gas: bid,
                    source: FeeSource::Network,
                }
            }
            Err(err) => {
                warn!(error = %err, fallback = %self.fallback, "fee market degraded; using static fee");
                FeeQuote {
                    max_fee_per_gas: self.fallback,
                    max_priority_fee_per_gas: self.fallback,
                    source: FeeSource::Fallback,
                }
            }
        }
    }

    /// Current suggested max fee, unmultiplied.
    pub async fn network_fee(&self, chain: &dyn ChainClient) -> Result<U256, SwapError> {
        let data = chain
            .fee_data()
            .await
            .map_err(|e| SwapError::FeeMarketUnavailable {
                detail: e.to_string(),
            })?;
        match data.max_fee_per_gas {
            Some(fee) if !fee.is_zero() => Ok(fee),
            _ => Err(SwapError::FeeMarketUnavailable {
                detail: "node returned no max fee".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::FeeData;
    use crate::testing::FakeChain;

    #[tokio::test]
    async fn doubles_network_fee() {
        let chain = FakeChain::default();
        chain.set_fee_data(Some(FeeData {
            max_fee_per_gas: Some(U256::from(1_000u64)),
            max_priority_fee_per_gas: Some(U256::from(1u64)),
        }));
        let quote = FeeMarket::new(&ExecutionPolicy::default())
            .fee_params(&chain)
            .await;
        assert_eq!(quote.max_fee_per_gas, U256::from(2_000u64));
        assert_eq!(quote.max_priority_fee_per_gas, quote.max_fee_per_gas);
        assert_eq!(quote.source, FeeSource::Network);
    }

    #[tokio::test]
    async fn falls_back_when_fee_read_fails() {
        let chain = FakeChain::default();
        chain.set_fee_data(None);
        let policy = ExecutionPolicy::default();
        let quote = FeeMarket::new(&policy).fee_params(&chain).await;
        assert_eq!(quote.max_fee_per_gas, policy.fallback_max_fee());
        assert_eq!(quote.max_priority_fee_per_gas, policy.fallback_max_fee());
        assert_eq!(quote.source, FeeSource::Fallback);
    }

    #[tokio::test]
    async fn missing_fee_field_is_unavailable() {
        let chain = FakeChain::default();
        chain.set_fee_data(Some(FeeData::default()));
        let market = FeeMarket::new(&ExecutionPolicy::default());
        assert!(matches!(
            market.network_fee(&chain).await,
            Err(SwapError::FeeMarketUnavailable { .. })
        ));
        assert_eq!(market.fee_params(&chain).await.source, FeeSource::Fallback);
    }
}
