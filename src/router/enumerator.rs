// Route enumerator
// Builds direct and bridged two-hop candidate paths over the pool registry, reads their
// reserves in parallel and quotes each candidate
//
// Numan Thabit 2025 Nov

use crate::config::NetworkConfig;
use crate::errors::SwapError;
use crate::router::routes::{Leg, Route, RouteKind};
use crate::transport::ChainClient;
use crate::venues::amm::{PoolReserveReader, ReserveRead};
use crate::venues::pools::Pool;
use alloy_primitives::{Address, U256};
use futures::future::join_all;
use tracing::{debug, info};

/// Candidate path before its reserves are read.
#[derive(Debug, Clone)]
struct Candidate {
    kind: RouteKind,
    label: String,
    legs: Vec<Leg>,
}

fn leg(pool: &Pool, token_in: Address, token_out: Address) -> Leg {
    Leg {
        pool: pool.address,
        fee: pool.fee,
        token_in,
        token_out,
    }
}

pub struct RouteEnumerator<'a> {
    chain: &'a dyn ChainClient,
    network: &'a NetworkConfig,
}

impl<'a> RouteEnumerator<'a> {
    pub fn new(chain: &'a dyn ChainClient, network: &'a NetworkConfig) -> Self {
        Self { chain, network }
    }

    async fn pool(&self, x: Address, y: Address) -> Option<Pool> {
        self.network
            .registry
            .find_pool(self.chain, self.network.factory, x, y)
            .await
    }

    async fn candidates(&self, source: Address, destination: Address) -> Vec<Candidate> {
        let registry = &self.network.registry;
        let mut out = Vec::new();
        if let Some(pool) = self.pool(source, destination).await {
            out.push(Candidate {
                kind: RouteKind::Direct,
                label: format!(
                    "{} -> {}",
                    registry.symbol(source),
                    registry.symbol(destination)
                ),
                legs: vec![leg(&pool, source, destination)],
            });
        }
        for &bridge in &registry.bridges {
            if bridge == source || bridge == destination {
                continue;
            }
            let (Some(first), Some(second)) = (
                self.pool(source, bridge).await,
                self.pool(bridge, destination).await,
            ) else {
                continue;
            };
            out.push(Candidate {
                kind: RouteKind::Indirect,
                label: format!(
                    "{} -> {} -> {}",
                    registry.symbol(source),
                    registry.symbol(bridge),
                    registry.symbol(destination)
                ),
                legs: vec![
                    leg(&first, source, bridge),
                    leg(&second, bridge, destination),
                ],
            });
        }
        out
    }

    /// Viable quoted routes in enumeration order (direct first). Empty when the registry
    /// knows no path; `NoLiquidity` when paths exist but none can be quoted.
    pub async fn enumerate(
        &self,
        source: Address,
        destination: Address,
        amount_in: U256,
    ) -> Result<Vec<Route>, SwapError> {
        let candidates = self.candidates(source, destination).await;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // Every leg is an independent read; issue them together and wait for all.
        let reader = PoolReserveReader::new(self.chain);
        let reads = join_all(candidates.iter().map(|c| {
            let reader = &reader;
            async move {
                join_all(
                    c.legs
                        .iter()
                        .map(|l| reader.reserves(l.pool, l.token_in, l.token_out)),
                )
                .await
            }
        }))
        .await;

        let mut viable = Vec::new();
        let mut rejected = Vec::new();
        for (candidate, reads) in candidates.into_iter().zip(reads) {
            if let Some(pos) = reads.iter().position(|r| !r.is_usable()) {
                let why = match reads[pos] {
                    ReserveRead::Unavailable => "reserves unavailable",
                    ReserveRead::Available(_) => "empty pool",
                };
                debug!(route = %candidate.label, pool = %candidate.legs[pos].pool, why, "route excluded");
                rejected.push(format!("{}: {why} at {}", candidate.label, candidate.legs[pos].pool));
                continue;
            }
            let pairs: Vec<_> = reads.iter().map(ReserveRead::pair).collect();
            let route = Route::chain(
                candidate.kind,
                candidate.label,
                amount_in,
                &candidate.legs,
                &pairs,
            );
            if route.amount_out.is_zero() {
                rejected.push(format!("{}: quotes zero output", route.label));
                continue;
            }
            viable.push(route);
        }

        info!(
            viable = viable.len(),
            rejected = rejected.len(),
            "routes enumerated"
        );
        if viable.is_empty() {
            return Err(SwapError::NoLiquidity {
                detail: rejected.join("; "),
            });
        }
        Ok(viable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeChain;
    use crate::venues::amm::quote;

    struct Fixture {
        network: NetworkConfig,
        usdc: Address,
        usdt: Address,
        weth: Address,
        usdc_weth: Address,
        usdc_usdt: Address,
        usdt_weth: Address,
    }

    fn fixture() -> Fixture {
        let network = NetworkConfig::sophon_mainnet();
        let usdc = network.asset_address("USDC").unwrap();
        let usdt = network.asset_address("USDT").unwrap();
        let weth = network.asset_address("WETH").unwrap();
        let pool = |a, b| network.registry.pool_for(a, b).unwrap().address;
        Fixture {
            usdc_weth: pool(usdc, weth),
            usdc_usdt: pool(usdc, usdt),
            usdt_weth: pool(usdt, weth),
            network,
            usdc,
            usdt,
            weth,
        }
    }

    /// Store reserves in the pool's canonical (sorted) order given a directional view.
    fn seed(chain: &FakeChain, pool: Address, a: Address, ra: u64, b: Address, rb: u64) {
        if a < b {
            chain.set_reserves(pool, U256::from(ra), U256::from(rb));
        } else {
            chain.set_reserves(pool, U256::from(rb), U256::from(ra));
        }
    }

    #[tokio::test]
    async fn finds_direct_and_bridged_routes() {
        let f = fixture();
        let chain = FakeChain::default();
        seed(&chain, f.usdc_weth, f.usdc, 1_000_000, f.weth, 500);
        seed(&chain, f.usdc_usdt, f.usdc, 2_000_000, f.usdt, 2_000_000);
        seed(&chain, f.usdt_weth, f.usdt, 1_000_000, f.weth, 520);

        let amount = U256::from(1_000u64);
        let routes = RouteEnumerator::new(&chain, &f.network)
            .enumerate(f.usdc, f.weth, amount)
            .await
            .unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].kind, RouteKind::Direct);
        assert_eq!(
            routes[0].amount_out,
            quote(amount, U256::from(1_000_000u64), U256::from(500u64))
        );
        assert_eq!(routes[1].kind, RouteKind::Indirect);
        assert_eq!(routes[1].hops[0].token_out, f.usdt);
        let first = quote(amount, U256::from(2_000_000u64), U256::from(2_000_000u64));
        assert_eq!(
            routes[1].amount_out,
            quote(first, U256::from(1_000_000u64), U256::from(520u64))
        );
        assert!(routes.iter().all(Route::is_well_formed));
        assert_eq!(chain.reserve_reads(), 3);
    }

    #[tokio::test]
    async fn empty_pool_is_excluded() {
        let f = fixture();
        let chain = FakeChain::default();
        seed(&chain, f.usdc_weth, f.usdc, 0, f.weth, 0);
        seed(&chain, f.usdc_usdt, f.usdc, 2_000_000, f.usdt, 2_000_000);
        seed(&chain, f.usdt_weth, f.usdt, 1_000_000_000, f.weth, 500_000);

        let routes = RouteEnumerator::new(&chain, &f.network)
            .enumerate(f.usdc, f.weth, U256::from(1_000_000u64))
            .await
            .unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].kind, RouteKind::Indirect);
    }

    #[tokio::test]
    async fn all_unusable_is_no_liquidity() {
        let f = fixture();
        let chain = FakeChain::default();
        seed(&chain, f.usdc_weth, f.usdc, 0, f.weth, 0);

        let err = RouteEnumerator::new(&chain, &f.network)
            .enumerate(f.usdc, f.weth, U256::from(1u64))
            .await
            .unwrap_err();
        assert!(matches!(err, SwapError::NoLiquidity { .. }));
    }

    #[tokio::test]
    async fn unknown_pair_yields_nothing() {
        let f = fixture();
        let mut network = f.network.clone();
        network.factory = None;
        let chain = FakeChain::default();
        let stranger = Address::repeat_byte(0x42);
        let routes = RouteEnumerator::new(&chain, &network)
            .enumerate(stranger, f.weth, U256::from(1u64))
            .await
            .unwrap();
        assert!(routes.is_empty());
    }
}
