// Route selector - ranks quoted routes by expected output
// Exact integer comparison with a stable sort, so equal outputs keep enumeration order
//
// Numan Thabit 2025 Nov

use crate::config::NetworkConfig;
use crate::errors::SwapError;
use crate::quant::format_units;
use crate::router::enumerator::RouteEnumerator;
use crate::router::routes::{Route, RouteSelection};
use crate::transport::ChainClient;
use alloy_primitives::{Address, U256};
use tracing::{debug, info};

/// Rank routes by `amount_out`, best first. Fails with `NoRoute` when `routes` is empty.
pub fn rank(
    mut routes: Vec<Route>,
    source: Address,
    destination: Address,
) -> Result<RouteSelection, SwapError> {
    if routes.is_empty() {
        return Err(SwapError::NoRoute {
            from_asset: source,
            to_asset: destination,
        });
    }
    routes.sort_by(|a, b| b.amount_out.cmp(&a.amount_out));
    Ok(RouteSelection::from_ranked(routes))
}

pub struct RouteSelector<'a> {
    chain: &'a dyn ChainClient,
    network: &'a NetworkConfig,
}

impl<'a> RouteSelector<'a> {
    pub fn new(chain: &'a dyn ChainClient, network: &'a NetworkConfig) -> Self {
        Self { chain, network }
    }

    /// Enumerate, quote and rank routes for one request. Reserves are read fresh.
    #[tracing::instrument(skip_all, fields(source = %source, destination = %destination, amount_in = %amount_in))]
    pub async fn select_route(
        &self,
        source: Address,
        destination: Address,
        amount_in: U256,
    ) -> Result<RouteSelection, SwapError> {
        let routes = RouteEnumerator::new(self.chain, self.network)
            .enumerate(source, destination, amount_in)
            .await?;
        let selection = rank(routes, source, destination)?;

        let decimals = self
            .network
            .registry
            .asset_entry(destination)
            .and_then(|a| a.decimals);
        let best = selection.best();
        info!(
            route = %best.label,
            amount_out = %best.amount_out,
            human_out = %decimals.map(|d| format_units(best.amount_out, d)).unwrap_or_default(),
            "best route selected"
        );
        for alt in selection.alternatives() {
            debug!(
                route = %alt.route.label,
                amount_out = %alt.route.amount_out,
                share_of_best_bps = alt.share_of_best_bps,
                "alternative route"
            );
        }
        Ok(selection)
    }
}
