// Route definitions and quoting
// Hops, routes and the ranked selection handed from the selector to the planner
//
// Numan Thabit 2025 Nov

use crate::quant::share_bps;
use crate::venues::amm::{quote_with_fee, FeeRate, ReservePair};
use alloy_primitives::{Address, U256};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RouteKind {
    /// One pool between source and destination
    Direct,
    /// Two pools through a bridge asset
    Indirect,
}

/// One pool traversal of a candidate path, before reserves are known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub pool: Address,
    pub fee: FeeRate,
    pub token_in: Address,
    pub token_out: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub pool: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    pub reserves: ReservePair,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    pub kind: RouteKind,
    pub label: String,
    pub source: Address,
    pub destination: Address,
    pub amount_in: U256,
    /// Estimated output of the last hop
    pub amount_out: U256,
    pub hops: Vec<Hop>,
}

impl Route {
    /// Quote `legs` in order, feeding each hop's output into the next. `legs` must be
    /// non-empty and `reserves` aligned with it.
    pub fn chain(
        kind: RouteKind,
        label: String,
        amount_in: U256,
        legs: &[Leg],
        reserves: &[ReservePair],
    ) -> Self {
        let mut hops = Vec::with_capacity(legs.len());
        let mut carried = amount_in;
        for (leg, pair) in legs.iter().zip(reserves) {
            let out = quote_with_fee(carried, pair.reserve_in, pair.reserve_out, leg.fee);
            hops.push(Hop {
                pool: leg.pool,
                token_in: leg.token_in,
                token_out: leg.token_out,
                amount_in: carried,
                amount_out: out,
                reserves: *pair,
            });
            carried = out;
        }
        let source = legs.first().map(|l| l.token_in).unwrap_or(Address::ZERO);
        let destination = legs.last().map(|l| l.token_out).unwrap_or(Address::ZERO);
        Self {
            kind,
            label,
            source,
            destination,
            amount_in,
            amount_out: carried,
            hops,
        }
    }

    /// Hops are contiguous and span source to destination.
    pub fn is_well_formed(&self) -> bool {
        let (Some(first), Some(last)) = (self.hops.first(), self.hops.last()) else {
            return false;
        };
        first.token_in == self.source
            && last.token_out == self.destination
            && self
                .hops
                .windows(2)
                .all(|pair| pair[0].token_out == pair[1].token_in)
    }
}

/// Route with its output as a share of the best route's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedRoute {
    pub route: Route,
    pub share_of_best_bps: u64,
}

/// Result of route selection: best route first, then the rest in rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSelection {
    pub ranked: Vec<RankedRoute>,
}

impl RouteSelection {
    /// `routes` must already be in rank order and non-empty.
    pub(crate) fn from_ranked(routes: Vec<Route>) -> Self {
        let best_out = routes.first().map(|r| r.amount_out).unwrap_or(U256::ZERO);
        let ranked = routes
            .into_iter()
            .map(|route| RankedRoute {
                share_of_best_bps: share_bps(route.amount_out, best_out),
                route,
            })
            .collect();
        Self { ranked }
    }

    pub fn best(&self) -> &Route {
        &self.ranked[0].route
    }

    pub fn alternatives(&self) -> impl Iterator<Item = &RankedRoute> {
        self.ranked.iter().skip(1)
    }
}
