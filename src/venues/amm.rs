// Constant-product AMM venue
// Quote math for classic x*y=k pools and the live reserve reader that feeds it
//
// Numan Thabit 2025 Nov

use crate::transport::ChainClient;
use alloy_primitives::{Address, Uint, U256};
use serde::Serialize;
use tracing::warn;

/// Fee kept by the pool, as `numerator / denominator` of the input that is actually traded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct FeeRate {
    pub numerator: u64,
    pub denominator: u64,
}

impl FeeRate {
    /// 0.3% pool fee.
    pub const STANDARD: FeeRate = FeeRate {
        numerator: 997,
        denominator: 1000,
    };
}

impl Default for FeeRate {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Wide enough for `u256 * u64 * u256`.
type Wide = Uint<640, 10>;

/// Output of a constant-product swap with the standard 0.3% fee.
pub fn quote(amount_in: U256, reserve_in: U256, reserve_out: U256) -> U256 {
    quote_with_fee(amount_in, reserve_in, reserve_out, FeeRate::STANDARD)
}

/// `amountIn*num*reserveOut / (reserveIn*den + amountIn*num)`, computed in 640 bits so no
/// intermediate product can overflow. Empty pools and zero input quote zero.
pub fn quote_with_fee(amount_in: U256, reserve_in: U256, reserve_out: U256, fee: FeeRate) -> U256 {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return U256::ZERO;
    }
    if fee.denominator == 0 {
        return U256::ZERO;
    }
    let amount_in_with_fee = Wide::from(amount_in) * Wide::from(fee.numerator);
    let numerator = amount_in_with_fee * Wide::from(reserve_out);
    let denominator = Wide::from(reserve_in) * Wide::from(fee.denominator) + amount_in_with_fee;
    // The quotient is strictly below reserve_out, so it always fits back into 256 bits.
    U256::from(numerator / denominator)
}

/// Reserves of one pool, ordered as `(token_in, token_out)` for a specific quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReservePair {
    pub reserve_in: U256,
    pub reserve_out: U256,
}

impl ReservePair {
    pub const EMPTY: ReservePair = ReservePair {
        reserve_in: U256::ZERO,
        reserve_out: U256::ZERO,
    };

    pub fn is_empty(&self) -> bool {
        self.reserve_in.is_zero() || self.reserve_out.is_zero()
    }
}

/// Result of a live reserve read. A failed read is kept distinct from an empty pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReserveRead {
    Available(ReservePair),
    Unavailable,
}

impl ReserveRead {
    /// Reserves for quoting; an unreadable pool quotes like an empty one.
    pub fn pair(&self) -> ReservePair {
        match self {
            ReserveRead::Available(pair) => *pair,
            ReserveRead::Unavailable => ReservePair::EMPTY,
        }
    }

    pub fn is_usable(&self) -> bool {
        matches!(self, ReserveRead::Available(pair) if !pair.is_empty())
    }
}

/// Reads reserves fresh on every call; nothing is cached.
pub struct PoolReserveReader<'a> {
    chain: &'a dyn ChainClient,
}

impl<'a> PoolReserveReader<'a> {
    pub fn new(chain: &'a dyn ChainClient) -> Self {
        Self { chain }
    }

    /// Pool storage order is sorted by token address; reorder to `(token_in, token_out)`.
    pub async fn reserves(&self, pool: Address, token_in: Address, token_out: Address) -> ReserveRead {
        match self.chain.get_reserves(pool).await {
            Ok((reserve0, reserve1)) => {
                let pair = if token_in < token_out {
                    ReservePair {
                        reserve_in: reserve0,
                        reserve_out: reserve1,
                    }
                } else {
                    ReservePair {
                        reserve_in: reserve1,
                        reserve_out: reserve0,
                    }
                };
                ReserveRead::Available(pair)
            }
            Err(err) => {
                warn!(pool = %pool, error = %err, "reserve read failed; pool treated as unusable");
                ReserveRead::Unavailable
            }
        }
    }
}
