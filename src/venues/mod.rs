// Venue layer
// Constant-product pool math, live reserve reads and the known pool registry
//
// Numan Thabit 2025 Nov

pub mod amm;
pub mod pools;

pub use amm::{quote, FeeRate, PoolReserveReader, ReservePair, ReserveRead};
pub use pools::{Asset, Pool, PoolRegistry};
