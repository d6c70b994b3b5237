// Library root module for sponsored-router
// This file defines the public API and module structure of the sponsored swap router:
// route discovery over AMM pools and fee-sponsored execution
//
// Numan Thabit 2025 Nov

pub mod abi;
pub mod config;
pub mod errors;
pub mod fees;
pub mod metrics;
pub mod quant;
pub mod router;
pub mod signing;
pub mod sponsorship;
pub mod transport;
pub mod venues;

#[cfg(test)]
mod testing;
