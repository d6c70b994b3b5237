// Pre-trade validation module
// Validates the request shape and the account's source balance before any routing or
// fee work is spent on it
//
// Numan Thabit 2025 Nov

use crate::errors::SwapError;
use crate::transport::{BlockTag, ChainClient};
use alloy_primitives::{Address, U256};
use tracing::warn;

/// Request-level checks that need no chain access.
pub fn validate_request(
    source: Address,
    destination: Address,
    amount_in: U256,
) -> Result<(), SwapError> {
    if amount_in.is_zero() {
        return Err(SwapError::InvalidRequest(
            "amount in must be positive".to_string(),
        ));
    }
    if source == destination {
        return Err(SwapError::InvalidRequest(format!(
            "source and destination are both {source}"
        )));
    }
    Ok(())
}

/// Current source balance, failing with `InsufficientBalance` when below `amount_in`.
pub async fn check_balance(
    chain: &dyn ChainClient,
    asset: Address,
    account: Address,
    amount_in: U256,
) -> Result<U256, SwapError> {
    let available = chain.balance_of(asset, account, BlockTag::Latest).await?;
    if available < amount_in {
        warn!(
            asset = %asset,
            required = %amount_in,
            available = %available,
            "source balance below requested amount"
        );
        return Err(SwapError::InsufficientBalance {
            required: amount_in,
            available,
        });
    }
    Ok(available)
}
