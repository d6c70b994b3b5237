// Chain access layer
// Defines the chain client capability the router consumes and its JSON-RPC implementation
//
// Numan Thabit 2025 Nov

pub mod jsonrpc;

use crate::errors::AggrError;
use alloy_primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use serde::Serialize;

/// Block a read is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockTag {
    Latest,
    Number(u64),
}

impl BlockTag {
    pub fn to_param(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Number(n) => format!("0x{n:x}"),
        }
    }
}

/// Network fee suggestion. Either field may be missing on chains without EIP-1559 data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeData {
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub gas_used: Option<U256>,
}

/// Call used for gas estimation and revert re-simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    /// Sponsor address and its input, sent as zkSync `eip712Meta`
    pub paymaster: Option<(Address, Bytes)>,
    pub gas_per_pubdata: u64,
}

/// Read/broadcast capability over the chain. Implementations must be safe to call
/// concurrently; the router issues independent reserve reads in parallel.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, AggrError>;

    async fn block_number(&self) -> Result<u64, AggrError>;

    /// Raw `(reserve0, reserve1)` in the pool's storage order.
    async fn get_reserves(&self, pool: Address) -> Result<(U256, U256), AggrError>;

    /// Factory lookup; the zero address means the pool does not exist.
    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address, AggrError>;

    async fn decimals(&self, asset: Address) -> Result<u8, AggrError>;

    async fn balance_of(
        &self,
        asset: Address,
        account: Address,
        block: BlockTag,
    ) -> Result<U256, AggrError>;

    async fn native_balance(&self, account: Address, block: BlockTag) -> Result<U256, AggrError>;

    async fn allowance(
        &self,
        asset: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AggrError>;

    async fn fee_data(&self) -> Result<FeeData, AggrError>;

    async fn estimate_gas(&self, call: &CallRequest) -> Result<U256, AggrError>;

    async fn transaction_count(&self, account: Address) -> Result<u64, AggrError>;

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, AggrError>;

    /// `None` while the transaction is not yet included.
    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, AggrError>;
}
