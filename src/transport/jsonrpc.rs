// JSON-RPC transport layer implementation
// This file implements the Ethereum-style JSON-RPC client used to read pool, token
// and fee state and to broadcast sponsored transactions
//
// Numan Thabit 2025 Nov

use crate::abi::{IPool, IPoolFactory, IERC20};
use crate::errors::AggrError;
use crate::metrics::{REQ_ERRORS, REQ_LATENCY};
use crate::transport::{BlockTag, CallRequest, ChainClient, FeeData, TxReceipt};
use alloy_primitives::{Address, Bytes, TxHash, U256, U64};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug)]
pub struct JsonRpc {
    http: Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpc {
    pub fn new(url: impl Into<String>) -> Result<Self, AggrError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()
            .map_err(|e| AggrError::Transport(format!("build http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, AggrError> {
        let _timer = REQ_LATENCY
            .with_label_values(&["jsonrpc", method])
            .start_timer();

        let result = self.request_inner(method, params).await;
        if result.is_err() {
            REQ_ERRORS.with_label_values(&["jsonrpc", method]).inc();
        }
        result
    }

    async fn request_inner<T: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Value,
    ) -> Result<T, AggrError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AggrError::Transport(format!("jsonrpc send {method}: {e}")))?;
        let status = resp.status();
        let body = match resp.json::<Value>().await {
            Ok(body) => Some(body),
            Err(e) if status.is_success() => {
                return Err(AggrError::Transport(format!("json parse: {e}")))
            }
            Err(_) => None,
        };
        let result = response_result(method, status, body)?;
        serde_json::from_value(result)
            .map_err(|e| AggrError::Decode(format!("{method} result: {e}")))
    }

    async fn eth_call<C: SolCall>(
        &self,
        to: Address,
        call: &C,
        block: BlockTag,
    ) -> Result<C::Return, AggrError> {
        let data = Bytes::from(call.abi_encode());
        let raw: Bytes = self
            .request(
                "eth_call",
                json!([{ "to": to, "data": data }, block.to_param()]),
            )
            .await?;
        C::abi_decode_returns(&raw, true)
            .map_err(|e| AggrError::Decode(format!("{} on {to}: {e}", C::SIGNATURE)))
    }
}

/// Only a JSON-RPC `error` object is the node's verdict; any other non-2xx reply is a
/// gateway fault.
fn response_result(
    method: &str,
    status: StatusCode,
    body: Option<Value>,
) -> Result<Value, AggrError> {
    if let Some(err) = body.as_ref().and_then(|b| b.get("error")) {
        return Err(AggrError::Provider(rpc_error_message(err)));
    }
    if !status.is_success() {
        return Err(AggrError::Transport(format!("{method}: http {status}")));
    }
    Ok(body
        .and_then(|mut b| b.get_mut("result").map(Value::take))
        .unwrap_or(Value::Null))
}

/// Flatten a JSON-RPC error object into one message, keeping revert data when present.
fn rpc_error_message(err: &Value) -> String {
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    match err.get("data") {
        Some(Value::String(data)) => format!("{message} (data: {data})"),
        Some(Value::Null) | None => message,
        Some(other) => format!("{message} (data: {other})"),
    }
}

fn quantity(v: u64) -> String {
    format!("0x{v:x}")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReceipt {
    transaction_hash: TxHash,
    block_number: Option<U64>,
    status: Option<U64>,
    gas_used: Option<U256>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlockHeader {
    base_fee_per_gas: Option<U256>,
}

#[async_trait]
impl ChainClient for JsonRpc {
    async fn chain_id(&self) -> Result<u64, AggrError> {
        let id: U64 = self.request("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    async fn block_number(&self) -> Result<u64, AggrError> {
        let n: U64 = self.request("eth_blockNumber", json!([])).await?;
        Ok(n.to::<u64>())
    }

    async fn get_reserves(&self, pool: Address) -> Result<(U256, U256), AggrError> {
        let ret = self
            .eth_call(pool, &IPool::getReservesCall {}, BlockTag::Latest)
            .await?;
        Ok((ret.reserve0, ret.reserve1))
    }

    async fn get_pool(
        &self,
        factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address, AggrError> {
        let ret = self
            .eth_call(
                factory,
                &IPoolFactory::getPoolCall {
                    tokenA: token_a,
                    tokenB: token_b,
                },
                BlockTag::Latest,
            )
            .await?;
        Ok(ret.pool)
    }

    async fn decimals(&self, asset: Address) -> Result<u8, AggrError> {
        let ret = self
            .eth_call(asset, &IERC20::decimalsCall {}, BlockTag::Latest)
            .await?;
        Ok(ret.value)
    }

    async fn balance_of(
        &self,
        asset: Address,
        account: Address,
        block: BlockTag,
    ) -> Result<U256, AggrError> {
        let ret = self
            .eth_call(asset, &IERC20::balanceOfCall { owner: account }, block)
            .await?;
        Ok(ret.balance)
    }

    async fn native_balance(&self, account: Address, block: BlockTag) -> Result<U256, AggrError> {
        self.request("eth_getBalance", json!([account, block.to_param()]))
            .await
    }

    async fn allowance(
        &self,
        asset: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AggrError> {
        let ret = self
            .eth_call(
                asset,
                &IERC20::allowanceCall { owner, spender },
                BlockTag::Latest,
            )
            .await?;
        Ok(ret.remaining)
    }

    async fn fee_data(&self) -> Result<FeeData, AggrError> {
        let block: Option<RawBlockHeader> = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let base_fee = block.and_then(|b| b.base_fee_per_gas);

        // Chains without a tip market reject this method; treat that as zero tip.
        let priority: U256 = self
            .request("eth_maxPriorityFeePerGas", json!([]))
            .await
            .unwrap_or(U256::ZERO);

        let max_fee = match base_fee {
            Some(base) => Some(base.saturating_mul(U256::from(2u64)).saturating_add(priority)),
            None => {
                let gas_price: U256 = self.request("eth_gasPrice", json!([])).await?;
                Some(gas_price)
            }
        };

        Ok(FeeData {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: Some(priority),
        })
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<U256, AggrError> {
        let mut tx = json!({
            "from": call.from,
            "to": call.to,
            "data": call.data,
            "value": call.value,
        });
        if let Some((paymaster, input)) = &call.paymaster {
            tx["type"] = json!("0x71");
            tx["eip712Meta"] = json!({
                "gasPerPubdata": quantity(call.gas_per_pubdata),
                "paymasterParams": {
                    "paymaster": paymaster,
                    "paymasterInput": input.to_vec(),
                },
            });
        }
        self.request("eth_estimateGas", json!([tx])).await
    }

    async fn transaction_count(&self, account: Address) -> Result<u64, AggrError> {
        let n: U64 = self
            .request("eth_getTransactionCount", json!([account, "latest"]))
            .await?;
        Ok(n.to::<u64>())
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, AggrError> {
        self.request("eth_sendRawTransaction", json!([raw])).await
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, AggrError> {
        let raw: Option<RawReceipt> = self
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        // zkSync returns receipts before the block number is assigned; treat those as pending.
        Ok(raw.and_then(|r| {
            let block_number = r.block_number?.to::<u64>();
            Some(TxReceipt {
                transaction_hash: r.transaction_hash,
                block_number,
                success: r.status.map(|s| s.to::<u64>() == 1).unwrap_or(false),
                gas_used: r.gas_used,
            })
        }))
    }
}
