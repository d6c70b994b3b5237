// In-memory chain and signer for unit tests
// Scripted reserves, balances, fee data, broadcast failures and receipts
//
// Numan Thabit 2025 Nov

use crate::errors::AggrError;
use crate::signing::TxSigner;
use crate::sponsorship::SponsoredTransactionRequest;
use crate::transport::{BlockTag, CallRequest, ChainClient, FeeData, TxReceipt};
use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// What the chain does with the next broadcast transaction.
#[derive(Debug, Clone)]
pub enum Inclusion {
    Success,
    Reverted,
    /// Never mined
    Pending,
    /// Rejected at broadcast with this node message
    Rejected(String),
    /// Broadcast never reaches the node
    Unreachable(String),
}

/// Value history keyed by the block it took effect in.
type History = Vec<(u64, U256)>;

fn at(history: Option<&History>, block: BlockTag, head: u64) -> U256 {
    let limit = match block {
        BlockTag::Latest => head,
        BlockTag::Number(n) => n,
    };
    history
        .and_then(|h| {
            h.iter()
                .filter(|(b, _)| *b <= limit)
                .max_by_key(|(b, _)| *b)
                .map(|(_, v)| *v)
        })
        .unwrap_or(U256::ZERO)
}

struct State {
    chain_id: u64,
    head: u64,
    reserves: HashMap<Address, (U256, U256)>,
    factory_pools: Vec<(Address, Address, Address)>,
    decimals: HashMap<Address, u8>,
    balances: HashMap<(Address, Address), History>,
    native: HashMap<Address, History>,
    allowances: HashMap<(Address, Address, Address), U256>,
    fee_data: Option<FeeData>,
    estimate: Result<U256, String>,
    nonces: HashMap<Address, u64>,
    inclusions: VecDeque<Inclusion>,
    mined: HashMap<TxHash, (Inclusion, u64)>,
    broadcasts: Vec<Bytes>,
    reserve_reads: usize,
}

pub struct FakeChain {
    state: Mutex<State>,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                chain_id: 50104,
                head: 100,
                reserves: HashMap::new(),
                factory_pools: Vec::new(),
                decimals: HashMap::new(),
                balances: HashMap::new(),
                native: HashMap::new(),
                allowances: HashMap::new(),
                fee_data: Some(FeeData {
                    max_fee_per_gas: Some(U256::from(1_000_000_000u64)),
                    max_priority_fee_per_gas: Some(U256::ZERO),
                }),
                estimate: Ok(U256::from(1_000_000u64)),
                nonces: HashMap::new(),
                inclusions: VecDeque::new(),
                mined: HashMap::new(),
                broadcasts: Vec::new(),
                reserve_reads: 0,
            }),
        }
    }
}

impl FakeChain {
    pub fn set_reserves(&self, pool: Address, reserve0: U256, reserve1: U256) {
        self.state.lock().unwrap().reserves.insert(pool, (reserve0, reserve1));
    }

    pub fn set_factory_pool(&self, a: Address, b: Address, pool: Address) {
        self.state.lock().unwrap().factory_pools.push((a, b, pool));
    }

    pub fn set_decimals(&self, asset: Address, decimals: u8) {
        self.state.lock().unwrap().decimals.insert(asset, decimals);
    }

    pub fn set_balance(&self, asset: Address, account: Address, amount: U256) {
        self.set_balance_at(asset, account, 0, amount);
    }

    pub fn set_balance_at(&self, asset: Address, account: Address, block: u64, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .balances
            .entry((asset, account))
            .or_default()
            .push((block, amount));
    }

    pub fn set_native_balance_at(&self, account: Address, block: u64, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .native
            .entry(account)
            .or_default()
            .push((block, amount));
    }

    pub fn set_allowance(&self, asset: Address, owner: Address, spender: Address, amount: U256) {
        self.state
            .lock()
            .unwrap()
            .allowances
            .insert((asset, owner, spender), amount);
    }

    /// `None` makes the fee read fail.
    pub fn set_fee_data(&self, data: Option<FeeData>) {
        self.state.lock().unwrap().fee_data = data;
    }

    pub fn set_estimate(&self, estimate: Result<U256, String>) {
        self.state.lock().unwrap().estimate = estimate;
    }

    pub fn set_nonce(&self, account: Address, nonce: u64) {
        self.state.lock().unwrap().nonces.insert(account, nonce);
    }

    /// Queue the fate of the next broadcast; unscripted broadcasts succeed.
    pub fn push_inclusion(&self, inclusion: Inclusion) {
        self.state.lock().unwrap().inclusions.push_back(inclusion);
    }

    pub fn broadcasts(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    pub fn reserve_reads(&self) -> usize {
        self.state.lock().unwrap().reserve_reads
    }

    pub fn head(&self) -> u64 {
        self.state.lock().unwrap().head
    }
}

#[async_trait]
impl ChainClient for FakeChain {
    async fn chain_id(&self) -> Result<u64, AggrError> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn block_number(&self) -> Result<u64, AggrError> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn get_reserves(&self, pool: Address) -> Result<(U256, U256), AggrError> {
        let mut state = self.state.lock().unwrap();
        state.reserve_reads += 1;
        state
            .reserves
            .get(&pool)
            .copied()
            .ok_or_else(|| AggrError::Provider(format!("execution reverted: no code at {pool}")))
    }

    async fn get_pool(
        &self,
        _factory: Address,
        token_a: Address,
        token_b: Address,
    ) -> Result<Address, AggrError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .factory_pools
            .iter()
            .find(|(a, b, _)| (*a == token_a && *b == token_b) || (*a == token_b && *b == token_a))
            .map(|(_, _, pool)| *pool)
            .unwrap_or(Address::ZERO))
    }

    async fn decimals(&self, asset: Address) -> Result<u8, AggrError> {
        self.state
            .lock()
            .unwrap()
            .decimals
            .get(&asset)
            .copied()
            .ok_or_else(|| AggrError::Decode(format!("decimals() on {asset}")))
    }

    async fn balance_of(
        &self,
        asset: Address,
        account: Address,
        block: BlockTag,
    ) -> Result<U256, AggrError> {
        let state = self.state.lock().unwrap();
        Ok(at(state.balances.get(&(asset, account)), block, state.head))
    }

    async fn native_balance(&self, account: Address, block: BlockTag) -> Result<U256, AggrError> {
        let state = self.state.lock().unwrap();
        Ok(at(state.native.get(&account), block, state.head))
    }

    async fn allowance(
        &self,
        asset: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, AggrError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn fee_data(&self) -> Result<FeeData, AggrError> {
        self.state
            .lock()
            .unwrap()
            .fee_data
            .clone()
            .ok_or_else(|| AggrError::Transport("eth_getBlockByNumber: connection reset".into()))
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> Result<U256, AggrError> {
        self.state
            .lock()
            .unwrap()
            .estimate
            .clone()
            .map_err(AggrError::Provider)
    }

    async fn transaction_count(&self, account: Address) -> Result<u64, AggrError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nonces
            .get(&account)
            .copied()
            .unwrap_or(0))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, AggrError> {
        let mut state = self.state.lock().unwrap();
        let inclusion = state.inclusions.pop_front().unwrap_or(Inclusion::Success);
        match &inclusion {
            Inclusion::Rejected(message) => return Err(AggrError::Provider(message.clone())),
            Inclusion::Unreachable(message) => {
                return Err(AggrError::Transport(message.clone()))
            }
            _ => {}
        }
        let hash = keccak256(&raw);
        state.broadcasts.push(raw);
        if !matches!(inclusion, Inclusion::Pending) {
            state.head += 1;
        }
        let block = state.head;
        state.mined.insert(hash, (inclusion, block));
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<TxReceipt>, AggrError> {
        let state = self.state.lock().unwrap();
        Ok(match state.mined.get(&hash) {
            None
            | Some((Inclusion::Pending, _))
            | Some((Inclusion::Rejected(_), _))
            | Some((Inclusion::Unreachable(_), _)) => None,
            Some((inclusion, block)) => Some(TxReceipt {
                transaction_hash: hash,
                block_number: *block,
                success: matches!(inclusion, Inclusion::Success),
                gas_used: Some(U256::from(21_000u64)),
            }),
        })
    }
}

/// Records every request and emits `nonce || calldata` as the raw transaction.
pub struct FakeSigner {
    address: Address,
    signed: Mutex<Vec<SponsoredTransactionRequest>>,
}

impl FakeSigner {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            signed: Mutex::new(Vec::new()),
        }
    }

    pub fn signed(&self) -> Vec<SponsoredTransactionRequest> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl TxSigner for FakeSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign(&self, request: &SponsoredTransactionRequest) -> Result<Bytes, AggrError> {
        self.signed.lock().unwrap().push(request.clone());
        let mut raw = request.nonce.to_be_bytes().to_vec();
        raw.extend_from_slice(&request.data);
        Ok(raw.into())
    }
}
