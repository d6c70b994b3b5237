// Sponsored transaction support module
// This file builds fee-sponsored transactions (paymaster "general" flow), derives the
// introspection-only signing domain, and decodes requests for failure diagnostics
//
// Numan Thabit 2025 Nov

use crate::abi::{IPaymasterFlow, IRouter, IERC20};
use crate::errors::SwapError;
use crate::fees::FeeQuote;
use crate::transport::{CallRequest, ChainClient};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::Serialize;
use tracing::debug;

/// Sponsor balance below which a rejection is most likely a funding problem (0.01 native).
pub const LOW_SPONSOR_BALANCE: U256 = U256::from_limbs([10_000_000_000_000_000, 0, 0, 0]);

/// Fee sponsor contract plus the activation payload it expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SponsorRef {
    pub address: Address,
    pub input: Bytes,
}

impl SponsorRef {
    /// "General" sponsorship: `general(bytes(""))`.
    pub fn general(address: Address) -> Self {
        let input = IPaymasterFlow::generalCall {
            input: Bytes::new(),
        }
        .abi_encode();
        Self {
            address,
            input: input.into(),
        }
    }
}

/// Structured signing domain for a request. Derived for logs only; authorization is the
/// transaction signature produced by the signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SigningDomain {
    pub name: &'static str,
    pub version: &'static str,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

impl SigningDomain {
    pub fn new(chain_id: u64, verifying_contract: Address) -> Self {
        Self {
            name: "SyncSwap Sophon",
            version: "1",
            chain_id,
            verifying_contract,
        }
    }
}

/// What a transaction does, looked up from its calldata selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationKind {
    Approve,
    Swap,
    TokenTransfer,
    NativeTransfer,
    Unknown,
}

/// Router swap selectors seen on chain besides the one this crate encodes.
const LEGACY_SWAP_SELECTORS: [[u8; 4]; 2] = [[0x2c, 0xc4, 0x08, 0x1e], [0x8a, 0xa7, 0x4f, 0x71]];

impl OperationKind {
    pub fn classify(data: &[u8], value: U256) -> Self {
        if data.is_empty() {
            return if value.is_zero() {
                OperationKind::Unknown
            } else {
                OperationKind::NativeTransfer
            };
        }
        let Some(selector) = data.get(..4).and_then(|s| <[u8; 4]>::try_from(s).ok()) else {
            return OperationKind::Unknown;
        };
        let table: [([u8; 4], OperationKind); 5] = [
            (IRouter::swapCall::SELECTOR, OperationKind::Swap),
            (LEGACY_SWAP_SELECTORS[0], OperationKind::Swap),
            (LEGACY_SWAP_SELECTORS[1], OperationKind::Swap),
            (IERC20::approveCall::SELECTOR, OperationKind::Approve),
            (IERC20::transferCall::SELECTOR, OperationKind::TokenTransfer),
        ];
        table
            .iter()
            .find(|(known, _)| *known == selector)
            .map(|(_, kind)| *kind)
            .unwrap_or(OperationKind::Unknown)
    }
}

/// Call the account wants to make, before fees and sponsorship are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallIntent {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
}

/// Pending transaction with sponsor metadata and fee parameters. Lives for one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsoredTransactionRequest {
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub nonce: u64,
    pub chain_id: u64,
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub gas_per_pubdata: u64,
    pub sponsor: SponsorRef,
}

impl SponsoredTransactionRequest {
    pub fn kind(&self) -> OperationKind {
        OperationKind::classify(&self.data, self.value)
    }

    /// Same call as an `eth_estimateGas` request, sponsor metadata included.
    pub fn call_request(&self) -> CallRequest {
        CallRequest {
            from: self.from,
            to: self.to,
            data: self.data.clone(),
            value: self.value,
            paymaster: Some((self.sponsor.address, self.sponsor.input.clone())),
            gas_per_pubdata: self.gas_per_pubdata,
        }
    }

    pub fn decode(&self) -> DecodedTransaction {
        DecodedTransaction {
            kind: self.kind(),
            from: self.from,
            to: self.to,
            value: self.value,
            nonce: self.nonce,
            chain_id: self.chain_id,
            gas_limit: self.gas_limit,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            gas_per_pubdata: self.gas_per_pubdata,
            paymaster: self.sponsor.address,
            paymaster_input: self.sponsor.input.clone(),
            data: self.data.clone(),
        }
    }
}

/// Full body of a request, attached to revert reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedTransaction {
    pub kind: OperationKind,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub nonce: u64,
    pub chain_id: u64,
    pub gas_limit: U256,
    pub max_fee_per_gas: U256,
    pub max_priority_fee_per_gas: U256,
    pub gas_per_pubdata: u64,
    pub paymaster: Address,
    pub paymaster_input: Bytes,
    pub data: Bytes,
}

pub struct TransactionComposer {
    chain_id: u64,
    gas_per_pubdata: u64,
}

impl TransactionComposer {
    pub fn new(chain_id: u64, gas_per_pubdata: u64) -> Self {
        Self {
            chain_id,
            gas_per_pubdata,
        }
    }

    /// Attach nonce, chain identity, fees, gas limit and the sponsor reference.
    pub async fn compose(
        &self,
        chain: &dyn ChainClient,
        intent: CallIntent,
        fees: &FeeQuote,
        gas_limit: U256,
        sponsor: &SponsorRef,
    ) -> Result<SponsoredTransactionRequest, SwapError> {
        let nonce = chain.transaction_count(intent.from).await?;
        let domain = SigningDomain::new(self.chain_id, intent.to);
        let request = SponsoredTransactionRequest {
            from: intent.from,
            to: intent.to,
            data: intent.data,
            value: intent.value,
            nonce,
            chain_id: self.chain_id,
            gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
            gas_per_pubdata: self.gas_per_pubdata,
            sponsor: sponsor.clone(),
        };
        debug!(
            domain = ?domain,
            kind = ?request.kind(),
            nonce,
            paymaster = %sponsor.address,
            "composed sponsored transaction"
        );
        Ok(request)
    }
}
