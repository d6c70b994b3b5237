// Error types and error handling module
// This file defines the transport error type, the classified swap failure kinds,
// and the structured report handed back to callers when an attempt fails
//
// Numan Thabit 2025 Nov

use crate::router::execution::SupervisorState;
use crate::sponsorship::DecodedTransaction;
use alloy_primitives::{Address, TxHash, U256};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggrError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("provider error: {0}")]
    Provider(String),
    #[error("signing error: {0}")]
    Signing(String),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Classified failure of a single swap attempt.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error("no liquidity: {detail}")]
    NoLiquidity { detail: String },
    #[error("no route between {from_asset} and {to_asset}")]
    NoRoute {
        from_asset: Address,
        to_asset: Address,
    },
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: U256, available: U256 },
    #[error("allowance grant failed: {detail}")]
    AllowanceGrantFailed {
        detail: String,
        /// Diagnosed failure of the approval transaction, if any
        cause: Option<Box<SwapError>>,
    },
    #[error("fee market unavailable: {detail}")]
    FeeMarketUnavailable { detail: String },
    #[error("sponsor rejected transaction: {detail}")]
    SponsorRejected {
        detail: String,
        sponsor_balance: Option<U256>,
    },
    #[error("slippage exceeded (min out {min_amount_out}): {detail}")]
    SlippageExceeded { detail: String, min_amount_out: U256 },
    #[error("max fee {submitted_max_fee} below network base fee: {detail}")]
    FeeTooLow {
        detail: String,
        submitted_max_fee: U256,
        network_max_fee: Option<U256>,
    },
    #[error("contract reverted: {reason}")]
    ContractRevert {
        reason: String,
        transaction: Option<Box<DecodedTransaction>>,
    },
    #[error("transaction {tx_hash} not confirmed within {waited_secs}s")]
    ConfirmationTimeout { tx_hash: TxHash, waited_secs: u64 },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Transport(#[from] AggrError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    NoLiquidityError,
    NoRouteError,
    InsufficientBalanceError,
    AllowanceGrantFailedError,
    FeeMarketUnavailableError,
    SponsorRejectedError,
    SlippageExceededError,
    FeeTooLowError,
    ContractRevertError,
    ConfirmationTimeoutError,
    InvalidRequestError,
    TransportError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoLiquidityError => "no_liquidity",
            ErrorKind::NoRouteError => "no_route",
            ErrorKind::InsufficientBalanceError => "insufficient_balance",
            ErrorKind::AllowanceGrantFailedError => "allowance_grant_failed",
            ErrorKind::FeeMarketUnavailableError => "fee_market_unavailable",
            ErrorKind::SponsorRejectedError => "sponsor_rejected",
            ErrorKind::SlippageExceededError => "slippage_exceeded",
            ErrorKind::FeeTooLowError => "fee_too_low",
            ErrorKind::ContractRevertError => "contract_revert",
            ErrorKind::ConfirmationTimeoutError => "confirmation_timeout",
            ErrorKind::InvalidRequestError => "invalid_request",
            ErrorKind::TransportError => "transport",
        }
    }
}

impl SwapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SwapError::NoLiquidity { .. } => ErrorKind::NoLiquidityError,
            SwapError::NoRoute { .. } => ErrorKind::NoRouteError,
            SwapError::InsufficientBalance { .. } => ErrorKind::InsufficientBalanceError,
            SwapError::AllowanceGrantFailed { .. } => ErrorKind::AllowanceGrantFailedError,
            SwapError::FeeMarketUnavailable { .. } => ErrorKind::FeeMarketUnavailableError,
            SwapError::SponsorRejected { .. } => ErrorKind::SponsorRejectedError,
            SwapError::SlippageExceeded { .. } => ErrorKind::SlippageExceededError,
            SwapError::FeeTooLow { .. } => ErrorKind::FeeTooLowError,
            SwapError::ContractRevert { .. } => ErrorKind::ContractRevertError,
            SwapError::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeoutError,
            SwapError::InvalidRequest(_) => ErrorKind::InvalidRequestError,
            SwapError::Transport(_) => ErrorKind::TransportError,
        }
    }
}

/// Extra data gathered while diagnosing a failure.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Enrichment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_balance: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_balance_low: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_max_fee: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_max_fee: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_amount_out: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<DecodedTransaction>,
}

impl Enrichment {
    /// Move the diagnostics carried by `err` (and any wrapped cause) into the report data.
    fn absorb(&mut self, err: SwapError) {
        match err {
            SwapError::SponsorRejected {
                sponsor_balance, ..
            } => {
                self.sponsor_balance = sponsor_balance;
                self.sponsor_balance_low =
                    sponsor_balance.map(|b| b < crate::sponsorship::LOW_SPONSOR_BALANCE);
            }
            SwapError::FeeTooLow {
                submitted_max_fee,
                network_max_fee,
                ..
            } => {
                self.submitted_max_fee = Some(submitted_max_fee);
                self.network_max_fee = network_max_fee;
            }
            SwapError::SlippageExceeded { min_amount_out, .. } => {
                self.min_amount_out = Some(min_amount_out);
            }
            SwapError::ContractRevert {
                reason,
                transaction,
            } => {
                self.revert_reason = Some(reason);
                self.transaction = transaction.map(|tx| *tx);
            }
            SwapError::AllowanceGrantFailed {
                cause: Some(cause), ..
            } => self.absorb(*cause),
            _ => {}
        }
    }
}

/// Structured failure returned to the caller of a swap attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub detail: String,
    /// State the supervisor was in when the failure happened
    pub failed_in: SupervisorState,
    /// States visited before failing
    pub trace: Vec<SupervisorState>,
    pub enrichment: Enrichment,
}

impl ErrorReport {
    pub fn from_error(
        err: SwapError,
        failed_in: SupervisorState,
        trace: Vec<SupervisorState>,
    ) -> Self {
        let kind = err.kind();
        let detail = err.to_string();
        let mut enrichment = Enrichment::default();
        enrichment.absorb(err);
        Self {
            kind,
            detail,
            failed_in,
            trace,
            enrichment,
        }
    }
}

impl ErrorReport {
    /// Report for a failure while resolving or quoting, before any transaction is built.
    pub fn pre_trade(err: SwapError) -> Self {
        Self::from_error(err, SupervisorState::Idle, vec![SupervisorState::Idle])
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} in {:?}: {}", self.kind, self.failed_in, self.detail)
    }
}

impl std::error::Error for ErrorReport {}

/// Coarse class of a broadcast or on-chain failure, derived from the node's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Sponsor,
    FeeTooLow,
    Slippage,
    Revert,
}

/// Lower-cased message fragments and the failure class they indicate. First match wins.
const FAILURE_PATTERNS: &[(&str, FailureClass)] = &[
    ("paymaster validation", FailureClass::Sponsor),
    ("failed to transfer tx fee to the bootloader", FailureClass::Sponsor),
    ("validateandpayforpaymastertransaction", FailureClass::Sponsor),
    ("insufficient funds", FailureClass::Sponsor),
    ("paymaster", FailureClass::Sponsor),
    ("max fee per gas less than block base fee", FailureClass::FeeTooLow),
    ("fee too low", FailureClass::FeeTooLow),
    ("underpriced", FailureClass::FeeTooLow),
    ("toolittlereceived", FailureClass::Slippage),
    ("insufficient output", FailureClass::Slippage),
    ("insufficient_output_amount", FailureClass::Slippage),
];

pub fn classify_failure(message: &str) -> FailureClass {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains(&crate::abi::too_little_received_selector_hex()) {
        return FailureClass::Slippage;
    }
    FAILURE_PATTERNS
        .iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map(|(_, class)| *class)
        .unwrap_or(FailureClass::Revert)
}
