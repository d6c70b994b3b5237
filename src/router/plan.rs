// Swap plan builder
// Encodes a selected route into the router's step/path structure, applying the per-hop
// recipient and withdrawal-mode conventions for internal multi-hop forwarding
//
// Numan Thabit 2025 Nov

use crate::abi::{IRouter, StepData};
use crate::router::routes::Route;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum WithdrawMode {
    /// Keep proceeds inside the vault / deliver the token as is
    Internal = 0,
    /// Unwrap to the chain's native asset
    Unwrap = 1,
    /// Deliver the wrapped token
    Wrapped = 2,
}

impl WithdrawMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStep {
    pub pool: Address,
    pub token_in: Address,
    /// Zero address forwards proceeds to the next step
    pub recipient: Address,
    pub withdraw_mode: WithdrawMode,
}

impl PlannedStep {
    pub fn payload(&self) -> Bytes {
        StepData {
            tokenIn: self.token_in,
            to: self.recipient,
            withdrawMode: self.withdraw_mode.as_u8(),
        }
        .abi_encode()
        .into()
    }
}

/// A route encoded for submission: one path, fed by `amount_in` of `token_in`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapPlan {
    pub token_in: Address,
    pub amount_in: U256,
    pub recipient: Address,
    pub steps: Vec<PlannedStep>,
    /// Withdrawal mode of the final step
    pub withdraw_mode: WithdrawMode,
}

impl SwapPlan {
    pub fn delivers_native(&self) -> bool {
        self.withdraw_mode == WithdrawMode::Unwrap
    }

    pub fn to_abi(&self) -> IRouter::SwapPath {
        IRouter::SwapPath {
            steps: self
                .steps
                .iter()
                .map(|step| IRouter::SwapStep {
                    pool: step.pool,
                    data: step.payload(),
                    callback: Address::ZERO,
                    callbackData: Bytes::new(),
                })
                .collect(),
            tokenIn: self.token_in,
            amountIn: self.amount_in,
        }
    }

    /// `swap([path], amountOutMin, deadline)` calldata.
    pub fn calldata(&self, min_amount_out: U256, deadline: U256) -> Bytes {
        IRouter::swapCall {
            paths: vec![self.to_abi()],
            amountOutMin: min_amount_out,
            deadline,
        }
        .abi_encode()
        .into()
    }
}

pub struct SwapPlanBuilder {
    wrapped_native: Address,
    unwrap_native: bool,
}

impl SwapPlanBuilder {
    pub fn new(wrapped_native: Address, unwrap_native: bool) -> Self {
        Self {
            wrapped_native,
            unwrap_native,
        }
    }

    fn final_mode(&self, destination: Address) -> WithdrawMode {
        match (destination == self.wrapped_native, self.unwrap_native) {
            (true, true) => WithdrawMode::Unwrap,
            (true, false) => WithdrawMode::Wrapped,
            (false, _) => WithdrawMode::Internal,
        }
    }

    /// Only the last step pays `recipient`; earlier steps forward internally.
    pub fn build(&self, route: &Route, recipient: Address) -> SwapPlan {
        let withdraw_mode = self.final_mode(route.destination);
        let last = route.hops.len().saturating_sub(1);
        let steps = route
            .hops
            .iter()
            .enumerate()
            .map(|(i, hop)| {
                if i == last {
                    PlannedStep {
                        pool: hop.pool,
                        token_in: hop.token_in,
                        recipient,
                        withdraw_mode,
                    }
                } else {
                    PlannedStep {
                        pool: hop.pool,
                        token_in: hop.token_in,
                        recipient: Address::ZERO,
                        withdraw_mode: WithdrawMode::Internal,
                    }
                }
            })
            .collect();
        SwapPlan {
            token_in: route.source,
            amount_in: route.amount_in,
            recipient,
            steps,
            withdraw_mode,
        }
    }
}
