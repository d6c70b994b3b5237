// Execution engine - drives one sponsored swap attempt from allowance to confirmation
// This file implements the supervisor state machine, receipt polling with a bounded
// wait, pinned balance diffing and failure diagnosis
//
// Numan Thabit 2025 Nov

use crate::abi::IERC20;
use crate::config::NetworkConfig;
use crate::errors::{classify_failure, AggrError, ErrorReport, FailureClass, SwapError};
use crate::fees::{FeeMarket, FeeQuote};
use crate::metrics::SWAP_OUTCOMES;
use crate::router::plan::{SwapPlan, SwapPlanBuilder};
use crate::router::routes::Route;
use crate::router::selector::RouteSelector;
use crate::router::validation::{check_balance, validate_request};
use crate::signing::TxSigner;
use crate::sponsorship::{CallIntent, SponsoredTransactionRequest, TransactionComposer};
use crate::transport::{BlockTag, ChainClient, TxReceipt};
use alloy_primitives::{Address, TxHash, U256};
use alloy_sol_types::SolCall;
use backoff::{future::retry, ExponentialBackoff};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Supervisor states. `Confirmed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SupervisorState {
    Idle,
    AllowanceChecked,
    AllowanceGranted,
    RoutePlanned,
    FeeEstimated,
    Submitted,
    Confirmed,
    Failed,
}

/// Current state plus every state visited so far.
#[derive(Debug)]
struct Attempt {
    state: SupervisorState,
    trace: Vec<SupervisorState>,
}

impl Attempt {
    fn new() -> Self {
        Self {
            state: SupervisorState::Idle,
            trace: vec![SupervisorState::Idle],
        }
    }

    fn advance(&mut self, next: SupervisorState) {
        debug!(from = ?self.state, to = ?next, "supervisor transition");
        self.state = next;
        self.trace.push(next);
    }

    fn fail(mut self, err: SwapError) -> ErrorReport {
        let failed_in = self.state;
        self.advance(SupervisorState::Failed);
        ErrorReport::from_error(err, failed_in, self.trace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub source: Address,
    pub destination: Address,
    pub amount_in: U256,
    /// Defaults to the signing account
    pub recipient: Option<Address>,
}

/// Balance of one asset around the swap, read at pinned blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceDelta {
    pub asset: Address,
    /// Native balance instead of the token balance
    pub native: bool,
    pub before_block: u64,
    pub before: U256,
    pub after_block: u64,
    pub after: U256,
}

impl BalanceDelta {
    pub fn gained(&self) -> Option<U256> {
        self.after.checked_sub(self.before)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub approval_tx: Option<TxHash>,
    pub route: Route,
    pub min_amount_out: U256,
    pub fees: FeeQuote,
    pub source_balance: BalanceDelta,
    pub destination_balance: BalanceDelta,
    /// Destination gained at the receipt block; `None` when the balance went down
    pub received: Option<U256>,
    pub trace: Vec<SupervisorState>,
    pub confirmation_ms: f64,
}

/// Execution statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStats {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub avg_confirmation_ms: Option<f64>,
    pub success_rate: f64,
}

/// Planned swap ready for submission.
#[derive(Debug, Clone)]
struct Prepared {
    route: Route,
    plan: SwapPlan,
    min_amount_out: U256,
    deadline: U256,
}

pub struct ExecutionEngine {
    chain: Arc<dyn ChainClient>,
    signer: Arc<dyn TxSigner>,
    network: Arc<NetworkConfig>,
    fee_market: FeeMarket,
    composer: TransactionComposer,
    planner: SwapPlanBuilder,
    total_executions: AtomicU64,
    successful_executions: AtomicU64,
    failed_executions: AtomicU64,
    /// Sum of confirmation times in microseconds
    total_confirmation_us: AtomicU64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl ExecutionEngine {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        signer: Arc<dyn TxSigner>,
        network: Arc<NetworkConfig>,
    ) -> Self {
        let policy = &network.policy;
        Self {
            fee_market: FeeMarket::new(policy),
            composer: TransactionComposer::new(network.chain_id, policy.gas_per_pubdata),
            planner: SwapPlanBuilder::new(network.wrapped_native, policy.unwrap_native),
            chain,
            signer,
            network,
            total_executions: AtomicU64::new(0),
            successful_executions: AtomicU64::new(0),
            failed_executions: AtomicU64::new(0),
            total_confirmation_us: AtomicU64::new(0),
        }
    }

    pub fn account(&self) -> Address {
        self.signer.address()
    }

    pub fn get_stats(&self) -> ExecutionStats {
        let total = self.total_executions.load(Ordering::Relaxed);
        let successful = self.successful_executions.load(Ordering::Relaxed);
        let failed = self.failed_executions.load(Ordering::Relaxed);
        let total_ms = self.total_confirmation_us.load(Ordering::Relaxed) as f64 / 1000.0;
        ExecutionStats {
            total_executions: total,
            successful_executions: successful,
            failed_executions: failed,
            avg_confirmation_ms: if successful > 0 {
                Some(total_ms / successful as f64)
            } else {
                None
            },
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
        }
    }

    /// One best-effort attempt. Never retried here; every failure comes back as a report.
    #[tracing::instrument(skip_all, fields(source = %req.source, destination = %req.destination, amount_in = %req.amount_in))]
    pub async fn execute(&self, req: &SwapRequest) -> Result<ExecutionOutcome, ErrorReport> {
        self.total_executions.fetch_add(1, Ordering::Relaxed);
        let mut attempt = Attempt::new();
        match self.drive(req, &mut attempt).await {
            Ok(outcome) => {
                self.successful_executions.fetch_add(1, Ordering::Relaxed);
                self.total_confirmation_us.fetch_add(
                    (outcome.confirmation_ms * 1000.0) as u64,
                    Ordering::Relaxed,
                );
                SWAP_OUTCOMES.with_label_values(&["confirmed"]).inc();
                info!(
                    tx = %outcome.tx_hash,
                    block = outcome.block_number,
                    received = ?outcome.received,
                    "swap confirmed"
                );
                Ok(outcome)
            }
            Err(err) => {
                self.failed_executions.fetch_add(1, Ordering::Relaxed);
                SWAP_OUTCOMES.with_label_values(&[err.kind().as_str()]).inc();
                let report = attempt.fail(err);
                warn!(kind = ?report.kind, failed_in = ?report.failed_in, detail = %report.detail, "swap failed");
                Err(report)
            }
        }
    }

    async fn drive(
        &self,
        req: &SwapRequest,
        attempt: &mut Attempt,
    ) -> Result<ExecutionOutcome, SwapError> {
        let account = self.account();
        let recipient = req.recipient.unwrap_or(account);
        let router = self.network.router;
        validate_request(req.source, req.destination, req.amount_in)?;
        check_balance(self.chain.as_ref(), req.source, account, req.amount_in).await?;

        let allowance = self.chain.allowance(req.source, account, router).await?;
        attempt.advance(SupervisorState::AllowanceChecked);

        let approval_tx = if allowance < req.amount_in {
            info!(allowance = %allowance, required = %req.amount_in, "granting router allowance");
            let hash = self
                .grant_allowance(req.source, account, router)
                .await
                .map_err(|e| SwapError::AllowanceGrantFailed {
                    detail: e.to_string(),
                    cause: Some(Box::new(e)),
                })?;
            Some(hash)
        } else {
            debug!(allowance = %allowance, "allowance sufficient; approval skipped");
            None
        };
        attempt.advance(SupervisorState::AllowanceGranted);

        let prepared = self.prepare(req, recipient).await?;
        attempt.advance(SupervisorState::RoutePlanned);

        let fees = self.fee_market.fee_params(self.chain.as_ref()).await;
        attempt.advance(SupervisorState::FeeEstimated);

        let intent = CallIntent {
            from: account,
            to: router,
            data: prepared
                .plan
                .calldata(prepared.min_amount_out, prepared.deadline),
            value: U256::ZERO,
        };
        let request = self.compose(intent, &fees).await?;

        // Pin "before" balances to the head the swap is submitted against.
        let before_block = self.chain.block_number().await?;
        let source_before = self
            .balance(req.source, account, false, BlockTag::Number(before_block))
            .await?;
        let native_out = prepared.plan.delivers_native();
        let destination_before = self
            .balance(
                req.destination,
                recipient,
                native_out,
                BlockTag::Number(before_block),
            )
            .await?;

        let started = Instant::now();
        let hash = self
            .broadcast(&request, Some(prepared.min_amount_out))
            .await?;
        attempt.advance(SupervisorState::Submitted);
        info!(tx = %hash, route = %prepared.route.label, min_out = %prepared.min_amount_out, "swap submitted");

        let receipt = self
            .confirm(&request, hash, Some(prepared.min_amount_out))
            .await?;
        let confirmation_ms = started.elapsed().as_secs_f64() * 1000.0;
        attempt.advance(SupervisorState::Confirmed);

        let after = BlockTag::Number(receipt.block_number);
        let source_after = self.balance(req.source, account, false, after).await?;
        let destination_after = self
            .balance(req.destination, recipient, native_out, after)
            .await?;
        let destination_balance = BalanceDelta {
            asset: req.destination,
            native: native_out,
            before_block,
            before: destination_before,
            after_block: receipt.block_number,
            after: destination_after,
        };
        Ok(ExecutionOutcome {
            success: receipt.success,
            tx_hash: hash,
            block_number: receipt.block_number,
            approval_tx,
            min_amount_out: prepared.min_amount_out,
            fees,
            source_balance: BalanceDelta {
                asset: req.source,
                native: false,
                before_block,
                before: source_before,
                after_block: receipt.block_number,
                after: source_after,
            },
            received: destination_balance.gained(),
            destination_balance,
            route: prepared.route,
            trace: attempt.trace.clone(),
            confirmation_ms,
        })
    }

    /// Route, plan and slippage floor for `req`.
    async fn prepare(&self, req: &SwapRequest, recipient: Address) -> Result<Prepared, SwapError> {
        let selection = RouteSelector::new(self.chain.as_ref(), &self.network)
            .select_route(req.source, req.destination, req.amount_in)
            .await?;
        let route = selection.best().clone();
        let plan = self.planner.build(&route, recipient);
        let policy = &self.network.policy;
        Ok(Prepared {
            min_amount_out: policy.min_amount_out(route.amount_out),
            deadline: policy.deadline(unix_now()),
            route,
            plan,
        })
    }

    async fn balance(
        &self,
        asset: Address,
        account: Address,
        native: bool,
        block: BlockTag,
    ) -> Result<U256, SwapError> {
        let value = if native {
            self.chain.native_balance(account, block).await?
        } else {
            self.chain.balance_of(asset, account, block).await?
        };
        Ok(value)
    }

    /// Approve the router for the maximum amount and wait for it to be mined.
    async fn grant_allowance(
        &self,
        asset: Address,
        account: Address,
        router: Address,
    ) -> Result<TxHash, SwapError> {
        let fees = self.fee_market.fee_params(self.chain.as_ref()).await;
        let intent = CallIntent {
            from: account,
            to: asset,
            data: IERC20::approveCall {
                spender: router,
                value: U256::MAX,
            }
            .abi_encode()
            .into(),
            value: U256::ZERO,
        };
        let request = self.compose(intent, &fees).await?;
        let hash = self.broadcast(&request, None).await?;
        let receipt = self.confirm(&request, hash, None).await?;
        info!(tx = %hash, block = receipt.block_number, "router allowance granted");
        Ok(hash)
    }

    async fn gas_limit(&self, request: &SponsoredTransactionRequest) -> U256 {
        let policy = &self.network.policy;
        if !policy.estimate_gas_limit {
            return U256::from(policy.gas_limit);
        }
        match self.chain.estimate_gas(&request.call_request()).await {
            Ok(estimate) => policy.with_gas_margin(estimate),
            Err(err) => {
                warn!(error = %err, fallback = policy.fallback_gas_limit, "gas estimate failed; using fallback limit");
                U256::from(policy.fallback_gas_limit)
            }
        }
    }

    async fn compose(
        &self,
        intent: CallIntent,
        fees: &FeeQuote,
    ) -> Result<SponsoredTransactionRequest, SwapError> {
        let policy = &self.network.policy;
        let mut request = self
            .composer
            .compose(
                self.chain.as_ref(),
                intent,
                fees,
                U256::from(policy.gas_limit),
                &self.network.sponsor,
            )
            .await?;
        request.gas_limit = self.gas_limit(&request).await;
        Ok(request)
    }

    async fn broadcast(
        &self,
        request: &SponsoredTransactionRequest,
        min_amount_out: Option<U256>,
    ) -> Result<TxHash, SwapError> {
        let raw = self.signer.sign(request).await?;
        match self.chain.send_raw_transaction(raw).await {
            Ok(hash) => Ok(hash),
            Err(AggrError::Provider(message)) => {
                Err(self.diagnose(&message, request, min_amount_out).await)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Wait for inclusion; a reverted receipt is re-simulated to recover its reason.
    async fn confirm(
        &self,
        request: &SponsoredTransactionRequest,
        hash: TxHash,
        min_amount_out: Option<U256>,
    ) -> Result<TxReceipt, SwapError> {
        let receipt = self.await_receipt(hash).await?;
        if receipt.success {
            return Ok(receipt);
        }
        let reason = match self.chain.estimate_gas(&request.call_request()).await {
            Err(err) => err.to_string(),
            Ok(_) => format!("transaction {hash} reverted in block {}", receipt.block_number),
        };
        Err(self.diagnose(&reason, request, min_amount_out).await)
    }

    async fn await_receipt(&self, hash: TxHash) -> Result<TxReceipt, SwapError> {
        let waited_secs = self.network.policy.confirmation_timeout_secs;
        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        let poll = retry(backoff, || async {
            match self.chain.transaction_receipt(hash).await {
                Ok(Some(receipt)) => Ok(receipt),
                Ok(None) => Err(backoff::Error::transient(AggrError::Provider(format!(
                    "receipt for {hash} pending"
                )))),
                Err(err) => {
                    debug!(error = %err, "receipt poll failed; retrying");
                    Err(backoff::Error::transient(err))
                }
            }
        });
        match tokio::time::timeout(Duration::from_secs(waited_secs), poll).await {
            Ok(receipt) => Ok(receipt?),
            Err(_) => Err(SwapError::ConfirmationTimeout {
                tx_hash: hash,
                waited_secs,
            }),
        }
    }

    /// Turn a node or revert message into a classified, enriched failure.
    async fn diagnose(
        &self,
        message: &str,
        request: &SponsoredTransactionRequest,
        min_amount_out: Option<U256>,
    ) -> SwapError {
        match classify_failure(message) {
            FailureClass::Sponsor => {
                let sponsor = self.network.sponsor.address;
                let sponsor_balance = match self.chain.native_balance(sponsor, BlockTag::Latest).await {
                    Ok(balance) => Some(balance),
                    Err(err) => {
                        warn!(error = %err, sponsor = %sponsor, "sponsor balance unavailable");
                        None
                    }
                };
                SwapError::SponsorRejected {
                    detail: message.to_string(),
                    sponsor_balance,
                }
            }
            FailureClass::FeeTooLow => SwapError::FeeTooLow {
                detail: message.to_string(),
                submitted_max_fee: request.max_fee_per_gas,
                network_max_fee: self.fee_market.network_fee(self.chain.as_ref()).await.ok(),
            },
            FailureClass::Slippage => SwapError::SlippageExceeded {
                detail: message.to_string(),
                min_amount_out: min_amount_out.unwrap_or(U256::ZERO),
            },
            FailureClass::Revert => SwapError::ContractRevert {
                reason: message.to_string(),
                transaction: Some(Box::new(request.decode())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::sponsorship::OperationKind;
    use crate::testing::{FakeChain, FakeSigner, Inclusion};
    use crate::transport::FeeData;
    use alloy_primitives::address;

    const ME: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    struct Harness {
        chain: Arc<FakeChain>,
        signer: Arc<FakeSigner>,
        engine: ExecutionEngine,
        network: NetworkConfig,
        usdc: Address,
        weth: Address,
    }

    fn harness() -> Harness {
        let network = NetworkConfig::sophon_mainnet();
        let usdc = network.asset_address("USDC").unwrap();
        let weth = network.asset_address("WETH").unwrap();
        let chain = Arc::new(FakeChain::default());
        let pool = network.registry.pool_for(usdc, weth).unwrap().address;
        // usdc sorts above weth, so the pool stores (weth, usdc)
        assert!(weth < usdc);
        chain.set_reserves(pool, U256::from(500_000_000u64), U256::from(1_000_000_000_000u64));
        chain.set_balance(usdc, ME, U256::from(10_000_000u64));
        let signer = Arc::new(FakeSigner::new(ME));
        let engine = ExecutionEngine::new(chain.clone(), signer.clone(), Arc::new(network.clone()));
        Harness {
            chain,
            signer,
            engine,
            network,
            usdc,
            weth,
        }
    }

    fn request(h: &Harness) -> SwapRequest {
        SwapRequest {
            source: h.usdc,
            destination: h.weth,
            amount_in: U256::from(1_000_000u64),
            recipient: None,
        }
    }

    #[tokio::test]
    async fn sufficient_allowance_skips_approval() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        let outcome = h.engine.execute(&request(&h)).await.unwrap();

        assert_eq!(
            &outcome.trace[..3],
            &[
                SupervisorState::Idle,
                SupervisorState::AllowanceChecked,
                SupervisorState::AllowanceGranted
            ]
        );
        assert_eq!(outcome.approval_tx, None);
        let signed = h.signer.signed();
        assert_eq!(signed.len(), 1);
        assert_eq!(signed[0].kind(), OperationKind::Swap);
        assert_eq!(h.chain.broadcasts().len(), 1);
        assert_eq!(outcome.trace.last(), Some(&SupervisorState::Confirmed));
    }

    #[tokio::test]
    async fn missing_allowance_is_granted_before_swap() {
        let h = harness();
        let outcome = h.engine.execute(&request(&h)).await.unwrap();

        let signed = h.signer.signed();
        assert_eq!(signed.len(), 2);
        assert_eq!(signed[0].kind(), OperationKind::Approve);
        assert_eq!(signed[0].to, h.usdc);
        let approve = IERC20::approveCall::abi_decode(&signed[0].data, true).unwrap();
        assert_eq!(approve.value, U256::MAX);
        assert_eq!(signed[1].kind(), OperationKind::Swap);
        assert!(outcome.approval_tx.is_some());
    }

    #[tokio::test]
    async fn reverted_approval_fails_the_attempt() {
        let h = harness();
        h.chain.push_inclusion(Inclusion::Reverted);
        let report = h.engine.execute(&request(&h)).await.unwrap_err();
        assert_eq!(report.kind, ErrorKind::AllowanceGrantFailedError);
        assert_eq!(report.failed_in, SupervisorState::AllowanceChecked);
        assert_eq!(h.signer.signed().len(), 1);
    }

    #[tokio::test]
    async fn sponsor_rejected_approval_keeps_sponsor_balance() {
        let h = harness();
        h.chain
            .set_native_balance_at(h.network.sponsor.address, 0, U256::from(12_345u64));
        h.chain
            .push_inclusion(Inclusion::Rejected("Paymaster validation error".into()));
        let report = h.engine.execute(&request(&h)).await.unwrap_err();
        assert_eq!(report.kind, ErrorKind::AllowanceGrantFailedError);
        assert_eq!(report.failed_in, SupervisorState::AllowanceChecked);
        assert_eq!(report.enrichment.sponsor_balance, Some(U256::from(12_345u64)));
        assert_eq!(report.enrichment.sponsor_balance_low, Some(true));
        assert!(h.chain.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn gateway_failure_is_not_a_revert() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        h.chain.push_inclusion(Inclusion::Unreachable(
            "eth_sendRawTransaction: http 502 Bad Gateway".into(),
        ));
        let report = h.engine.execute(&request(&h)).await.unwrap_err();
        assert_eq!(report.kind, ErrorKind::TransportError);
        assert_eq!(report.failed_in, SupervisorState::FeeEstimated);
        assert!(report.enrichment.transaction.is_none());
        assert!(report.enrichment.revert_reason.is_none());
    }

    #[tokio::test]
    async fn swap_uses_slippage_floor_and_sponsor() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        let outcome = h.engine.execute(&request(&h)).await.unwrap();

        assert_eq!(
            outcome.min_amount_out,
            outcome.route.amount_out * U256::from(80u64) / U256::from(100u64)
        );
        let swap = &h.signer.signed()[0];
        assert_eq!(swap.sponsor, h.network.sponsor);
        assert_eq!(swap.to, h.network.router);
        assert_eq!(swap.gas_limit, U256::from(3_000_000u64));
        let call = crate::abi::IRouter::swapCall::abi_decode(&swap.data, true).unwrap();
        assert_eq!(call.amountOutMin, outcome.min_amount_out);
        assert!(call.deadline > U256::from(unix_now()));
    }

    #[tokio::test]
    async fn fee_read_failure_still_executes() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        h.chain.set_fee_data(None);
        let outcome = h.engine.execute(&request(&h)).await.unwrap();
        assert!(outcome.success);
        assert_eq!(
            outcome.fees.max_fee_per_gas,
            h.network.policy.fallback_max_fee()
        );
    }

    #[tokio::test]
    async fn paymaster_rejection_reports_sponsor_balance() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        h.chain
            .set_native_balance_at(h.network.sponsor.address, 0, U256::from(12_345u64));
        h.chain.push_inclusion(Inclusion::Rejected(
            "failed to validate the transaction. reason: Paymaster validation error".into(),
        ));
        let report = h.engine.execute(&request(&h)).await.unwrap_err();
        assert_eq!(report.kind, ErrorKind::SponsorRejectedError);
        assert_eq!(report.failed_in, SupervisorState::FeeEstimated);
        assert_eq!(
            report.enrichment.sponsor_balance,
            Some(U256::from(12_345u64))
        );
        assert_eq!(report.enrichment.sponsor_balance_low, Some(true));
        assert_eq!(report.trace.last(), Some(&SupervisorState::Failed));
    }

    #[tokio::test]
    async fn base_fee_rejection_reads_network_fee() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        h.chain.set_fee_data(Some(FeeData {
            max_fee_per_gas: Some(U256::from(100u64)),
            max_priority_fee_per_gas: None,
        }));
        h.chain.push_inclusion(Inclusion::Rejected(
            "max fee per gas less than block base fee".into(),
        ));
        let report = h.engine.execute(&request(&h)).await.unwrap_err();
        assert_eq!(report.kind, ErrorKind::FeeTooLowError);
        assert_eq!(report.enrichment.submitted_max_fee, Some(U256::from(200u64)));
        assert_eq!(report.enrichment.network_max_fee, Some(U256::from(100u64)));
    }

    #[tokio::test]
    async fn reverted_swap_is_resimulated() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        h.chain.push_inclusion(Inclusion::Reverted);
        h.chain
            .set_estimate(Err("execution reverted: TooLittleReceived()".into()));
        let report = h.engine.execute(&request(&h)).await.unwrap_err();
        assert_eq!(report.kind, ErrorKind::SlippageExceededError);
        assert_eq!(report.failed_in, SupervisorState::Submitted);
        assert!(report.enrichment.min_amount_out.is_some());
    }

    #[tokio::test]
    async fn unknown_revert_carries_decoded_transaction() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        h.chain.push_inclusion(Inclusion::Reverted);
        h.chain.set_estimate(Err("execution reverted: Expired()".into()));
        let report = h.engine.execute(&request(&h)).await.unwrap_err();
        assert_eq!(report.kind, ErrorKind::ContractRevertError);
        let tx = report.enrichment.transaction.unwrap();
        assert_eq!(tx.kind, OperationKind::Swap);
        assert_eq!(tx.paymaster, h.network.sponsor.address);
        assert_eq!(
            report.enrichment.revert_reason.as_deref(),
            Some("provider error: execution reverted: Expired()")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn pending_receipt_times_out() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        h.chain.push_inclusion(Inclusion::Pending);
        let report = h.engine.execute(&request(&h)).await.unwrap_err();
        assert_eq!(report.kind, ErrorKind::ConfirmationTimeoutError);
        assert_eq!(report.failed_in, SupervisorState::Submitted);
    }

    #[tokio::test]
    async fn insufficient_balance_fails_before_routing() {
        let h = harness();
        let mut req = request(&h);
        req.amount_in = U256::from(10_000_001u64);
        let report = h.engine.execute(&req).await.unwrap_err();
        assert_eq!(report.kind, ErrorKind::InsufficientBalanceError);
        assert_eq!(report.failed_in, SupervisorState::Idle);
        assert_eq!(h.chain.reserve_reads(), 0);
        assert!(h.signer.signed().is_empty());
    }

    #[tokio::test]
    async fn received_amount_uses_pinned_blocks() {
        let h = harness();
        h.chain
            .set_allowance(h.usdc, ME, h.network.router, U256::MAX);
        let head = h.chain.head();
        // Unwrapped destination: the native balance is diffed.
        h.chain.set_native_balance_at(ME, 0, U256::from(1_000u64));
        h.chain.set_native_balance_at(ME, head + 1, U256::from(1_450u64));
        // A later transfer must not leak into the result.
        h.chain.set_native_balance_at(ME, head + 5, U256::from(9_999u64));
        h.chain
            .set_balance_at(h.usdc, ME, head + 1, U256::from(9_000_000u64));

        let outcome = h.engine.execute(&request(&h)).await.unwrap();
        assert_eq!(outcome.block_number, head + 1);
        assert!(outcome.destination_balance.native);
        assert_eq!(outcome.destination_balance.before_block, head);
        assert_eq!(outcome.received, Some(U256::from(450u64)));
        assert_eq!(outcome.source_balance.before, U256::from(10_000_000u64));
        assert_eq!(outcome.source_balance.after, U256::from(9_000_000u64));

        let stats = h.engine.get_stats();
        assert_eq!(stats.total_executions, 1);
        assert_eq!(stats.successful_executions, 1);
    }

    #[tokio::test]
    async fn stats_count_failures() {
        let h = harness();
        let mut req = request(&h);
        req.amount_in = U256::ZERO;
        assert!(h.engine.execute(&req).await.is_err());
        let stats = h.engine.get_stats();
        assert_eq!(stats.failed_executions, 1);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.avg_confirmation_ms, None);
    }
}
