// Router HTTP API implementation
// This file ties quoting and execution together and exposes them over HTTP
//
// Numan Thabit 2025 Nov

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::execution::{ExecutionEngine, ExecutionOutcome, ExecutionStats, SwapRequest};
use super::plan::{SwapPlan, SwapPlanBuilder};
use super::routes::RouteSelection;
use super::selector::RouteSelector;
use super::validation::validate_request;
use crate::config::NetworkConfig;
use crate::errors::{ErrorKind, ErrorReport, SwapError};
use crate::quant::{format_units, parse_units};
use crate::signing::TxSigner;
use crate::transport::ChainClient;
use crate::venues::pools::Asset;
use alloy_primitives::{Address, U256};

/// High-level Router that ties selection and execution together
pub struct Router {
    chain: Arc<dyn ChainClient>,
    network: Arc<NetworkConfig>,
    executor: ExecutionEngine,
}

/// Order in human units, as accepted by the API and the one-shot runner.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderRequest {
    /// Symbol or address
    pub source: String,
    pub destination: String,
    /// Decimal amount in source units, e.g. "0.05"
    pub amount: String,
    pub recipient: Option<Address>,
}

/// Resolved order: assets with their precision and the fixed-point amount.
#[derive(Debug, Clone)]
pub struct ResolvedOrder {
    pub source: Asset,
    pub destination: Asset,
    pub request: SwapRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteResponse {
    pub amount_in: U256,
    pub expected_out: U256,
    /// `expected_out` in destination units
    pub expected_out_display: String,
    pub min_amount_out: U256,
    pub selection: RouteSelection,
    pub plan: SwapPlan,
}

impl Router {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        signer: Arc<dyn TxSigner>,
        network: Arc<NetworkConfig>,
    ) -> Self {
        let executor = ExecutionEngine::new(chain.clone(), signer, network.clone());
        Self {
            chain,
            network,
            executor,
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Get access to the execution engine
    pub fn executor(&self) -> &ExecutionEngine {
        &self.executor
    }

    /// Resolve symbols, precision and the human amount.
    pub async fn resolve(&self, order: &OrderRequest) -> Result<ResolvedOrder, SwapError> {
        let lookup = |name: &str| {
            self.network
                .asset_address(name)
                .map_err(|e| SwapError::InvalidRequest(format!("{e:#}")))
        };
        let source_address = lookup(&order.source)?;
        let destination_address = lookup(&order.destination)?;
        let registry = &self.network.registry;
        let source = registry
            .resolve_asset(self.chain.as_ref(), source_address)
            .await;
        let destination = registry
            .resolve_asset(self.chain.as_ref(), destination_address)
            .await;
        let amount_in = parse_units(&order.amount, source.decimals)
            .map_err(|e| SwapError::InvalidRequest(format!("amount {:?}: {e}", order.amount)))?;
        Ok(ResolvedOrder {
            request: SwapRequest {
                source: source.address,
                destination: destination.address,
                amount_in,
                recipient: order.recipient,
            },
            source,
            destination,
        })
    }

    /// Select and plan without submitting anything.
    pub async fn quote(&self, order: &ResolvedOrder) -> Result<QuoteResponse, SwapError> {
        let req = &order.request;
        validate_request(req.source, req.destination, req.amount_in)?;
        let selection = RouteSelector::new(self.chain.as_ref(), &self.network)
            .select_route(req.source, req.destination, req.amount_in)
            .await?;
        let best = selection.best();
        let planner = SwapPlanBuilder::new(
            self.network.wrapped_native,
            self.network.policy.unwrap_native,
        );
        let plan = planner.build(best, req.recipient.unwrap_or(self.executor.account()));
        Ok(QuoteResponse {
            amount_in: req.amount_in,
            expected_out: best.amount_out,
            expected_out_display: format_units(best.amount_out, order.destination.decimals),
            min_amount_out: self.network.policy.min_amount_out(best.amount_out),
            plan,
            selection,
        })
    }

    pub async fn swap(&self, order: &ResolvedOrder) -> Result<ExecutionOutcome, ErrorReport> {
        self.executor.execute(&order.request).await
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequestError => StatusCode::BAD_REQUEST,
        ErrorKind::NoRouteError
        | ErrorKind::NoLiquidityError
        | ErrorKind::InsufficientBalanceError => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::TransportError | ErrorKind::SponsorRejectedError => StatusCode::BAD_GATEWAY,
        ErrorKind::ConfirmationTimeoutError => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

struct ApiError(SwapError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        (
            status_for(kind),
            Json(ErrorResponse {
                error: self.0.to_string(),
                kind,
            }),
        )
            .into_response()
    }
}

struct ReportError(ErrorReport);

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        (status_for(self.0.kind), Json(self.0)).into_response()
    }
}

/// Create the HTTP router with API endpoints
pub fn create_api_router(router: Arc<Router>) -> AxumRouter {
    AxumRouter::new()
        .route("/health", get(health_check))
        .route("/api/v1/quote", post(quote_route))
        .route("/api/v1/swap", post(execute_swap))
        .route("/api/v1/stats", get(get_stats))
        .route("/metrics", get(metrics))
        .with_state(router)
}

/// Health check endpoint
async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Quote route endpoint - returns route selection without executing
async fn quote_route(
    State(router): State<Arc<Router>>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<QuoteResponse>, Response> {
    let order = router
        .resolve(&req)
        .await
        .map_err(|e| ApiError(e).into_response())?;
    let quote = router
        .quote(&order)
        .await
        .map_err(|e| ApiError(e).into_response())?;
    Ok(Json(quote))
}

/// Execute swap endpoint - routes and executes a sponsored swap
async fn execute_swap(
    State(router): State<Arc<Router>>,
    Json(req): Json<OrderRequest>,
) -> Result<Json<ExecutionOutcome>, Response> {
    let order = router
        .resolve(&req)
        .await
        .map_err(|e| ApiError(e).into_response())?;
    let outcome = router
        .swap(&order)
        .await
        .map_err(|r| ReportError(r).into_response())?;
    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub network: String,
    pub account: Address,
    pub execution: ExecutionStats,
}

async fn get_stats(State(router): State<Arc<Router>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        network: router.network().name.clone(),
        account: router.executor().account(),
        execution: router.executor().get_stats(),
    })
}

async fn metrics() -> String {
    crate::metrics::render()
}
