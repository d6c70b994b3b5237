use anyhow::{anyhow, bail, Context, Result};
use sponsored_router::config::{AppConfig, SwapOrder};
use sponsored_router::errors::{ErrorReport, SwapError};
use sponsored_router::quant::format_units;
use sponsored_router::router::router::{create_api_router, OrderRequest};
use sponsored_router::router::Router;
use sponsored_router::signing::{LocalSigner, TxSigner};
use sponsored_router::transport::jsonrpc::JsonRpc;
use sponsored_router::transport::ChainClient;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing().context("initialize tracing subscriber")?;

    if let Err(err) = run().await {
        tracing::error!(error = ?err, "fatal router error");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    let config = AppConfig::load().context("load configuration from environment")?;
    let network = Arc::new(config.network().context("build network configuration")?);

    let jsonrpc = Arc::new(
        JsonRpc::new(config.rpc_endpoint.to_string()).context("initialize JSON-RPC client")?,
    );
    let chain_id = jsonrpc
        .chain_id()
        .await
        .with_context(|| format!("query chain id from {}", jsonrpc.endpoint()))?;
    if chain_id != network.chain_id {
        bail!(
            "endpoint {} serves chain {chain_id}, expected {}",
            jsonrpc.endpoint(),
            network.chain_id
        );
    }

    let signer = Arc::new(LocalSigner::from_hex(&config.private_key_hex).context("load signing key")?);
    info!(
        account = %signer.address(),
        network = %network.name,
        rpc = %jsonrpc.endpoint(),
        router = %network.router,
        paymaster = %network.sponsor.address,
        "sponsored router online"
    );

    let router = Arc::new(Router::new(jsonrpc, signer, network));

    match (config.api_listen, &config.swap) {
        (Some(addr), _) => serve(router, addr).await,
        (None, Some(order)) => run_once(&router, order).await,
        (None, None) => bail!("nothing to do: set APP__API_LISTEN or APP__SWAP__*"),
    }
}

async fn serve(router: Arc<Router>, addr: SocketAddr) -> Result<()> {
    let app = create_api_router(router.clone()).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind API server address {addr}"))?;
    info!(address = %addr, "HTTP API server starting");
    let api_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "API server error");
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = router.executor().get_stats();
                info!(
                    total_executions = stats.total_executions,
                    successful = stats.successful_executions,
                    failed = stats.failed_executions,
                    success_rate = stats.success_rate,
                    avg_confirmation_ms = ?stats.avg_confirmation_ms,
                    "execution statistics"
                );
            }
            res = tokio::signal::ctrl_c() => {
                if let Err(err) = res {
                    warn!(error = %err, "ctrl_c listener error");
                }
                info!("Shutdown signal received, exiting");
                break;
            }
        }
    }
    api_handle.abort();
    Ok(())
}

async fn run_once(router: &Router, order: &SwapOrder) -> Result<()> {
    let request = OrderRequest {
        source: order.source.clone(),
        destination: order.destination.clone(),
        amount: order.amount.clone(),
        recipient: None,
    };
    let resolved = router.resolve(&request).await.map_err(pre_trade_failure)?;

    let quote = router.quote(&resolved).await.map_err(pre_trade_failure)?;
    info!(
        route = %quote.selection.best().label,
        amount_in = %format_units(quote.amount_in, resolved.source.decimals),
        expected_out = %quote.expected_out_display,
        min_out = %format_units(quote.min_amount_out, resolved.destination.decimals),
        alternatives = quote.selection.ranked.len() - 1,
        "quote"
    );
    if order.dry_run {
        info!("dry run; nothing submitted");
        return Ok(());
    }

    match router.swap(&resolved).await {
        Ok(outcome) => {
            info!(
                tx = %outcome.tx_hash,
                block = outcome.block_number,
                received = %outcome
                    .received
                    .map(|r| format_units(r, resolved.destination.decimals))
                    .unwrap_or_else(|| "unknown".to_string()),
                spent = %outcome
                    .source_balance
                    .before
                    .checked_sub(outcome.source_balance.after)
                    .map(|s| format_units(s, resolved.source.decimals))
                    .unwrap_or_else(|| "unknown".to_string()),
                "swap complete"
            );
            Ok(())
        }
        Err(report) => Err(failure(report)),
    }
}

fn pre_trade_failure(err: SwapError) -> anyhow::Error {
    failure(ErrorReport::pre_trade(err))
}

fn failure(report: ErrorReport) -> anyhow::Error {
    let body = serde_json::to_string_pretty(&report).unwrap_or_else(|_| report.to_string());
    warn!(report = %body, "swap failed");
    anyhow!(report)
}

fn init_tracing() -> Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow!("tracing subscriber init: {err}"))
}
