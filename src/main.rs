// =============================================================================
// Mean-Reversion Alert Bridge — Main Entry Point
// =============================================================================
//
// Receives TradingView alerts on a single webhook route and turns them into
// take-profit closes or break-even stops on the MEXC futures account.
// Startup halts if credentials are missing or the initial account snapshot
// cannot be fetched; after that, failed alerts never stop the server.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod account;
mod actions;
mod alert;
mod api;
mod dispatcher;
mod error;
mod exchange;
mod mexc;
mod runtime_config;
mod trade_registry;
mod types;

use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::dispatcher::AlertDispatcher;
use crate::exchange::ExchangeAdapter;
use crate::mexc::MexcClient;
use crate::runtime_config::{Credentials, RuntimeConfig, ALERT_PATH};
use crate::trade_registry::TradeRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Mean-reversion alert bridge starting up");

    let config = RuntimeConfig::load("runtime_config.json").unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    let bind_addr = std::env::var("MR_BIND_ADDR").unwrap_or_else(|_| config.bind_addr());
    let credentials = Credentials::from_env()?;

    // ── 2. Exchange client ───────────────────────────────────────────────
    let exchange: Arc<dyn ExchangeAdapter> = Arc::new(MexcClient::new(credentials, &config)?);
    info!(
        exchange = exchange.name(),
        margin_mode = %config.margin_mode,
        "Exchange client ready"
    );

    // ── 3. Account snapshot & trade registry ─────────────────────────────
    let snapshot = account::fetch_and_log(exchange.as_ref(), &config.quote_currency).await?;

    let registry = Arc::new(TradeRegistry::new());
    if config.adopt_open_positions {
        account::adopt_open_positions(&registry, &snapshot.positions).await;
    } else {
        info!("Position adoption disabled; waiting for upstream trade state");
    }

    // ── 4. Webhook server ────────────────────────────────────────────────
    let dispatcher = Arc::new(AlertDispatcher::new(
        registry.clone(),
        exchange.clone(),
        config.quote_currency.clone(),
    ));
    let app = api::webhook::router(dispatcher);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, path = ALERT_PATH, "Webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // ── 5. Shutdown ──────────────────────────────────────────────────────
    if !registry.is_empty() {
        for symbol in registry.active_symbols().await {
            let flags = registry.get(&symbol).await;
            warn!(
                symbol = %symbol,
                trade = ?flags.trade_info,
                "Shutting down with active trade; state is not persisted"
            );
        }
    }
    info!("Mean-reversion alert bridge shut down complete.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    warn!("Shutdown signal received, stopping gracefully");
}
