// =============================================================================
// Account Snapshot — startup balance/position report and position adoption
// =============================================================================
//
// Runs once before the webhook listener starts. The snapshot only reads from
// the exchange; adoption only writes to the local registry. Neither places or
// cancels orders.
// =============================================================================

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::exchange::ExchangeAdapter;
use crate::trade_registry::{TradeInfo, TradeRegistry};
use crate::types::{AccountBalance, Position};

/// Balance and open positions observed at startup.
#[derive(Debug, Clone, Serialize)]
pub struct AccountSnapshot {
    /// Balance of the quote currency, if the account holds any.
    pub quote_balance: Option<AccountBalance>,
    pub positions: Vec<Position>,
}

/// Fetch the futures balance and open positions and log both.
///
/// # Arguments
/// * `exchange`       — authenticated exchange handle.
/// * `quote_currency` — currency whose total/free/used figures are logged.
pub async fn fetch_and_log(exchange: &dyn ExchangeAdapter, quote_currency: &str) -> Result<AccountSnapshot> {
    let balances = exchange
        .fetch_balance("swap")
        .await
        .context("failed to fetch futures account balance")?;

    let quote_balance = balances.into_iter().find(|b| b.currency == quote_currency);
    match &quote_balance {
        Some(b) => info!(
            currency = %b.currency,
            total = b.total,
            free = b.free,
            used = b.used,
            "futures account balance"
        ),
        None => warn!(currency = quote_currency, "no balance reported for quote currency"),
    }

    let positions = exchange
        .fetch_positions()
        .await
        .context("failed to fetch open positions")?;

    info!(count = positions.len(), "current positions");
    for p in &positions {
        info!(
            symbol = %p.symbol,
            side = %p.side,
            contracts = p.contracts,
            entry_price = ?p.entry_price,
            position_id = ?p.position_id,
            "open position"
        );
    }

    Ok(AccountSnapshot {
        quote_balance,
        positions,
    })
}

/// Tradable symbol for an exchange symbol: separators are dropped
/// ("BTC_USDT" -> "BTCUSDT", "BTC/USDT:USDT" -> "BTCUSDT").
pub fn tradable_from_exchange_symbol(exchange_symbol: &str) -> String {
    let base = exchange_symbol.split(':').next().unwrap_or(exchange_symbol);
    base.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Mark every symbol with an open position as in-trade. Returns the adopted
/// tradable symbols.
pub async fn adopt_open_positions(registry: &TradeRegistry, positions: &[Position]) -> Vec<String> {
    let mut adopted = Vec::with_capacity(positions.len());
    for p in positions {
        let symbol = tradable_from_exchange_symbol(&p.symbol);
        if symbol.is_empty() {
            warn!(exchange_symbol = %p.symbol, "cannot derive tradable symbol, skipping");
            continue;
        }
        registry.open_trade(&symbol, TradeInfo::from_position(p)).await;
        adopted.push(symbol);
    }
    info!(adopted = ?adopted, "open positions adopted as active trades");
    adopted
}
