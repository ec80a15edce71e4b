// =============================================================================
// Exchange Adapter — the order/position surface the bridge depends on
// =============================================================================

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{AccountBalance, OrderAck, OrderRequest, Position};

/// Authenticated handle to a derivatives exchange account.
///
/// Every call may suspend on network I/O and may fail with an exchange or
/// transport error; failures are returned, never swallowed.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Balances of the account identified by `account_type` (e.g. "swap").
    async fn fetch_balance(&self, account_type: &str) -> Result<Vec<AccountBalance>>;

    /// All currently open positions.
    async fn fetch_positions(&self) -> Result<Vec<Position>>;

    async fn create_market_sell_order(&self, symbol: &str, amount: f64) -> Result<OrderAck>;

    async fn create_market_buy_order(&self, symbol: &str, amount: f64) -> Result<OrderAck>;

    /// Submit an arbitrary order, including conditional (stop) orders.
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderAck>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}
