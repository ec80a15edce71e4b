// =============================================================================
// Action Handlers — take-profit close and stop-to-breakeven
// =============================================================================
//
// Each handler computes its order from the live exchange position and submits
// exactly one order. Fills are not awaited: an accepted submission counts as
// success.
// =============================================================================

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::DispatchError;
use crate::exchange::ExchangeAdapter;
use crate::trade_registry::SymbolFlags;
use crate::types::{
    OrderAck, OrderParams, OrderRequest, OrderType, Position, PositionSide, StopType,
    TriggerPriceType,
};

/// Issues the orders behind each alert kind.
pub struct ActionEngine {
    exchange: Arc<dyn ExchangeAdapter>,
}

impl ActionEngine {
    pub fn new(exchange: Arc<dyn ExchangeAdapter>) -> Self {
        Self { exchange }
    }

    /// Close the whole position with a market order on the opposite side,
    /// then clear the symbol's flags. A failed submission leaves the flags
    /// untouched.
    pub async fn take_profit(
        &self,
        symbol: &str,
        position: &Position,
        flags: &mut SymbolFlags,
    ) -> Result<OrderAck, DispatchError> {
        info!(symbol, side = %position.side, contracts = position.contracts, "TP hit");

        let result = match position.side {
            PositionSide::Long => {
                self.exchange
                    .create_market_sell_order(symbol, position.contracts)
                    .await
            }
            PositionSide::Short => {
                self.exchange
                    .create_market_buy_order(symbol, position.contracts)
                    .await
            }
        };

        let ack = result.map_err(|e| {
            warn!(symbol, error = %e, "take-profit close order failed");
            DispatchError::AdapterFailure(e)
        })?;

        info!(symbol, order_id = ?ack.order_id, "position close submitted");
        flags.reset();
        Ok(ack)
    }

    /// Move the stop to the entry price: a stop-limit order for the full
    /// position, triggered on mark price. The symbol stays in-trade.
    pub async fn break_even(&self, symbol: &str, position: &Position) -> Result<OrderAck, DispatchError> {
        info!(symbol, side = %position.side, "BE hit");

        let entry_price = position
            .entry_price
            .ok_or_else(|| DispatchError::MissingEntryPrice(symbol.to_string()))?;

        let request = Self::break_even_order(position, entry_price);
        let ack = self.exchange.create_order(&request).await.map_err(|e| {
            warn!(symbol, error = %e, "break-even stop order failed");
            DispatchError::AdapterFailure(e)
        })?;

        info!(
            symbol,
            entry_price,
            order_id = ?ack.order_id,
            "stop limit moved to break-even"
        );
        Ok(ack)
    }

    fn break_even_order(position: &Position, entry_price: f64) -> OrderRequest {
        OrderRequest {
            symbol: position.symbol.clone(),
            order_type: OrderType::StopLimit,
            side: position.side.closing_side(),
            amount: position.contracts.abs(),
            price: Some(entry_price),
            params: OrderParams {
                stop_price: Some(entry_price),
                trigger_price_type: TriggerPriceType::MarkPrice,
                stop_type: StopType::Full,
                position_id: position.position_id.clone(),
            },
        }
    }
}

impl std::fmt::Debug for ActionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionEngine")
            .field("exchange", &self.exchange.name())
            .finish()
    }
}
