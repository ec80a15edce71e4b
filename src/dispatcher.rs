// =============================================================================
// Alert Dispatcher — validate, gate on trade state, route to a handler
// =============================================================================
//
// Order of checks for one alert:
//   1. body parses as JSON                 -> MalformedRequest
//   2. symbol has a non-empty prefix       -> InvalidSymbol
//   3. message is TP / BE                  -> UnsupportedMessageKind
//   4. symbol is in-trade                  -> NoActiveTrade
//   5. a live position matches the symbol  -> PositionNotFound
//   6. handler runs                        -> MissingEntryPrice / AdapterFailure
//
// Steps 1-4 never touch the exchange. The symbol's registry guard is held
// from step 4 until the handler returns.
// =============================================================================

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::actions::ActionEngine;
use crate::alert::{bare_crypto_name, tradable_symbol, Alert, AlertKind, AlertPayload};
use crate::error::DispatchError;
use crate::exchange::ExchangeAdapter;
use crate::trade_registry::TradeRegistry;
use crate::types::{OrderAck, Position};

/// Result of a successfully handled alert.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub alert: Alert,
    pub order: OrderAck,
}

pub struct AlertDispatcher {
    registry: Arc<TradeRegistry>,
    exchange: Arc<dyn ExchangeAdapter>,
    actions: ActionEngine,
    quote_currency: String,
}

impl AlertDispatcher {
    pub fn new(
        registry: Arc<TradeRegistry>,
        exchange: Arc<dyn ExchangeAdapter>,
        quote_currency: impl Into<String>,
    ) -> Self {
        Self {
            actions: ActionEngine::new(exchange.clone()),
            registry,
            exchange,
            quote_currency: quote_currency.into(),
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Arc<TradeRegistry> {
        &self.registry
    }

    /// Handle one raw alert body end to end.
    #[instrument(skip_all, name = "dispatch_alert")]
    pub async fn dispatch(&self, body: &[u8]) -> Result<DispatchOutcome, DispatchError> {
        let payload: AlertPayload = serde_json::from_slice(body)
            .map_err(|e| DispatchError::MalformedRequest(e.to_string()))?;
        let alert = Self::validate(payload)?;
        debug!(symbol = %alert.symbol, kind = %alert.kind, "alert validated");

        let mut flags = match self.registry.lock_existing(&alert.symbol).await {
            Some(flags) if flags.in_trade => flags,
            _ => return Err(DispatchError::NoActiveTrade(alert.symbol)),
        };

        let positions = self.exchange.fetch_positions().await?;
        let crypto_name = bare_crypto_name(&alert.symbol, &self.quote_currency);
        let position = find_position(&positions, crypto_name)
            .ok_or_else(|| DispatchError::PositionNotFound(alert.symbol.clone()))?;

        let order = match alert.kind {
            AlertKind::TakeProfit => {
                self.actions
                    .take_profit(&alert.symbol, position, &mut flags)
                    .await?
            }
            AlertKind::BreakEven => self.actions.break_even(&alert.symbol, position).await?,
        };

        Ok(DispatchOutcome { alert, order })
    }

    fn validate(payload: AlertPayload) -> Result<Alert, DispatchError> {
        let symbol = payload
            .symbol
            .as_deref()
            .and_then(tradable_symbol)
            .ok_or(DispatchError::InvalidSymbol)?
            .to_string();

        let kind = payload
            .message
            .as_deref()
            .and_then(|m| m.parse::<AlertKind>().ok())
            .ok_or(DispatchError::UnsupportedMessageKind(payload.message.clone()))?;

        Ok(Alert { symbol, kind })
    }
}

/// First position whose exchange symbol contains `crypto_name`. An empty
/// name matches nothing.
pub fn find_position<'a>(positions: &'a [Position], crypto_name: &str) -> Option<&'a Position> {
    if crypto_name.is_empty() {
        return None;
    }
    positions.iter().find(|p| p.symbol.contains(crypto_name))
}

impl std::fmt::Debug for AlertDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertDispatcher")
            .field("registry", &self.registry)
            .field("actions", &self.actions)
            .field("quote_currency", &self.quote_currency)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::MockExchangeAdapter;
    use crate::trade_registry::{SymbolFlags, TradeInfo};
    use crate::types::{OrderSide, OrderType, PositionSide};

    fn btc_long() -> Position {
        Position {
            symbol: "BTC_USDT".into(),
            side: PositionSide::Long,
            contracts: 3.0,
            entry_price: Some(61_000.0),
            position_id: Some("77".into()),
        }
    }

    fn eth_short() -> Position {
        Position {
            symbol: "ETH_USDT".into(),
            side: PositionSide::Short,
            contracts: 20.0,
            entry_price: None,
            position_id: None,
        }
    }

    fn ack() -> OrderAck {
        OrderAck {
            order_id: Some("9".into()),
            raw: serde_json::Value::Null,
        }
    }

    async fn dispatcher_with(mock: MockExchangeAdapter, active: &[Position]) -> AlertDispatcher {
        let registry = Arc::new(TradeRegistry::new());
        for pos in active {
            let symbol = pos.symbol.replace('_', "");
            registry.open_trade(&symbol, TradeInfo::from_position(pos)).await;
        }
        AlertDispatcher::new(registry, Arc::new(mock), "USDT")
    }

    #[tokio::test]
    async fn inactive_symbol_is_rejected_for_every_kind_without_fetching() {
        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions().never();
        let dispatcher = dispatcher_with(mock, &[]).await;

        for message in ["TP", "BE"] {
            let body = format!(r#"{{"symbol":"BTCUSDT.P","message":"{message}"}}"#);
            let err = dispatcher.dispatch(body.as_bytes()).await.unwrap_err();
            assert!(matches!(err, DispatchError::NoActiveTrade(ref s) if s == "BTCUSDT"));
        }
    }

    #[tokio::test]
    async fn rejected_alerts_for_unknown_symbols_leave_registry_empty() {
        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions().never();
        let dispatcher = dispatcher_with(mock, &[]).await;

        for i in 0..1_000 {
            let body = format!(r#"{{"symbol":"JUNK{i}USDT.P","message":"TP"}}"#);
            let err = dispatcher.dispatch(body.as_bytes()).await.unwrap_err();
            assert!(matches!(err, DispatchError::NoActiveTrade(_)));
        }
        assert_eq!(dispatcher.registry().len(), 0);
    }

    #[tokio::test]
    async fn take_profit_closes_long_and_resets_registry() {
        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions()
            .times(1)
            .returning(|| Ok(vec![eth_short(), btc_long()]));
        mock.expect_create_market_sell_order()
            .withf(|symbol, amount| symbol == "BTCUSDT" && *amount == 3.0)
            .times(1)
            .returning(|_, _| Ok(ack()));
        mock.expect_create_market_buy_order().never();
        let dispatcher = dispatcher_with(mock, &[btc_long()]).await;

        let outcome = dispatcher
            .dispatch(br#"{"symbol":"BTCUSDT.P","message":"TP"}"#)
            .await
            .unwrap();
        assert_eq!(outcome.alert.kind, AlertKind::TakeProfit);
        assert_eq!(outcome.order.order_id.as_deref(), Some("9"));
        assert_eq!(dispatcher.registry().get("BTCUSDT").await, SymbolFlags::default());
    }

    #[tokio::test]
    async fn break_even_keeps_trade_active() {
        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions()
            .times(1)
            .returning(|| Ok(vec![btc_long()]));
        mock.expect_create_order()
            .withf(|req| {
                req.order_type == OrderType::StopLimit
                    && req.side == OrderSide::Sell
                    && req.price == Some(61_000.0)
                    && req.params.stop_price == Some(61_000.0)
            })
            .times(1)
            .returning(|_| Ok(ack()));
        let dispatcher = dispatcher_with(mock, &[btc_long()]).await;

        dispatcher
            .dispatch(br#"{"symbol":"BTCUSDT.P","message":"BE"}"#)
            .await
            .unwrap();

        let flags = dispatcher.registry().get("BTCUSDT").await;
        assert!(flags.in_trade);
        assert!(flags.trade_info.is_some());
    }

    #[tokio::test]
    async fn break_even_without_entry_price_fails_and_places_nothing() {
        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions()
            .times(1)
            .returning(|| Ok(vec![eth_short()]));
        mock.expect_create_order().never();
        let dispatcher = dispatcher_with(mock, &[eth_short()]).await;

        let err = dispatcher
            .dispatch(br#"{"symbol":"ETHUSDT.P","message":"BE"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingEntryPrice(_)));
        assert!(dispatcher.registry().get("ETHUSDT").await.in_trade);
    }

    #[tokio::test]
    async fn missing_position_is_not_found() {
        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions()
            .times(1)
            .returning(|| Ok(vec![eth_short()]));
        let dispatcher = dispatcher_with(mock, &[btc_long()]).await;

        let err = dispatcher
            .dispatch(br#"{"symbol":"BTCUSDT.P","message":"TP"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::PositionNotFound(_)));
        assert!(dispatcher.registry().get("BTCUSDT").await.in_trade);
    }

    #[tokio::test]
    async fn validation_errors_precede_registry_and_exchange() {
        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions().never();
        let dispatcher = dispatcher_with(mock, &[btc_long()]).await;

        let err = dispatcher.dispatch(b"not json").await.unwrap_err();
        assert!(matches!(err, DispatchError::MalformedRequest(_)));

        let err = dispatcher.dispatch(br#"{"message":"TP"}"#).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidSymbol));

        let err = dispatcher
            .dispatch(br#"{"symbol":".P","message":"TP"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidSymbol));

        let err = dispatcher
            .dispatch(br#"{"symbol":"BTCUSDT.P","message":"SL"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedMessageKind(Some(ref m)) if m == "SL"));
    }

    #[tokio::test]
    async fn fetch_failure_surfaces_as_adapter_failure() {
        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions()
            .times(1)
            .returning(|| Err(anyhow::anyhow!("timeout")));
        let dispatcher = dispatcher_with(mock, &[btc_long()]).await;

        let err = dispatcher
            .dispatch(br#"{"symbol":"BTCUSDT.P","message":"TP"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::AdapterFailure(_)));
        assert_eq!(err.body(), "Error: timeout");
    }

    #[test]
    fn find_position_uses_substring_match() {
        let positions = vec![eth_short(), btc_long()];
        assert_eq!(find_position(&positions, "BTC").map(|p| p.symbol.as_str()), Some("BTC_USDT"));
        assert_eq!(find_position(&positions, "ETH").map(|p| p.symbol.as_str()), Some("ETH_USDT"));
        assert!(find_position(&positions, "SOL").is_none());
        assert!(find_position(&positions, "").is_none());
    }
}
