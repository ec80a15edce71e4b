// =============================================================================
// Webhook Endpoint — Axum 0.7
// =============================================================================
//
// A single route: `POST /tradingview/meanreversion`. Every other method or
// path is answered with a plain `404 Not Found` before any state is touched.
//
// The body is read as raw bytes: TradingView posts JSON with a `text/plain`
// content type, so the `Json` extractor would reject valid alerts.
// =============================================================================

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::dispatcher::AlertDispatcher;
use crate::runtime_config::ALERT_PATH;

// =============================================================================
// Router construction
// =============================================================================

/// Build the webhook router around a shared dispatcher.
pub fn router(dispatcher: Arc<AlertDispatcher>) -> Router {
    Router::new()
        .route(ALERT_PATH, post(handle_alert).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher)
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}

// =============================================================================
// Alert handler
// =============================================================================

async fn handle_alert(State(dispatcher): State<Arc<AlertDispatcher>>, body: Bytes) -> Response {
    match dispatcher.dispatch(&body).await {
        Ok(outcome) => {
            info!(
                symbol = %outcome.alert.symbol,
                kind = %outcome.alert.kind,
                order_id = ?outcome.order.order_id,
                "alert handled"
            );
            (StatusCode::OK, "Request handled successfully").into_response()
        }
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                error!(status = %status, error = %e.body(), "alert handling failed");
            } else {
                warn!(status = %status, reason = %e, "alert rejected");
            }
            e.into_response()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use crate::exchange::MockExchangeAdapter;
    use crate::trade_registry::{TradeInfo, TradeRegistry};
    use crate::types::{OrderAck, Position, PositionSide};

    fn sol_long() -> Position {
        Position {
            symbol: "SOL_USDT".into(),
            side: PositionSide::Long,
            contracts: 15.0,
            entry_price: Some(142.3),
            position_id: Some("31".into()),
        }
    }

    fn app(mock: MockExchangeAdapter, registry: Arc<TradeRegistry>) -> Router {
        router(Arc::new(AlertDispatcher::new(registry, Arc::new(mock), "USDT")))
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "text/plain; charset=utf-8")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn other_routes_are_not_found_and_touch_nothing() {
        let registry = Arc::new(TradeRegistry::new());
        let alert = r#"{"symbol":"BTCUSDT.P","message":"TP"}"#;

        for (method, uri) in [
            (Method::GET, ALERT_PATH),
            (Method::PUT, ALERT_PATH),
            (Method::POST, "/tradingview/other"),
            (Method::POST, "/"),
            (Method::GET, "/health"),
        ] {
            let (status, body) = send(app(MockExchangeAdapter::new(), registry.clone()), method, uri, alert).await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body, "Not Found");
        }
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn take_profit_alert_returns_success() {
        let registry = Arc::new(TradeRegistry::new());
        registry.open_trade("SOLUSDT", TradeInfo::from_position(&sol_long())).await;

        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions()
            .times(1)
            .returning(|| Ok(vec![sol_long()]));
        mock.expect_create_market_sell_order()
            .withf(|symbol, amount| symbol == "SOLUSDT" && *amount == 15.0)
            .times(1)
            .returning(|_, _| {
                Ok(OrderAck {
                    order_id: Some("1".into()),
                    raw: serde_json::Value::Null,
                })
            });

        let (status, body) = send(
            app(mock, registry.clone()),
            Method::POST,
            ALERT_PATH,
            r#"{"symbol":"SOLUSDT.P","message":"TP"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "Request handled successfully");
        assert!(!registry.get("SOLUSDT").await.in_trade);
    }

    #[tokio::test]
    async fn inactive_symbol_is_bad_request() {
        let (status, body) = send(
            app(MockExchangeAdapter::new(), Arc::new(TradeRegistry::new())),
            Method::POST,
            ALERT_PATH,
            r#"{"symbol":"BTCUSDT.P","message":"BE"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "No active trade for symbol");
    }

    #[tokio::test]
    async fn invalid_symbol_and_kind_are_bad_request() {
        let registry = Arc::new(TradeRegistry::new());

        let (status, body) = send(
            app(MockExchangeAdapter::new(), registry.clone()),
            Method::POST,
            ALERT_PATH,
            r#"{"message":"TP"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid symbol");

        let (status, body) = send(
            app(MockExchangeAdapter::new(), registry),
            Method::POST,
            ALERT_PATH,
            r#"{"symbol":"BTCUSDT.P","message":"CLOSE"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Invalid message type");
    }

    #[tokio::test]
    async fn malformed_body_is_internal_error() {
        let (status, body) = send(
            app(MockExchangeAdapter::new(), Arc::new(TradeRegistry::new())),
            Method::POST,
            ALERT_PATH,
            "{not json",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Error: "));
    }

    #[tokio::test]
    async fn order_failure_is_internal_error_with_message() {
        let registry = Arc::new(TradeRegistry::new());
        registry.open_trade("SOLUSDT", TradeInfo::from_position(&sol_long())).await;

        let mut mock = MockExchangeAdapter::new();
        mock.expect_fetch_positions()
            .times(1)
            .returning(|| Ok(vec![sol_long()]));
        mock.expect_create_order()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("MEXC rejected (code 2005): balance insufficient")));

        let (status, body) = send(
            app(mock, registry.clone()),
            Method::POST,
            ALERT_PATH,
            r#"{"symbol":"SOLUSDT.P","message":"BE"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Error: MEXC rejected (code 2005): balance insufficient");
        assert!(registry.get("SOLUSDT").await.in_trade);
    }
}
