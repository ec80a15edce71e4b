// =============================================================================
// MEXC Contract REST API Client — HMAC-SHA256 signed requests
// =============================================================================
//
// SECURITY: The secret key is never logged or serialized. Signed requests
// carry `ApiKey`, `Request-Time` and `Signature` headers; the signature covers
// `api_key + request_time + param_string`, where `param_string` is the sorted
// query string for GET and the raw JSON body for POST.
//
// Every response is wrapped in `{ success, code, data, message }`. Anything
// other than `success: true` is surfaced as an error carrying the exchange
// code and message.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::exchange::ExchangeAdapter;
use crate::mexc::rate_limit::RequestThrottle;
use crate::runtime_config::{Credentials, MarginMode, RuntimeConfig};
use crate::types::{
    AccountBalance, OrderAck, OrderRequest, OrderSide, OrderType, Position, PositionSide,
    StopType, TriggerPriceType,
};

type HmacSha256 = Hmac<Sha256>;

// Order side codes of the contract API.
const SIDE_CLOSE_SHORT: u8 = 2;
const SIDE_CLOSE_LONG: u8 = 4;

// Order type codes.
const ORDER_TYPE_LIMIT: u8 = 1;
const ORDER_TYPE_MARKET: u8 = 5;

// Position type codes.
const POSITION_TYPE_LONG: i64 = 1;
const POSITION_TYPE_SHORT: i64 = 2;

// Plan order trigger directions.
const TRIGGER_GTE: u8 = 1;
const TRIGGER_LTE: u8 = 2;

/// Plan orders stay armed for seven days.
const PLAN_EXECUTE_CYCLE_7D: u8 = 2;

/// Response envelope shared by every contract endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
}

/// MEXC futures (contract) REST client.
pub struct MexcClient {
    api_key: String,
    secret: String,
    base_url: String,
    quote_currency: String,
    recv_window_ms: u64,
    margin_mode: MarginMode,
    client: reqwest::Client,
    throttle: RequestThrottle,
}

impl MexcClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(credentials: Credentials, config: &RuntimeConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(
            "apikey",
            HeaderValue::from_str(&credentials.api_key).context("API key is not a valid header value")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        debug!(base_url = %config.base_url, "MexcClient initialised");

        Ok(Self {
            api_key: credentials.api_key,
            secret: credentials.secret,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            quote_currency: config.quote_currency.clone(),
            recv_window_ms: config.recv_window_ms,
            margin_mode: config.margin_mode,
            client,
            throttle: RequestThrottle::new(Duration::from_millis(config.min_request_interval_ms)),
        })
    }

    // -------------------------------------------------------------------------
    // Signing helpers
    // -------------------------------------------------------------------------

    /// HMAC-SHA256 hex signature of `api_key + request_time + param_string`.
    pub fn sign(&self, request_time: i64, param_string: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .context("invalid HMAC key")?;
        mac.update(self.api_key.as_bytes());
        mac.update(request_time.to_string().as_bytes());
        mac.update(param_string.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Parameters sorted by key and joined as `k=v&k=v`.
    fn query_string(params: &[(&str, String)]) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    fn auth_headers(&self, param_string: &str) -> Result<HeaderMap> {
        let request_time = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(request_time, param_string)?;

        let mut headers = HeaderMap::new();
        headers.insert("request-time", HeaderValue::from(request_time));
        headers.insert("recv-window", HeaderValue::from(self.recv_window_ms));
        headers.insert(
            "signature",
            HeaderValue::from_str(&signature).context("signature is not a valid header value")?,
        );
        Ok(headers)
    }

    /// Exchange symbol for a tradable symbol: "BTCUSDT" -> "BTC_USDT".
    pub fn contract_symbol(&self, symbol: &str) -> String {
        if symbol.contains('_') {
            return symbol.to_string();
        }
        match symbol.strip_suffix(self.quote_currency.as_str()) {
            Some(base) if !base.is_empty() => format!("{base}_{}", self.quote_currency),
            _ => symbol.to_string(),
        }
    }

    // -------------------------------------------------------------------------
    // Transport
    // -------------------------------------------------------------------------

    async fn get_private(&self, path: &str, params: &[(&str, String)]) -> Result<Value> {
        let qs = Self::query_string(params);
        self.throttle.acquire().await;
        let headers = self.auth_headers(&qs)?;
        let url = if qs.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}?{}", self.base_url, path, qs)
        };

        let resp = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .with_context(|| format!("GET {path} request failed"))?;

        Self::unwrap_envelope("GET", path, resp).await
    }

    async fn post_private(&self, path: &str, body: &Value) -> Result<Value> {
        let payload = serde_json::to_string(body).context("failed to serialise request body")?;
        self.throttle.acquire().await;
        let headers = self.auth_headers(&payload)?;
        let url = format!("{}{}", self.base_url, path);

        let resp = self
            .client
            .post(&url)
            .headers(headers)
            .body(payload)
            .send()
            .await
            .with_context(|| format!("POST {path} request failed"))?;

        Self::unwrap_envelope("POST", path, resp).await
    }

    async fn unwrap_envelope(method: &str, path: &str, resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        let text = resp
            .text()
            .await
            .with_context(|| format!("failed to read {method} {path} response"))?;

        if !status.is_success() {
            anyhow::bail!("MEXC {method} {path} returned {status}: {text}");
        }

        let envelope: Envelope = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {method} {path} response"))?;
        Self::check_envelope(method, path, envelope)
    }

    fn check_envelope(method: &str, path: &str, envelope: Envelope) -> Result<Value> {
        if !envelope.success {
            anyhow::bail!(
                "MEXC {method} {path} rejected (code {}): {}",
                envelope.code,
                envelope.message.as_deref().unwrap_or("no message")
            );
        }
        Ok(envelope.data)
    }

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------

    /// Side code for an exit order. The bridge only ever reduces positions,
    /// so sells close longs and buys close shorts.
    fn close_side_code(side: OrderSide) -> u8 {
        match side {
            OrderSide::Sell => SIDE_CLOSE_LONG,
            OrderSide::Buy => SIDE_CLOSE_SHORT,
        }
    }

    fn trend_code(trigger: TriggerPriceType) -> u8 {
        match trigger {
            TriggerPriceType::LastPrice => 1,
            TriggerPriceType::MarkPrice => 2,
            TriggerPriceType::IndexPrice => 3,
        }
    }

    /// A sell stop fires when price falls to the trigger, a buy stop when it
    /// rises to it.
    fn trigger_direction(side: OrderSide) -> u8 {
        match side {
            OrderSide::Sell => TRIGGER_LTE,
            OrderSide::Buy => TRIGGER_GTE,
        }
    }

    fn submit_body(&self, symbol: &str, side: OrderSide, order_type: u8, vol: f64, price: Option<f64>) -> Value {
        let mut body = json!({
            "symbol": self.contract_symbol(symbol),
            "vol": vol,
            "side": Self::close_side_code(side),
            "type": order_type,
            "openType": self.margin_mode.code(),
            "externalOid": Uuid::new_v4().simple().to_string(),
        });
        if let (Some(p), Some(obj)) = (price, body.as_object_mut()) {
            obj.insert("price".to_string(), json!(p));
        }
        body
    }

    fn plan_order_body(&self, request: &OrderRequest) -> Result<Value> {
        let price = request
            .price
            .context("stop-limit order requires a limit price")?;
        let trigger_price = request.params.stop_price.unwrap_or(price);

        let mut body = json!({
            "symbol": self.contract_symbol(&request.symbol),
            "vol": request.amount,
            "side": Self::close_side_code(request.side),
            "openType": self.margin_mode.code(),
            "price": price,
            "triggerPrice": trigger_price,
            "triggerType": Self::trigger_direction(request.side),
            "trend": Self::trend_code(request.params.trigger_price_type),
            "orderType": ORDER_TYPE_LIMIT,
            "executeCycle": PLAN_EXECUTE_CYCLE_7D,
            "reduceOnly": request.params.stop_type == StopType::Full,
        });

        if let (Some(id), Some(obj)) = (&request.params.position_id, body.as_object_mut()) {
            let value = id.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(id));
            obj.insert("positionId".to_string(), value);
        }
        Ok(body)
    }

    async fn submit_market(&self, symbol: &str, side: OrderSide, amount: f64) -> Result<OrderAck> {
        let body = self.submit_body(symbol, side, ORDER_TYPE_MARKET, amount, None);
        debug!(symbol, %side, amount, "placing market order");
        let data = self.post_private("/api/v1/private/order/submit", &body).await?;
        Ok(Self::order_ack(data))
    }

    fn order_ack(data: Value) -> OrderAck {
        let order_id = match &data {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Object(obj) => obj.get("orderId").map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            _ => None,
        };
        OrderAck { order_id, raw: data }
    }

    // -------------------------------------------------------------------------
    // Response parsing
    // -------------------------------------------------------------------------

    fn parse_position(raw: &Value) -> Result<Option<Position>> {
        let symbol = raw["symbol"]
            .as_str()
            .context("position entry missing 'symbol'")?
            .to_string();

        let side = match raw["positionType"].as_i64() {
            Some(POSITION_TYPE_LONG) => PositionSide::Long,
            Some(POSITION_TYPE_SHORT) => PositionSide::Short,
            other => anyhow::bail!("position {symbol} has unknown positionType {other:?}"),
        };

        let contracts = parse_f64(&raw["holdVol"]).unwrap_or(0.0);
        if contracts == 0.0 {
            return Ok(None);
        }

        let entry_price = parse_f64(&raw["openAvgPrice"])
            .or_else(|| parse_f64(&raw["holdAvgPrice"]))
            .filter(|p| *p > 0.0);

        let position_id = match &raw["positionId"] {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        Ok(Some(Position {
            symbol,
            side,
            contracts,
            entry_price,
            position_id,
        }))
    }

    fn parse_balance(raw: &Value) -> Option<AccountBalance> {
        let currency = raw["currency"].as_str()?.to_string();
        let free = parse_f64(&raw["availableBalance"]).unwrap_or(0.0);
        let frozen = parse_f64(&raw["frozenBalance"]).unwrap_or(0.0);
        let margin = parse_f64(&raw["positionMargin"]).unwrap_or(0.0);
        let total = parse_f64(&raw["equity"]).unwrap_or(free + frozen + margin);
        Some(AccountBalance {
            currency,
            total,
            free,
            used: frozen + margin,
        })
    }
}

/// Parse a JSON value that may be either a string or a number into `f64`.
fn parse_f64(val: &Value) -> Option<f64> {
    match val {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl ExchangeAdapter for MexcClient {
    /// GET /api/v1/private/account/assets (signed). The contract API only
    /// exposes the futures account, so anything but "swap" is logged and
    /// served from the same endpoint.
    #[instrument(skip(self), name = "mexc::fetch_balance")]
    async fn fetch_balance(&self, account_type: &str) -> Result<Vec<AccountBalance>> {
        if account_type != "swap" {
            warn!(account_type, "only the swap account is available on the contract API");
        }

        let data = self.get_private("/api/v1/private/account/assets", &[]).await?;
        let balances: Vec<AccountBalance> = data
            .as_array()
            .context("assets response is not an array")?
            .iter()
            .filter_map(Self::parse_balance)
            .collect();

        debug!(count = balances.len(), "balances retrieved");
        Ok(balances)
    }

    /// GET /api/v1/private/position/open_positions (signed).
    #[instrument(skip(self), name = "mexc::fetch_positions")]
    async fn fetch_positions(&self) -> Result<Vec<Position>> {
        let data = self
            .get_private("/api/v1/private/position/open_positions", &[])
            .await?;

        let raw = data
            .as_array()
            .context("open_positions response is not an array")?;

        let mut positions = Vec::with_capacity(raw.len());
        for entry in raw {
            if let Some(position) = Self::parse_position(entry)? {
                positions.push(position);
            }
        }

        debug!(count = positions.len(), "open positions retrieved");
        Ok(positions)
    }

    #[instrument(skip(self), name = "mexc::create_market_sell_order")]
    async fn create_market_sell_order(&self, symbol: &str, amount: f64) -> Result<OrderAck> {
        self.submit_market(symbol, OrderSide::Sell, amount).await
    }

    #[instrument(skip(self), name = "mexc::create_market_buy_order")]
    async fn create_market_buy_order(&self, symbol: &str, amount: f64) -> Result<OrderAck> {
        self.submit_market(symbol, OrderSide::Buy, amount).await
    }

    /// Market and limit orders go to `order/submit`; stop-limit orders are
    /// placed as plan (trigger) orders.
    #[instrument(skip(self, request), fields(symbol = %request.symbol, order_type = %request.order_type), name = "mexc::create_order")]
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderAck> {
        let (path, body) = match request.order_type {
            OrderType::Market => (
                "/api/v1/private/order/submit",
                self.submit_body(&request.symbol, request.side, ORDER_TYPE_MARKET, request.amount, None),
            ),
            OrderType::Limit => {
                let price = request.price.context("limit order requires a price")?;
                (
                    "/api/v1/private/order/submit",
                    self.submit_body(&request.symbol, request.side, ORDER_TYPE_LIMIT, request.amount, Some(price)),
                )
            }
            OrderType::StopLimit => ("/api/v1/private/planorder/place", self.plan_order_body(request)?),
        };

        debug!(path, side = %request.side, amount = request.amount, "placing order");
        let data = self.post_private(path, &body).await?;
        let ack = Self::order_ack(data);
        debug!(order_id = ?ack.order_id, throttle = ?self.throttle.snapshot(), "order accepted");
        Ok(ack)
    }

    fn name(&self) -> &'static str {
        "mexc"
    }
}

impl std::fmt::Debug for MexcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MexcClient")
            .field("api_key", &"<redacted>")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("margin_mode", &self.margin_mode)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
