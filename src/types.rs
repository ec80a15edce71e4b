// =============================================================================
// Shared types used across the mean-reversion alert bridge
// =============================================================================

use serde::{Deserialize, Serialize};

/// Direction of an open derivatives position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// The order side that reduces (closes) a position on this side.
    pub fn closing_side(self) -> OrderSide {
        match self {
            Self::Long => OrderSide::Sell,
            Self::Short => OrderSide::Buy,
        }
    }
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// A live position as reported by the exchange. Read once per request and
/// never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Exchange symbol, e.g. "BTC_USDT".
    pub symbol: String,
    pub side: PositionSide,
    /// Position size in contracts.
    pub contracts: f64,
    #[serde(default)]
    pub entry_price: Option<f64>,
    /// Exchange-specific position identifier.
    #[serde(default)]
    pub position_id: Option<String>,
}

/// Balance snapshot for a single currency of the futures account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub currency: String,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub free: f64,
    #[serde(default)]
    pub used: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopLimit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
            Self::StopLimit => write!(f, "stop_limit"),
        }
    }
}

/// Reference price the exchange watches to fire a conditional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerPriceType {
    #[default]
    MarkPrice,
    LastPrice,
    IndexPrice,
}

/// Whether a stop covers the whole position or only part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopType {
    #[default]
    Full,
    Partial,
}

/// Exchange-specific extras attached to an order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderParams {
    #[serde(default)]
    pub stop_price: Option<f64>,
    #[serde(default)]
    pub trigger_price_type: TriggerPriceType,
    #[serde(default)]
    pub stop_type: StopType,
    #[serde(default)]
    pub position_id: Option<String>,
}

/// A generic order submission accepted by `ExchangeAdapter::create_order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub params: OrderParams,
}

/// Acknowledgement returned by the exchange for a submitted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    #[serde(default)]
    pub order_id: Option<String>,
    /// Raw `data` payload of the exchange response.
    #[serde(default)]
    pub raw: serde_json::Value,
}
