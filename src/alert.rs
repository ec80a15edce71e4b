// =============================================================================
// Alert model — inbound TradingView payload and symbol derivation
// =============================================================================
//
// TradingView sends the chart symbol in dotted form ("BTCUSDT.P"). The
// tradable symbol is everything before the first dot; the bare crypto name
// is the tradable symbol up to the quote currency ("BTC").
// =============================================================================

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Action requested by an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    TakeProfit,
    BreakEven,
}

impl FromStr for AlertKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TP" | "TakeProfit" => Ok(Self::TakeProfit),
            "BE" | "BreakEven" => Ok(Self::BreakEven),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TakeProfit => write!(f, "TP"),
            Self::BreakEven => write!(f, "BE"),
        }
    }
}

/// Raw JSON body as posted by the alerting tool. Both fields are optional
/// here so that missing values surface as validation errors rather than
/// parse failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertPayload {
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A validated alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    /// Tradable symbol, e.g. "BTCUSDT".
    pub symbol: String,
    pub kind: AlertKind,
}

/// Substring before the first `.`; `None` when that is empty.
pub fn tradable_symbol(raw: &str) -> Option<&str> {
    let symbol = raw.split('.').next().unwrap_or_default().trim();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol)
    }
}

/// Tradable symbol up to the first occurrence of `quote`
/// ("ETHUSDT" -> "ETH"). A symbol without the quote is returned whole.
pub fn bare_crypto_name<'a>(tradable: &'a str, quote: &str) -> &'a str {
    if quote.is_empty() {
        return tradable;
    }
    match tradable.find(quote) {
        Some(idx) => &tradable[..idx],
        None => tradable,
    }
}
