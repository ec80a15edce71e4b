// =============================================================================
// Trade-State Registry — per-symbol flags gating alert handling
// =============================================================================
//
// An alert is actionable for a symbol only while its `in_trade` flag is set.
// Entries are created only when a trade is opened or a symbol is reset;
// lookups for unknown symbols read as empty without inserting anything.
// Nothing is persisted, so every restart begins with an empty registry.
//
// Thread-safety: the symbol map sits behind a `parking_lot::RwLock`; each
// entry has its own async mutex. The dispatcher holds an entry's guard for
// the whole request, so alerts for one symbol are handled one at a time while
// different symbols proceed in parallel.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use crate::types::{Position, PositionSide};

/// Metadata describing the trade currently tracked for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeInfo {
    pub side: PositionSide,
    pub contracts: f64,
    #[serde(default)]
    pub entry_price: Option<f64>,
    #[serde(default)]
    pub position_id: Option<String>,
    pub opened_at: DateTime<Utc>,
}

impl TradeInfo {
    pub fn from_position(position: &Position) -> Self {
        Self {
            side: position.side,
            contracts: position.contracts,
            entry_price: position.entry_price,
            position_id: position.position_id.clone(),
            opened_at: Utc::now(),
        }
    }
}

/// Flags tracked for one tradable symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolFlags {
    pub in_trade: bool,
    /// Set by upstream signal logic; informational only.
    pub long_5min: bool,
    /// Set by upstream signal logic; informational only.
    pub short_5min: bool,
    pub trade_info: Option<TradeInfo>,
}

impl SymbolFlags {
    /// Return every flag to its empty state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn open(&mut self, info: TradeInfo) {
        self.in_trade = true;
        self.trade_info = Some(info);
    }
}

/// Exclusive access to one symbol's flags, held across awaits.
pub type SymbolGuard = OwnedMutexGuard<SymbolFlags>;

/// In-memory mapping from tradable symbol to [`SymbolFlags`].
#[derive(Default)]
pub struct TradeRegistry {
    entries: RwLock<HashMap<String, Arc<Mutex<SymbolFlags>>>>,
}

impl TradeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing(&self, symbol: &str) -> Option<Arc<Mutex<SymbolFlags>>> {
        self.entries.read().get(symbol).cloned()
    }

    fn slot(&self, symbol: &str) -> Arc<Mutex<SymbolFlags>> {
        if let Some(slot) = self.existing(symbol) {
            return slot;
        }
        self.entries
            .write()
            .entry(symbol.to_string())
            .or_default()
            .clone()
    }

    /// Acquire exclusive access to `symbol`'s flags, waiting for any request
    /// currently working on the same symbol.
    pub async fn lock(&self, symbol: &str) -> SymbolGuard {
        self.slot(symbol).lock_owned().await
    }

    /// Like [`lock`](Self::lock), but only for symbols already tracked.
    /// Unknown symbols yield `None` and leave the map untouched.
    pub async fn lock_existing(&self, symbol: &str) -> Option<SymbolGuard> {
        match self.existing(symbol) {
            Some(slot) => Some(slot.lock_owned().await),
            None => None,
        }
    }

    /// Snapshot of `symbol`'s flags (empty if never referenced).
    pub async fn get(&self, symbol: &str) -> SymbolFlags {
        match self.existing(symbol) {
            Some(slot) => slot.lock().await.clone(),
            None => SymbolFlags::default(),
        }
    }

    /// Standalone reset; request handling resets through its held guard
    /// instead (see `SymbolFlags::reset`).
    #[cfg(test)]
    pub async fn reset(&self, symbol: &str) {
        self.lock(symbol).await.reset();
        tracing::debug!(symbol, "symbol flags reset");
    }

    /// Mark `symbol` as in-trade with the given metadata.
    pub async fn open_trade(&self, symbol: &str, info: TradeInfo) {
        let mut flags = self.lock(symbol).await;
        info!(symbol, side = %info.side, contracts = info.contracts, "trade marked active");
        flags.open(info);
    }

    /// Number of symbols referenced so far.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Symbols currently marked in-trade, sorted.
    pub async fn active_symbols(&self) -> Vec<String> {
        let slots: Vec<(String, Arc<Mutex<SymbolFlags>>)> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut active = Vec::new();
        for (symbol, slot) in slots {
            if slot.lock().await.in_trade {
                active.push(symbol);
            }
        }
        active.sort();
        active
    }
}

impl std::fmt::Debug for TradeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeRegistry")
            .field("symbols", &self.len())
            .finish()
    }
}
