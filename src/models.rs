use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One daily bar of a symbol's price history. Series are chronological;
/// missing trading days are simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    pub high: f64,
    pub low: f64,
}

/// A held lot. Owned exclusively by the `Portfolio`; mutated only through
/// confirmed trades and price-driven `high_since_entry` refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub shares: u32,
    pub avg_price: f64,
    pub cost_basis: f64,
    pub first_entry: NaiveDate,
    pub high_since_entry: f64,
    #[serde(default)]
    pub is_core: bool,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.shares as f64 * price
    }

    pub fn pnl_pct(&self, price: f64) -> Option<f64> {
        if self.avg_price > 0.0 {
            Some((price - self.avg_price) / self.avg_price)
        } else {
            None
        }
    }

    /// Refreshes the high-water mark. Monotone non-decreasing for the life
    /// of the position; a reset only happens on a fresh entry after a full
    /// exit, which creates a new `Position`.
    pub fn observe_price(&mut self, price: f64) {
        if price > self.high_since_entry {
            self.high_since_entry = price;
        }
    }
}

/// One entry of the append-only transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: ActionKind,
    pub shares: u32,
    pub price: f64,
}

/// The persisted portfolio state. `BTreeMap` keeps symbol iteration
/// deterministic, which the plan idempotence contract relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: f64,
    #[serde(default)]
    pub updated: Option<NaiveDate>,
    #[serde(default)]
    pub positions: BTreeMap<String, Position>,
    #[serde(default)]
    pub transactions: Vec<TradeRecord>,
}

impl Default for Portfolio {
    fn default() -> Self {
        Self {
            cash: 0.0,
            updated: None,
            positions: BTreeMap::new(),
            transactions: Vec::new(),
        }
    }
}

impl Portfolio {
    pub fn non_core_count(&self) -> usize {
        self.positions.values().filter(|p| !p.is_core).count()
    }

    /// Cash plus positions marked at the supplied prices. Positions with no
    /// quote fall back to cost basis so the total stays meaningful.
    pub fn total_equity(&self, prices: &BTreeMap<String, f64>) -> f64 {
        let holdings: f64 = self
            .positions
            .values()
            .map(|p| match prices.get(&p.symbol) {
                Some(price) => p.market_value(*price),
                None => p.cost_basis,
            })
            .sum();
        self.cash + holdings
    }
}

/// A ranked member of the candidate universe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub symbol: String,
    pub trailing_return: f64,
    pub rank: u32,
    pub is_existing_holding: bool,
    pub is_whitelisted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Hold,
    Exit,
    Add,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Hold => "HOLD",
            ActionKind::Exit => "EXIT",
            ActionKind::Add => "ADD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    HardStop,
    StrategySignal,
    Scanner,
    CoreProtect,
    Auto,
}

impl ActionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionSource::HardStop => "hard_stop",
            ActionSource::StrategySignal => "strategy_signal",
            ActionSource::Scanner => "scanner",
            ActionSource::CoreProtect => "core_protect",
            ActionSource::Auto => "auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    Confirmed,
    Skipped,
    Auto,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Confirmed => "confirmed",
            ActionStatus::Skipped => "skipped",
            ActionStatus::Auto => "auto",
        }
    }
}

/// Closed action variant; each tag carries only the fields valid for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Hold {
        symbol: String,
        shares: u32,
        price: Option<f64>,
        pnl_pct: Option<f64>,
    },
    Exit {
        symbol: String,
        shares: u32,
        price: f64,
        pnl_pct: Option<f64>,
    },
    Add {
        symbol: String,
        shares: u32,
        price: f64,
        rank: u32,
        momentum: f64,
    },
}

impl Action {
    pub fn symbol(&self) -> &str {
        match self {
            Action::Hold { symbol, .. }
            | Action::Exit { symbol, .. }
            | Action::Add { symbol, .. } => symbol,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Hold { .. } => ActionKind::Hold,
            Action::Exit { .. } => ActionKind::Exit,
            Action::Add { .. } => ActionKind::Add,
        }
    }
}

/// One recommendation of a dated plan. Immutable once written except for
/// `status`, which the confirmation step transitions exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(flatten)]
    pub action: Action,
    pub reason: String,
    pub source: ActionSource,
    pub status: ActionStatus,
}

/// Per-bar strategy event on the historical path. Transient, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Enter,
    Exit,
    Hold,
}
