use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use log::{info, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::{Action, ActionKind, ActionRecord, ActionStatus, Portfolio, Position, TradeRecord};

/// Serializes `value` to a sibling temp file, then renames over `path`.
/// Readers see either the old file or the new one, never a partial write.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    let body = serde_json::to_string_pretty(value)?;
    fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} into place", tmp.display()))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Loads the portfolio, or starts an empty one when no state file exists
/// yet.
pub fn load_portfolio(path: &Path) -> anyhow::Result<Portfolio> {
    if !path.exists() {
        info!("no portfolio at {}, starting empty", path.display());
        return Ok(Portfolio::default());
    }
    read_json(path)
}

pub fn save_portfolio(path: &Path, portfolio: &Portfolio) -> anyhow::Result<()> {
    write_json_atomic(path, portfolio)
}

/// User-curated symbols always included in the candidate universe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watchlist {
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub updated: Option<NaiveDate>,
}

impl Watchlist {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_json_atomic(path, self)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }

    /// Returns false when the symbol was already present.
    pub fn add(&mut self, symbol: &str, today: NaiveDate) -> bool {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() || self.contains(&symbol) {
            return false;
        }
        self.symbols.push(symbol);
        self.symbols.sort();
        self.updated = Some(today);
        true
    }

    pub fn remove(&mut self, symbol: &str, today: NaiveDate) -> bool {
        let symbol = symbol.trim().to_uppercase();
        let before = self.symbols.len();
        self.symbols.retain(|s| s != &symbol);
        let removed = self.symbols.len() != before;
        if removed {
            self.updated = Some(today);
        }
        removed
    }
}

/// Refreshes every position's high-water mark from the latest quotes.
pub fn observe_prices(portfolio: &mut Portfolio, prices: &BTreeMap<String, f64>) {
    for position in portfolio.positions.values_mut() {
        if let Some(price) = prices.get(&position.symbol) {
            position.observe_price(*price);
        }
    }
}

/// Applies the confirmed trades of a plan to portfolio state. HOLDs and
/// anything not in `confirmed` status are no-ops. Every applied trade is
/// appended to the transaction log.
pub fn apply_confirmed_actions(
    portfolio: &mut Portfolio,
    records: &[ActionRecord],
    date: NaiveDate,
) -> usize {
    let mut applied = 0;
    for record in records {
        if record.status != ActionStatus::Confirmed {
            continue;
        }
        match &record.action {
            Action::Add {
                symbol,
                shares,
                price,
                ..
            } => {
                if *shares == 0 {
                    continue;
                }
                apply_buy(portfolio, symbol, *shares, *price, date);
                portfolio.transactions.push(TradeRecord {
                    date,
                    symbol: symbol.clone(),
                    action: ActionKind::Add,
                    shares: *shares,
                    price: *price,
                });
                applied += 1;
            }
            Action::Exit {
                symbol,
                shares,
                price,
                ..
            } => {
                if apply_sell(portfolio, symbol, *shares, *price) {
                    portfolio.transactions.push(TradeRecord {
                        date,
                        symbol: symbol.clone(),
                        action: ActionKind::Exit,
                        shares: *shares,
                        price: *price,
                    });
                    applied += 1;
                }
            }
            Action::Hold { .. } => {}
        }
    }
    if applied > 0 {
        portfolio.updated = Some(date);
    }
    applied
}

fn apply_buy(portfolio: &mut Portfolio, symbol: &str, shares: u32, price: f64, date: NaiveDate) {
    let cost = shares as f64 * price;
    portfolio.cash -= cost;
    match portfolio.positions.get_mut(symbol) {
        Some(position) => {
            // Averaging into an existing lot keeps the original entry date
            // and high-water mark.
            let total_shares = position.shares + shares;
            position.cost_basis += cost;
            position.avg_price = position.cost_basis / total_shares as f64;
            position.shares = total_shares;
            position.observe_price(price);
        }
        None => {
            portfolio.positions.insert(
                symbol.to_string(),
                Position {
                    symbol: symbol.to_string(),
                    shares,
                    avg_price: price,
                    cost_basis: cost,
                    first_entry: date,
                    high_since_entry: price,
                    is_core: false,
                },
            );
        }
    }
}

fn apply_sell(portfolio: &mut Portfolio, symbol: &str, shares: u32, price: f64) -> bool {
    let Some(position) = portfolio.positions.get_mut(symbol) else {
        warn!("confirmed exit for {symbol} but no such position, skipping");
        return false;
    };
    let shares = shares.min(position.shares);
    if shares == 0 {
        return false;
    }
    portfolio.cash += shares as f64 * price;
    if shares == position.shares {
        portfolio.positions.remove(symbol);
    } else {
        let fraction = shares as f64 / position.shares as f64;
        position.cost_basis *= 1.0 - fraction;
        position.shares -= shares;
    }
    true
}
