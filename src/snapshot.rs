use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::models::Portfolio;
use crate::portfolio::{read_json, write_json_atomic};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotPosition {
    pub shares: u32,
    pub price: f64,
    pub value: f64,
}

/// Start-of-year valuation baseline. Written once per calendar year and
/// never regenerated, so year-to-date figures stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualSnapshot {
    pub year: i32,
    pub date: NaiveDate,
    pub cash: f64,
    pub total_value: f64,
    pub positions: BTreeMap<String, SnapshotPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearToDate {
    pub baseline: f64,
    pub current: f64,
    pub pnl: f64,
    pub pnl_pct: Option<f64>,
}

pub fn snapshot_path(dir: &Path, year: i32) -> PathBuf {
    dir.join(format!("snapshot_{year}.json"))
}

pub fn load_snapshot(dir: &Path, year: i32) -> anyhow::Result<Option<AnnualSnapshot>> {
    let path = snapshot_path(dir, year);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(read_json(&path)?))
}

pub fn save_snapshot(dir: &Path, snapshot: &AnnualSnapshot) -> anyhow::Result<()> {
    write_json_atomic(&snapshot_path(dir, snapshot.year), snapshot)
}

/// Values the portfolio as of `date`. Positions with no quote are valued
/// at average cost so the baseline still covers every holding.
pub fn build_snapshot(
    portfolio: &Portfolio,
    prices: &BTreeMap<String, f64>,
    date: NaiveDate,
) -> AnnualSnapshot {
    let mut positions = BTreeMap::new();
    let mut total_value = portfolio.cash;
    for (symbol, position) in &portfolio.positions {
        let price = match prices.get(symbol) {
            Some(price) => *price,
            None => {
                warn!("no quote for {symbol}, snapshotting at average cost");
                position.avg_price
            }
        };
        let value = position.market_value(price);
        total_value += value;
        positions.insert(
            symbol.clone(),
            SnapshotPosition {
                shares: position.shares,
                price,
                value,
            },
        );
    }
    AnnualSnapshot {
        year: date.year(),
        date,
        cash: portfolio.cash,
        total_value,
        positions,
    }
}

/// Loads this year's baseline, creating it on first use.
pub fn ensure_snapshot(
    dir: &Path,
    portfolio: &Portfolio,
    prices: &BTreeMap<String, f64>,
    today: NaiveDate,
) -> anyhow::Result<AnnualSnapshot> {
    if let Some(existing) = load_snapshot(dir, today.year())? {
        return Ok(existing);
    }
    let snapshot = build_snapshot(portfolio, prices, today);
    save_snapshot(dir, &snapshot)?;
    Ok(snapshot)
}

pub fn year_to_date(
    snapshot: &AnnualSnapshot,
    portfolio: &Portfolio,
    prices: &BTreeMap<String, f64>,
) -> YearToDate {
    let current = portfolio.total_equity(prices);
    let pnl = current - snapshot.total_value;
    let pnl_pct = if snapshot.total_value > 0.0 {
        Some(pnl / snapshot.total_value)
    } else {
        None
    };
    YearToDate {
        baseline: snapshot.total_value,
        current,
        pnl,
        pnl_pct,
    }
}
