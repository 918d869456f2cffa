use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use log::{info, warn};

use crate::backtest::{self, StopRule};
use crate::context::AppContext;
use crate::performance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StopKind {
    None,
    Fixed,
    Trailing,
}

pub fn resolve_stop(kind: StopKind, threshold: f64) -> Result<StopRule> {
    match kind {
        StopKind::None => Ok(StopRule::None),
        _ if !(0.0..1.0).contains(&threshold) || threshold == 0.0 => Err(anyhow!(
            "stop threshold must be a fraction in (0, 1), got {threshold}"
        )),
        StopKind::Fixed => Ok(StopRule::Fixed(threshold)),
        StopKind::Trailing => Ok(StopRule::Trailing(threshold)),
    }
}

/// Replays the moving-average strategy over the full history and prints
/// the performance summary.
pub fn run(
    app: &AppContext,
    data_file: Option<PathBuf>,
    symbols: Vec<String>,
    stop_kind: StopKind,
    threshold: f64,
) -> Result<()> {
    let data = app.load_market_data(data_file)?;
    let symbols = if symbols.is_empty() {
        app.load_universe(&data)?
    } else {
        symbols.iter().map(|s| s.trim().to_uppercase()).collect()
    };
    let stop = resolve_stop(stop_kind, threshold)?;

    let report = backtest::run_backtest(&data, &symbols, stop, app.config());
    for (symbol, err) in &report.failures {
        warn!("excluded {symbol}: {err}");
    }
    let summary = performance::summarize(&report);

    info!("backtest over {} symbols, stop rule: {}", symbols.len(), stop.label());
    info!("  total return:      {:+.2}%", summary.total_return * 100.0);
    info!("  buy and hold:      {:+.2}%", summary.buy_hold_return * 100.0);
    info!("  CAGR:              {:+.2}%", summary.cagr * 100.0);
    info!("  max drawdown:      {:.2}%", summary.max_drawdown * 100.0);
    info!("  ann. volatility:   {:.2}%", summary.annualized_volatility * 100.0);
    info!(
        "  win rate:          {}",
        summary
            .win_rate
            .map(|r| format!("{:.1}%", r * 100.0))
            .unwrap_or_else(|| "n/a (no closed trades)".to_string())
    );
    info!("  closed trades:     {}", summary.trades);
    info!("  stop exits:        {}", summary.stop_exits);
    info!("  open at end:       {}", report.open_trades.len());
    Ok(())
}
