use std::path::PathBuf;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

use crate::backtest::{self, StopRule};
use crate::context::AppContext;
use crate::performance;

const STUDY_THRESHOLDS: &[f64] = &[0.05, 0.10, 0.15, 0.20, 0.25, 0.35];

/// Runs the same replay under every stop-rule variant and prints a
/// comparison table, using the no-stop run as the base line.
pub fn run(app: &AppContext, data_file: Option<PathBuf>, symbols: Vec<String>) -> Result<()> {
    let data = app.load_market_data(data_file)?;
    let symbols = if symbols.is_empty() {
        app.load_universe(&data)?
    } else {
        symbols.iter().map(|s| s.trim().to_uppercase()).collect()
    };

    let mut rules = vec![StopRule::None];
    for &threshold in STUDY_THRESHOLDS {
        rules.push(StopRule::Fixed(threshold));
        rules.push(StopRule::Trailing(threshold));
    }

    let pb = ProgressBar::new(rules.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let mut rows = Vec::with_capacity(rules.len());
    for rule in rules {
        let report = backtest::run_backtest(&data, &symbols, rule, app.config());
        if rule == StopRule::None {
            for (symbol, err) in &report.failures {
                warn!("excluded {symbol}: {err}");
            }
        }
        rows.push((rule.label(), performance::summarize(&report)));
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "stop-rule study over {} symbols ({} variants)",
        symbols.len(),
        rows.len()
    );
    info!(
        "{:<14} {:>10} {:>10} {:>9} {:>8} {:>8}",
        "rule", "return", "drawdown", "win rate", "trades", "stops"
    );
    for (label, summary) in &rows {
        info!(
            "{:<14} {:>9.2}% {:>9.2}% {:>8} {:>8} {:>8}",
            label,
            summary.total_return * 100.0,
            summary.max_drawdown * 100.0,
            summary
                .win_rate
                .map(|r| format!("{:.0}%", r * 100.0))
                .unwrap_or_else(|| "n/a".to_string()),
            summary.trades,
            summary.stop_exits
        );
    }
    Ok(())
}
