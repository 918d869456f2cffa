use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use log::info;

use crate::context::AppContext;
use crate::portfolio;
use crate::snapshot;

/// Prints (creating on first use) the annual baseline and the
/// year-to-date result against it.
pub fn run(app: &AppContext, data_file: Option<PathBuf>) -> Result<()> {
    let data = app.load_market_data(data_file)?;
    let today = data
        .last_date()
        .ok_or_else(|| anyhow!("market data holds no bars"))?;
    let held = portfolio::load_portfolio(&app.portfolio_path())?;

    let mut prices = BTreeMap::new();
    for symbol in held.positions.keys() {
        if let Some(price) = data.last_close(symbol) {
            prices.insert(symbol.clone(), price);
        }
    }

    let baseline = snapshot::ensure_snapshot(&app.snapshots_dir(), &held, &prices, today)?;
    let ytd = snapshot::year_to_date(&baseline, &held, &prices);
    info!(
        "{} baseline ({}): {:.2} across {} positions",
        baseline.year,
        baseline.date,
        baseline.total_value,
        baseline.positions.len()
    );
    info!(
        "current equity {:.2}, year-to-date {:+.2} ({})",
        ytd.current,
        ytd.pnl,
        ytd.pnl_pct
            .map(|p| format!("{:+.1}%", p * 100.0))
            .unwrap_or_else(|| "n/a".to_string())
    );
    Ok(())
}
