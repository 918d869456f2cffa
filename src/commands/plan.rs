use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use log::{info, warn};

use crate::context::AppContext;
use crate::models::ActionRecord;
use crate::plan_store::{self, ActionPlan};
use crate::planner;
use crate::portfolio::{self, Watchlist};
use crate::sentiment::SentimentMap;
use crate::snapshot;

/// Generates (or re-reads) the action plan for one trading date.
pub fn run(app: &AppContext, date: Option<NaiveDate>, data_file: Option<PathBuf>) -> Result<()> {
    let data = app.load_market_data(data_file)?;
    let date = match date.or_else(|| data.last_date()) {
        Some(date) => date,
        None => return Err(anyhow!("market data holds no bars, cannot pick a plan date")),
    };

    if let Some(existing) = plan_store::load_plan(&app.plans_dir(), date)? {
        info!(
            "plan for {date} already exists with {} actions, not regenerating",
            existing.actions.len()
        );
        print_plan(&existing);
        return Ok(());
    }

    let mut held = portfolio::load_portfolio(&app.portfolio_path())?;
    let watchlist = Watchlist::load(&app.watchlist_path())?;
    let sentiment = SentimentMap::load(&app.sentiment_path())?;
    let universe = app.load_universe(&data)?;

    // Refresh high-water marks before the exit rules look at them.
    let mut prices = BTreeMap::new();
    for symbol in held.positions.keys() {
        if let Some(price) = data.last_close(symbol) {
            prices.insert(symbol.clone(), price);
        }
    }
    portfolio::observe_prices(&mut held, &prices);

    let outcome = planner::plan_actions(
        date,
        &held,
        &universe,
        &watchlist,
        &data,
        &sentiment,
        app.config(),
    );
    for (symbol, err) in &outcome.failures {
        warn!("skipped {symbol}: {err}");
    }

    plan_store::save_plan(&app.plans_dir(), &outcome.plan)?;
    portfolio::save_portfolio(&app.portfolio_path(), &held)?;

    let baseline = snapshot::ensure_snapshot(&app.snapshots_dir(), &held, &prices, date)?;
    let ytd = snapshot::year_to_date(&baseline, &held, &prices);
    info!(
        "year-to-date: {:+.2} ({}) against the {} baseline of {:.2}",
        ytd.pnl,
        ytd.pnl_pct
            .map(|p| format!("{:+.1}%", p * 100.0))
            .unwrap_or_else(|| "n/a".to_string()),
        baseline.year,
        baseline.total_value
    );

    print_plan(&outcome.plan);
    Ok(())
}

fn print_plan(plan: &ActionPlan) {
    info!("action plan for {}", plan.date);
    for record in &plan.actions {
        info!("  {}", format_record(record));
    }
}

fn format_record(record: &ActionRecord) -> String {
    use crate::models::Action;
    let head = match &record.action {
        Action::Hold {
            symbol, shares, ..
        } => format!("HOLD {symbol} x{shares}"),
        Action::Exit {
            symbol,
            shares,
            price,
            ..
        } => format!("EXIT {symbol} x{shares} @ {price:.2}"),
        Action::Add {
            symbol,
            shares,
            price,
            ..
        } => format!("ADD  {symbol} x{shares} @ {price:.2}"),
    };
    format!(
        "{head} [{}] {}",
        record.status.as_str(),
        record.reason
    )
}
