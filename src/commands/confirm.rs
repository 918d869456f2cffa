use std::collections::BTreeSet;

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use log::info;

use crate::context::AppContext;
use crate::models::ActionStatus;
use crate::plan_store;
use crate::portfolio;

/// Resolves a plan's pending actions and applies the confirmed trades.
/// `approve_all` confirms every pending symbol; otherwise only those
/// listed are confirmed and the rest are skipped.
pub fn run(
    app: &AppContext,
    date: NaiveDate,
    approved: &[String],
    approve_all: bool,
) -> Result<()> {
    let mut plan = plan_store::load_plan(&app.plans_dir(), date)?
        .ok_or_else(|| anyhow!("no plan exists for {date}, generate one first"))?;

    if plan.pending_count() == 0 {
        info!("plan for {date} has no pending actions, nothing to confirm");
        return Ok(());
    }

    let approved: BTreeSet<String> = if approve_all {
        plan.actions
            .iter()
            .filter(|r| r.status == ActionStatus::Pending)
            .map(|r| r.action.symbol().to_uppercase())
            .collect()
    } else {
        approved.iter().map(|s| s.trim().to_uppercase()).collect()
    };

    let (confirmed, skipped) = plan.confirm(&approved);
    plan_store::save_plan(&app.plans_dir(), &plan)?;

    let mut held = portfolio::load_portfolio(&app.portfolio_path())?;
    let applied = portfolio::apply_confirmed_actions(&mut held, &plan.actions, date);
    portfolio::save_portfolio(&app.portfolio_path(), &held)?;

    info!(
        "plan for {date}: {confirmed} confirmed, {skipped} skipped, {applied} trades applied ({:.2} cash remaining)",
        held.cash
    );
    Ok(())
}
