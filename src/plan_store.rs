use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};

use crate::models::{ActionRecord, ActionStatus};
use crate::portfolio::{read_json, write_json_atomic};

/// A dated action plan. At most one plan exists per calendar date; once
/// written it is only ever mutated by the confirmation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub date: NaiveDate,
    pub actions: Vec<ActionRecord>,
}

impl ActionPlan {
    pub fn pending_count(&self) -> usize {
        self.actions
            .iter()
            .filter(|r| r.status == ActionStatus::Pending)
            .count()
    }

    /// Resolves every pending record: confirmed when its symbol appears
    /// in `approved`, skipped otherwise. Already-resolved records are
    /// left untouched, so a second confirmation pass is a no-op.
    pub fn confirm(&mut self, approved: &BTreeSet<String>) -> (usize, usize) {
        let mut confirmed = 0;
        let mut skipped = 0;
        for record in &mut self.actions {
            if record.status != ActionStatus::Pending {
                continue;
            }
            if approved.contains(record.action.symbol()) {
                record.status = ActionStatus::Confirmed;
                confirmed += 1;
            } else {
                record.status = ActionStatus::Skipped;
                skipped += 1;
            }
        }
        (confirmed, skipped)
    }
}

pub fn plan_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("actions_{}.json", date.format("%Y-%m-%d")))
}

pub fn load_plan(dir: &Path, date: NaiveDate) -> anyhow::Result<Option<ActionPlan>> {
    let path = plan_path(dir, date);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(read_json(&path)?))
}

pub fn save_plan(dir: &Path, plan: &ActionPlan) -> anyhow::Result<()> {
    let path = plan_path(dir, plan.date);
    write_json_atomic(&path, plan)?;
    info!(
        "saved plan for {} with {} actions to {}",
        plan.date,
        plan.actions.len(),
        path.display()
    );
    Ok(())
}
