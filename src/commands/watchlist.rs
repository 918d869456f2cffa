use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::context::AppContext;
use crate::portfolio::Watchlist;

/// Lists the watchlist, applying any additions and removals first.
pub fn run(app: &AppContext, add: Vec<String>, remove: Vec<String>) -> Result<()> {
    let path = app.watchlist_path();
    let mut watchlist = Watchlist::load(&path)?;
    let today = Utc::now().date_naive();

    let mut changed = false;
    for symbol in &add {
        if watchlist.add(symbol, today) {
            info!("added {} to the watchlist", symbol.trim().to_uppercase());
            changed = true;
        }
    }
    for symbol in &remove {
        if watchlist.remove(symbol, today) {
            info!("removed {} from the watchlist", symbol.trim().to_uppercase());
            changed = true;
        }
    }
    if changed {
        watchlist.save(&path)?;
    }

    if watchlist.symbols.is_empty() {
        info!("watchlist is empty");
    } else {
        info!("watchlist: {}", watchlist.symbols.join(", "));
    }
    Ok(())
}
