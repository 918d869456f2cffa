use std::path::{Path, PathBuf};

use anyhow::Result;
use log::info;

use crate::context::AppContext;
use crate::market_data::MarketData;

/// Re-encodes a market data file, typically JSON series into the compact
/// binary snapshot the other commands read by default.
pub fn run(app: &AppContext, input: &Path, output: Option<PathBuf>) -> Result<()> {
    let data = MarketData::load_from_file(input)?;

    let output = app.market_data_path(output);
    data.save_to_file(&output)?;
    info!(
        "exported {} symbols from {} to {}",
        data.symbols().count(),
        input.display(),
        output.display()
    );
    Ok(())
}
