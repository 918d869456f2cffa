use serde::{Deserialize, Serialize};

/// Strategy thresholds the core accepts as explicit parameters. Nothing in
/// the rule modules hard-codes these; every caller passes a config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Lookback window (trading days) for the momentum trailing return.
    pub momentum_lookback: usize,
    /// How many top-ranked candidates are ADD-eligible per run.
    pub top_k: usize,
    /// Unconditional exit when price falls this fraction below avg cost.
    pub hard_stop_pct: f64,
    /// Exit when price falls this fraction below the high since entry.
    pub trailing_stop_pct: f64,
    /// Moving-average window for the trend-break exit tier.
    pub trend_ma_window: usize,
    /// Ceiling on non-core position count.
    pub max_positions: usize,
    /// Cap on the size of the ranked candidate universe.
    pub universe_size: usize,
    /// RSI window reported alongside ranking output.
    pub rsi_window: usize,
    /// Moving-average window for the historical entry signal.
    pub signal_ma_window: usize,
    /// Discount applied to projected exit proceeds before funding ADDs.
    pub cash_safety_factor: f64,
    /// Bars to wait after a simulated stop-out before re-entering.
    pub cooldown_days: usize,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            momentum_lookback: 21,
            top_k: 5,
            hard_stop_pct: 0.35,
            trailing_stop_pct: 0.15,
            trend_ma_window: 200,
            max_positions: 30,
            universe_size: 500,
            rsi_window: 14,
            signal_ma_window: 60,
            cash_safety_factor: 0.85,
            cooldown_days: 1,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.momentum_lookback == 0 {
            anyhow::bail!("momentum_lookback must be at least 1");
        }
        if self.top_k == 0 {
            anyhow::bail!("top_k must be at least 1");
        }
        if !(0.0..1.0).contains(&self.hard_stop_pct) {
            anyhow::bail!(
                "hard_stop_pct must be in [0, 1) (value: {})",
                self.hard_stop_pct
            );
        }
        if !(0.0..1.0).contains(&self.trailing_stop_pct) {
            anyhow::bail!(
                "trailing_stop_pct must be in [0, 1) (value: {})",
                self.trailing_stop_pct
            );
        }
        if self.trend_ma_window == 0 || self.signal_ma_window == 0 {
            anyhow::bail!("moving-average windows must be at least 1");
        }
        if self.max_positions == 0 {
            anyhow::bail!("max_positions must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.cash_safety_factor) {
            anyhow::bail!(
                "cash_safety_factor must be in [0, 1] (value: {})",
                self.cash_safety_factor
            );
        }
        Ok(())
    }
}
