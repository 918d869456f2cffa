use crate::config::StrategyConfig;
use crate::models::{ActionKind, ActionSource, Position};

pub const PRICE_EPSILON: f64 = 1e-9;

/// Outcome of running the exit tiers against one held position.
#[derive(Debug, Clone, PartialEq)]
pub struct ExitEvaluation {
    pub kind: ActionKind,
    pub source: ActionSource,
    pub reason: String,
}

impl ExitEvaluation {
    fn hold(source: ActionSource, reason: String) -> Self {
        Self {
            kind: ActionKind::Hold,
            source,
            reason,
        }
    }

    fn exit(source: ActionSource, reason: String) -> Self {
        Self {
            kind: ActionKind::Exit,
            source,
            reason,
        }
    }
}

/// Applies the three exit tiers in strict precedence order; the first
/// matching tier wins and later tiers are not evaluated.
///
/// Core positions short-circuit to HOLD before any tier, including the
/// hard stop.
///
/// `ma_long` is `None` when the symbol lacks history for the trend
/// window; the trend-break tier is then skipped rather than guessed.
pub fn evaluate_position(
    position: &Position,
    current_price: f64,
    ma_long: Option<f64>,
    config: &StrategyConfig,
) -> ExitEvaluation {
    if position.is_core {
        return ExitEvaluation::hold(
            ActionSource::CoreProtect,
            "core holding, exempt from exit rules".to_string(),
        );
    }

    // Tier 1: hard stop from average cost. Unconditional; downstream risk
    // logic must not override it.
    let hard_stop_price = position.avg_price * (1.0 - config.hard_stop_pct);
    if current_price <= hard_stop_price + PRICE_EPSILON {
        let pnl_pct = position.pnl_pct(current_price).unwrap_or(0.0) * 100.0;
        return ExitEvaluation::exit(
            ActionSource::HardStop,
            format!(
                "hard stop: {:.1}% from avg cost {:.2} breaches the -{:.0}% limit (stop {:.2})",
                pnl_pct,
                position.avg_price,
                config.hard_stop_pct * 100.0,
                hard_stop_price
            ),
        );
    }

    // Tier 2: trailing stop from the high-water mark.
    let trailing_stop_price = position.high_since_entry * (1.0 - config.trailing_stop_pct);
    if current_price <= trailing_stop_price + PRICE_EPSILON {
        let drawdown_pct = if position.high_since_entry > 0.0 {
            (current_price - position.high_since_entry) / position.high_since_entry * 100.0
        } else {
            0.0
        };
        return ExitEvaluation::exit(
            ActionSource::StrategySignal,
            format!(
                "trailing stop: {:.1}% off high {:.2} breaches the -{:.0}% trail (stop {:.2})",
                drawdown_pct,
                position.high_since_entry,
                config.trailing_stop_pct * 100.0,
                trailing_stop_price
            ),
        );
    }

    // Tier 3: trend break below the long moving average.
    if let Some(ma) = ma_long {
        if current_price < ma {
            let below_pct = if ma > 0.0 {
                (current_price - ma) / ma * 100.0
            } else {
                0.0
            };
            return ExitEvaluation::exit(
                ActionSource::StrategySignal,
                format!(
                    "trend break: close {:.2} is {:.1}% below MA{} ({:.2})",
                    current_price, below_pct, config.trend_ma_window, ma
                ),
            );
        }
    }

    ExitEvaluation::hold(ActionSource::Auto, "holding, no exit condition met".to_string())
}
