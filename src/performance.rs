use statrs::statistics::Statistics;

use crate::backtest::{BacktestReport, ClosedTrade};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics over a replayed equity path.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    pub total_return: f64,
    pub cagr: f64,
    /// Worst peak-to-trough decline, always <= 0.
    pub max_drawdown: f64,
    pub annualized_volatility: f64,
    /// `None` when no trade ever closed; 0.0 would misread as "all losers".
    pub win_rate: Option<f64>,
    pub trades: usize,
    pub stop_exits: usize,
    pub buy_hold_return: f64,
}

pub fn summarize(report: &BacktestReport) -> PerformanceSummary {
    let values: Vec<f64> = report.equity_curve.iter().map(|(_, v)| *v).collect();
    PerformanceSummary {
        total_return: total_return(&values),
        cagr: cagr(&values),
        max_drawdown: max_drawdown(&values),
        annualized_volatility: annualized_volatility(&values),
        win_rate: win_rate(&report.closed_trades),
        trades: report.closed_trades.len(),
        stop_exits: report.stop_exits,
        buy_hold_return: report.buy_hold_return,
    }
}

/// Final equity over a unit start. Empty curves are flat.
pub fn total_return(values: &[f64]) -> f64 {
    match values.last() {
        Some(last) => last - 1.0,
        None => 0.0,
    }
}

pub fn cagr(values: &[f64]) -> f64 {
    match values.last() {
        Some(last) if values.len() > 1 && *last > 0.0 => {
            let years = values.len() as f64 / TRADING_DAYS_PER_YEAR;
            last.powf(1.0 / years) - 1.0
        }
        _ => 0.0,
    }
}

/// Largest fractional decline from a running peak. Zero for an empty or
/// non-decreasing curve.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &value in values {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown = value / peak - 1.0;
            if drawdown < worst {
                worst = drawdown;
            }
        }
    }
    worst
}

pub fn annualized_volatility(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    returns.std_dev() * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Fraction of closed trades with a positive realized return.
pub fn win_rate(trades: &[ClosedTrade]) -> Option<f64> {
    if trades.is_empty() {
        return None;
    }
    let winners = trades.iter().filter(|t| t.return_pct > 0.0).count();
    Some(winners as f64 / trades.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn trade(return_pct: f64) -> ClosedTrade {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        ClosedTrade {
            symbol: "T".to_string(),
            entry_date: date,
            exit_date: date,
            entry_price: 100.0,
            exit_price: 100.0 * (1.0 + return_pct),
            return_pct,
            stopped: false,
        }
    }

    #[test]
    fn total_return_reads_the_final_equity() {
        assert_eq!(total_return(&[1.0, 1.2, 1.5]), 0.5);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn drawdown_is_non_positive() {
        assert_eq!(max_drawdown(&[1.0, 1.1, 1.2, 1.3]), 0.0);
        let dd = max_drawdown(&[1.0, 2.0, 1.0, 1.5]);
        assert!((dd - (-0.5)).abs() < 1e-12);
        assert_eq!(max_drawdown(&[]), 0.0);
    }

    #[test]
    fn drawdown_tracks_the_running_peak_not_the_start() {
        // Peak moves up to 3.0 before the fall to 1.8.
        let dd = max_drawdown(&[1.0, 3.0, 1.8, 2.0]);
        assert!((dd - (-0.4)).abs() < 1e-12);
    }

    #[test]
    fn win_rate_is_none_without_closed_trades() {
        assert_eq!(win_rate(&[]), None);
        let rate = win_rate(&[trade(0.1), trade(-0.05), trade(0.02), trade(0.0)]).unwrap();
        assert!((rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn cagr_annualizes_over_trading_days() {
        // Doubling over exactly one trading year.
        let values: Vec<f64> = (1..=252)
            .map(|i| 1.0 + i as f64 / 252.0)
            .collect();
        let growth = cagr(&values);
        assert!((growth - 1.0).abs() < 1e-9);
    }

    #[test]
    fn volatility_is_zero_for_a_flat_curve() {
        assert_eq!(annualized_volatility(&[1.0, 1.0, 1.0, 1.0]), 0.0);
        assert!(annualized_volatility(&[1.0, 1.1, 1.0, 1.2]) > 0.0);
    }
}
