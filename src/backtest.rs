use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::info;
use rayon::prelude::*;

use crate::config::StrategyConfig;
use crate::errors::EngineError;
use crate::indicators;
use crate::market_data::MarketData;
use crate::models::{PricePoint, Signal};

/// Exit overlay applied on top of the entry signal during replay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopRule {
    None,
    /// Exit when price falls this fraction below the entry price.
    Fixed(f64),
    /// Exit when price falls this fraction below the high since entry.
    Trailing(f64),
}

impl StopRule {
    pub fn label(&self) -> String {
        match self {
            StopRule::None => "no stop".to_string(),
            StopRule::Fixed(pct) => format!("fixed {:.0}%", pct * 100.0),
            StopRule::Trailing(pct) => format!("trailing {:.0}%", pct * 100.0),
        }
    }
}

/// A completed round trip on the historical path.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub return_pct: f64,
    pub stopped: bool,
}

/// Still-open position at the end of the path, marked to the final close
/// rather than force-liquidated.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenTrade {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub last_price: f64,
    pub unrealized_pct: f64,
}

#[derive(Debug, Clone)]
pub struct SymbolBacktest {
    pub symbol: String,
    pub daily_returns: Vec<(NaiveDate, f64)>,
    pub closed_trades: Vec<ClosedTrade>,
    pub open_trade: Option<OpenTrade>,
    pub stop_exits: usize,
    pub buy_hold_return: f64,
}

/// Equal-weight combination of every symbol's replay.
#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub stop_rule: StopRule,
    pub equity_curve: Vec<(NaiveDate, f64)>,
    pub closed_trades: Vec<ClosedTrade>,
    pub open_trades: Vec<OpenTrade>,
    pub stop_exits: usize,
    pub buy_hold_return: f64,
    pub failures: Vec<(String, EngineError)>,
}

/// Moving-average cross signals, one per bar. Bars before the window
/// fills emit `Hold`; a close exactly on the average is also a `Hold`.
pub fn ma_cross_signals(closes: &[f64], ma_window: usize) -> Vec<Signal> {
    let ma = indicators::sma_series(closes, ma_window);
    closes
        .iter()
        .zip(ma.iter())
        .map(|(&close, &avg)| {
            if avg.is_nan() || close == avg {
                Signal::Hold
            } else if close > avg {
                Signal::Enter
            } else {
                Signal::Exit
            }
        })
        .collect()
}

/// Replays one symbol through the signal stream. A decision taken at bar
/// `i` changes exposure from bar `i + 1`, so the bar that produced the
/// signal never contributes its own return. Trades fill at the deciding
/// bar's close. After a stop exit, entries stay suppressed for
/// `cooldown_days` bars.
pub fn replay_symbol(
    symbol: &str,
    series: &[PricePoint],
    stop: StopRule,
    config: &StrategyConfig,
) -> Result<SymbolBacktest, EngineError> {
    let required = config.signal_ma_window + 1;
    if series.len() < required {
        return Err(EngineError::InsufficientHistory {
            required,
            available: series.len(),
        });
    }
    let closes: Vec<f64> = series.iter().map(|p| p.close).collect();
    let signals = ma_cross_signals(&closes, config.signal_ma_window);

    struct Open {
        entry_index: usize,
        entry_price: f64,
        high: f64,
    }

    let mut open: Option<Open> = None;
    let mut held_today = false;
    let mut cooldown_until: Option<usize> = None;
    let mut daily_returns = Vec::with_capacity(series.len().saturating_sub(1));
    let mut closed_trades = Vec::new();
    let mut stop_exits = 0;

    for i in 1..series.len() {
        let bar = &series[i];
        let bar_return = closes[i] / closes[i - 1] - 1.0;
        daily_returns.push((bar.date, if held_today { bar_return } else { 0.0 }));

        if let Some(state) = open.as_mut() {
            if bar.close > state.high {
                state.high = bar.close;
            }
        }

        // Decide at this close what tomorrow's exposure is.
        let mut exit = false;
        let mut stopped = false;
        if let Some(state) = &open {
            match stop {
                StopRule::Fixed(pct) if bar.close <= state.entry_price * (1.0 - pct) => {
                    exit = true;
                    stopped = true;
                }
                StopRule::Trailing(pct) if bar.close <= state.high * (1.0 - pct) => {
                    exit = true;
                    stopped = true;
                }
                _ => {}
            }
            if !exit && signals[i] == Signal::Exit {
                exit = true;
            }
        }

        if exit {
            let state = match open.take() {
                Some(state) => state,
                None => continue,
            };
            closed_trades.push(ClosedTrade {
                symbol: symbol.to_string(),
                entry_date: series[state.entry_index].date,
                exit_date: bar.date,
                entry_price: state.entry_price,
                exit_price: bar.close,
                return_pct: bar.close / state.entry_price - 1.0,
                stopped,
            });
            if stopped {
                stop_exits += 1;
                cooldown_until = Some(i + config.cooldown_days);
            }
            held_today = false;
        } else if open.is_none() && signals[i] == Signal::Enter {
            let blocked = cooldown_until.map(|until| i <= until).unwrap_or(false);
            if !blocked {
                open = Some(Open {
                    entry_index: i,
                    entry_price: bar.close,
                    high: bar.close,
                });
            }
        }
        if open.is_some() && !exit {
            held_today = true;
        }
    }

    let open_trade = open.map(|state| {
        let last = closes[closes.len() - 1];
        OpenTrade {
            symbol: symbol.to_string(),
            entry_date: series[state.entry_index].date,
            entry_price: state.entry_price,
            last_price: last,
            unrealized_pct: last / state.entry_price - 1.0,
        }
    });

    Ok(SymbolBacktest {
        symbol: symbol.to_string(),
        daily_returns,
        closed_trades,
        open_trade,
        stop_exits,
        buy_hold_return: closes[closes.len() - 1] / closes[0] - 1.0,
    })
}

/// Replays every symbol in parallel, then merges the paths into one
/// equal-weight daily timeline. The merge is sequential and keyed by
/// date, so the combined curve is deterministic regardless of worker
/// scheduling.
pub fn run_backtest(
    data: &MarketData,
    symbols: &[String],
    stop: StopRule,
    config: &StrategyConfig,
) -> BacktestReport {
    let results: Vec<(String, Result<SymbolBacktest, EngineError>)> = symbols
        .par_iter()
        .map(|symbol| {
            let run = match data.series(symbol) {
                Some(series) => replay_symbol(symbol, series, stop, config),
                None => Err(EngineError::MissingPrice {
                    symbol: symbol.clone(),
                }),
            };
            (symbol.clone(), run)
        })
        .collect();

    let mut per_symbol = Vec::new();
    let mut failures = Vec::new();
    for (symbol, run) in results {
        match run {
            Ok(result) => per_symbol.push(result),
            Err(err) => failures.push((symbol, err)),
        }
    }

    let mut by_date: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    let mut closed_trades = Vec::new();
    let mut open_trades = Vec::new();
    let mut stop_exits = 0;
    let mut buy_hold_sum = 0.0;
    for result in &per_symbol {
        for (date, value) in &result.daily_returns {
            let entry = by_date.entry(*date).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
        closed_trades.extend(result.closed_trades.iter().cloned());
        open_trades.extend(result.open_trade.iter().cloned());
        stop_exits += result.stop_exits;
        buy_hold_sum += result.buy_hold_return;
    }
    closed_trades.sort_by(|a, b| {
        a.exit_date
            .cmp(&b.exit_date)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    let mut equity = 1.0;
    let equity_curve = by_date
        .into_iter()
        .map(|(date, (sum, count))| {
            equity *= 1.0 + sum / count as f64;
            (date, equity)
        })
        .collect();

    let buy_hold_return = if per_symbol.is_empty() {
        0.0
    } else {
        buy_hold_sum / per_symbol.len() as f64
    };
    info!(
        "backtest ({}) replayed {} symbols, {} failures, {} closed trades",
        stop.label(),
        per_symbol.len(),
        failures.len(),
        closed_trades.len()
    );

    BacktestReport {
        stop_rule: stop,
        equity_curve,
        closed_trades,
        open_trades,
        stop_exits,
        buy_hold_return,
        failures,
    }
}
