use std::collections::BTreeSet;

use chrono::NaiveDate;
use log::{debug, info};

use crate::config::StrategyConfig;
use crate::errors::EngineError;
use crate::exit_rules;
use crate::indicators;
use crate::market_data::MarketData;
use crate::models::{
    Action, ActionKind, ActionRecord, ActionSource, ActionStatus, Portfolio,
};
use crate::momentum;
use crate::plan_store::ActionPlan;
use crate::portfolio::Watchlist;
use crate::risk;
use crate::sentiment::SentimentMap;

/// A generated plan plus the symbols that dropped out of evaluation.
#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: ActionPlan,
    pub failures: Vec<(String, EngineError)>,
}

/// Generates the dated action plan. Pure over its inputs: the same
/// portfolio, data and config always produce the identical plan, and the
/// caller's portfolio is never mutated.
///
/// Records come out in a fixed order: exits (hard stops leading, then by
/// symbol), holds by symbol, adds by ascending rank.
pub fn plan_actions(
    date: NaiveDate,
    portfolio: &Portfolio,
    universe: &[String],
    watchlist: &Watchlist,
    data: &MarketData,
    sentiment: &SentimentMap,
    config: &StrategyConfig,
) -> PlanOutcome {
    let mut working = portfolio.clone();
    let mut failures = Vec::new();
    let mut exits = Vec::new();
    let mut holds = Vec::new();
    let mut exited_today = BTreeSet::new();
    let mut exit_proceeds = 0.0;

    // Held positions first. Exits are applied to the working copy so the
    // freed slots and proceeds are visible to the addition pass below.
    for (symbol, position) in &portfolio.positions {
        let Some(price) = data.last_close(symbol) else {
            failures.push((
                symbol.clone(),
                EngineError::MissingPrice {
                    symbol: symbol.clone(),
                },
            ));
            holds.push(ActionRecord {
                action: Action::Hold {
                    symbol: symbol.clone(),
                    shares: position.shares,
                    price: None,
                    pnl_pct: None,
                },
                reason: "no market data, holding unchanged".to_string(),
                source: ActionSource::Auto,
                status: ActionStatus::Auto,
            });
            continue;
        };

        let ma_long = data
            .closes(symbol)
            .and_then(|closes| indicators::latest_sma(&closes, config.trend_ma_window).ok());
        let eval = exit_rules::evaluate_position(position, price, ma_long, config);
        match eval.kind {
            ActionKind::Exit => {
                // Second line of defense behind the core short-circuit in
                // the exit rules.
                if let Err(err) = risk::check_sell(portfolio, symbol) {
                    failures.push((symbol.clone(), err));
                    holds.push(ActionRecord {
                        action: Action::Hold {
                            symbol: symbol.clone(),
                            shares: position.shares,
                            price: Some(price),
                            pnl_pct: position.pnl_pct(price),
                        },
                        reason: "core holding, exempt from exit rules".to_string(),
                        source: ActionSource::CoreProtect,
                        status: ActionStatus::Auto,
                    });
                    continue;
                }
                exits.push(ActionRecord {
                    action: Action::Exit {
                        symbol: symbol.clone(),
                        shares: position.shares,
                        price,
                        pnl_pct: position.pnl_pct(price),
                    },
                    reason: eval.reason,
                    source: eval.source,
                    status: ActionStatus::Pending,
                });
                exited_today.insert(symbol.clone());
                exit_proceeds += position.market_value(price);
                working.positions.remove(symbol);
            }
            _ => {
                let reason = match eval.source {
                    ActionSource::CoreProtect => eval.reason,
                    _ => hold_reason(data, symbol, config),
                };
                holds.push(ActionRecord {
                    action: Action::Hold {
                        symbol: symbol.clone(),
                        shares: position.shares,
                        price: Some(price),
                        pnl_pct: position.pnl_pct(price),
                    },
                    reason,
                    source: eval.source,
                    status: ActionStatus::Auto,
                });
            }
        }
    }

    // Exits sort hard stops ahead of strategy exits, ties by symbol. The
    // hold pass above already runs in symbol order.
    exits.sort_by(|a, b| {
        let weight = |r: &ActionRecord| match r.source {
            ActionSource::HardStop => 0u8,
            _ => 1,
        };
        weight(a)
            .cmp(&weight(b))
            .then_with(|| a.action.symbol().cmp(b.action.symbol()))
    });

    // Candidate ranking runs against the working portfolio so freshly
    // exited slots count as open.
    let ranking = momentum::rank_universe(universe, watchlist, &working, data, config);
    failures.extend(ranking.failures);

    // Symbols exited this run are barred before the top-K cut so the
    // freed slot falls to the next-ranked candidate instead of going
    // unused.
    let eligible = momentum::top_additions(&ranking.candidates, config.top_k, &exited_today);
    let slots = risk::available_slots(&working, config.max_positions);
    let num_to_add = eligible.len().min(slots);

    let mut adds = Vec::new();
    if num_to_add > 0 {
        // Exit proceeds are projected, not realized, so they come in
        // discounted by the safety factor. Cash on hand does not.
        let investable =
            (working.cash + exit_proceeds * config.cash_safety_factor).max(0.0);
        let per_slot = investable / num_to_add as f64;
        debug!(
            "sizing {} additions from {:.2} investable cash ({:.2} per slot)",
            num_to_add, investable, per_slot
        );
        for candidate in eligible.iter().take(num_to_add) {
            let Some(price) = data.last_close(&candidate.symbol) else {
                failures.push((
                    candidate.symbol.clone(),
                    EngineError::MissingPrice {
                        symbol: candidate.symbol.clone(),
                    },
                ));
                continue;
            };
            let note = sentiment.get(&candidate.symbol).label();
            let rsi_note = data
                .closes(&candidate.symbol)
                .and_then(|closes| indicators::latest_rsi(&closes, config.rsi_window).ok())
                .map(|rsi| format!("RSI{} {:.0}", config.rsi_window, rsi))
                .unwrap_or_else(|| "RSI n/a".to_string());
            match risk::size_addition(price, per_slot) {
                Ok(shares) => adds.push(ActionRecord {
                    action: Action::Add {
                        symbol: candidate.symbol.clone(),
                        shares,
                        price,
                        rank: candidate.rank,
                        momentum: candidate.trailing_return,
                    },
                    reason: format!(
                        "momentum rank {} ({:+.1}% over {}d), {}, sentiment {}",
                        candidate.rank,
                        candidate.trailing_return * 100.0,
                        config.momentum_lookback,
                        rsi_note,
                        note
                    ),
                    source: ActionSource::Scanner,
                    status: ActionStatus::Pending,
                }),
                Err(EngineError::InsufficientAllocation { .. }) => adds.push(ActionRecord {
                    action: Action::Add {
                        symbol: candidate.symbol.clone(),
                        shares: 0,
                        price,
                        rank: candidate.rank,
                        momentum: candidate.trailing_return,
                    },
                    reason: format!(
                        "insufficient allocation: {:.2} per slot cannot buy one share at {:.2}",
                        per_slot, price
                    ),
                    source: ActionSource::Scanner,
                    status: ActionStatus::Skipped,
                }),
                Err(err) => failures.push((candidate.symbol.clone(), err)),
            }
        }
    }

    // Candidates cut by the slot limit are recorded, not silently dropped.
    for candidate in eligible.iter().skip(num_to_add) {
        if let Err(err) =
            risk::check_add(working.non_core_count() + num_to_add, config.max_positions)
        {
            failures.push((candidate.symbol.clone(), err));
        }
    }

    let mut actions = exits;
    actions.append(&mut holds);
    actions.append(&mut adds);
    info!(
        "plan for {}: {} actions, {} evaluation failures",
        date,
        actions.len(),
        failures.len()
    );
    PlanOutcome {
        plan: ActionPlan { date, actions },
        failures,
    }
}

/// Hold annotation from the position's own trailing momentum.
fn hold_reason(data: &MarketData, symbol: &str, config: &StrategyConfig) -> String {
    let momentum = data
        .closes(symbol)
        .and_then(|closes| indicators::trailing_return(&closes, config.momentum_lookback).ok());
    match momentum {
        Some(m) if m > 0.10 => format!("strong momentum ({:+.1}%), holding", m * 100.0),
        Some(m) if m > 0.0 => format!("positive momentum ({:+.1}%), holding", m * 100.0),
        Some(m) => format!("weak momentum ({:+.1}%), monitoring", m * 100.0),
        None => "holding, no exit condition met".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, TradeRecord};
    use crate::market_data::MarketData;
    use crate::models::PricePoint;
    use std::collections::BTreeMap;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Builds a daily series ending at `closes.last()` on 2025-06-30.
    fn series(closes: &[f64]) -> Vec<PricePoint> {
        let end = ymd(2025, 6, 30);
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: end - chrono::Days::new((closes.len() - 1 - i) as u64),
                close,
                high: close,
                low: close,
            })
            .collect()
    }

    fn flat_then(last: f64, bars: usize) -> Vec<f64> {
        let mut closes = vec![100.0; bars - 1];
        closes.push(last);
        closes
    }

    fn rising(start: f64, step: f64, bars: usize) -> Vec<f64> {
        (0..bars).map(|i| start + step * i as f64).collect()
    }

    fn position(symbol: &str, shares: u32, avg: f64, high: f64, core: bool) -> Position {
        Position {
            symbol: symbol.to_string(),
            shares,
            avg_price: avg,
            cost_basis: avg * shares as f64,
            first_entry: ymd(2025, 1, 2),
            high_since_entry: high,
            is_core: core,
        }
    }

    fn data_from(pairs: Vec<(&str, Vec<f64>)>) -> MarketData {
        let mut map = BTreeMap::new();
        for (symbol, closes) in pairs {
            map.insert(symbol.to_string(), series(&closes));
        }
        MarketData::from_series(map)
    }

    fn config() -> StrategyConfig {
        StrategyConfig {
            trend_ma_window: 50,
            momentum_lookback: 21,
            top_k: 2,
            ..StrategyConfig::default()
        }
    }

    #[test]
    fn plan_orders_exits_holds_then_adds() {
        let mut portfolio = Portfolio {
            cash: 10_000.0,
            ..Portfolio::default()
        };
        // STOP crashes through the hard stop; HOLD1 stays healthy.
        portfolio
            .positions
            .insert("STOP".to_string(), position("STOP", 10, 100.0, 100.0, false));
        portfolio
            .positions
            .insert("HOLD1".to_string(), position("HOLD1", 5, 90.0, 110.0, false));

        let data = data_from(vec![
            ("STOP", flat_then(60.0, 60)),
            ("HOLD1", rising(80.0, 0.5, 60)),
            ("NEW", rising(50.0, 1.0, 60)),
        ]);
        let outcome = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &["STOP".to_string(), "HOLD1".to_string(), "NEW".to_string()],
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &config(),
        );

        let kinds: Vec<ActionKind> =
            outcome.plan.actions.iter().map(|r| r.action.kind()).collect();
        assert_eq!(
            kinds,
            vec![ActionKind::Exit, ActionKind::Hold, ActionKind::Add]
        );
        assert_eq!(outcome.plan.actions[0].source, ActionSource::HardStop);
        assert_eq!(outcome.plan.actions[0].status, ActionStatus::Pending);
        assert!(outcome.failures.is_empty());
    }

    #[test]
    fn exit_proceeds_fund_the_additions() {
        // No starting cash: only the stopped position's proceeds can pay
        // for the new entry.
        let mut portfolio = Portfolio::default();
        portfolio
            .positions
            .insert("STOP".to_string(), position("STOP", 100, 100.0, 100.0, false));
        let data = data_from(vec![
            ("STOP", flat_then(60.0, 60)),
            ("NEW", rising(50.0, 1.0, 60)),
        ]);
        let outcome = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &["NEW".to_string()],
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &config(),
        );

        let add = outcome
            .plan
            .actions
            .iter()
            .find(|r| r.action.kind() == ActionKind::Add)
            .unwrap();
        // 6000 proceeds * 0.85 safety factor, one slot, price 109.
        match &add.action {
            Action::Add { shares, price, .. } => {
                assert_eq!(*price, 109.0);
                assert_eq!(*shares, (6_000.0 * 0.85 / 109.0) as u32);
            }
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn unaffordable_candidate_is_recorded_as_skipped() {
        let portfolio = Portfolio {
            cash: 100.0,
            ..Portfolio::default()
        };
        let data = data_from(vec![("PRICY", rising(5_000.0, 10.0, 60))]);
        let outcome = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &["PRICY".to_string()],
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &config(),
        );

        assert_eq!(outcome.plan.actions.len(), 1);
        let record = &outcome.plan.actions[0];
        assert_eq!(record.status, ActionStatus::Skipped);
        assert!(record.reason.contains("insufficient allocation"));
        match &record.action {
            Action::Add { shares, .. } => assert_eq!(*shares, 0),
            other => panic!("expected add, got {other:?}"),
        }
    }

    #[test]
    fn top_k_one_picks_only_the_stronger_candidate() {
        let portfolio = Portfolio {
            cash: 1_000.0,
            ..Portfolio::default()
        };
        // A up ~20% over the lookback, B up ~10%.
        let data = data_from(vec![
            ("A", rising(10.0, 0.1, 60)),
            ("B", rising(12.0, 0.06, 60)),
        ]);
        let cfg = StrategyConfig {
            top_k: 1,
            ..config()
        };
        let outcome = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &["A".to_string(), "B".to_string()],
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &cfg,
        );

        let adds: Vec<&str> = outcome
            .plan
            .actions
            .iter()
            .filter(|r| r.action.kind() == ActionKind::Add)
            .map(|r| r.action.symbol())
            .collect();
        assert_eq!(adds, vec!["A"]);
    }

    #[test]
    fn exited_symbol_frees_its_slot_for_the_next_candidate() {
        let mut portfolio = Portfolio {
            cash: 10_000.0,
            ..Portfolio::default()
        };
        // XHELD trips the trailing stop off its 200 high while still
        // carrying the strongest momentum in the universe.
        portfolio
            .positions
            .insert("XHELD".to_string(), position("XHELD", 10, 100.0, 200.0, false));
        let data = data_from(vec![
            ("XHELD", rising(81.0, 1.0, 60)),
            ("YNEW", rising(100.0, 0.3, 60)),
        ]);
        let cfg = StrategyConfig {
            top_k: 1,
            ..config()
        };
        let outcome = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &["XHELD".to_string(), "YNEW".to_string()],
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &cfg,
        );

        assert_eq!(outcome.plan.actions[0].action.kind(), ActionKind::Exit);
        assert_eq!(outcome.plan.actions[0].action.symbol(), "XHELD");
        // The exited symbol does not burn the single add slot; the only
        // fresh candidate takes it.
        let adds: Vec<&str> = outcome
            .plan
            .actions
            .iter()
            .filter(|r| r.action.kind() == ActionKind::Add)
            .map(|r| r.action.symbol())
            .collect();
        assert_eq!(adds, vec!["YNEW"]);
    }

    #[test]
    fn core_position_holds_through_a_crash() {
        let mut portfolio = Portfolio::default();
        portfolio
            .positions
            .insert("CORE".to_string(), position("CORE", 10, 100.0, 100.0, true));
        let data = data_from(vec![("CORE", flat_then(30.0, 60))]);
        let outcome = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &[],
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &config(),
        );

        assert_eq!(outcome.plan.actions.len(), 1);
        assert_eq!(outcome.plan.actions[0].action.kind(), ActionKind::Hold);
        assert_eq!(outcome.plan.actions[0].source, ActionSource::CoreProtect);
    }

    #[test]
    fn position_cap_limits_additions() {
        let mut portfolio = Portfolio {
            cash: 100_000.0,
            ..Portfolio::default()
        };
        let mut pairs = Vec::new();
        let mut universe = Vec::new();
        let held: Vec<String> = (0..29).map(|i| format!("H{i:02}")).collect();
        for symbol in &held {
            portfolio
                .positions
                .insert(symbol.clone(), position(symbol, 1, 100.0, 110.0, false));
            pairs.push((symbol.as_str(), rising(95.0, 0.5, 60)));
        }
        universe.extend(held.iter().cloned());
        universe.push("NEWA".to_string());
        universe.push("NEWB".to_string());
        pairs.push(("NEWA", rising(50.0, 1.0, 60)));
        pairs.push(("NEWB", rising(40.0, 1.0, 60)));

        let data = data_from(pairs);
        let cfg = StrategyConfig {
            max_positions: 30,
            ..config()
        };
        let outcome = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &universe,
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &cfg,
        );

        let adds: Vec<_> = outcome
            .plan
            .actions
            .iter()
            .filter(|r| r.action.kind() == ActionKind::Add)
            .collect();
        // One slot open under the 30 cap, two eligible candidates. The
        // overflow candidate surfaces as a cap failure.
        assert_eq!(adds.len(), 1);
        assert!(outcome.failures.iter().any(|(symbol, err)| symbol == "NEWA"
            && matches!(err, EngineError::PositionLimitReached { held: 30, cap: 30 })));
    }

    #[test]
    fn missing_quote_for_a_holding_isolates_the_failure() {
        let mut portfolio = Portfolio {
            cash: 1_000.0,
            ..Portfolio::default()
        };
        portfolio
            .positions
            .insert("GONE".to_string(), position("GONE", 3, 20.0, 25.0, false));
        let data = data_from(vec![("NEW", rising(50.0, 1.0, 60))]);
        let outcome = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &["NEW".to_string()],
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &config(),
        );

        assert!(outcome
            .failures
            .iter()
            .any(|(symbol, err)| symbol == "GONE"
                && matches!(err, EngineError::MissingPrice { .. })));
        let hold = &outcome.plan.actions[0];
        assert_eq!(hold.action.kind(), ActionKind::Hold);
        match &hold.action {
            Action::Hold { price, .. } => assert!(price.is_none()),
            other => panic!("expected hold, got {other:?}"),
        }
        // The unrelated addition still goes through.
        assert!(outcome
            .plan
            .actions
            .iter()
            .any(|r| r.action.kind() == ActionKind::Add));
    }

    #[test]
    fn identical_inputs_produce_a_byte_identical_plan() {
        let mut portfolio = Portfolio {
            cash: 10_000.0,
            updated: Some(ymd(2025, 6, 27)),
            ..Portfolio::default()
        };
        portfolio
            .positions
            .insert("HOLD1".to_string(), position("HOLD1", 5, 90.0, 110.0, false));
        portfolio.transactions.push(TradeRecord {
            date: ymd(2025, 1, 2),
            symbol: "HOLD1".to_string(),
            action: ActionKind::Add,
            shares: 5,
            price: 90.0,
        });
        let data = data_from(vec![
            ("HOLD1", rising(80.0, 0.5, 60)),
            ("NEW", rising(50.0, 1.0, 60)),
        ]);
        let universe = vec!["HOLD1".to_string(), "NEW".to_string()];

        let first = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &universe,
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &config(),
        );
        let second = plan_actions(
            ymd(2025, 6, 30),
            &portfolio,
            &universe,
            &Watchlist::default(),
            &data,
            &SentimentMap::default(),
            &config(),
        );

        let a = serde_json::to_vec(&first.plan).unwrap();
        let b = serde_json::to_vec(&second.plan).unwrap();
        assert_eq!(a, b);
    }
}
