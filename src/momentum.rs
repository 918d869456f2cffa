use crate::config::StrategyConfig;
use crate::errors::EngineError;
use crate::market_data::MarketData;
use crate::models::Candidate;
use crate::portfolio::Watchlist;
use crate::{indicators, models::Portfolio};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Candidate construction plus symbols that could not be evaluated.
/// A bad series never aborts the run; it lands in `failures` instead.
#[derive(Debug, Default)]
pub struct RankingOutcome {
    pub candidates: Vec<Candidate>,
    pub failures: Vec<(String, EngineError)>,
}

/// Builds and ranks the candidate universe by trailing momentum return.
/// Whitelisted symbols join unconditionally; existing holdings are ranked
/// but flagged so the planner never re-adds them.
pub fn rank_universe(
    universe: &[String],
    watchlist: &Watchlist,
    portfolio: &Portfolio,
    data: &MarketData,
    config: &StrategyConfig,
) -> RankingOutcome {
    let mut symbols: BTreeSet<String> = universe
        .iter()
        .take(config.universe_size)
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    for symbol in &watchlist.symbols {
        symbols.insert(symbol.clone());
    }

    let mut outcome = RankingOutcome::default();
    for symbol in symbols {
        let closes = match data.closes(&symbol) {
            Some(closes) => closes,
            None => {
                outcome
                    .failures
                    .push((symbol.clone(), EngineError::MissingPrice { symbol }));
                continue;
            }
        };
        match indicators::trailing_return(&closes, config.momentum_lookback) {
            Ok(trailing_return) => outcome.candidates.push(Candidate {
                is_existing_holding: portfolio.positions.contains_key(&symbol),
                is_whitelisted: watchlist.contains(&symbol),
                symbol,
                trailing_return,
                rank: 0,
            }),
            Err(err) => outcome.failures.push((symbol, err)),
        }
    }

    assign_ranks(&mut outcome.candidates);
    outcome
}

/// Sorts by trailing return descending, ties by symbol ascending, and
/// numbers ranks 1..N. Pure and restartable: every call recomputes from
/// scratch.
pub fn assign_ranks(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        b.trailing_return
            .partial_cmp(&a.trailing_return)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    for (index, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = (index + 1) as u32;
    }
}

/// Top-K ADD-eligible candidates: positive momentum, not already held,
/// not in the exclusion set. Exclusions are applied before the top-K cut
/// so a barred symbol never consumes a slot from the next-best candidate.
pub fn top_additions<'a>(
    candidates: &'a [Candidate],
    top_k: usize,
    excluded: &BTreeSet<String>,
) -> Vec<&'a Candidate> {
    candidates
        .iter()
        .filter(|c| {
            !c.is_existing_holding && c.trailing_return > 0.0 && !excluded.contains(&c.symbol)
        })
        .take(top_k)
        .collect()
}
