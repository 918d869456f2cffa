use crate::errors::EngineError;
use crate::models::Portfolio;

/// Number of non-core slots still open under the position cap.
pub fn available_slots(portfolio: &Portfolio, max_positions: usize) -> usize {
    max_positions.saturating_sub(portfolio.non_core_count())
}

/// Rejects a new entry once the non-core position cap is reached. `held`
/// counts current non-core positions plus any additions already planned
/// this run; core holdings do not consume slots.
pub fn check_add(held: usize, max_positions: usize) -> Result<(), EngineError> {
    if held >= max_positions {
        return Err(EngineError::PositionLimitReached {
            held,
            cap: max_positions,
        });
    }
    Ok(())
}

/// Whole-share count purchasable with the per-slot allocation. Fails
/// when the allocation cannot cover a single share.
pub fn size_addition(price: f64, allocation: f64) -> Result<u32, EngineError> {
    if price <= 0.0 {
        return Err(EngineError::InsufficientAllocation { price, allocation });
    }
    let shares = (allocation / price).floor() as u32;
    if shares == 0 {
        return Err(EngineError::InsufficientAllocation { price, allocation });
    }
    Ok(shares)
}

/// Guards manual sell requests against core holdings.
pub fn check_sell(portfolio: &Portfolio, symbol: &str) -> Result<(), EngineError> {
    if let Some(position) = portfolio.positions.get(symbol) {
        if position.is_core {
            return Err(EngineError::CorePositionProtected {
                symbol: symbol.to_string(),
            });
        }
    }
    Ok(())
}
