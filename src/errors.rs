use thiserror::Error;

/// Recoverable evaluation failures. These never abort a run; callers
/// collect them per symbol and keep going.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("insufficient history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("position limit reached: {held} non-core positions at a cap of {cap}")]
    PositionLimitReached { held: usize, cap: usize },

    #[error("allocation {allocation:.2} cannot buy one share at {price:.2}")]
    InsufficientAllocation { price: f64, allocation: f64 },

    #[error("no market data for {symbol}")]
    MissingPrice { symbol: String },

    #[error("{symbol} is a core position and cannot be sold")]
    CorePositionProtected { symbol: String },
}
