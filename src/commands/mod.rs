pub mod confirm;
pub mod export_data;
pub mod plan;
pub mod run_backtest;
pub mod snapshot;
pub mod stop_study;
pub mod watchlist;
