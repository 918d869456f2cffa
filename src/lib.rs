pub mod backtest;
pub mod commands;
pub mod config;
pub mod context;
pub mod errors;
pub mod exit_rules;
pub mod indicators;
pub mod market_data;
pub mod models;
pub mod momentum;
pub mod performance;
pub mod plan_store;
pub mod planner;
pub mod portfolio;
pub mod risk;
pub mod sentiment;
pub mod snapshot;
