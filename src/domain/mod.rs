//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod fusion;
pub mod position;
pub mod ledger;
pub mod risk;
pub mod metrics;
pub mod backtest;
pub mod config;
pub mod config_validation;
pub mod error;
