//! sentitrader: crypto signal fusion and sentiment-aware backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], collaborator traits in
//! [`ports`], concrete implementations in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
