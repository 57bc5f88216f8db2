//! Core domain types and logic.

pub mod error;
pub mod ohlcv;
pub mod price_series;
pub mod feature;
pub mod scoring;
pub mod selection;
pub mod portfolio;
pub mod trade;
pub mod schedule;
pub mod simulation;
pub mod metrics;
pub mod backtest;
pub mod engine;
pub mod config;
