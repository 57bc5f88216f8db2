//! rankfolio: ranking-driven portfolio backtester.
//!
//! Hexagonal architecture: scoring, selection and simulation logic in
//! [`domain`], port traits in [`ports`], concrete implementations in
//! [`adapters`], and the command-line surface in [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
