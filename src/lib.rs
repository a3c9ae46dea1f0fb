//! Binance USDⓈ-M futures agent tool layer.
//!
//! A library of agent-callable tools for signed order placement,
//! order-lifecycle management, bracket/TTL order orchestration, an
//! aggregated-trade streaming pipeline, a REST market-data collector, and
//! a set of order-book/trade-tape analytics kernels. Hosting these tools
//! behind an agent-facing dispatch loop, process startup/config loading,
//! and `tracing` subscriber initialization are the embedding binary's
//! responsibility (`spec.md` §1).

pub mod analytics;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod market_data;
pub mod orchestrator;
pub mod orders;
pub mod param_cache;
pub mod rate_limit;
pub mod retry;
pub mod rules;
pub mod stream;
pub mod types;
