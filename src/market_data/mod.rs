//! REST market-data collector (`spec.md` §4.7): order book depth, recent
//! and historical trades, and mark price, behind a short-TTL cache.

pub mod cache;
pub mod collector;

pub use collector::MarketDataCollector;
