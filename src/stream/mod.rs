//! Aggregated-trade streaming pipeline (`spec.md` §4.6): a persistent
//! WebSocket session per symbol group feeding per-symbol ring buffers.

pub mod agg_trade;
pub mod ring_buffer;

pub use agg_trade::AggTradeStream;
pub use ring_buffer::{AggTrade, TradeRingBuffer};
