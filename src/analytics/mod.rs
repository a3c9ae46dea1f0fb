//! Analytics kernels (`spec.md` §4.9): microstructure models that turn
//! order-book and trade-tape snapshots into bounded, agent-consumable
//! summaries. Every kernel here returns a value capped at roughly 2KB of
//! serialized JSON — raw trade/level series are never echoed back.

pub mod common;
pub mod multi_horizon;
pub mod queue_fill;
pub mod volume_profile;
pub mod wall_persistence;
