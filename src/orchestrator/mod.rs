//! Background job orchestrators (`spec.md` §4.4, §4.5): the bracket
//! order orchestrator and the TTL cancel orchestrator, each backed by its
//! own job registry with a single worker task per job.

pub mod bracket;
pub mod registry;
pub mod ttl;
