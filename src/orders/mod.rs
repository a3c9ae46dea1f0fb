//! Order lifecycle tool family (`spec.md` §4.3): placing, amending,
//! querying, and cancelling orders, plus leverage/margin-type tools.

mod lifecycle;

pub use lifecycle::*;
