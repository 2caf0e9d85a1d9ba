// Season simulation core: data model, deterministic match resolution,
// league table and leaderboard aggregation, playoff bracket, and the
// season state store. No I/O and no timers live in this crate.

pub mod bracket;
pub mod model;
pub mod performers;
pub mod resolve;
pub mod rng;
pub mod standings;
pub mod store;
