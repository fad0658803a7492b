// crates/db/src/queries/mod.rs
pub mod classifier;
pub mod normalized;
pub mod raw;
