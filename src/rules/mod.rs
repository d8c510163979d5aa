//! Threshold rule engine
//!
//! Pure mapping from (reading, settings) to an ordered batch of device
//! commands. No I/O, fully deterministic.

mod engine;

pub use engine::evaluate;
