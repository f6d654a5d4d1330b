//! Concurrency primitives backing the fan-in combinator.
//!
//! - [`signal`] provides the one-shot [`signal::Signal`] and its single-fire latch.
//! - [`tracker`] counts watcher tasks so callers can verify nothing is left behind.

pub mod signal;
pub mod tracker;
