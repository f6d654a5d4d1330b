//! Fan-in of one-shot completion signals.
//!
//! [`any_of`] merges any number of [`Signal`]s into one that fires as soon as any input fires.
//! [`FanIn`] exposes the same operation with explicit configuration, optional cancellation and
//! access to the [`WatcherTracker`] counting the watcher tasks it spawns.

pub mod combinator;
pub mod concurrency;
pub mod metrics;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use combinator::{FanIn, any_of};
pub use concurrency::signal::{Observation, Signal, SignalTx, create_signal};
pub use concurrency::tracker::WatcherTracker;
pub use fanin_config::shared::{FanInConfig, Strategy};
