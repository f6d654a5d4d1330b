//! Configuration for fan-in combinators.
//!
//! Holds the serde-backed [`shared::FanInConfig`] consumed by the `fanin` crate and the
//! hierarchical loader used by binaries that want to read it from disk.

pub mod load;
pub mod shared;

pub use load::{LoadConfigError, load_config, load_config_from, profile_from_env};
