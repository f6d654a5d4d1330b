//! Shared configuration types for fan-in combinators.

mod base;
mod fan_in;

pub use base::ValidationError;
pub use fan_in::{FanInConfig, Strategy};
