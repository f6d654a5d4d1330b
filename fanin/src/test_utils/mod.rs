//! Helpers for tests exercising signals and combinators.

pub mod signal;
