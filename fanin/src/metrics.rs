//! Metric names emitted by fan-in combinators.

/// Label for the strategy used to race inputs.
pub const STRATEGY_LABEL: &str = "strategy";

/// Counter for watcher tasks spawned.
pub const FANIN_WATCHERS_SPAWNED_TOTAL: &str = "fanin_watchers_spawned_total";

/// Gauge for watcher tasks that have not finished yet.
pub const FANIN_WATCHERS_ACTIVE: &str = "fanin_watchers_active";

/// Counter for outputs transitioned to fired.
pub const FANIN_OUTPUTS_FIRED_TOTAL: &str = "fanin_outputs_fired_total";
