//! Fan-in combinator merging any number of completion signals into one.
//!
//! The combined [`Signal`] fires as soon as any input fires. Zero inputs produce an already
//! fired signal and a single input is returned as is. Two or more inputs are raced by watcher
//! tasks spawned on the current tokio runtime, using the [`Strategy`] from [`FanInConfig`]:
//!
//! - [`Strategy::FanOut`] spawns one watcher per input. Each watcher also watches the output, so
//!   once the race is decided every watcher exits, including those whose input never fires.
//! - [`Strategy::Pairwise`] races two inputs against a synthetic signal combining the rest, level
//!   by level. It is used only up to [`FanInConfig::effective_pairwise_max_inputs`] inputs.
//!
//! A watcher also exits when its input is abandoned (every firing handle dropped), so an output
//! whose inputs can all no longer fire becomes abandoned in turn instead of pinning tasks.

mod fan_out;
mod pairwise;

use std::future::Future;

use fanin_config::shared::{FanInConfig, Strategy};
use metrics::{counter, gauge};
use tracing::{debug, warn};

use crate::concurrency::signal::Signal;
use crate::concurrency::tracker::{WatcherGuard, WatcherTracker};
use crate::metrics::{
    FANIN_OUTPUTS_FIRED_TOTAL, FANIN_WATCHERS_ACTIVE, FANIN_WATCHERS_SPAWNED_TOTAL,
    STRATEGY_LABEL,
};

/// Combines `inputs` with the default [`FanInConfig`].
///
/// # Panics
///
/// Panics if called with two or more inputs outside of a tokio runtime.
pub fn any_of<I>(inputs: I) -> Signal
where
    I: IntoIterator<Item = Signal>,
{
    FanIn::default().combine(inputs)
}

/// Builder and shared context for fan-in combinations.
///
/// All combinations made through one [`FanIn`] (and its clones) share the same
/// [`WatcherTracker`] and optional cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct FanIn {
    config: FanInConfig,
    cancel: Option<Signal>,
    tracker: WatcherTracker,
}

impl FanIn {
    /// Creates a new [`FanIn`] using `config`.
    pub fn new(config: FanInConfig) -> Self {
        Self {
            config,
            cancel: None,
            tracker: WatcherTracker::new(),
        }
    }

    /// Stops every watcher of this [`FanIn`] without firing its output once `cancel` fires.
    ///
    /// Only combinations of two or more inputs have watchers. A single input is returned as is,
    /// so it still fires after cancellation, and zero inputs yield an already fired signal.
    pub fn with_cancellation(mut self, cancel: Signal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Returns the configuration used by this [`FanIn`].
    pub fn config(&self) -> &FanInConfig {
        &self.config
    }

    /// Returns the tracker counting watchers spawned by this [`FanIn`].
    pub fn tracker(&self) -> &WatcherTracker {
        &self.tracker
    }

    /// Returns a signal that fires as soon as any of `inputs` fires.
    ///
    /// Never blocks. Duplicated inputs are allowed and each gets its own watcher.
    ///
    /// # Panics
    ///
    /// Panics if called with two or more inputs outside of a tokio runtime.
    pub fn combine<I>(&self, inputs: I) -> Signal
    where
        I: IntoIterator<Item = Signal>,
    {
        let mut inputs = inputs.into_iter();

        let Some(first) = inputs.next() else {
            return Signal::fired();
        };
        let Some(second) = inputs.next() else {
            return first;
        };
        let rest: Vec<Signal> = inputs.collect();
        let input_count = rest.len() + 2;

        if self.cancel.as_ref().is_some_and(Signal::is_fired) {
            debug!(input_count, "cancellation already requested, no watchers spawned");
            return Signal::never();
        }

        let strategy = self.config.effective_strategy(input_count);
        if strategy != self.config.strategy {
            warn!(
                input_count,
                pairwise_max_inputs = self.config.effective_pairwise_max_inputs(),
                "too many inputs for pairwise strategy, falling back to fan-out"
            );
        }

        match strategy {
            Strategy::FanOut => fan_out::combine(self, [first, second].into_iter().chain(rest)),
            Strategy::Pairwise => pairwise::combine(self, first, second, rest),
        }
    }

    /// Spawns `watcher` on the current runtime and accounts for it until it finishes.
    fn spawn_watcher<F>(&self, strategy: Strategy, watcher: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let active = ActiveWatcher::register(&self.tracker, strategy);

        tokio::spawn(async move {
            let _active = active;
            watcher.await;
        });
    }
}

/// Records that an output was fired by a watcher using `strategy`.
fn record_output_fired(tracker: &WatcherTracker, strategy: Strategy) {
    tracker.record_output_fired();
    counter!(FANIN_OUTPUTS_FIRED_TOTAL, STRATEGY_LABEL => strategy.as_str()).increment(1);
}

/// Tracker registration paired with the active watchers gauge.
#[derive(Debug)]
struct ActiveWatcher {
    _guard: WatcherGuard,
    strategy: Strategy,
}

impl ActiveWatcher {
    fn register(tracker: &WatcherTracker, strategy: Strategy) -> Self {
        counter!(FANIN_WATCHERS_SPAWNED_TOTAL, STRATEGY_LABEL => strategy.as_str()).increment(1);
        gauge!(FANIN_WATCHERS_ACTIVE, STRATEGY_LABEL => strategy.as_str()).increment(1.0);

        Self {
            _guard: tracker.register(),
            strategy,
        }
    }
}

impl Drop for ActiveWatcher {
    fn drop(&mut self) {
        gauge!(FANIN_WATCHERS_ACTIVE, STRATEGY_LABEL => self.strategy.as_str()).decrement(1.0);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::concurrency::signal::create_signal;

    fn pairwise_config() -> FanInConfig {
        FanInConfig {
            strategy: Strategy::Pairwise,
            pairwise_max_inputs: 4,
        }
    }

    #[test]
    fn empty_input_is_fired_without_a_runtime() {
        let fan_in = FanIn::default();
        let output = fan_in.combine(Vec::new());

        assert!(output.is_fired());
        assert_eq!(fan_in.tracker().spawned(), 0);
    }

    #[test]
    fn single_input_is_passed_through_without_a_runtime() {
        let (tx, input) = create_signal();
        let fan_in = FanIn::default();
        let output = fan_in.combine([input]);

        assert!(!output.is_fired());
        tx.fire();
        assert!(output.is_fired());
        assert_eq!(fan_in.tracker().spawned(), 0);
    }

    #[tokio::test]
    async fn fan_out_spawns_one_watcher_per_input() {
        let fan_in = FanIn::default();
        let signals: Vec<_> = (0..5).map(|_| create_signal()).collect();
        let output = fan_in.combine(signals.iter().map(|(_, signal)| signal.clone()));

        assert_eq!(fan_in.tracker().spawned(), 5);

        signals[3].0.fire();
        timeout(Duration::from_secs(1), output.wait())
            .await
            .expect("output should fire");
        timeout(Duration::from_secs(1), fan_in.tracker().wait_idle())
            .await
            .expect("watchers should exit");
    }

    #[tokio::test]
    async fn pairwise_spawns_one_task_per_pair() {
        let fan_in = FanIn::new(pairwise_config());
        let signals: Vec<_> = (0..4).map(|_| create_signal()).collect();
        let output = fan_in.combine(signals.iter().map(|(_, signal)| signal.clone()));

        assert_eq!(fan_in.tracker().spawned(), 2);

        signals[2].0.fire();
        timeout(Duration::from_secs(1), output.wait())
            .await
            .expect("output should fire");
        timeout(Duration::from_secs(1), fan_in.tracker().wait_idle())
            .await
            .expect("watchers should exit");
    }

    #[tokio::test]
    async fn pairwise_falls_back_to_fan_out_above_bound() {
        let fan_in = FanIn::new(pairwise_config());
        let signals: Vec<_> = (0..6).map(|_| create_signal()).collect();
        let _output = fan_in.combine(signals.iter().map(|(_, signal)| signal.clone()));

        assert_eq!(fan_in.tracker().spawned(), 6);
    }

    #[tokio::test]
    async fn pairwise_at_cap_chains_every_pair() {
        let fan_in = FanIn::new(FanInConfig {
            strategy: Strategy::Pairwise,
            pairwise_max_inputs: FanInConfig::MAX_PAIRWISE_INPUTS,
        });
        let signals: Vec<_> = (0..FanInConfig::MAX_PAIRWISE_INPUTS)
            .map(|_| create_signal())
            .collect();
        let output = fan_in.combine(signals.iter().map(|(_, signal)| signal.clone()));

        assert_eq!(
            fan_in.tracker().spawned(),
            FanInConfig::MAX_PAIRWISE_INPUTS / 2
        );

        signals[FanInConfig::MAX_PAIRWISE_INPUTS - 1].0.fire();
        timeout(Duration::from_secs(1), output.wait())
            .await
            .expect("output should fire");
        timeout(Duration::from_secs(1), fan_in.tracker().wait_idle())
            .await
            .expect("watchers should exit");
        assert_eq!(fan_in.tracker().outputs_fired(), 1);
    }

    #[tokio::test]
    async fn unvalidated_pairwise_bound_above_cap_falls_back_to_fan_out() {
        let fan_in = FanIn::new(FanInConfig {
            strategy: Strategy::Pairwise,
            pairwise_max_inputs: 5_000,
        });
        let signals: Vec<_> = (0..5_000).map(|_| create_signal()).collect();
        let output = fan_in.combine(signals.iter().map(|(_, signal)| signal.clone()));

        assert_eq!(fan_in.tracker().spawned(), 5_000);

        signals[4_999].0.fire();
        timeout(Duration::from_secs(5), output.wait())
            .await
            .expect("output should fire");
        timeout(Duration::from_secs(5), fan_in.tracker().wait_idle())
            .await
            .expect("watchers should exit");
    }

    #[test]
    fn cancellation_leaves_single_input_passthrough_untouched() {
        let (tx, input) = create_signal();
        let fan_in = FanIn::default().with_cancellation(Signal::fired());

        let output = fan_in.combine([input]);
        assert!(!output.is_fired());

        tx.fire();
        assert!(output.is_fired());
        assert!(fan_in.combine(Vec::new()).is_fired());
        assert_eq!(fan_in.tracker().spawned(), 0);
    }

    #[tokio::test]
    async fn fired_cancellation_spawns_nothing() {
        let fan_in = FanIn::default().with_cancellation(Signal::fired());
        let (_tx_a, a) = create_signal();
        let (_tx_b, b) = create_signal();

        let output = fan_in.combine([a, b]);

        assert_eq!(fan_in.tracker().spawned(), 0);
        assert!(output.is_abandoned());
    }

    #[tokio::test]
    async fn any_of_uses_default_configuration() {
        let (tx, a) = create_signal();
        let output = any_of([a, Signal::never()]);

        tx.fire();
        timeout(Duration::from_secs(1), output.wait())
            .await
            .expect("output should fire");
    }
}
