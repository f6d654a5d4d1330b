use fanin_config::shared::Strategy;
use tracing::{debug, trace};

use crate::combinator::{FanIn, record_output_fired};
use crate::concurrency::signal::{Observation, Signal, create_signal, wait_optional};

/// Spawns one watcher per input, all racing to fire a shared output.
pub(super) fn combine<I>(fan_in: &FanIn, inputs: I) -> Signal
where
    I: IntoIterator<Item = Signal>,
{
    let (output_tx, output) = create_signal();

    let mut input_count: usize = 0;
    for (index, input) in inputs.into_iter().enumerate() {
        input_count += 1;

        let output_tx = output_tx.clone();
        let decided = output.clone();
        let cancel = fan_in.cancel.clone();
        let tracker = fan_in.tracker.clone();

        fan_in.spawn_watcher(Strategy::FanOut, async move {
            tokio::select! {
                biased;

                _ = decided.wait() => {
                    trace!(index, "race already decided, watcher exiting");
                }

                observation = input.observe() => match observation {
                    Observation::Fired => {
                        if output_tx.fire() {
                            record_output_fired(&tracker, Strategy::FanOut);
                            debug!(index, "input fired first, output fired");
                        } else {
                            trace!(index, "input fired after the race was decided");
                        }
                    }
                    Observation::Abandoned => {
                        trace!(index, "input abandoned, watcher exiting");
                    }
                },

                _ = wait_optional(cancel.as_ref()) => {
                    trace!(index, "cancellation requested, watcher exiting");
                }
            }
        });
    }

    debug!(input_count, "spawned fan-out watchers");

    output
}
