use fanin_config::shared::Strategy;
use tracing::{debug, trace};

use crate::combinator::{FanIn, record_output_fired};
use crate::concurrency::signal::{
    Observation, Signal, SignalTx, create_signal, observe_optional, wait_optional,
};

/// Races inputs two at a time, each level against a signal standing for all later levels.
///
/// Levels are built with a loop rather than by recursion, so the number of inputs only bounds
/// how many tasks are spawned, never the stack depth of this call.
pub(super) fn combine(fan_in: &FanIn, first: Signal, second: Signal, rest: Vec<Signal>) -> Signal {
    let input_count = rest.len() + 2;

    let mut pairs = vec![(first, second)];
    let mut rest = rest.into_iter();
    let leftover = loop {
        match (rest.next(), rest.next()) {
            (Some(a), Some(b)) => pairs.push((a, b)),
            (leftover, _) => break leftover,
        }
    };

    let levels: Vec<_> = pairs.iter().map(|_| create_signal()).collect();
    let output = levels[0].1.clone();

    for (depth, ((first, second), (output_tx, _))) in pairs.into_iter().zip(&levels).enumerate() {
        let rest = match levels.get(depth + 1) {
            Some((_, next_output)) => Some(next_output.clone()),
            None => leftover.clone(),
        };
        let enclosing = depth.checked_sub(1).map(|above| levels[above].1.clone());

        spawn_level(
            fan_in,
            output_tx.clone(),
            first,
            second,
            rest,
            enclosing,
            depth,
        );
    }

    debug!(input_count, levels = levels.len(), "spawned pairwise watchers");

    output
}

/// Spawns the task for one level, firing `output_tx` when `first`, `second` or `rest` fires.
///
/// `enclosing` is the output of the level above. Once that level's task is gone, whether it fired
/// or not, this level has no reader left and exits without firing.
fn spawn_level(
    fan_in: &FanIn,
    output_tx: SignalTx,
    first: Signal,
    second: Signal,
    rest: Option<Signal>,
    enclosing: Option<Signal>,
    depth: usize,
) {
    let cancel = fan_in.cancel.clone();
    let tracker = fan_in.tracker.clone();

    fan_in.spawn_watcher(Strategy::Pairwise, async move {
        let mut first_open = true;
        let mut second_open = true;
        let mut rest_open = rest.is_some();

        let winner = loop {
            let any_open = first_open || second_open || rest_open;

            tokio::select! {
                biased;

                _ = observe_optional(enclosing.as_ref()), if any_open => {
                    trace!(depth, "enclosing race finished, watcher exiting");
                    break None;
                }

                observation = first.observe(), if first_open => match observation {
                    Observation::Fired => break Some("first"),
                    Observation::Abandoned => first_open = false,
                },

                observation = second.observe(), if second_open => match observation {
                    Observation::Fired => break Some("second"),
                    Observation::Abandoned => second_open = false,
                },

                observation = observe_optional(rest.as_ref()), if rest_open => match observation {
                    Observation::Fired => break Some("rest"),
                    Observation::Abandoned => rest_open = false,
                },

                _ = wait_optional(cancel.as_ref()), if any_open => {
                    trace!(depth, "cancellation requested, watcher exiting");
                    break None;
                }

                else => {
                    trace!(depth, "every input abandoned, watcher exiting");
                    break None;
                }
            }
        };

        let Some(winner) = winner else {
            return;
        };

        if output_tx.fire() && depth == 0 {
            record_output_fired(&tracker, Strategy::Pairwise);
            debug!(winner, "input fired first, output fired");
        } else {
            trace!(depth, winner, "pairwise level fired");
        }
    });
}
