use std::fmt;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::concurrency::signal::{Signal, SignalTx};

/// Default timeout for waiting on signals in tests.
///
/// Generous on purpose: a combined signal normally fires within a few milliseconds.
pub const DEFAULT_SIGNAL_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`Signal`] wrapper that fails tests instead of hanging when the signal never fires.
#[derive(Clone)]
pub struct TimedSignal {
    signal: Signal,
    timeout_duration: Duration,
}

impl TimedSignal {
    /// Creates a new [`TimedSignal`] with the default timeout.
    pub fn new(signal: Signal) -> Self {
        Self::with_timeout(signal, DEFAULT_SIGNAL_TIMEOUT)
    }

    /// Creates a new [`TimedSignal`] with a custom timeout duration.
    pub fn with_timeout(signal: Signal, timeout_duration: Duration) -> Self {
        Self {
            signal,
            timeout_duration,
        }
    }

    /// Waits for the signal to fire.
    ///
    /// # Panics
    ///
    /// Panics if the timeout elapses before the signal fires.
    pub async fn fired(&self) {
        if timeout(self.timeout_duration, self.signal.wait()).await.is_err() {
            panic!(
                "Signal did not fire within {:?}. \
                 Check that at least one input of the combination was fired.",
                self.timeout_duration
            );
        }
    }

    /// Waits for the signal to fire, logging instead of panicking on timeout.
    ///
    /// Returns `true` if the signal fired.
    pub async fn try_fired(&self) -> bool {
        let fired = timeout(self.timeout_duration, self.signal.wait())
            .await
            .is_ok();

        if !fired {
            warn!(
                "Signal did not fire within {:?}, continuing",
                self.timeout_duration
            );
        }

        fired
    }

    /// Returns the wrapped signal.
    pub fn inner(&self) -> &Signal {
        &self.signal
    }
}

impl fmt::Debug for TimedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedSignal")
            .field("fired", &self.signal.is_fired())
            .field("timeout_duration", &self.timeout_duration)
            .finish()
    }
}

/// Asserts that `signal` does not fire within `duration`.
///
/// # Panics
///
/// Panics if the signal fires before `duration` elapses.
pub async fn assert_stays_pending(signal: &Signal, duration: Duration) {
    if timeout(duration, signal.wait()).await.is_ok() {
        panic!("Signal fired although it was expected to stay pending for {duration:?}");
    }
}

/// Fires `tx` from a background task after `delay`.
pub fn fire_after(tx: SignalTx, delay: Duration) -> JoinHandle<bool> {
    tokio::spawn(async move {
        sleep(delay).await;
        tx.fire()
    })
}
