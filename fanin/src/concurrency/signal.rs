//! One-shot completion signals.
//!
//! A [`Signal`] is a write-once marker that moves from pending to fired at most once and carries
//! no payload. It wraps a tokio watch channel of `bool` so that any number of waiters observe the
//! transition, not just the first one. The firing side, [`SignalTx`], acts as a single-fire latch:
//! concurrent calls to [`SignalTx::fire`] are serialized by the channel lock and exactly one of
//! them performs the transition.
//!
//! When every [`SignalTx`] clone of a pending signal is dropped, the signal is *abandoned*: it
//! can never fire. Watchers use [`Signal::observe`] to notice this and stop waiting.

use std::future;
use std::sync::Arc;

use tokio::sync::watch;

/// Outcome of observing a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The signal fired.
    Fired,
    /// The signal is still pending and nothing is left that could fire it.
    Abandoned,
}

/// Firing side of a [`Signal`].
///
/// Cloning a [`SignalTx`] shares the same latch. The signal becomes abandoned once the last
/// clone is dropped without firing.
#[derive(Debug, Clone)]
pub struct SignalTx {
    inner: Arc<watch::Sender<bool>>,
}

impl SignalTx {
    /// Fires the signal, waking every waiter.
    ///
    /// Returns `true` for the single call that performed the pending→fired transition and
    /// `false` for every other call, including concurrent ones.
    pub fn fire(&self) -> bool {
        self.inner.send_if_modified(|fired| {
            if *fired {
                return false;
            }

            *fired = true;
            true
        })
    }

    /// Returns `true` if the signal has fired.
    pub fn is_fired(&self) -> bool {
        *self.inner.borrow()
    }

    /// Creates a new observing handle for this signal.
    pub fn subscribe(&self) -> Signal {
        Signal {
            rx: self.inner.subscribe(),
        }
    }
}

/// Observing side of a one-shot completion signal.
///
/// Clones observe the same underlying state.
#[derive(Debug, Clone)]
pub struct Signal {
    rx: watch::Receiver<bool>,
}

impl Signal {
    /// Returns a signal that has already fired.
    pub fn fired() -> Self {
        let (_, rx) = watch::channel(true);
        Self { rx }
    }

    /// Returns a signal that will never fire.
    ///
    /// The returned signal is already abandoned.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        Self { rx }
    }

    /// Returns `true` if the signal has fired.
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }

    /// Returns `true` if the signal is pending and can no longer fire.
    pub fn is_abandoned(&self) -> bool {
        // The closed check must come first: once closed, the value is final.
        let closed = self.rx.has_changed().is_err();
        closed && !self.is_fired()
    }

    /// Waits until the signal fires.
    ///
    /// An abandoned signal never resolves this future.
    pub async fn wait(&self) {
        if self.observe().await == Observation::Abandoned {
            future::pending::<()>().await;
        }
    }

    /// Waits until the signal either fires or is abandoned.
    pub async fn observe(&self) -> Observation {
        let mut rx = self.rx.clone();
        let fired = rx.wait_for(|fired| *fired).await.is_ok();

        if fired {
            Observation::Fired
        } else {
            Observation::Abandoned
        }
    }
}

/// Waits for `signal` to fire, or forever when there is no signal.
pub async fn wait_optional(signal: Option<&Signal>) {
    match signal {
        Some(signal) => signal.wait().await,
        None => future::pending().await,
    }
}

/// Observes `signal`, or waits forever when there is no signal.
pub async fn observe_optional(signal: Option<&Signal>) -> Observation {
    match signal {
        Some(signal) => signal.observe().await,
        None => future::pending().await,
    }
}

/// Creates a new pending signal with its firing side.
pub fn create_signal() -> (SignalTx, Signal) {
    let (tx, rx) = watch::channel(false);
    (SignalTx { inner: Arc::new(tx) }, Signal { rx })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[test]
    fn fire_transitions_exactly_once() {
        let (tx, signal) = create_signal();
        assert!(!signal.is_fired());
        assert!(!tx.is_fired());

        assert!(tx.fire());
        assert!(!tx.fire());
        assert!(!tx.clone().fire());

        assert!(signal.is_fired());
        assert!(tx.is_fired());
    }

    #[test]
    fn fired_and_never_constructors() {
        let fired = Signal::fired();
        assert!(fired.is_fired());
        assert!(!fired.is_abandoned());

        let never = Signal::never();
        assert!(!never.is_fired());
        assert!(never.is_abandoned());
    }

    #[test]
    fn dropping_every_sender_abandons_a_pending_signal() {
        let (tx, signal) = create_signal();
        let tx_clone = tx.clone();

        drop(tx);
        assert!(!signal.is_abandoned());

        drop(tx_clone);
        assert!(signal.is_abandoned());
    }

    #[test]
    fn fired_signal_is_not_abandoned_after_senders_drop() {
        let (tx, signal) = create_signal();
        tx.fire();
        drop(tx);

        assert!(signal.is_fired());
        assert!(!signal.is_abandoned());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_fires_have_a_single_winner() {
        let (tx, signal) = create_signal();
        let barrier = Arc::new(tokio::sync::Barrier::new(16));

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let tx = tx.clone();
                let barrier = barrier.clone();
                tokio::spawn(async move {
                    barrier.wait().await;
                    tx.fire()
                })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn every_waiter_is_released() {
        let (tx, signal) = create_signal();

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.wait().await })
            })
            .collect();

        tx.fire();

        for waiter in waiters {
            timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter should be released")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn subscriber_created_after_fire_sees_fired_state() {
        let (tx, _signal) = create_signal();
        tx.fire();

        let late = tx.subscribe();
        assert!(late.is_fired());
        assert_eq!(late.observe().await, Observation::Fired);
    }

    #[tokio::test]
    async fn observe_reports_abandonment() {
        let (tx, signal) = create_signal();
        let observer = tokio::spawn({
            let signal = signal.clone();
            async move { signal.observe().await }
        });

        drop(tx);

        let observation = timeout(Duration::from_secs(1), observer)
            .await
            .expect("observer should notice abandonment")
            .unwrap();
        assert_eq!(observation, Observation::Abandoned);
    }

    #[tokio::test]
    async fn optional_helpers_never_resolve_without_a_signal() {
        assert!(timeout(Duration::from_millis(10), wait_optional(None)).await.is_err());
        assert!(timeout(Duration::from_millis(10), observe_optional(None)).await.is_err());

        let fired = Signal::fired();
        wait_optional(Some(&fired)).await;
        assert_eq!(observe_optional(Some(&fired)).await, Observation::Fired);
    }

    #[tokio::test]
    async fn wait_on_abandoned_signal_stays_pending() {
        let result = timeout(Duration::from_millis(20), Signal::never().wait()).await;
        assert!(result.is_err());
    }
}
