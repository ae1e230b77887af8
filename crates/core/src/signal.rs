//! One-shot completion signal
//!
//! Every node owns a [`CompletionSignal`]. It starts out pending and is fired
//! exactly once, after the node's work returned. Any number of tasks may wait
//! on it concurrently; all of them are released by the single fire, and
//! waiting on a signal that already fired returns immediately.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use crate::types::{ParathreadError, ParathreadResult};

/// Pending/done state machine with a broadcast wake-up
#[derive(Debug, Default)]
pub struct CompletionSignal {
    done: AtomicBool,
    notify: Notify,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the signal has already fired
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Transition pending -> done and release every waiter.
    ///
    /// Returns [`ParathreadError::SignalAlreadyFired`] on a second call; the
    /// waiters of the first fire are unaffected.
    pub fn try_fire(&self) -> ParathreadResult<()> {
        self.done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ParathreadError::SignalAlreadyFired)?;
        self.notify.notify_waiters();
        Ok(())
    }

    /// Transition pending -> done and release every waiter.
    ///
    /// # Panics
    ///
    /// Firing a signal twice is a programming error and panics.
    #[allow(clippy::panic)]
    #[track_caller]
    pub fn fire(&self) {
        if let Err(e) = self.try_fire() {
            panic!("{}", e);
        }
    }

    /// Suspend until the signal has fired
    pub async fn wait(&self) {
        if self.is_done() {
            return;
        }

        // Register interest before re-checking the flag so a fire racing with
        // this call cannot slip between the check and the await.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_done() {
            return;
        }
        notified.await;
    }
}
