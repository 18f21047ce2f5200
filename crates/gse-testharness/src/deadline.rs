//! ---
//! gse_section: "11-test-harness"
//! gse_subsection: "01-engine"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "One-shot deadline timer that preempts an in-progress wait."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
//! A deadline is a spawned tokio task that sleeps and then fires a oneshot
//! channel. The engine races [`ArmedDeadline::expired`] against its drain and
//! poll futures, so expiry interrupts the poll sleep as well as any await
//! point inside a drain.
//!
//! A [`DeadlineTimer`] keeps at most one pending timer. Arming again aborts
//! the previous one, and an [`ArmedDeadline`] aborts its own task when
//! dropped.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::trace;

/// Signal delivered when an armed deadline elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineExceeded {
    pub after: Duration,
}

/// Identifies one arming of a [`DeadlineTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeadlineHandle(u64);

#[derive(Debug)]
struct PendingTimer {
    handle: DeadlineHandle,
    task: JoinHandle<()>,
}

/// Owner of the single outstanding deadline.
#[derive(Debug, Default)]
pub struct DeadlineTimer {
    generation: u64,
    pending: Option<PendingTimer>,
}

impl DeadlineTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot expiry after `after`, cancelling any pending one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, after: Duration) -> ArmedDeadline {
        if let Some(previous) = self.pending.take() {
            trace!(generation = previous.handle.0, "replacing pending deadline");
            previous.task.abort();
        }

        self.generation += 1;
        let handle = DeadlineHandle(self.generation);
        let (sender, receiver) = oneshot::channel();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = sender.send(DeadlineExceeded { after });
        });
        let abort = task.abort_handle();
        self.pending = Some(PendingTimer { handle, task });
        trace!(generation = handle.0, after_ms = after.as_millis() as u64, "deadline armed");

        ArmedDeadline {
            handle,
            state: ExpiryState::Waiting(receiver),
            abort,
        }
    }

    /// Cancel the timer identified by `handle`. Returns `false` when that
    /// timer was already replaced or disarmed.
    pub fn disarm(&mut self, handle: DeadlineHandle) -> bool {
        if !self.pending.as_ref().is_some_and(|p| p.handle == handle) {
            return false;
        }
        if let Some(pending) = self.pending.take() {
            pending.task.abort();
        }
        trace!(generation = handle.0, "deadline disarmed");
        true
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_armed(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.task.is_finished())
    }
}

#[derive(Debug)]
enum ExpiryState {
    Waiting(oneshot::Receiver<DeadlineExceeded>),
    Fired(DeadlineExceeded),
    Cancelled,
}

/// Receiving side of an armed deadline.
#[derive(Debug)]
pub struct ArmedDeadline {
    handle: DeadlineHandle,
    state: ExpiryState,
    abort: AbortHandle,
}

impl ArmedDeadline {
    pub fn handle(&self) -> DeadlineHandle {
        self.handle
    }

    /// Resolves once the deadline fires. Never resolves for a timer that was
    /// disarmed or replaced. Cancel safe.
    pub async fn expired(&mut self) -> DeadlineExceeded {
        let outcome = match &mut self.state {
            ExpiryState::Fired(exceeded) => return *exceeded,
            ExpiryState::Cancelled => None,
            ExpiryState::Waiting(receiver) => receiver.await.ok(),
        };
        match outcome {
            Some(exceeded) => {
                self.state = ExpiryState::Fired(exceeded);
                exceeded
            }
            None => {
                self.state = ExpiryState::Cancelled;
                std::future::pending().await
            }
        }
    }

    /// Non-blocking check of the fired flag.
    pub fn has_fired(&mut self) -> bool {
        if let ExpiryState::Waiting(receiver) = &mut self.state {
            match receiver.try_recv() {
                Ok(exceeded) => self.state = ExpiryState::Fired(exceeded),
                Err(oneshot::error::TryRecvError::Closed) => self.state = ExpiryState::Cancelled,
                Err(oneshot::error::TryRecvError::Empty) => {}
            }
        }
        matches!(self.state, ExpiryState::Fired(_))
    }
}

impl Drop for ArmedDeadline {
    fn drop(&mut self) {
        self.abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn expiry_fires_after_the_duration() {
        let mut timer = DeadlineTimer::new();
        let mut armed = timer.arm(Duration::from_millis(20));
        assert!(timer.is_armed());
        assert!(!armed.has_fired());

        let started = Instant::now();
        let exceeded = armed.expired().await;
        assert_eq!(exceeded.after, Duration::from_millis(20));
        assert!(started.elapsed() >= Duration::from_millis(15));
        assert!(armed.has_fired());
        // cached after the first resolution
        assert_eq!(armed.expired().await, exceeded);
    }

    #[tokio::test]
    async fn disarmed_timer_never_fires() {
        let mut timer = DeadlineTimer::new();
        let mut armed = timer.arm(Duration::from_millis(10));
        assert!(timer.disarm(armed.handle()));
        assert!(!timer.is_armed());
        assert!(!timer.disarm(armed.handle()));

        let raced = tokio::time::timeout(Duration::from_millis(50), armed.expired()).await;
        assert!(raced.is_err(), "disarmed deadline resolved");
    }

    #[tokio::test]
    async fn arming_again_cancels_the_previous_timer() {
        let mut timer = DeadlineTimer::new();
        let mut first = timer.arm(Duration::from_millis(10));
        let mut second = timer.arm(Duration::from_millis(30));
        assert_ne!(first.handle(), second.handle());
        assert!(!timer.disarm(first.handle()));

        let raced = tokio::time::timeout(Duration::from_millis(60), first.expired()).await;
        assert!(raced.is_err(), "replaced deadline resolved");
        second.expired().await;
    }

    #[tokio::test]
    async fn expiry_preempts_a_longer_sleep() {
        let mut timer = DeadlineTimer::new();
        let mut armed = timer.arm(Duration::from_millis(10));
        let started = Instant::now();
        let interrupted = tokio::select! {
            biased;
            _ = armed.expired() => true,
            _ = tokio::time::sleep(Duration::from_secs(5)) => false,
        };
        assert!(interrupted);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
