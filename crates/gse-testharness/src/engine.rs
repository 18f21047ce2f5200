//! ---
//! gse_section: "11-test-harness"
//! gse_subsection: "01-engine"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Drain-and-retry wait/assert loop bounded by a deadline."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
//! The engine interleaves three activities on the caller's task:
//!
//! 1. evaluate the predicate against history,
//! 2. on a pending verdict pop exactly one item and append it,
//! 3. once the queue is empty, sleep for the poll interval and start over.
//!
//! A wait with a timeout races every round and every sleep against an
//! [`ArmedDeadline`]. The deadline is disarmed on every exit path.

use std::sync::Arc;
use std::time::{Duration, Instant};

use gse_common::{HarnessMetrics, WaitResult};
use gse_msg::{NameDirectory, RawItem, Transport, Value};
use tracing::{debug, trace, warn};

use crate::deadline::{ArmedDeadline, DeadlineExceeded, DeadlineTimer};
use crate::error::{AssertionFailure, HarnessError};
use crate::history::{Category, History};

/// Result of one predicate evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Satisfied,
    /// Not yet true; carries the diagnostic reported on failure.
    Pending(String),
}

impl Verdict {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Verdict::Satisfied)
    }
}

/// What a single drain-and-retry round ended with.
#[derive(Debug)]
enum Round {
    Satisfied,
    Exhausted(String),
}

/// Outcome of [`WaitAssertEngine::wait_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    /// Whether a matching item arrived before the deadline.
    pub found: bool,
    /// Items moved into history while waiting.
    pub drained: u64,
    pub elapsed: Duration,
}

impl WaitOutcome {
    pub(crate) fn skipped() -> Self {
        Self {
            found: false,
            drained: 0,
            elapsed: Duration::ZERO,
        }
    }
}

/// History-backed wait/assert loop over a [`Transport`].
pub struct WaitAssertEngine {
    transport: Arc<dyn Transport>,
    directory: Arc<NameDirectory>,
    history: History,
    deadline: DeadlineTimer,
    poll_interval: Duration,
    metrics: Option<HarnessMetrics>,
    drained_total: u64,
}

impl WaitAssertEngine {
    pub fn new(
        transport: Arc<dyn Transport>,
        directory: Arc<NameDirectory>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            transport,
            directory,
            history: History::new(),
            deadline: DeadlineTimer::new(),
            poll_interval,
            metrics: None,
            drained_total: 0,
        }
    }

    pub fn with_metrics(mut self, metrics: HarnessMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn directory(&self) -> &NameDirectory {
        &self.directory
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Whether a wait deadline is still pending.
    pub fn deadline_armed(&self) -> bool {
        self.deadline.is_armed()
    }

    /// Items moved into history since the engine was created.
    pub fn drained_total(&self) -> u64 {
        self.drained_total
    }

    /// Pop at most one item and append it to history under its mnemonic.
    /// Returns `false` when the queue was empty.
    pub async fn drain_one(&mut self) -> Result<bool, HarnessError> {
        let Some(item) = self.transport.try_pop().await? else {
            return Ok(false);
        };
        let (category, name, value) = self.resolve(item)?;
        self.history.push(category, name, value);
        self.drained_total += 1;
        if let Some(metrics) = &self.metrics {
            metrics.observe_drained();
        }
        Ok(true)
    }

    fn resolve(&self, item: RawItem) -> Result<(Category, String, Value), HarnessError> {
        match item {
            RawItem::Telemetry { id, value } => {
                let name = self
                    .directory
                    .channel_name(id)
                    .ok_or(HarnessError::UnknownId {
                        category: Category::Telemetry,
                        id,
                    })?;
                Ok((Category::Telemetry, name.to_owned(), value))
            }
            RawItem::Event { id, args } => {
                let name = self
                    .directory
                    .event_name(id)
                    .ok_or(HarnessError::UnknownId {
                        category: Category::Event,
                        id,
                    })?;
                Ok((Category::Event, name.to_owned(), Value::List(args)))
            }
        }
    }

    /// Drain everything currently queued. Returns the number of items added.
    pub async fn update(&mut self) -> Result<usize, HarnessError> {
        let mut drained = 0;
        while self.drain_one().await? {
            drained += 1;
        }
        trace!(drained, "history updated");
        Ok(drained)
    }

    /// Clear history and discard unread items. Returns the number discarded.
    pub async fn reset(&mut self) -> Result<usize, HarnessError> {
        self.history.clear();
        let flushed = self.transport.flush().await?;
        debug!(flushed, transport = self.transport.name(), "history reset");
        Ok(flushed)
    }

    async fn round<P>(&mut self, predicate: &mut P) -> Result<Round, HarnessError>
    where
        P: FnMut(&History) -> Result<Verdict, HarnessError>,
    {
        let mut verdict = predicate(&self.history)?;
        loop {
            let diagnostic = match verdict {
                Verdict::Satisfied => return Ok(Round::Satisfied),
                Verdict::Pending(diagnostic) => diagnostic,
            };
            if !self.drain_one().await? {
                return Ok(Round::Exhausted(diagnostic));
            }
            verdict = predicate(&self.history)?;
            if matches!(verdict, Verdict::Pending(_)) {
                // lets an expired deadline preempt a long backlog
                tokio::task::yield_now().await;
            }
        }
    }

    /// Evaluate `predicate` against history, draining one item between
    /// evaluations, until it is satisfied.
    ///
    /// With no timeout (or a zero one) the currently queued backlog is
    /// drained once and the wait fails with [`FailureKind::Unmet`] if the
    /// predicate still does not hold. With a timeout the engine keeps polling
    /// every `poll_interval` and fails with [`FailureKind::Timeout`] once the
    /// deadline fires.
    ///
    /// Errors returned by the predicate or the transport abort the wait
    /// immediately.
    ///
    /// [`FailureKind::Unmet`]: crate::FailureKind::Unmet
    /// [`FailureKind::Timeout`]: crate::FailureKind::Timeout
    pub async fn wait_assert<P>(
        &mut self,
        mut predicate: P,
        timeout: Option<Duration>,
    ) -> Result<(), HarnessError>
    where
        P: FnMut(&History) -> Result<Verdict, HarnessError>,
    {
        let started = Instant::now();
        let result = match timeout.filter(|limit| !limit.is_zero()) {
            None => self.check_once(&mut predicate).await,
            Some(limit) => {
                let mut expiry = self.deadline.arm(limit);
                let handle = expiry.handle();
                let result = self.poll_until(&mut predicate, &mut expiry).await;
                self.deadline.disarm(handle);
                result
            }
        };
        self.record(&result, started.elapsed());
        result
    }

    async fn check_once<P>(&mut self, predicate: &mut P) -> Result<(), HarnessError>
    where
        P: FnMut(&History) -> Result<Verdict, HarnessError>,
    {
        match self.round(predicate).await? {
            Round::Satisfied => Ok(()),
            Round::Exhausted(diagnostic) => {
                Err(AssertionFailure::unmet(&diagnostic, &self.history.pretty_print()).into())
            }
        }
    }

    async fn poll_until<P>(
        &mut self,
        predicate: &mut P,
        expiry: &mut ArmedDeadline,
    ) -> Result<(), HarnessError>
    where
        P: FnMut(&History) -> Result<Verdict, HarnessError>,
    {
        let poll_interval = self.poll_interval;
        loop {
            let round = tokio::select! {
                biased;
                exceeded = expiry.expired() => return self.timed_out(predicate, exceeded),
                round = self.round(predicate) => round?,
            };
            let Round::Exhausted(diagnostic) = round else {
                return Ok(());
            };
            trace!(%diagnostic, "queue exhausted, polling again");

            tokio::select! {
                biased;
                exceeded = expiry.expired() => return self.timed_out(predicate, exceeded),
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    /// Build the timeout failure. The predicate is re-checked only so the
    /// failure carries the latest diagnostic; an expired deadline always
    /// fails the wait.
    fn timed_out<P>(&self, predicate: &mut P, exceeded: DeadlineExceeded) -> Result<(), HarnessError>
    where
        P: FnMut(&History) -> Result<Verdict, HarnessError>,
    {
        let diagnostic = match predicate(&self.history)? {
            Verdict::Satisfied => "condition held only after the deadline fired".to_owned(),
            Verdict::Pending(diagnostic) => diagnostic,
        };
        warn!(
            after_ms = exceeded.after.as_millis() as u64,
            %diagnostic,
            "wait deadline exceeded"
        );
        Err(AssertionFailure::timeout(&diagnostic, &self.history.pretty_print()).into())
    }

    fn record(&self, result: &Result<(), HarnessError>, elapsed: Duration) {
        let outcome = match result {
            Ok(()) => WaitResult::Satisfied,
            Err(HarnessError::Assertion(failure)) if failure.is_timeout() => WaitResult::TimedOut,
            Err(_) => WaitResult::Unmet,
        };
        debug!(result = ?outcome, elapsed_ms = elapsed.as_millis() as u64, "wait finished");
        if let Some(metrics) = &self.metrics {
            metrics.observe_wait(outcome, elapsed);
        }
    }

    /// Wait until a new record named `name` arrives in `category`.
    ///
    /// Does not fail on timeout; the outcome reports whether it was found.
    pub async fn wait_for(
        &mut self,
        category: Category,
        name: &str,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome, HarnessError> {
        let baseline = self.history.size_of(category, Some(name), None);
        let drained_before = self.drained_total;
        let started = Instant::now();

        let arrived = |history: &History| {
            let seen = history.size_of(category, Some(name), None);
            Ok(if seen > baseline {
                Verdict::Satisfied
            } else {
                Verdict::Pending(format!("no new {} '{}' received", category, name))
            })
        };
        let found = match self.wait_assert(arrived, timeout).await {
            Ok(()) => true,
            Err(HarnessError::Assertion(_)) => false,
            Err(err) => return Err(err),
        };

        Ok(WaitOutcome {
            found,
            drained: self.drained_total - drained_before,
            elapsed: started.elapsed(),
        })
    }
}

impl std::fmt::Debug for WaitAssertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitAssertEngine")
            .field("transport", &self.transport.name())
            .field("poll_interval", &self.poll_interval)
            .field("drained_total", &self.drained_total)
            .finish_non_exhaustive()
    }
}
