//! ---
//! gse_section: "11-test-harness"
//! gse_subsection: "02-api"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Test-facing command, wait, and assertion surface."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use gse_common::{HarnessConfig, HarnessMetrics, WaitConfig};
use gse_msg::{Command, CommandStatus, NameDirectory, Opcode, Transport, Value};
use tracing::{info, warn};

use crate::compare::{Expected, Op};
use crate::engine::{Verdict, WaitAssertEngine, WaitOutcome};
use crate::error::{AssertionFailure, HarnessError};
use crate::history::{Category, Filter, History, Selector};

/// How long a wait may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// The configured default timeout.
    #[default]
    Default,
    /// Check once against what is already queued; never sleep.
    Immediate,
    After(Duration),
}

impl Timeout {
    pub fn secs(secs: u64) -> Self {
        Duration::from_secs(secs).into()
    }

    pub fn millis(millis: u64) -> Self {
        Duration::from_millis(millis).into()
    }

    fn resolve(self, default: Duration) -> Option<Duration> {
        match self {
            Timeout::Default => Some(default),
            Timeout::Immediate => None,
            Timeout::After(limit) => Some(limit),
        }
    }
}

impl From<Duration> for Timeout {
    fn from(limit: Duration) -> Self {
        if limit.is_zero() {
            Timeout::Immediate
        } else {
            Timeout::After(limit)
        }
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(limit: Option<Duration>) -> Self {
        limit.map_or(Timeout::Immediate, Timeout::from)
    }
}

/// Entry point for integration tests: sends commands, accumulates history
/// and asserts on it.
///
/// Every wait takes `&mut self`, so a second wait cannot start while one is
/// outstanding on the same instance.
#[derive(Debug)]
pub struct TestApi {
    engine: WaitAssertEngine,
    default_timeout: Duration,
}

macro_rules! size_assertions {
    ($($assert:ident, $wait:ident => $category:expr, $op:expr, $what:literal;)+) => {
        $(
            #[doc = concat!("Check now that the number of ", $what, ".")]
            ///
            /// When `filter` is given only records it accepts are counted.
            pub fn $assert(
                &self,
                size: usize,
                name: Option<&str>,
                filter: Option<Filter<'_>>,
            ) -> Result<(), HarnessError> {
                self.assert_size($category, size, name, filter, $op)
            }

            #[doc = concat!("Wait until the number of ", $what, ".")]
            pub async fn $wait(
                &mut self,
                size: usize,
                name: Option<&str>,
                filter: Option<Filter<'_>>,
                timeout: impl Into<Timeout>,
            ) -> Result<(), HarnessError> {
                self.wait_assert_size($category, size, name, filter, $op, timeout).await
            }
        )+
    };
}

macro_rules! value_assertions {
    ($($assert:ident, $wait:ident => $category:expr, $op:expr, $what:literal;)+) => {
        $(
            #[doc = concat!("Check now that the selected ", $what, ".")]
            pub fn $assert(
                &self,
                expected: impl Into<Expected>,
                name: Option<&str>,
                selector: Selector,
            ) -> Result<(), HarnessError> {
                self.assert_value($category, expected, name, selector, $op)
            }

            #[doc = concat!("Wait until the selected ", $what, ".")]
            pub async fn $wait(
                &mut self,
                expected: impl Into<Expected>,
                name: Option<&str>,
                selector: Selector,
                timeout: impl Into<Timeout>,
            ) -> Result<(), HarnessError> {
                self.wait_assert_value($category, expected, name, selector, $op, timeout)
                    .await
            }
        )+
    };
}

impl TestApi {
    pub fn new(transport: Arc<dyn Transport>, directory: NameDirectory) -> Self {
        Self::with_wait_config(transport, directory, &WaitConfig::default())
    }

    pub fn with_wait_config(
        transport: Arc<dyn Transport>,
        directory: NameDirectory,
        wait: &WaitConfig,
    ) -> Self {
        Self {
            engine: WaitAssertEngine::new(transport, Arc::new(directory), wait.poll_interval),
            default_timeout: wait.default_timeout,
        }
    }

    /// Build from a validated configuration, loading the dictionary it names.
    pub fn from_config(
        transport: Arc<dyn Transport>,
        config: &HarnessConfig,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let path = &config.dictionary.path;
        let directory = NameDirectory::load(path)
            .with_context(|| format!("failed to load dictionary {}", path.display()))?;
        info!(
            transport = transport.name(),
            dictionary = %path.display(),
            default_timeout_ms = config.wait.default_timeout.as_millis() as u64,
            "test api ready"
        );
        Ok(Self::with_wait_config(transport, directory, &config.wait))
    }

    pub fn with_metrics(mut self, metrics: HarnessMetrics) -> Self {
        self.engine = self.engine.with_metrics(metrics);
        self
    }

    pub fn engine(&self) -> &WaitAssertEngine {
        &self.engine
    }

    pub fn history(&self) -> &History {
        self.engine.history()
    }

    pub fn directory(&self) -> &NameDirectory {
        self.engine.directory()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    fn resolve(&self, timeout: impl Into<Timeout>) -> Option<Duration> {
        timeout.into().resolve(self.default_timeout)
    }

    fn check_name(&self, category: Category, name: Option<&str>) -> Result<(), HarnessError> {
        let Some(name) = name else {
            return Ok(());
        };
        let known = match category {
            Category::Event => self.directory().has_event(name),
            Category::Telemetry => self.directory().has_channel(name),
        };
        if known {
            Ok(())
        } else {
            Err(HarnessError::UnknownMnemonic {
                category,
                name: name.to_owned(),
            })
        }
    }

    fn unmet(&self, diagnostic: &str) -> HarnessError {
        AssertionFailure::unmet(diagnostic, &self.history().pretty_print()).into()
    }

    // ---- commands ----

    /// Opcode registered for a command mnemonic.
    pub fn get_cmd_id(&self, command: &str) -> Result<Opcode, HarnessError> {
        self.directory()
            .opcode(command)
            .ok_or_else(|| HarnessError::UnknownCommand(command.to_owned()))
    }

    pub async fn send(&self, command: &str, args: Vec<Value>) -> Result<CommandStatus, HarnessError> {
        let opcode = self.get_cmd_id(command)?;
        let status = self
            .engine
            .transport()
            .send(Command::new(opcode, command, args))
            .await?;
        if let CommandStatus::Rejected { reason } = &status {
            warn!(command, opcode, %reason, "command rejected");
        }
        Ok(status)
    }

    /// Send a command, then wait for event `event`. A rejected command
    /// returns an empty outcome without waiting.
    pub async fn send_wait_evr(
        &mut self,
        command: &str,
        args: Vec<Value>,
        event: &str,
        timeout: impl Into<Timeout>,
    ) -> Result<WaitOutcome, HarnessError> {
        self.check_name(Category::Event, Some(event))?;
        if !self.send(command, args).await?.is_sent() {
            return Ok(WaitOutcome::skipped());
        }
        self.wait_evr(event, timeout).await
    }

    /// Send a command, then wait for channel `channel`.
    pub async fn send_wait_tlm(
        &mut self,
        command: &str,
        args: Vec<Value>,
        channel: &str,
        timeout: impl Into<Timeout>,
    ) -> Result<WaitOutcome, HarnessError> {
        self.check_name(Category::Telemetry, Some(channel))?;
        if !self.send(command, args).await?.is_sent() {
            return Ok(WaitOutcome::skipped());
        }
        self.wait_tlm(channel, timeout).await
    }

    /// Wait for a new event named `name`. Does not fail on timeout.
    pub async fn wait_evr(
        &mut self,
        name: &str,
        timeout: impl Into<Timeout>,
    ) -> Result<WaitOutcome, HarnessError> {
        self.check_name(Category::Event, Some(name))?;
        let timeout = self.resolve(timeout);
        self.engine.wait_for(Category::Event, name, timeout).await
    }

    /// Wait for a new sample of channel `name`. Does not fail on timeout.
    pub async fn wait_tlm(
        &mut self,
        name: &str,
        timeout: impl Into<Timeout>,
    ) -> Result<WaitOutcome, HarnessError> {
        self.check_name(Category::Telemetry, Some(name))?;
        let timeout = self.resolve(timeout);
        self.engine.wait_for(Category::Telemetry, name, timeout).await
    }

    // ---- history ----

    /// Drain everything currently queued into history.
    pub async fn update(&mut self) -> Result<usize, HarnessError> {
        self.engine.update().await
    }

    /// Clear history and discard unread transport items.
    pub async fn reset(&mut self) -> Result<usize, HarnessError> {
        self.engine.reset().await
    }

    pub fn clear_evr(&mut self) {
        self.engine.history_mut().clear_events();
    }

    pub fn clear_tlm(&mut self) {
        self.engine.history_mut().clear_telemetry();
    }

    /// Clear both histories. Queued items are kept; see [`TestApi::reset`].
    pub fn clear(&mut self) {
        self.engine.history_mut().clear();
    }

    pub fn print_evr(&self) -> String {
        self.history().print(Category::Event)
    }

    pub fn print_tlm(&self) -> String {
        self.history().print(Category::Telemetry)
    }

    pub fn pretty_print(&self) -> String {
        self.history().pretty_print()
    }

    pub fn get_evr_hist(&self, name: Option<&str>, selector: Selector) -> Result<Vec<&Value>, HarnessError> {
        self.history().values(Category::Event, name, selector)
    }

    pub fn get_tlm_hist(&self, name: Option<&str>, selector: Selector) -> Result<Vec<&Value>, HarnessError> {
        self.history().values(Category::Telemetry, name, selector)
    }

    // ---- assertions ----

    /// Check the record count now, without draining.
    pub fn assert_size(
        &self,
        category: Category,
        size: usize,
        name: Option<&str>,
        filter: Option<Filter<'_>>,
        op: Op,
    ) -> Result<(), HarnessError> {
        self.check_name(category, name)?;
        match self.history().size_check(category, size, name, filter, op) {
            Verdict::Satisfied => Ok(()),
            Verdict::Pending(diagnostic) => Err(self.unmet(&diagnostic)),
        }
    }

    /// Check recorded values now, without draining.
    pub fn assert_value(
        &self,
        category: Category,
        expected: impl Into<Expected>,
        name: Option<&str>,
        selector: Selector,
        op: Op,
    ) -> Result<(), HarnessError> {
        self.check_name(category, name)?;
        let expected = expected.into();
        match self
            .history()
            .value_check(category, &expected, name, selector, op)?
        {
            Verdict::Satisfied => Ok(()),
            Verdict::Pending(diagnostic) => Err(self.unmet(&diagnostic)),
        }
    }

    /// Drain and re-check the record count until it holds or `timeout`
    /// elapses.
    pub async fn wait_assert_size(
        &mut self,
        category: Category,
        size: usize,
        name: Option<&str>,
        filter: Option<Filter<'_>>,
        op: Op,
        timeout: impl Into<Timeout>,
    ) -> Result<(), HarnessError> {
        self.check_name(category, name)?;
        let timeout = self.resolve(timeout);
        let check = |history: &History| Ok(history.size_check(category, size, name, filter, op));
        self.engine.wait_assert(check, timeout).await
    }

    /// Drain and re-check recorded values until they hold or `timeout`
    /// elapses.
    ///
    /// An index selector past the end keeps the wait pending, since the
    /// record may still arrive. If it is still out of range when the wait
    /// gives up, the range error is returned instead of the timeout.
    pub async fn wait_assert_value(
        &mut self,
        category: Category,
        expected: impl Into<Expected>,
        name: Option<&str>,
        selector: Selector,
        op: Op,
        timeout: impl Into<Timeout>,
    ) -> Result<(), HarnessError> {
        self.check_name(category, name)?;
        let timeout = self.resolve(timeout);
        let expected = expected.into();
        let check = |history: &History| {
            match history.value_check(category, &expected, name, selector, op) {
                Err(err @ HarnessError::SelectorOutOfRange { .. }) => {
                    Ok(Verdict::Pending(err.to_string()))
                }
                verdict => verdict,
            }
        };
        match self.engine.wait_assert(check, timeout).await {
            Err(HarnessError::Assertion(failure)) => {
                match self
                    .history()
                    .value_check(category, &expected, name, selector, op)
                {
                    Err(err @ HarnessError::SelectorOutOfRange { .. }) => Err(err),
                    _ => Err(failure.into()),
                }
            }
            outcome => outcome,
        }
    }

    size_assertions! {
        assert_evr_size, wait_assert_evr_size => Category::Event, Op::Eq, "events equals `size`";
        assert_evr_size_eq, wait_assert_evr_size_eq => Category::Event, Op::Eq, "events equals `size`";
        assert_evr_size_ne, wait_assert_evr_size_ne => Category::Event, Op::Ne, "events differs from `size`";
        assert_evr_size_lt, wait_assert_evr_size_lt => Category::Event, Op::Lt, "events is below `size`";
        assert_evr_size_le, wait_assert_evr_size_le => Category::Event, Op::Le, "events is at most `size`";
        assert_evr_size_gt, wait_assert_evr_size_gt => Category::Event, Op::Gt, "events is above `size`";
        assert_evr_size_ge, wait_assert_evr_size_ge => Category::Event, Op::Ge, "events is at least `size`";
        assert_tlm_size, wait_assert_tlm_size => Category::Telemetry, Op::Eq, "telemetry samples equals `size`";
        assert_tlm_size_eq, wait_assert_tlm_size_eq => Category::Telemetry, Op::Eq, "telemetry samples equals `size`";
        assert_tlm_size_ne, wait_assert_tlm_size_ne => Category::Telemetry, Op::Ne, "telemetry samples differs from `size`";
        assert_tlm_size_lt, wait_assert_tlm_size_lt => Category::Telemetry, Op::Lt, "telemetry samples is below `size`";
        assert_tlm_size_le, wait_assert_tlm_size_le => Category::Telemetry, Op::Le, "telemetry samples is at most `size`";
        assert_tlm_size_gt, wait_assert_tlm_size_gt => Category::Telemetry, Op::Gt, "telemetry samples is above `size`";
        assert_tlm_size_ge, wait_assert_tlm_size_ge => Category::Telemetry, Op::Ge, "telemetry samples is at least `size`";
    }

    value_assertions! {
        assert_evr, wait_assert_evr => Category::Event, Op::Eq, "event arguments equal `expected`";
        assert_evr_eq, wait_assert_evr_eq => Category::Event, Op::Eq, "event arguments equal `expected`";
        assert_evr_ne, wait_assert_evr_ne => Category::Event, Op::Ne, "event arguments differ from `expected`";
        assert_evr_lt, wait_assert_evr_lt => Category::Event, Op::Lt, "event arguments are below `expected`";
        assert_evr_le, wait_assert_evr_le => Category::Event, Op::Le, "event arguments are at most `expected`";
        assert_evr_gt, wait_assert_evr_gt => Category::Event, Op::Gt, "event arguments are above `expected`";
        assert_evr_ge, wait_assert_evr_ge => Category::Event, Op::Ge, "event arguments are at least `expected`";
        assert_evr_is, wait_assert_evr_is => Category::Event, Op::Is, "event arguments are identical to `expected`";
        assert_evr_is_not, wait_assert_evr_is_not => Category::Event, Op::IsNot, "event arguments are not identical to `expected`";
        assert_tlm, wait_assert_tlm => Category::Telemetry, Op::Eq, "telemetry values equal `expected`";
        assert_tlm_eq, wait_assert_tlm_eq => Category::Telemetry, Op::Eq, "telemetry values equal `expected`";
        assert_tlm_ne, wait_assert_tlm_ne => Category::Telemetry, Op::Ne, "telemetry values differ from `expected`";
        assert_tlm_lt, wait_assert_tlm_lt => Category::Telemetry, Op::Lt, "telemetry values are below `expected`";
        assert_tlm_le, wait_assert_tlm_le => Category::Telemetry, Op::Le, "telemetry values are at most `expected`";
        assert_tlm_gt, wait_assert_tlm_gt => Category::Telemetry, Op::Gt, "telemetry values are above `expected`";
        assert_tlm_ge, wait_assert_tlm_ge => Category::Telemetry, Op::Ge, "telemetry values are at least `expected`";
        assert_tlm_is, wait_assert_tlm_is => Category::Telemetry, Op::Is, "telemetry values are identical to `expected`";
        assert_tlm_is_not, wait_assert_tlm_is_not => Category::Telemetry, Op::IsNot, "telemetry values are not identical to `expected`";
    }
}
