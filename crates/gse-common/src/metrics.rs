//! ---
//! gse_section: "01-core-functionality"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Metrics collection for harness sessions."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};

/// Shared registry type used across the harness crates.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// How a wait finished, for metrics purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Satisfied,
    Unmet,
    TimedOut,
}

/// Prometheus handles describing drain and wait activity.
#[derive(Clone, Debug)]
pub struct HarnessMetrics {
    registry: SharedRegistry,
    items_drained: IntCounter,
    waits: IntCounter,
    wait_timeouts: IntCounter,
    wait_failures: IntCounter,
    wait_duration: Histogram,
}

impl HarnessMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let items_drained = IntCounter::with_opts(Opts::new(
            "gse_items_drained_total",
            "Telemetry and event items moved from the transport into history",
        ))?;
        registry.register(Box::new(items_drained.clone()))?;

        let waits = IntCounter::with_opts(Opts::new(
            "gse_waits_total",
            "Wait operations started by the harness",
        ))?;
        registry.register(Box::new(waits.clone()))?;

        let wait_timeouts = IntCounter::with_opts(Opts::new(
            "gse_wait_timeouts_total",
            "Wait operations aborted by their deadline",
        ))?;
        registry.register(Box::new(wait_timeouts.clone()))?;

        let wait_failures = IntCounter::with_opts(Opts::new(
            "gse_wait_failures_total",
            "Wait operations that gave up without a deadline",
        ))?;
        registry.register(Box::new(wait_failures.clone()))?;

        let buckets = prometheus::exponential_buckets(0.001, 2.0, 16)
            .context("failed to construct histogram buckets")?;
        let wait_duration = Histogram::with_opts(
            HistogramOpts::new(
                "gse_wait_duration_seconds",
                "Wall-clock time spent inside wait operations",
            )
            .buckets(buckets),
        )?;
        registry.register(Box::new(wait_duration.clone()))?;

        Ok(Self {
            registry,
            items_drained,
            waits,
            wait_timeouts,
            wait_failures,
            wait_duration,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn observe_drained(&self) {
        self.items_drained.inc();
    }

    pub fn observe_wait(&self, result: WaitResult, elapsed: Duration) {
        self.waits.inc();
        self.wait_duration.observe(elapsed.as_secs_f64());
        match result {
            WaitResult::Satisfied => {}
            WaitResult::Unmet => self.wait_failures.inc(),
            WaitResult::TimedOut => self.wait_timeouts.inc(),
        }
    }
}
