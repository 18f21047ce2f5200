//! ---
//! gse_section: "01-core-functionality"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Shared primitives and utilities for the test harness."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
//! Core shared primitives for the GSE test harness workspace.
//! This crate exposes configuration loading, tracing initialisation, and
//! prometheus instrumentation consumed by the messaging and harness crates.

pub mod config;
pub mod logging;
pub mod metrics;

pub use config::{DictionaryConfig, HarnessConfig, LoadedHarnessConfig, LoggingConfig, WaitConfig};
pub use logging::{init_test, init_tracing, LogFormat};
pub use metrics::{new_registry, HarnessMetrics, SharedRegistry, WaitResult};
