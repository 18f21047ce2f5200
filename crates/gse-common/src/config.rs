//! ---
//! gse_section: "01-core-functionality"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Shared primitives and utilities for the test harness."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(100)
}

fn default_dictionary_path() -> PathBuf {
    PathBuf::from("configs/dictionary.yaml")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for a harness session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub dictionary: DictionaryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`HarnessConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedHarnessConfig {
    pub config: HarnessConfig,
    pub source: PathBuf,
}

impl HarnessConfig {
    pub const ENV_CONFIG_PATH: &str = "GSE_HARNESS_CONFIG";

    /// Load configuration from disk, respecting the `GSE_HARNESS_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedHarnessConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading harness configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<HarnessConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.wait.validate()
    }
}

impl std::str::FromStr for HarnessConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: HarnessConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Timing knobs for the wait/assert engine.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Timeout applied when a caller asks for the default wait.
    #[serde(rename = "default_timeout_ms", default = "default_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub default_timeout: Duration,
    /// Sleep between unsuccessful drain rounds.
    #[serde(rename = "poll_interval_ms", default = "default_poll_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,
}

impl WaitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(anyhow!("wait.poll_interval_ms must be greater than zero"));
        }
        if self.poll_interval > self.default_timeout {
            return Err(anyhow!(
                "wait.poll_interval_ms ({} ms) must not exceed wait.default_timeout_ms ({} ms)",
                self.poll_interval.as_millis(),
                self.default_timeout.as_millis()
            ));
        }
        Ok(())
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_timeout(),
            poll_interval: default_poll_interval(),
        }
    }
}

/// Location of the id/mnemonic dictionary for the system under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryConfig {
    #[serde(default = "default_dictionary_path")]
    pub path: PathBuf,
}

impl Default for DictionaryConfig {
    fn default() -> Self {
        Self {
            path: default_dictionary_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for rolling JSON log files. Console only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: HarnessConfig = "".parse().expect("empty config parses");
        assert_eq!(config.wait.default_timeout, Duration::from_secs(5));
        assert_eq!(config.wait.poll_interval, Duration::from_millis(100));
        assert_eq!(config.dictionary.path, PathBuf::from("configs/dictionary.yaml"));
        assert!(config.logging.directory.is_none());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn wait_section_is_read_in_milliseconds() {
        let config: HarnessConfig = r#"
            [wait]
            default_timeout_ms = 2500
            poll_interval_ms = 20

            [logging]
            format = "structured-json"
        "#
        .parse()
        .expect("config parses");
        assert_eq!(config.wait.default_timeout, Duration::from_millis(2500));
        assert_eq!(config.wait.poll_interval, Duration::from_millis(20));
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = "[wait]\npoll_interval_ms = 0\n"
            .parse::<HarnessConfig>()
            .expect_err("zero poll interval must fail");
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn poll_interval_longer_than_timeout_is_rejected() {
        let result = "[wait]\ndefault_timeout_ms = 50\npoll_interval_ms = 100\n"
            .parse::<HarnessConfig>();
        assert!(result.is_err());
    }

    #[test]
    fn load_picks_first_existing_candidate() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.toml");
        let present = dir.path().join("harness.toml");
        fs::write(&present, "[wait]\ndefault_timeout_ms = 750\n").expect("write config");

        let loaded =
            HarnessConfig::load_with_source(&[missing, present.clone()]).expect("config loads");
        assert_eq!(loaded.source, present);
        assert_eq!(loaded.config.wait.default_timeout, Duration::from_millis(750));
    }

    #[test]
    fn load_reports_inspected_candidates() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("nowhere.toml");
        let err = HarnessConfig::load(&[missing]).expect_err("no config present");
        assert!(err.to_string().contains("nowhere.toml"));
    }
}
