//! ---
//! gse_section: "11-test-harness"
//! gse_subsection: "01-engine"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Failure taxonomy surfaced to test callers."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::fmt;

use gse_msg::TransportError;

use crate::history::Category;

/// Why an assertion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The check never held and no further data was available.
    Unmet,
    /// The deadline elapsed while waiting for the check to hold.
    Timeout,
}

/// Self-contained assertion failure: expectation, cause, and observed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionFailure {
    kind: FailureKind,
    message: String,
}

impl AssertionFailure {
    const UNMET_HEADLINE: &'static str = "Unable to meet assertion.";
    const TIMEOUT_HEADLINE: &'static str = "Timeout reached, unable to meet assertion.";

    pub(crate) fn unmet(diagnostic: &str, history_dump: &str) -> Self {
        Self::build(FailureKind::Unmet, Self::UNMET_HEADLINE, diagnostic, history_dump)
    }

    pub(crate) fn timeout(diagnostic: &str, history_dump: &str) -> Self {
        Self::build(
            FailureKind::Timeout,
            Self::TIMEOUT_HEADLINE,
            diagnostic,
            history_dump,
        )
    }

    fn build(kind: FailureKind, headline: &str, diagnostic: &str, history_dump: &str) -> Self {
        Self {
            kind,
            message: format!("{headline}\n\n\n{diagnostic}\n\n\n{history_dump}"),
        }
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Errors returned by every harness operation.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("{0}")]
    Assertion(AssertionFailure),
    #[error("selector index {index} is out of range for {category} '{name}' ({len} records)")]
    SelectorOutOfRange {
        category: Category,
        name: String,
        index: usize,
        len: usize,
    },
    #[error("no {category} mnemonic is registered for id {id}")]
    UnknownId { category: Category, id: u32 },
    #[error("'{name}' is not a known {category} mnemonic")]
    UnknownMnemonic { category: Category, name: String },
    #[error("unknown command mnemonic '{0}'")]
    UnknownCommand(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HarnessError {
    /// Whether this error is one of the assertion-flavoured failures a test
    /// would report as "check did not hold".
    pub fn is_assertion(&self) -> bool {
        matches!(
            self,
            HarnessError::Assertion(_) | HarnessError::SelectorOutOfRange { .. }
        )
    }

    /// Borrow the assertion failure, if this is one.
    pub fn as_assertion(&self) -> Option<&AssertionFailure> {
        match self {
            HarnessError::Assertion(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<AssertionFailure> for HarnessError {
    fn from(failure: AssertionFailure) -> Self {
        HarnessError::Assertion(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_messages_carry_headline_diagnostic_and_dump() {
        let failure = AssertionFailure::unmet("expected 2 records, found 1", "EVR history: ...");
        assert_eq!(failure.kind(), FailureKind::Unmet);
        assert!(failure.message().starts_with("Unable to meet assertion."));
        assert!(failure.message().contains("expected 2 records, found 1"));
        assert!(failure.message().contains("EVR history"));
        assert!(!failure.message().contains("Timeout reached"));
    }

    #[test]
    fn timeout_failures_are_distinguishable() {
        let failure = AssertionFailure::timeout("still 0", "");
        assert!(failure.is_timeout());
        assert!(failure.to_string().starts_with("Timeout reached"));
    }

    #[test]
    fn selector_errors_count_as_assertions() {
        let err = HarnessError::SelectorOutOfRange {
            category: Category::Event,
            name: "OpCodeCompleted".into(),
            index: 3,
            len: 1,
        };
        assert!(err.is_assertion());
        assert!(err.to_string().contains("index 3"));
        assert!(!HarnessError::UnknownCommand("CMD_X".into()).is_assertion());
    }
}
