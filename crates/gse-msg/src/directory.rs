//! ---
//! gse_section: "02-messaging-data-model"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Item model, transport adapters, and dictionary helpers."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
//! Read-only dictionary mapping numeric identifiers to mnemonics.
//!
//! The YAML layout mirrors what the ground system exports:
//!
//! ```yaml
//! channels:
//!   12: CommandsDispatched
//! events:
//!   7: OpCodeDispatched
//! commands:
//!   CMD_NO_OP: 1
//! ```

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{ChannelId, EventId, Opcode};

/// Failures while loading a dictionary file.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The dictionary file could not be read.
    #[error("unable to read dictionary {path}: {source}")]
    Io {
        /// Offending path.
        path: String,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The dictionary content is not valid YAML for this layout.
    #[error("invalid dictionary: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Two commands share an opcode.
    #[error("opcode {opcode:#x} is declared by both {first} and {second}")]
    DuplicateOpcode {
        /// Shared opcode.
        opcode: Opcode,
        /// First mnemonic declaring it.
        first: String,
        /// Second mnemonic declaring it.
        second: String,
    },
}

/// Id to mnemonic lookup tables for channels, events, and commands.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameDirectory {
    #[serde(default)]
    channels: IndexMap<ChannelId, String>,
    #[serde(default)]
    events: IndexMap<EventId, String>,
    #[serde(default)]
    commands: IndexMap<String, Opcode>,
}

impl NameDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a telemetry channel mnemonic.
    pub fn with_channel(mut self, id: ChannelId, name: impl Into<String>) -> Self {
        self.channels.insert(id, name.into());
        self
    }

    /// Register an event mnemonic.
    pub fn with_event(mut self, id: EventId, name: impl Into<String>) -> Self {
        self.events.insert(id, name.into());
        self
    }

    /// Register a command mnemonic.
    pub fn with_command(mut self, name: impl Into<String>, opcode: Opcode) -> Self {
        self.commands.insert(name.into(), opcode);
        self
    }

    /// Parse a YAML dictionary.
    pub fn from_yaml_str(content: &str) -> Result<Self, DirectoryError> {
        let directory: NameDirectory = serde_yaml::from_str(content)?;
        directory.validate()?;
        Ok(directory)
    }

    /// Load a YAML dictionary from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DirectoryError> {
        let path = path.as_ref();
        debug!(dictionary = %path.display(), "loading name dictionary");
        let content = fs::read_to_string(path).map_err(|source| DirectoryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> Result<(), DirectoryError> {
        let mut seen: IndexMap<Opcode, &str> = IndexMap::new();
        for (name, opcode) in &self.commands {
            if let Some(first) = seen.insert(*opcode, name) {
                return Err(DirectoryError::DuplicateOpcode {
                    opcode: *opcode,
                    first: first.to_owned(),
                    second: name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Mnemonic of a telemetry channel.
    pub fn channel_name(&self, id: ChannelId) -> Option<&str> {
        self.channels.get(&id).map(String::as_str)
    }

    /// Mnemonic of an event.
    pub fn event_name(&self, id: EventId) -> Option<&str> {
        self.events.get(&id).map(String::as_str)
    }

    /// Opcode of a command mnemonic.
    pub fn opcode(&self, mnemonic: &str) -> Option<Opcode> {
        self.commands.get(mnemonic).copied()
    }

    /// Whether a channel mnemonic is known.
    pub fn has_channel(&self, name: &str) -> bool {
        self.channels.values().any(|known| known == name)
    }

    /// Whether an event mnemonic is known.
    pub fn has_event(&self, name: &str) -> bool {
        self.events.values().any(|known| known == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DICTIONARY: &str = r#"
channels:
  12: CommandsDispatched
events:
  7: OpCodeDispatched
  8: OpCodeCompleted
commands:
  CMD_NO_OP: 1
"#;

    #[test]
    fn yaml_dictionary_resolves_all_tables() {
        let directory = NameDirectory::from_yaml_str(DICTIONARY).expect("dictionary parses");
        assert_eq!(directory.channel_name(12), Some("CommandsDispatched"));
        assert_eq!(directory.event_name(7), Some("OpCodeDispatched"));
        assert_eq!(directory.event_name(99), None);
        assert_eq!(directory.opcode("CMD_NO_OP"), Some(1));
        assert!(directory.has_event("OpCodeCompleted"));
        assert!(!directory.has_channel("OpCodeCompleted"));
    }

    #[test]
    fn duplicate_opcodes_are_rejected() {
        let err = NameDirectory::from_yaml_str("commands:\n  A: 3\n  B: 3\n")
            .expect_err("duplicate opcode must fail");
        assert!(matches!(err, DirectoryError::DuplicateOpcode { opcode: 3, .. }));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = NameDirectory::load(dir.path().join("absent.yaml")).expect_err("missing file");
        assert!(err.to_string().contains("absent.yaml"));
    }

    #[test]
    fn builder_matches_parsed_dictionary() {
        let built = NameDirectory::new()
            .with_channel(12, "CommandsDispatched")
            .with_event(7, "OpCodeDispatched")
            .with_event(8, "OpCodeCompleted")
            .with_command("CMD_NO_OP", 1);
        let parsed = NameDirectory::from_yaml_str(DICTIONARY).expect("dictionary parses");
        assert_eq!(built, parsed);
    }
}
