//! ---
//! gse_section: "02-messaging-data-model"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Item model, transport adapters, and dictionary helpers."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Messaging primitives consumed by the GSE test harness: decoded telemetry
//! and event items, the non-blocking transport seam, the id/mnemonic
//! dictionary, and the length-prefixed string codec.

pub mod capture;
pub mod codec;
pub mod directory;
pub mod logging;
pub mod transport;
pub mod types;

/// Shared result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures raised while sending commands or popping items.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The link to the system under test is gone.
    #[error("transport disconnected: {0}")]
    Disconnected(String),
    /// The transport does not implement the requested operation.
    #[error("transport does not support {0}")]
    Unsupported(&'static str),
    /// Wrapper for IO errors encountered while reading captures or sockets.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON problems in capture files.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub use capture::{load_capture, replay_capture, CaptureRecord};
pub use codec::{CodecError, StringField};
pub use directory::{DirectoryError, NameDirectory};
pub use logging::{log_command, log_item, ItemDirection};
pub use transport::{InMemoryTransport, Transport};
pub use types::{ChannelId, Command, CommandStatus, EventId, Opcode, RawItem, Value};
