//! ---
//! gse_section: "02-messaging-data-model"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Item model, transport adapters, and dictionary helpers."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use tracing::{debug, trace};

use crate::types::{Command, RawItem};

/// Direction of the item movement, used for consistent logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemDirection {
    /// Item popped from a transport queue.
    Inbound,
    /// Item discarded by a flush before anyone read it.
    Flushed,
    /// Item replayed from a capture file.
    Replayed,
}

/// Emit a structured log entry for item activity.
pub fn log_item(direction: ItemDirection, item: &RawItem) {
    trace!(
        kind = item.kind(),
        id = item.id(),
        direction = ?direction,
        "transport item"
    );
}

/// Emit a structured log entry for an outgoing command.
pub fn log_command(command: &Command) {
    debug!(
        opcode = command.opcode,
        mnemonic = %command.mnemonic,
        args = command.args.len(),
        "command dispatched"
    );
}
