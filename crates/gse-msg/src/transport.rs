//! ---
//! gse_section: "02-messaging-data-model"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Item model, transport adapters, and dictionary helpers."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::logging::{log_command, log_item, ItemDirection};
use crate::types::{Command, CommandStatus, Opcode, RawItem};
use crate::Result;

/// Seam between the harness and the link to the system under test.
///
/// Every operation is non-blocking with respect to the item queue:
/// `try_pop` answers `None` straight away when nothing is waiting.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a command to the system under test.
    async fn send(&self, command: Command) -> Result<CommandStatus>;
    /// Pop the oldest pending item, if any. Items are never returned twice.
    async fn try_pop(&self) -> Result<Option<RawItem>>;
    /// Discard every pending item, returning how many were dropped.
    async fn flush(&self) -> Result<usize>;
    /// Human-readable transport name for logging.
    fn name(&self) -> &'static str;
}

#[derive(Default)]
struct State {
    queue: VecDeque<RawItem>,
    sent: Vec<Command>,
    responses: HashMap<Opcode, Vec<RawItem>>,
    rejected: HashSet<Opcode>,
    popped: usize,
}

/// In-process transport backed by a mutex protected queue.
///
/// Clones share the same queue, so a test can keep one handle to feed items
/// while the harness owns another.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<State>>,
}

impl InMemoryTransport {
    /// Create an empty in-memory transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a single item as if the system under test emitted it.
    pub fn push(&self, item: RawItem) {
        self.state.lock().queue.push_back(item);
    }

    /// Queue several items in order.
    pub fn extend<I: IntoIterator<Item = RawItem>>(&self, items: I) {
        self.state.lock().queue.extend(items);
    }

    /// Script the items emitted whenever the given opcode is sent.
    pub fn respond_to(&self, opcode: Opcode, items: Vec<RawItem>) {
        self.state.lock().responses.insert(opcode, items);
    }

    /// Make every send of the given opcode come back rejected.
    pub fn reject(&self, opcode: Opcode) {
        self.state.lock().rejected.insert(opcode);
    }

    /// Number of items still waiting in the queue.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Number of items handed out through `try_pop`.
    pub fn popped(&self) -> usize {
        self.state.lock().popped
    }

    /// Commands accepted so far, in send order.
    pub fn sent(&self) -> Vec<Command> {
        self.state.lock().sent.clone()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, command: Command) -> Result<CommandStatus> {
        log_command(&command);
        let mut guard = self.state.lock();
        if guard.rejected.contains(&command.opcode) {
            return Ok(CommandStatus::Rejected {
                reason: format!("opcode {:#x} rejected by transport", command.opcode),
            });
        }
        if let Some(items) = guard.responses.get(&command.opcode).cloned() {
            guard.queue.extend(items);
        }
        guard.sent.push(command);
        Ok(CommandStatus::Sent)
    }

    async fn try_pop(&self) -> Result<Option<RawItem>> {
        let mut guard = self.state.lock();
        let item = guard.queue.pop_front();
        if let Some(item) = &item {
            guard.popped += 1;
            log_item(ItemDirection::Inbound, item);
        }
        Ok(item)
    }

    async fn flush(&self) -> Result<usize> {
        let mut guard = self.state.lock();
        let dropped = guard.queue.len();
        for item in guard.queue.drain(..) {
            log_item(ItemDirection::Flushed, &item);
        }
        Ok(dropped)
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}
