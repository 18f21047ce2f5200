//! ---
//! gse_section: "02-messaging-data-model"
//! gse_subsection: "module"
//! gse_type: "source"
//! gse_scope: "code"
//! gse_description: "Item model, transport adapters, and dictionary helpers."
//! gse_version: "v0.1.0"
//! gse_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logging::{log_item, ItemDirection};
use crate::transport::InMemoryTransport;
use crate::types::RawItem;
use crate::Result;

/// One line of a newline-delimited JSON capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    /// Pause before the item becomes visible.
    #[serde(default)]
    pub delay_ms: Option<u64>,
    /// Item to enqueue.
    pub item: RawItem,
}

fn parse_capture(path: &Path) -> Result<Vec<CaptureRecord>> {
    let content = fs::read_to_string(path)?;
    let mut records = Vec::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line)?);
    }
    Ok(records)
}

/// Enqueue every item of a capture immediately, ignoring delays.
pub fn load_capture<P: AsRef<Path>>(transport: &InMemoryTransport, path: P) -> Result<usize> {
    let records = parse_capture(path.as_ref())?;
    let count = records.len();
    for record in records {
        log_item(ItemDirection::Replayed, &record.item);
        transport.push(record.item);
    }
    Ok(count)
}

/// Replay a capture into the transport, honouring each record's `delay_ms`.
///
/// Meant to be spawned next to a wait so items trickle in the way a live
/// link delivers them.
pub async fn replay_capture<P: AsRef<Path>>(transport: &InMemoryTransport, path: P) -> Result<usize> {
    let records = parse_capture(path.as_ref())?;
    let count = records.len();
    for record in records {
        if let Some(delay) = record.delay_ms {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        log_item(ItemDirection::Replayed, &record.item);
        transport.push(record.item);
    }
    Ok(count)
}
