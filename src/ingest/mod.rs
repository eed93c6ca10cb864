//! Mapping parsed blocks into the [`NetworkStore`](crate::store::NetworkStore).
//!
//! One [`Ingestor`] per block type turns a [`ParsedBlock`](crate::codec::ParsedBlock) into store
//! upserts. Ingestors run in ascending priority rather than in file order, so everything a record
//! may reference (the device identity, its interfaces) exists before the record is written:
//!
//! | Priority | Block types |
//! |---|---|
//! | 0 | `sysname`, `version` |
//! | 10 | `interface_brief`, `ip_interface_brief` |
//! | 20 | `device` |
//! | 30 | `optical_module`, `arp`, `lldp_neighbor`, `ospf_peer` |
//! | 40 | `routing_table`, `bgp_peer` |
//! | 50 | `alarm` |
//!
//! Record-level problems (an unresolvable interface, a malformed natural key) land in the block's
//! [`IngestReport`]; only store failures abort ingestion.

use serde::Serialize;

use crate::{codec::BlockType, error::NetsnapError};

pub mod context;
pub mod ingestors;
pub mod orchestrator;

pub use context::{IngestionContext, InterfaceRef};
pub use ingestors::{AnyIngestor, Ingestor};
pub use orchestrator::IngestionOrchestrator;

/// Separator between natural-key components.
pub const KEY_SEPARATOR: char = '|';

/// Outcome of ingesting one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub block_type: BlockType,
    /// Records written (inserted or updated)
    pub upserted: usize,
    /// Records left out because a required reference did not resolve
    pub skipped: usize,
    pub warnings: Vec<String>,
    /// Records rejected because their data cannot form a key
    pub errors: Vec<String>,
}

impl IngestReport {
    pub fn new(block_type: BlockType) -> Self {
        IngestReport {
            block_type,
            upserted: 0,
            skipped: 0,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub(crate) fn skip(&mut self, message: String) {
        tracing::warn!("[{}] {}", self.block_type, message);
        self.skipped += 1;
        self.warnings.push(message);
    }

    pub(crate) fn reject(&mut self, error: NetsnapError) {
        tracing::debug!("[{}] record rejected: {}", self.block_type, error);
        self.errors.push(error.to_string());
    }
}

/// One component of a natural key.
#[derive(Debug, Clone, Copy)]
pub enum KeyPart<'a> {
    /// Must be present and non-blank; the name is used in the error.
    Required(&'static str, &'a str),
    /// Absent values become an empty component.
    Optional(Option<&'a str>),
}

/// Join key components with [`KEY_SEPARATOR`].
pub fn natural_key(parts: &[KeyPart<'_>]) -> Result<String, NetsnapError> {
    let mut out = Vec::with_capacity(parts.len());
    for part in parts {
        let value = match part {
            KeyPart::Required(field, value) => {
                let value = value.trim();
                if value.is_empty() {
                    return Err(NetsnapError::Ingest(format!("natural key field '{field}' is empty")));
                }
                value
            }
            KeyPart::Optional(value) => value.map(str::trim).unwrap_or(""),
        };
        if value.contains(KEY_SEPARATOR) {
            return Err(NetsnapError::Ingest(format!(
                "natural key component '{value}' contains '{KEY_SEPARATOR}'"
            )));
        }
        out.push(value);
    }
    Ok(out.join(&KEY_SEPARATOR.to_string()))
}
