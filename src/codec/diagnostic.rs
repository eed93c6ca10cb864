//! Diagnostic types for block parsing.
//!
//! Diagnostics are non-fatal: they are collected on the [`ParsedBlock`](super::ParsedBlock) that
//! produced them and surfaced through the run summary instead of being logged from deep inside a
//! parser.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Longest excerpt kept from an offending line.
pub const EXCERPT_LIMIT: usize = 120;

/// One error or warning recorded while parsing a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDiagnostic {
    /// Description of what went wrong
    pub message: String,
    /// The offending input, truncated to [`EXCERPT_LIMIT`] characters
    pub excerpt: String,
    /// Milliseconds since the unix epoch
    pub timestamp: u64,
}

impl BlockDiagnostic {
    pub fn new(message: impl Into<String>, excerpt: &str) -> Self {
        BlockDiagnostic {
            message: message.into(),
            excerpt: excerpt_of(excerpt),
            timestamp: now_millis(),
        }
    }
}

fn excerpt_of(line: &str) -> String {
    let trimmed = line.trim();
    match trimmed.char_indices().nth(EXCERPT_LIMIT) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
