//! The line-driven engine that turns one capture into [`ParsedBlock`]s.

use enumset::EnumSet;
use std::collections::BTreeMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{
    prompt_hostname, AnyParser, BlockParser, BlockType, LineOutcome, ParsedBlock, ParserRegistry,
};
use crate::error::NetsnapError;

/// Opaque key of an active parser instance. Keys increase with start order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey(u64);

/// Drives block parsers over the lines of one capture file.
///
/// ## Per-Line Protocol
///
/// For every input line:
///
/// 1. Each active instance (in start order) is asked whether the line completes it. Completed
///    instances are finalized and their [`ParsedBlock`] is collected; the others are fed the line.
/// 2. The registry is probed for an entry point. The first match (by priority, then registration
///    order) starts a fresh instance under a new key, unless an instance of the same type was fed
///    the line in step 1. A `display version` banner followed by its software line is one block.
///
/// Several instances may be active at once. This keeps the engine correct when one command's
/// output is still accumulating while another command's output starts.
///
/// ## Error Budget
///
/// A rule handler failure increments a consecutive-error counter and any line without handler
/// failures resets it. When the counter reaches `max_consecutive_errors` the rest of the file is
/// skipped: active instances are finalized (partial results are kept) and the run is marked
/// aborted. Nothing outside this engine is affected.
pub struct ParsingEngine<'r> {
    registry: &'r ParserRegistry,
    active: BTreeMap<InstanceKey, AnyParser>,
    next_key: u64,
    blocks: Vec<ParsedBlock>,
    lines_scanned: usize,
    consecutive_errors: usize,
    max_consecutive_errors: usize,
    prompt_hostname: Option<String>,
    aborted: Option<String>,
}

/// Output of one engine run.
#[derive(Debug, Clone, Default)]
pub struct ParseRun {
    /// Blocks in completion order
    pub blocks: Vec<ParsedBlock>,
    pub lines_scanned: usize,
    /// First user-view prompt hostname seen in the capture
    pub prompt_hostname: Option<String>,
    /// Reason the file was abandoned early, if it was
    pub aborted: Option<String>,
}

impl ParseRun {
    pub fn error_count(&self) -> usize {
        self.blocks.iter().map(|b| b.errors.len()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.blocks.iter().map(|b| b.warnings.len()).sum()
    }
}

impl<'r> ParsingEngine<'r> {
    pub fn new(registry: &'r ParserRegistry, max_consecutive_errors: usize) -> Self {
        ParsingEngine {
            registry,
            active: BTreeMap::new(),
            next_key: 0,
            blocks: Vec::new(),
            lines_scanned: 0,
            consecutive_errors: 0,
            max_consecutive_errors: max_consecutive_errors.max(1),
            prompt_hostname: None,
            aborted: None,
        }
    }

    /// Number of parser instances currently accumulating lines.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    /// Feed one line. Returns [`NetsnapError::Aborted`] once the error budget is exhausted; every
    /// later call returns the same error without looking at its input.
    pub fn feed_line(&mut self, line: &str) -> Result<(), NetsnapError> {
        if let Some(reason) = &self.aborted {
            return Err(NetsnapError::Aborted(reason.clone()));
        }
        let line = line.trim_end_matches(['\r', '\n']);
        self.lines_scanned += 1;
        if self.prompt_hostname.is_none() {
            self.prompt_hostname = prompt_hostname(line);
        }

        // 1. Complete or feed every active instance
        let keys: Vec<InstanceKey> = self.active.keys().copied().collect();
        let mut failed = false;
        let mut fed: EnumSet<BlockType> = EnumSet::new();
        for key in keys {
            let complete = match self.active.get(&key) {
                Some(parser) => parser.is_block_complete(line),
                None => continue,
            };
            if complete {
                if let Some(parser) = self.active.remove(&key) {
                    self.finalize(parser);
                }
            } else if let Some(parser) = self.active.get_mut(&key) {
                fed.insert(parser.block_type());
                if parser.parse_line(line) == LineOutcome::Failed {
                    failed = true;
                }
            }
        }

        if failed {
            self.consecutive_errors += 1;
            if self.consecutive_errors >= self.max_consecutive_errors {
                let reason = format!(
                    "{} consecutive parse errors at line {}",
                    self.consecutive_errors, self.lines_scanned
                );
                tracing::warn!("[ParsingEngine] aborting capture: {}", reason);
                self.finalize_all();
                self.aborted = Some(reason.clone());
                return Err(NetsnapError::Aborted(reason));
            }
        } else {
            self.consecutive_errors = 0;
        }

        // 2. Probe for a new block
        if let Some((block_type, entry)) = self
            .registry
            .detect(line)
            .filter(|(block_type, _)| !fed.contains(*block_type))
        {
            let key = InstanceKey(self.next_key);
            self.next_key += 1;
            tracing::trace!(
                "[ParsingEngine] line {}: starting {} block",
                self.lines_scanned,
                block_type
            );
            self.active
                .insert(key, self.registry.instantiate(block_type, line, &entry));
        }
        Ok(())
    }

    /// Finalize every remaining instance and return the run.
    pub fn finish(mut self) -> ParseRun {
        self.finalize_all();
        ParseRun {
            blocks: self.blocks,
            lines_scanned: self.lines_scanned,
            prompt_hostname: self.prompt_hostname,
            aborted: self.aborted,
        }
    }

    /// Parse an in-memory capture.
    pub fn parse_str(mut self, content: &str) -> ParseRun {
        for line in content.lines() {
            if self.feed_line(line).is_err() {
                break;
            }
        }
        self.finish()
    }

    /// Parse a capture stream line by line. IO errors propagate; an exhausted error budget does
    /// not (it is reported through [`ParseRun::aborted`]).
    pub async fn parse_reader<R>(mut self, reader: R) -> Result<ParseRun, NetsnapError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if self.feed_line(&line).is_err() {
                break;
            }
        }
        Ok(self.finish())
    }

    fn finalize(&mut self, parser: AnyParser) {
        let block = parser.get_result();
        tracing::debug!(
            "[ParsingEngine] {} block complete: {} records, {} errors, {} warnings",
            block.block_type,
            block.record_count(),
            block.errors.len(),
            block.warnings.len()
        );
        self.blocks.push(block);
    }

    fn finalize_all(&mut self) {
        let active = std::mem::take(&mut self.active);
        for (_key, parser) in active {
            self.finalize(parser);
        }
    }
}
