//! Rule-table machinery shared by every block parser variant.
//!
//! A variant only supplies an [`Accumulator`]: its entry-point test, an ordered [`RuleSet`] of
//! `(pattern, handler)` pairs, and whatever state its records need. [`RuleParser`] wraps the
//! accumulator and implements the [`BlockParser`] contract on top of it: trimming, noise
//! filtering, first-match rule dispatch, diagnostics, statistics and completion.
//!
//! Global noise is dropped before any rule sees the line, so a catch-all rule (alarm description
//! continuations) never swallows a CLI error banner. Variant noise is only consulted for lines no
//! rule claimed.

use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexSet};
use std::time::Instant;

use super::{
    is_prompt, BlockDiagnostic, BlockParser, BlockRecords, BlockStats, BlockType, EntryMatch,
    LineOutcome, ParsedBlock,
};
use crate::error::NetsnapError;

/// Line shapes that are never data, whatever block is active: command echoes, pager prompts,
/// error banners, separators and the caret the CLI prints under a rejected token.
static NOISE: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        r"^$",
        r"^Error:",
        r"^Warning:",
        r"^Info:",
        r"^%",
        r"^\^$",
        r"^-{3,}$",
        r"^={3,}$",
        r"^-{2,}\s*More\s*-{2,}",
        r"^(?:<[^<>\s]+>|\[[~*]?[^\[\]\s]+\])",
    ])
    .expect("noise patterns are valid")
});

/// True when a trimmed line matches the global noise allow-list.
pub fn is_noise(trimmed: &str) -> bool {
    NOISE.is_match(trimmed)
}

pub type Handler<A> = fn(&mut A, &Captures<'_>) -> Result<(), NetsnapError>;

pub struct Rule<A> {
    name: &'static str,
    pattern: Regex,
    handler: Handler<A>,
}

/// Result of applying a [`RuleSet`] to one line.
#[derive(Debug)]
pub enum RuleMatch {
    Handled(&'static str),
    Failed(&'static str, NetsnapError),
    NoMatch,
}

/// Ordered `(pattern, handler)` list; the first matching pattern wins.
pub struct RuleSet<A> {
    rules: Vec<Rule<A>>,
}

impl<A> Default for RuleSet<A> {
    fn default() -> Self {
        RuleSet { rules: Vec::new() }
    }
}

impl<A> RuleSet<A> {
    pub fn new() -> Self {
        RuleSet::default()
    }

    /// Append a rule. Patterns are static program text, so an invalid one is a programming error.
    pub fn rule(mut self, name: &'static str, pattern: &str, handler: Handler<A>) -> Self {
        let pattern = Regex::new(pattern)
            .unwrap_or_else(|e| panic!("rule '{name}' has an invalid pattern: {e}"));
        self.rules.push(Rule {
            name,
            pattern,
            handler,
        });
        self
    }

    pub fn apply(&self, acc: &mut A, trimmed: &str) -> RuleMatch {
        for rule in self.rules.iter() {
            if let Some(caps) = rule.pattern.captures(trimmed) {
                return match (rule.handler)(acc, &caps) {
                    Ok(()) => RuleMatch::Handled(rule.name),
                    Err(e) => RuleMatch::Failed(rule.name, e),
                };
            }
        }
        RuleMatch::NoMatch
    }

    /// True when some rule's pattern matches, without running its handler.
    pub fn matches(&self, trimmed: &str) -> bool {
        self.rules.iter().any(|r| r.pattern.is_match(trimmed))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }
}

/// Per-variant extraction state.
pub trait Accumulator: Default + Send + 'static {
    const BLOCK_TYPE: BlockType;

    /// Consecutive blank lines that end the block.
    const BLANK_LINES_TO_COMPLETE: usize = 1;

    /// The entry-point line carries data and goes through the rules like any later line.
    const ENTRY_LINE_IS_DATA: bool = false;

    fn is_entry_point(line: &str) -> Option<EntryMatch>;

    fn rules() -> &'static RuleSet<Self>;

    /// Variant-specific noise (legends, column units) checked after the global list.
    fn is_noise(_trimmed: &str) -> bool {
        false
    }

    fn start(&mut self, _line: &str, _entry: &EntryMatch) {}

    /// Completion test for non-blank, non-prompt lines.
    fn completes_on(&self, line: &str) -> bool {
        Self::is_entry_point(line).is_some()
    }

    /// Only asked of variants that tolerate blank lines: whether the first non-blank line after
    /// one still belongs to the block.
    fn resumes_after_blank(&self, _trimmed: &str) -> bool {
        true
    }

    /// Flush any record still being assembled from continuation lines.
    fn commit(&mut self) {}

    /// Post-block validation; every message becomes a block error.
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }

    fn into_records(self) -> BlockRecords;
}

/// Generic [`BlockParser`] over an [`Accumulator`].
pub struct RuleParser<A: Accumulator> {
    acc: A,
    errors: Vec<BlockDiagnostic>,
    warnings: Vec<BlockDiagnostic>,
    stats: BlockStats,
    started: Instant,
    blank_run: usize,
}

impl<A: Accumulator> Default for RuleParser<A> {
    fn default() -> Self {
        RuleParser {
            acc: A::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            stats: BlockStats::default(),
            started: Instant::now(),
            blank_run: 0,
        }
    }
}

impl<A: Accumulator> RuleParser<A> {
    pub fn accumulator(&self) -> &A {
        &self.acc
    }
}

impl<A: Accumulator> BlockParser for RuleParser<A> {
    fn block_type(&self) -> BlockType {
        A::BLOCK_TYPE
    }

    fn start_block(&mut self, line: &str, entry: &EntryMatch) {
        self.started = Instant::now();
        self.acc.start(line, entry);
        if A::ENTRY_LINE_IS_DATA {
            self.parse_line(line);
        }
    }

    fn parse_line(&mut self, line: &str) -> LineOutcome {
        self.stats.lines_processed += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            self.blank_run += 1;
            self.stats.noise_dropped += 1;
            return LineOutcome::Noise;
        }
        self.blank_run = 0;
        if is_noise(trimmed) {
            self.stats.noise_dropped += 1;
            return LineOutcome::Noise;
        }

        match A::rules().apply(&mut self.acc, trimmed) {
            RuleMatch::Handled(_) => {
                self.stats.rules_matched += 1;
                LineOutcome::Matched
            }
            RuleMatch::Failed(rule, e) => {
                self.stats.handler_failures += 1;
                tracing::debug!("[{}] rule '{}' failed: {}", A::BLOCK_TYPE, rule, e);
                self.errors
                    .push(BlockDiagnostic::new(format!("rule '{rule}' failed: {e}"), line));
                LineOutcome::Failed
            }
            RuleMatch::NoMatch => {
                if A::is_noise(trimmed) {
                    self.stats.noise_dropped += 1;
                    LineOutcome::Noise
                } else {
                    self.stats.unrecognized += 1;
                    self.warnings.push(BlockDiagnostic::new(
                        format!("unrecognized {} line", A::BLOCK_TYPE),
                        line,
                    ));
                    LineOutcome::Unrecognized
                }
            }
        }
    }

    fn is_block_complete(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return self.blank_run + 1 >= A::BLANK_LINES_TO_COMPLETE;
        }
        if self.blank_run > 0 && !self.acc.resumes_after_blank(trimmed) {
            return true;
        }
        is_prompt(line) || self.acc.completes_on(line)
    }

    fn get_result(mut self) -> ParsedBlock {
        self.acc.commit();
        for message in self.acc.validate() {
            self.errors.push(BlockDiagnostic::new(message, ""));
        }
        self.stats.duration_us = self.started.elapsed().as_micros() as u64;
        ParsedBlock {
            block_type: A::BLOCK_TYPE,
            records: self.acc.into_records(),
            errors: self.errors,
            warnings: self.warnings,
            stats: self.stats,
        }
    }
}
