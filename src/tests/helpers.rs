//! Shared test utilities for unit tests

use crate::codec::{BlockType, ParseRun, ParsedBlock, ParsingEngine, PARSERS};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Parse `capture` with the built-in registry and a generous error budget.
pub fn parse_capture(capture: &str) -> ParseRun {
    init_logging();
    ParsingEngine::new(&PARSERS, 50).parse_str(capture)
}

/// The only block of `block_type` in `run`.
pub fn single_block(run: &ParseRun, block_type: BlockType) -> &ParsedBlock {
    let mut found = run.blocks.iter().filter(|b| b.block_type == block_type);
    let block = found
        .next()
        .unwrap_or_else(|| panic!("no {block_type} block"));
    assert!(found.next().is_none(), "more than one {block_type} block");
    block
}
