//! `sysname <name>` from the running configuration. A single-line block.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::codec::{Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet};

static ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*sysname\s+(\S+)\s*$").expect("sysname regex is valid"));

static RULES: Lazy<RuleSet<Sysname>> = Lazy::new(RuleSet::new);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SysnameRecord {
    pub hostname: String,
}

#[derive(Debug, Default)]
pub struct Sysname {
    hostname: Option<String>,
}

impl Accumulator for Sysname {
    const BLOCK_TYPE: BlockType = BlockType::Sysname;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        ENTRY.captures(line).map(|c| EntryMatch::from_captures(&c))
    }

    fn rules() -> &'static RuleSet<Self> {
        &RULES
    }

    fn start(&mut self, _line: &str, entry: &EntryMatch) {
        self.hostname = entry.group(1).map(str::to_string);
    }

    fn completes_on(&self, _line: &str) -> bool {
        true
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::Sysname(
            self.hostname
                .into_iter()
                .map(|hostname| SysnameRecord { hostname })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{BlockRecords, ParsingEngine, PARSERS};

    #[test]
    fn sysname_is_single_line() {
        let capture = "\
#
 sysname CORE-01
#
 header login information \"authorized access only\"
";
        let run = ParsingEngine::new(&PARSERS, 10).parse_str(capture);
        assert_eq!(run.blocks.len(), 1);
        let block = &run.blocks[0];
        assert!(block.warnings.is_empty());
        assert_eq!(block.stats.lines_processed, 0);
        let BlockRecords::Sysname(records) = &block.records else {
            panic!("expected sysname records");
        };
        assert_eq!(records[0].hostname, "CORE-01");
    }
}
