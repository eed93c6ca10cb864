//! `display lldp neighbor brief`. Local ports are printed abbreviated (`GE0/0/1`).

use once_cell::sync::Lazy;
use regex::Captures;
use serde::{Deserialize, Serialize};

use crate::{
    codec::{contains_all, Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
};

use super::dash_none;

static RULES: Lazy<RuleSet<LldpNeighborTable>> = Lazy::new(|| {
    RuleSet::new()
        .rule("neighbor", r"^(\S+)\s+(.+?)\s+(\S+)\s+(\d+)$", on_neighbor)
        .rule("neighbor_no_expiry", r"^(\S+)\s+(.+?)\s+(\S+)\s+(-+)$", on_neighbor)
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LldpNeighborRecord {
    pub local_interface: String,
    pub neighbor_device: String,
    pub neighbor_interface: String,
    pub expire_s: Option<u32>,
}

#[derive(Debug, Default)]
pub struct LldpNeighborTable {
    records: Vec<LldpNeighborRecord>,
}

fn on_neighbor(acc: &mut LldpNeighborTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let expire_s = match dash_none(&caps[4]) {
        Some(v) => Some(v.parse()?),
        None => None,
    };
    acc.records.push(LldpNeighborRecord {
        local_interface: caps[1].to_string(),
        neighbor_device: caps[2].to_string(),
        neighbor_interface: caps[3].to_string(),
        expire_s,
    });
    Ok(())
}

impl Accumulator for LldpNeighborTable {
    const BLOCK_TYPE: BlockType = BlockType::LldpNeighbor;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        contains_all(line, &["Local Intf", "Neighbor Dev"]).then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &RULES
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::LldpNeighbor(self.records)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{BlockRecords, ParsingEngine, PARSERS};

    #[test]
    fn neighbor_names_may_contain_spaces() {
        let capture = "\
Local Intf       Neighbor Dev             Neighbor Intf             Exptime(s)
GE0/0/1          SW2                      GE0/0/2                   101
XGE0/0/3         Core Switch A            Ten-GigabitEthernet1/0/1  --
";
        let run = ParsingEngine::new(&PARSERS, 10).parse_str(capture);
        let block = &run.blocks[0];
        assert!(block.warnings.is_empty(), "{:?}", block.warnings);
        let BlockRecords::LldpNeighbor(records) = &block.records else {
            panic!("expected lldp records");
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].expire_s, Some(101));
        assert_eq!(records[1].neighbor_device, "Core Switch A");
        assert_eq!(records[1].neighbor_interface, "Ten-GigabitEthernet1/0/1");
        assert_eq!(records[1].expire_s, None);
    }

    #[test]
    fn garbage_only_block_is_silent() {
        let capture = "\
Local Intf       Neighbor Dev             Neighbor Intf             Exptime(s)
---- More ----
Error: Unrecognized command found at '^' position.
^
---------------------------------------------------------------
";
        let run = ParsingEngine::new(&PARSERS, 10).parse_str(capture);
        assert_eq!(run.blocks.len(), 1);
        assert_eq!(run.blocks[0].record_count(), 0);
        assert!(run.blocks[0].warnings.is_empty());
        assert!(run.blocks[0].errors.is_empty());
        assert_eq!(run.blocks[0].stats.noise_dropped, 4);
    }
}
