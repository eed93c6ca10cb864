//! `display ospf peer brief`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::{
    codec::{contains_all, Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
};

static RULES: Lazy<RuleSet<OspfPeerTable>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "peer",
            r"^(\d+\.\d+\.\d+\.\d+|\d+)\s+(\S+)\s+(\d+\.\d+\.\d+\.\d+)\s+(\S+)$",
            on_peer,
        )
        .rule("total", r"^Total Peer\(s\)\s*:\s*(\d+)$", on_total)
});

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:OSPF Process \d+|Peer Statistic Information)")
        .expect("ospf noise regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OspfPeerRecord {
    /// Dotted form; a decimal area id is converted (`1` => `0.0.0.1`)
    pub area: String,
    pub interface: String,
    pub neighbor_id: String,
    pub state: String,
}

#[derive(Debug, Default)]
pub struct OspfPeerTable {
    records: Vec<OspfPeerRecord>,
    total: Option<usize>,
}

fn dotted_area(raw: &str) -> Result<String, NetsnapError> {
    if raw.contains('.') {
        Ok(raw.parse::<Ipv4Addr>()?.to_string())
    } else {
        Ok(Ipv4Addr::from(raw.parse::<u32>()?).to_string())
    }
}

fn on_peer(acc: &mut OspfPeerTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.records.push(OspfPeerRecord {
        area: dotted_area(&caps[1])?,
        interface: caps[2].to_string(),
        neighbor_id: caps[3].parse::<Ipv4Addr>()?.to_string(),
        state: caps[4].to_string(),
    });
    Ok(())
}

fn on_total(acc: &mut OspfPeerTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.total = Some(caps[1].parse()?);
    Ok(())
}

impl Accumulator for OspfPeerTable {
    const BLOCK_TYPE: BlockType = BlockType::OspfPeer;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        contains_all(line, &["Area Id", "Interface", "Neighbor id", "State"])
            .then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &RULES
    }

    fn is_noise(trimmed: &str) -> bool {
        NOISE.is_match(trimmed)
    }

    fn validate(&self) -> Vec<String> {
        match self.total {
            Some(total) if total != self.records.len() => vec![format!(
                "Total Peer(s) reports {total} peers, {} were extracted",
                self.records.len()
            )],
            _ => Vec::new(),
        }
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::OspfPeer(self.records)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{BlockRecords, ParsingEngine, PARSERS};

    #[test]
    fn peers_and_total() {
        let capture = "\
          OSPF Process 1 with Router ID 1.1.1.1
                  Peer Statistic Information
 ----------------------------------------------------------------------------
 Area Id          Interface                        Neighbor id      State
 0.0.0.0          GigabitEthernet0/0/1             2.2.2.2          Full
 1                Vlanif100                        3.3.3.3          ExStart
 ----------------------------------------------------------------------------
 Total Peer(s):      2
";
        let run = ParsingEngine::new(&PARSERS, 10).parse_str(capture);
        assert_eq!(run.blocks.len(), 1);
        let block = &run.blocks[0];
        assert!(block.warnings.is_empty(), "{:?}", block.warnings);
        assert!(block.errors.is_empty(), "{:?}", block.errors);
        let BlockRecords::OspfPeer(records) = &block.records else {
            panic!("expected ospf records");
        };
        assert_eq!(records[0].interface, "GigabitEthernet0/0/1");
        assert_eq!(records[1].area, "0.0.0.1");
        assert_eq!(records[1].state, "ExStart");
    }
}
