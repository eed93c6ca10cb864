//! `display interface brief` and `display ip interface brief`.
//!
//! Both tables describe interfaces by their long-form name, so they are the tables interface
//! identity is discovered from. They share [`InterfaceRecord`]; the first fills the counters, the
//! second the addressing columns.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::{
    codec::{contains_all, Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
};

use super::{dash_none, parse_percent};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: String,
    /// Physical state with any `*` (admin down) or `^` (standby) marker stripped
    pub phy: Option<String>,
    pub admin_down: bool,
    pub protocol: Option<String>,
    pub in_util: Option<f64>,
    pub out_util: Option<f64>,
    pub in_errors: Option<u64>,
    pub out_errors: Option<u64>,
    /// `address/prefix` as printed; `None` for `unassigned`
    pub ip_address: Option<String>,
    pub vpn_instance: Option<String>,
}

/// `*down: administratively down`, `(s): spoofing`, `PHY: Physical`.
static LEGEND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[*^]?\w+|\(\w\)|InUti/OutUti)\s*:\s+\S|^The number of interface")
        .expect("interface legend regex is valid")
});

fn split_phy(raw: &str) -> (Option<String>, bool) {
    let admin_down = raw.starts_with('*');
    let phy = raw.trim_start_matches(['*', '^']);
    (dash_none(phy), admin_down)
}

fn parse_count(raw: &str) -> Result<Option<u64>, NetsnapError> {
    match dash_none(raw) {
        None => Ok(None),
        Some(v) => Ok(Some(v.parse::<u64>()?)),
    }
}

// ----- display interface brief -----

static BRIEF_RULES: Lazy<RuleSet<InterfaceBriefTable>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "row",
            r"^(\S+)\s+([*^]?[A-Za-z]+(?:\([a-zA-Z]\))*)\s+(\S+)\s+(\S+%|--)\s+(\S+%|--)\s+(\d+|--)\s+(\d+|--)$",
            on_brief_row,
        )
        .rule(
            "row_states_only",
            r"^(\S+)\s+([*^]?(?:up|down|\w+)(?:\([a-zA-Z]\))*)\s+(\S+)$",
            on_brief_states,
        )
});

#[derive(Debug, Default)]
pub struct InterfaceBriefTable {
    records: Vec<InterfaceRecord>,
}

fn on_brief_row(acc: &mut InterfaceBriefTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let (phy, admin_down) = split_phy(&caps[2]);
    acc.records.push(InterfaceRecord {
        name: caps[1].to_string(),
        phy,
        admin_down,
        protocol: dash_none(&caps[3]),
        in_util: parse_percent(&caps[4])?,
        out_util: parse_percent(&caps[5])?,
        in_errors: parse_count(&caps[6])?,
        out_errors: parse_count(&caps[7])?,
        ..Default::default()
    });
    Ok(())
}

fn on_brief_states(acc: &mut InterfaceBriefTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let (phy, admin_down) = split_phy(&caps[2]);
    acc.records.push(InterfaceRecord {
        name: caps[1].to_string(),
        phy,
        admin_down,
        protocol: dash_none(&caps[3]),
        ..Default::default()
    });
    Ok(())
}

impl Accumulator for InterfaceBriefTable {
    const BLOCK_TYPE: BlockType = BlockType::InterfaceBrief;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        contains_all(line, &["Interface", "PHY", "Protocol"]).then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &BRIEF_RULES
    }

    fn is_noise(trimmed: &str) -> bool {
        LEGEND.is_match(trimmed)
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::InterfaceBrief(self.records)
    }
}

// ----- display ip interface brief -----

static IP_RULES: Lazy<RuleSet<IpInterfaceBriefTable>> = Lazy::new(|| {
    RuleSet::new().rule(
        "row",
        r"^(\S+)\s+(\S+)\s+([*^]?[A-Za-z]+(?:\([a-zA-Z]\))*)\s+(\S+)(?:\s+(\S+))?$",
        on_ip_row,
    )
});

#[derive(Debug, Default)]
pub struct IpInterfaceBriefTable {
    records: Vec<InterfaceRecord>,
}

fn parse_address(raw: &str) -> Result<Option<String>, NetsnapError> {
    if raw.eq_ignore_ascii_case("unassigned") || dash_none(raw).is_none() {
        return Ok(None);
    }
    let (addr, prefix) = raw.split_once('/').unwrap_or((raw, ""));
    addr.parse::<IpAddr>()?;
    if !prefix.is_empty() {
        let bits: u8 = prefix.parse()?;
        if bits > 128 {
            return Err(NetsnapError::parse(format!("prefix length {bits} out of range")));
        }
    }
    Ok(Some(raw.to_string()))
}

fn on_ip_row(acc: &mut IpInterfaceBriefTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let (phy, admin_down) = split_phy(&caps[3]);
    acc.records.push(InterfaceRecord {
        name: caps[1].to_string(),
        ip_address: parse_address(&caps[2])?,
        phy,
        admin_down,
        protocol: dash_none(&caps[4]),
        vpn_instance: caps.get(5).and_then(|m| dash_none(m.as_str())),
        ..Default::default()
    });
    Ok(())
}

impl Accumulator for IpInterfaceBriefTable {
    const BLOCK_TYPE: BlockType = BlockType::IpInterfaceBrief;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        contains_all(line, &["Interface", "IP Address/Mask", "Physical", "Protocol"])
            .then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &IP_RULES
    }

    fn is_noise(trimmed: &str) -> bool {
        LEGEND.is_match(trimmed)
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::IpInterfaceBrief(self.records)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{BlockRecords, BlockType, ParsingEngine, PARSERS};

    #[test]
    fn interface_brief_rows() {
        let capture = "\
<R1>display interface brief
PHY: Physical
*down: administratively down
(s): spoofing
InUti/OutUti: input utility/output utility
Interface                   PHY   Protocol  InUti OutUti   inErrors  outErrors
Eth-Trunk1                  up    up        0.01%  0.01%          0          0
  GigabitEthernet0/0/1      up    up        0.01%  0.01%          0          0
GigabitEthernet0/0/2        *down down         0%     0%          0          3
NULL0                       up    up(s)        0%     0%          0          0
";
        let run = ParsingEngine::new(&PARSERS, 10).parse_str(capture);
        assert_eq!(run.blocks.len(), 1);
        let block = &run.blocks[0];
        assert_eq!(block.block_type, BlockType::InterfaceBrief);
        assert!(block.warnings.is_empty(), "{:?}", block.warnings);
        let BlockRecords::InterfaceBrief(records) = &block.records else {
            panic!("expected interface records");
        };
        assert_eq!(records.len(), 4);
        assert_eq!(records[1].name, "GigabitEthernet0/0/1");
        assert_eq!(records[1].in_util, Some(0.01));
        assert!(records[2].admin_down);
        assert_eq!(records[2].phy.as_deref(), Some("down"));
        assert_eq!(records[2].out_errors, Some(3));
        assert_eq!(records[3].protocol.as_deref(), Some("up(s)"));
    }

    #[test]
    fn ip_interface_brief_rows() {
        let capture = "\
The number of interface that is UP in Physical is 3
The number of interface that is DOWN in Physical is 1
Interface                         IP Address/Mask      Physical   Protocol  VPN
GigabitEthernet0/0/0              10.1.1.1/24          up         up        --
LoopBack0                         1.1.1.1/32           up         up(s)     --
Vlanif100                         10.9.9.300/24        up         up        --
NULL0                             unassigned           up         up(s)     --
";
        let run = ParsingEngine::new(&PARSERS, 10).parse_str(capture);
        assert_eq!(run.blocks.len(), 1);
        let block = &run.blocks[0];
        assert_eq!(block.block_type, BlockType::IpInterfaceBrief);
        assert_eq!(block.errors.len(), 1);
        assert!(block.errors[0].excerpt.contains("Vlanif100"));
        let BlockRecords::IpInterfaceBrief(records) = &block.records else {
            panic!("expected interface records");
        };
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].ip_address.as_deref(), Some("10.1.1.1/24"));
        assert_eq!(records[0].vpn_instance, None);
        assert_eq!(records[2].ip_address, None);
    }
}
