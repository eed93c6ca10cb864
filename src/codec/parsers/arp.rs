//! `display arp`.
//!
//! The row layout is `IP MAC [EXPIRE] TYPE... INTERFACE [VPN]`. Only the address columns are
//! fixed; `TYPE` may contain a space (`I -`) and both `EXPIRE` and `VPN-INSTANCE` are optional, so
//! the remaining tokens are taken from both ends by meaning. A `VLAN/CEVLAN` row under an entry
//! belongs to that entry.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::{
    codec::{contains_all, Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
    ifname::looks_like_interface,
};

static RULES: Lazy<RuleSet<ArpTable>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "entry",
            r"^(\d{1,3}(?:\.\d{1,3}){3}|[0-9A-Fa-f:]*:[0-9A-Fa-f:]+)\s+([0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4})\s+(.+)$",
            on_entry,
        )
        .rule("vlan", r"^(\d+|-)\s*/\s*(\d+|-)(?:\s+\S+)?$", on_vlan)
        .rule("total", r"^Total\s*:\s*(\d+)", on_total)
});

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:VLAN/CEVLAN|VLAN\s+PVC)").expect("arp noise regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArpRecord {
    pub ip: String,
    pub mac: String,
    pub expire_m: Option<u32>,
    pub entry_type: String,
    pub interface: String,
    pub vpn_instance: Option<String>,
    pub vlan: Option<u32>,
    pub cevlan: Option<u32>,
}

#[derive(Debug, Default)]
pub struct ArpTable {
    records: Vec<ArpRecord>,
    last: Option<usize>,
    total: Option<usize>,
}

fn on_entry(acc: &mut ArpTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let ip = caps[1].parse::<IpAddr>()?;
    let mut tokens: Vec<&str> = caps[3].split_whitespace().collect();

    let last = tokens
        .pop()
        .ok_or_else(|| NetsnapError::parse("arp entry has no interface"))?;
    let (interface, vpn_instance) = if looks_like_interface(last) {
        (last, None)
    } else {
        let interface = tokens
            .pop()
            .ok_or_else(|| NetsnapError::parse("arp entry has no interface"))?;
        (interface, Some(last.to_string()))
    };

    let expire_m = match tokens.first() {
        Some(tok) if tok.chars().all(|c| c.is_ascii_digit()) => {
            let expire = tok.parse::<u32>()?;
            tokens.remove(0);
            Some(expire)
        }
        _ => None,
    };
    if tokens.is_empty() {
        return Err(NetsnapError::parse("arp entry has no type"));
    }

    acc.records.push(ArpRecord {
        ip: ip.to_string(),
        mac: caps[2].to_ascii_lowercase(),
        expire_m,
        entry_type: tokens.join(" "),
        interface: interface.to_string(),
        vpn_instance,
        vlan: None,
        cevlan: None,
    });
    acc.last = Some(acc.records.len() - 1);
    Ok(())
}

fn dash_u32(value: &str) -> Result<Option<u32>, NetsnapError> {
    match value {
        "-" => Ok(None),
        v => Ok(Some(v.parse()?)),
    }
}

fn on_vlan(acc: &mut ArpTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let record = acc
        .last
        .and_then(|idx| acc.records.get_mut(idx))
        .ok_or_else(|| NetsnapError::parse("VLAN row without an arp entry"))?;
    record.vlan = dash_u32(&caps[1])?;
    record.cevlan = dash_u32(&caps[2])?;
    Ok(())
}

fn on_total(acc: &mut ArpTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.total = Some(caps[1].parse()?);
    acc.last = None;
    Ok(())
}

impl Accumulator for ArpTable {
    const BLOCK_TYPE: BlockType = BlockType::Arp;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        contains_all(line, &["IP ADDRESS", "MAC ADDRESS"]).then(EntryMatch::empty)
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
                "Total: reports {total} entries, {} were extracted",
                self.records.len()
            )],
            _ => Vec::new(),
        }
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::Arp(self.records)
    }
}
