//! `display ip routing-table` (optionally `vpn-instance` / `all-vpn`).
//!
//! One command prints one `Route Flags:` legend followed by one or more named tables, each
//! introduced by `Routing Table(s) : <name>` and separated by single blank lines. Rows whose
//! destination column is empty are further equal-cost paths of the destination above them.
//!
//! A single blank line only keeps the block open when the next line is more routing-table
//! output; two blank lines always end it.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, net::IpAddr};

use crate::{
    codec::{accumulator::is_noise, Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
};

pub const PUBLIC_TABLE: &str = "Public";

static ENTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*Route Flags\s*:").expect("route entry regex is valid"));

static RULES: Lazy<RuleSet<RoutingTable>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "table",
            r"^Routing Tables?\s*:\s*(\S+)$",
            on_table,
        )
        .rule(
            "counts",
            r"^Destinations\s*:\s*(\d+)\s+Routes\s*:\s*(\d+)$",
            on_counts,
        )
        .rule(
            "route",
            r"^(?:(\d{1,3}(?:\.\d{1,3}){3}/\d{1,2})\s+)?([A-Za-z][\w-]*)\s+(\d+)\s+(\d+)\s+(.+)$",
            on_route,
        )
});

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Destination/Mask\s+Proto").expect("route noise regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRecord {
    pub table: String,
    pub destination: String,
    pub protocol: String,
    pub preference: u32,
    pub cost: u32,
    pub flags: Option<String>,
    pub next_hop: String,
    pub interface: String,
}

#[derive(Debug)]
pub struct RoutingTable {
    records: Vec<RouteRecord>,
    current_table: String,
    /// `Routes :` count announced per table
    announced: BTreeMap<String, usize>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        RoutingTable {
            records: Vec::new(),
            current_table: PUBLIC_TABLE.to_string(),
            announced: BTreeMap::new(),
        }
    }
}

fn on_table(acc: &mut RoutingTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.current_table = caps[1].to_string();
    Ok(())
}

fn on_counts(acc: &mut RoutingTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.announced
        .insert(acc.current_table.clone(), caps[2].parse()?);
    Ok(())
}

fn on_route(acc: &mut RoutingTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let destination = match caps.get(1) {
        Some(dest) => dest.as_str().to_string(),
        None => acc
            .records
            .last()
            .filter(|prev| prev.table == acc.current_table)
            .map(|prev| prev.destination.clone())
            .ok_or_else(|| NetsnapError::parse("equal-cost row without a destination above it"))?,
    };

    // Interface is always the last token, next hop the one before it; anything left is flags.
    let mut tokens: Vec<&str> = caps[5].split_whitespace().collect();
    let interface = tokens
        .pop()
        .ok_or_else(|| NetsnapError::parse("route has no interface"))?;
    let next_hop = tokens
        .pop()
        .ok_or_else(|| NetsnapError::parse("route has no next hop"))?
        .parse::<IpAddr>()?;
    let flags = (!tokens.is_empty()).then(|| tokens.join(" "));

    acc.records.push(RouteRecord {
        table: acc.current_table.clone(),
        destination,
        protocol: caps[2].to_string(),
        preference: caps[3].parse()?,
        cost: caps[4].parse()?,
        flags,
        next_hop: next_hop.to_string(),
        interface: interface.to_string(),
    });
    Ok(())
}

impl Accumulator for RoutingTable {
    const BLOCK_TYPE: BlockType = BlockType::RoutingTable;
    const BLANK_LINES_TO_COMPLETE: usize = 2;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        ENTRY.is_match(line).then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &RULES
    }

    fn is_noise(trimmed: &str) -> bool {
        NOISE.is_match(trimmed)
    }

    fn resumes_after_blank(&self, trimmed: &str) -> bool {
        RULES.matches(trimmed) || NOISE.is_match(trimmed) || is_noise(trimmed)
    }

    fn validate(&self) -> Vec<String> {
        self.announced
            .iter()
            .filter_map(|(table, announced)| {
                let extracted = self.records.iter().filter(|r| &r.table == table).count();
                (extracted != *announced).then(|| {
                    format!("table {table} announces {announced} routes, {extracted} were extracted")
                })
            })
            .collect()
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::RoutingTable(self.records)
    }
}
