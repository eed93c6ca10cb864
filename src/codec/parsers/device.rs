//! `display device`: one hardware component per slot.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::{
    codec::{contains_all, Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
};

use super::dash_none;

static RULES: Lazy<RuleSet<DeviceTable>> = Lazy::new(|| {
    RuleSet::new()
        // Box switches print an extra Sub and Power column.
        .rule(
            "row_with_power",
            r"^(\S+)\s+(\S+)\s+(\S+)\s+(Present|Absent)\s+(Power\w+|-+|NA)\s+(\S+)\s+(\S+)\s+(\S+)$",
            on_row_with_power,
        )
        .rule(
            "row",
            r"^(\S+)\s+(\S+)\s+(Present|Absent)\s+(\S+)\s+(\S+)(?:\s+(\S+))?$",
            on_row,
        )
});

static NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'s Device status:$").expect("device noise regex is valid"));

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareRecord {
    pub slot: String,
    pub sub_slot: Option<String>,
    pub board_type: String,
    pub online: bool,
    pub power: Option<String>,
    pub register: Option<String>,
    pub status: String,
    pub role: Option<String>,
}

#[derive(Debug, Default)]
pub struct DeviceTable {
    records: Vec<HardwareRecord>,
}

fn na_none(value: &str) -> Option<String> {
    match value {
        "NA" => None,
        v => dash_none(v),
    }
}

fn on_row_with_power(acc: &mut DeviceTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.records.push(HardwareRecord {
        slot: caps[1].to_string(),
        sub_slot: dash_none(&caps[2]),
        board_type: caps[3].to_string(),
        online: &caps[4] == "Present",
        power: na_none(&caps[5]),
        register: na_none(&caps[6]),
        status: caps[7].to_string(),
        role: na_none(&caps[8]),
    });
    Ok(())
}

fn on_row(acc: &mut DeviceTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.records.push(HardwareRecord {
        slot: caps[1].to_string(),
        board_type: caps[2].to_string(),
        online: &caps[3] == "Present",
        register: na_none(&caps[4]),
        status: caps[5].to_string(),
        role: caps.get(6).and_then(|m| na_none(m.as_str())),
        ..Default::default()
    });
    Ok(())
}

impl Accumulator for DeviceTable {
    const BLOCK_TYPE: BlockType = BlockType::Device;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        contains_all(line, &["Slot", "Type", "Online", "Status"]).then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &RULES
    }

    fn is_noise(trimmed: &str) -> bool {
        NOISE.is_match(trimmed)
    }

    fn validate(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .filter(|r| !seen.insert((r.slot.as_str(), r.sub_slot.as_deref())))
            .map(|r| format!("slot {} listed more than once", r.slot))
            .collect()
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::Device(self.records)
    }
}
