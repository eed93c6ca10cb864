//! `display alarm active`.
//!
//! Each alarm starts on a line carrying sequence, id, severity and timestamp; its description
//! wraps onto any number of indented lines. The description is assembled first and the embedded
//! reason code and interface are extracted once the alarm is complete.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::{
    codec::{contains_all, Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
};

use super::collapse_whitespace;

static RULES: Lazy<RuleSet<AlarmTable>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "alarm",
            r"^(\d+)\s+(0x[0-9A-Fa-f]+)\s+([A-Za-z]+)\s+(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:[+-]\d{2}:\d{2})?(?:\s+DST)?)\s*(.*)$",
            on_alarm,
        )
        .rule("continuation", r"^([^-=].*)$", on_continuation)
});

static CODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:reason\s*code|error\s*code|code)\s*[=:]\s*(\d+)")
        .expect("alarm code regex is valid")
});

static IFNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:ifName|InterfaceName)\s*=\s*([^,\)\s]+)")
        .expect("alarm ifname regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRecord {
    pub sequence: u64,
    pub alarm_id: String,
    pub severity: String,
    pub raised_at: String,
    /// Description with continuation lines joined and whitespace collapsed
    pub info: String,
    pub code: Option<u32>,
    pub interface: Option<String>,
}

#[derive(Debug, Default)]
pub struct AlarmTable {
    records: Vec<AlarmRecord>,
    /// Alarm still receiving continuation lines
    last: Option<usize>,
}

impl AlarmTable {
    fn finish_last(&mut self) {
        let Some(record) = self.last.take().and_then(|idx| self.records.get_mut(idx)) else {
            return;
        };
        record.info = collapse_whitespace(&record.info);
        record.code = CODE
            .captures(&record.info)
            .and_then(|c| c[1].parse().ok());
        record.interface = IFNAME
            .captures(&record.info)
            .map(|c| c[1].to_string());
    }
}

fn on_alarm(acc: &mut AlarmTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.finish_last();
    acc.records.push(AlarmRecord {
        sequence: caps[1].parse()?,
        alarm_id: caps[2].to_ascii_lowercase(),
        severity: caps[3].to_string(),
        raised_at: collapse_whitespace(&caps[4]),
        info: caps[5].to_string(),
        ..Default::default()
    });
    acc.last = Some(acc.records.len() - 1);
    Ok(())
}

fn on_continuation(acc: &mut AlarmTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let record = acc
        .last
        .and_then(|idx| acc.records.get_mut(idx))
        .ok_or_else(|| NetsnapError::parse("alarm text without an alarm line"))?;
    record.info.push(' ');
    record.info.push_str(&caps[1]);
    Ok(())
}

impl Accumulator for AlarmTable {
    const BLOCK_TYPE: BlockType = BlockType::Alarm;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        contains_all(line, &["Sequence", "AlarmId", "Severity"]).then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &RULES
    }

    fn commit(&mut self) {
        self.finish_last();
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::Alarm(self.records)
    }
}
