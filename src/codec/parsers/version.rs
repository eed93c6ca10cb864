//! `display version`: platform model, software release and uptime.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::{
    codec::{Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
};

use super::collapse_whitespace;

static RULES: Lazy<RuleSet<VersionInfo>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "software",
            r"^VRP \(R\) software,\s*Version\s+(\S+)(?:\s+\((\S+)\s+(\S+)\))?",
            on_software,
        )
        .rule(
            "chassis_uptime",
            r"^(?:HUAWEI|Huawei)\s+(\S+)(?:\s+[A-Za-z ]+?)?\s+uptime is\s+(.+)$",
            on_chassis_uptime,
        )
        .rule("patch", r"^Patch Version\s*:\s*(\S+)", on_patch)
});

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:Copyright|.*Versatile Routing Platform|\S+\s*\(\w+\)\s*\d*\s*:\s*uptime is|.*(?:Version|version)\s*:)",
    )
    .expect("version noise regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub model: Option<String>,
    pub software_version: Option<String>,
    pub release: Option<String>,
    pub patch: Option<String>,
    pub uptime: Option<String>,
}

#[derive(Debug, Default)]
pub struct VersionInfo {
    record: VersionRecord,
}

fn on_software(acc: &mut VersionInfo, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.record.software_version = Some(caps[1].to_string());
    if let Some(model) = caps.get(2) {
        acc.record.model.get_or_insert_with(|| model.as_str().to_string());
    }
    acc.record.release = caps.get(3).map(|m| m.as_str().to_string());
    Ok(())
}

fn on_chassis_uptime(acc: &mut VersionInfo, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    // The chassis line names the exact model (NE40E-X8A), the software line only the family.
    acc.record.model = Some(caps[1].to_string());
    acc.record.uptime = Some(collapse_whitespace(&caps[2]));
    Ok(())
}

fn on_patch(acc: &mut VersionInfo, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.record.patch = Some(caps[1].to_string());
    Ok(())
}

impl Accumulator for VersionInfo {
    const BLOCK_TYPE: BlockType = BlockType::Version;
    /// Some captures omit the banner, so the software line itself can open the block.
    const ENTRY_LINE_IS_DATA: bool = true;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        let line = line.trim_start();
        (line.contains("Versatile Routing Platform") || line.starts_with("VRP (R) software"))
            .then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &RULES
    }

    fn is_noise(trimmed: &str) -> bool {
        NOISE.is_match(trimmed)
    }

    fn completes_on(&self, line: &str) -> bool {
        line.contains("Versatile Routing Platform")
    }

    fn validate(&self) -> Vec<String> {
        if self.record.software_version.is_none() {
            vec!["version block has no software version line".to_string()]
        } else {
            Vec::new()
        }
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::Version(vec![self.record])
    }
}
