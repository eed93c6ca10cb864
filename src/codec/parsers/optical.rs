//! `display optical-module brief`: one transceiver per port.
//!
//! Multi-lane modules (40G/100G) print the first lane on the port row and every further lane on
//! an indented row carrying only the two power columns.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::{
    codec::{contains_all, Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
};

use super::{dash_none, parse_opt_f64, parse_opt_u32};

static RULES: Lazy<RuleSet<OpticalModuleTable>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "row",
            r"^(\S+)\s+(\S+)\s+(\S+)\s+(\d+|-+)\s+(-?\d+(?:\.\d+)?|-+)\s+(-?\d+(?:\.\d+)?|-+)$",
            on_row,
        )
        .rule("lane", r"^(-?\d+\.\d+)\s+(-?\d+\.\d+)$", on_lane)
});

static UNITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\((?:nm|dBm)\)").expect("optical units regex is valid"));

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanePower {
    pub rx_power_dbm: f64,
    pub tx_power_dbm: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransceiverRecord {
    pub port: String,
    pub status: Option<String>,
    pub module_type: Option<String>,
    pub wavelength_nm: Option<u32>,
    pub rx_power_dbm: Option<f64>,
    pub tx_power_dbm: Option<f64>,
    /// Per-lane powers, lane 0 first; empty for single-lane modules
    pub lanes: Vec<LanePower>,
}

#[derive(Debug, Default)]
pub struct OpticalModuleTable {
    records: Vec<TransceiverRecord>,
    last: Option<usize>,
}

fn on_row(acc: &mut OpticalModuleTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.records.push(TransceiverRecord {
        port: caps[1].to_string(),
        status: dash_none(&caps[2]),
        module_type: dash_none(&caps[3]),
        wavelength_nm: parse_opt_u32(&caps[4])?,
        rx_power_dbm: parse_opt_f64(&caps[5])?,
        tx_power_dbm: parse_opt_f64(&caps[6])?,
        lanes: Vec::new(),
    });
    acc.last = Some(acc.records.len() - 1);
    Ok(())
}

fn on_lane(acc: &mut OpticalModuleTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let record = acc
        .last
        .and_then(|idx| acc.records.get_mut(idx))
        .ok_or_else(|| NetsnapError::parse("lane row without a port row"))?;
    if record.lanes.is_empty() {
        if let (Some(rx), Some(tx)) = (record.rx_power_dbm, record.tx_power_dbm) {
            record.lanes.push(LanePower {
                rx_power_dbm: rx,
                tx_power_dbm: tx,
            });
        }
    }
    record.lanes.push(LanePower {
        rx_power_dbm: caps[1].parse()?,
        tx_power_dbm: caps[2].parse()?,
    });
    Ok(())
}

impl Accumulator for OpticalModuleTable {
    const BLOCK_TYPE: BlockType = BlockType::OpticalModule;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        contains_all(line, &["Port", "RxPower", "TxPower"]).then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &RULES
    }

    fn is_noise(trimmed: &str) -> bool {
        UNITS.is_match(trimmed)
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::OpticalModule(self.records)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{BlockRecords, ParsingEngine, PARSERS};

    const CAPTURE: &str = "\
Port            Status  Type          WaveLength RxPower  TxPower
                                      (nm)       (dBm)    (dBm)
GE0/0/1         up      1000_BASE_LX  1310       -5.12    -4.98
100GE1/0/0      up      100GBASE_LR4  1310       -3.10    -1.20
                                                 -3.25    -1.31
                                                 -3.05    -1.17
GE0/0/2         down    -             -          -        -
";

    #[test]
    fn lanes_attach_to_previous_port() {
        let run = ParsingEngine::new(&PARSERS, 10).parse_str(CAPTURE);
        assert_eq!(run.blocks.len(), 1);
        let block = &run.blocks[0];
        assert!(block.warnings.is_empty(), "{:?}", block.warnings);
        assert!(block.errors.is_empty(), "{:?}", block.errors);
        let BlockRecords::OpticalModule(records) = &block.records else {
            panic!("expected transceiver records");
        };
        assert_eq!(records.len(), 3);
        assert!(records[0].lanes.is_empty());
        assert_eq!(records[0].wavelength_nm, Some(1310));
        assert_eq!(records[1].lanes.len(), 3);
        assert_eq!(records[1].lanes[0].rx_power_dbm, -3.10);
        assert_eq!(records[1].lanes[2].tx_power_dbm, -1.17);
        assert_eq!(records[2].module_type, None);
        assert_eq!(records[2].rx_power_dbm, None);
    }

    #[test]
    fn orphan_lane_is_an_error() {
        let capture = "\
Port            Status  Type          WaveLength RxPower  TxPower
                                                 -3.25    -1.31
";
        let run = ParsingEngine::new(&PARSERS, 10).parse_str(capture);
        assert_eq!(run.blocks[0].errors.len(), 1);
        assert_eq!(run.blocks[0].record_count(), 0);
    }
}
