//! `display bgp peer` and `display bgp vpnv4 all peer`.
//!
//! VPN peers are listed under `VPN-Instance <name>, Router ID <id>:` sub-headers, which switch the
//! instance every following row belongs to. The peer table is separated from its header by a blank
//! line, so the block only ends on two consecutive blanks.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::{
    codec::{contains_all, Accumulator, BlockRecords, BlockType, EntryMatch, RuleSet},
    error::NetsnapError,
};

pub const DEFAULT_ADDRESS_FAMILY: &str = "ipv4";

static RULES: Lazy<RuleSet<BgpPeerTable>> = Lazy::new(|| {
    RuleSet::new()
        .rule(
            "peer",
            r"^(\S+)\s+(\d)\s+(\d+(?:\.\d+)?)\s+(\d+)\s+(\d+)\s+(\d+)\s+(\S+)\s+([A-Za-z]+(?:\(\w+\))?)(?:\s+(\d+))?$",
            on_peer,
        )
        .rule(
            "vpn_instance",
            r"^VPN-Instance\s+([^,\s]+)\s*,\s*Router ID\s+\S+?:?$",
            on_vpn_instance,
        )
        .rule(
            "family",
            r"^Peer of (\S+?)-family for vpn instance\s*:?$",
            on_family,
        )
});

static NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:BGP local router ID|Local AS number|Total number of peers)")
        .expect("bgp noise regex is valid")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpPeerRecord {
    /// `None` for peers of the public instance
    pub vpn_instance: Option<String>,
    pub peer: String,
    pub address_family: String,
    pub version: u8,
    /// Plain or asdot notation, as printed
    pub remote_as: String,
    pub msg_rcvd: u64,
    pub msg_sent: u64,
    pub out_q: u64,
    pub up_down: String,
    pub state: String,
    pub pref_rcv: Option<u64>,
}

#[derive(Debug)]
pub struct BgpPeerTable {
    records: Vec<BgpPeerRecord>,
    vpn_instance: Option<String>,
    address_family: String,
}

impl Default for BgpPeerTable {
    fn default() -> Self {
        BgpPeerTable {
            records: Vec::new(),
            vpn_instance: None,
            address_family: DEFAULT_ADDRESS_FAMILY.to_string(),
        }
    }
}

fn on_peer(acc: &mut BgpPeerTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    let peer = caps[1].parse::<IpAddr>()?;
    acc.records.push(BgpPeerRecord {
        vpn_instance: acc.vpn_instance.clone(),
        peer: peer.to_string(),
        address_family: acc.address_family.clone(),
        version: caps[2].parse()?,
        remote_as: caps[3].to_string(),
        msg_rcvd: caps[4].parse()?,
        msg_sent: caps[5].parse()?,
        out_q: caps[6].parse()?,
        up_down: caps[7].to_string(),
        state: caps[8].to_string(),
        pref_rcv: caps.get(9).map(|m| m.as_str().parse()).transpose()?,
    });
    Ok(())
}

fn on_vpn_instance(acc: &mut BgpPeerTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.vpn_instance = Some(caps[1].to_string());
    Ok(())
}

fn on_family(acc: &mut BgpPeerTable, caps: &Captures<'_>) -> Result<(), NetsnapError> {
    acc.address_family = caps[1].to_ascii_lowercase();
    Ok(())
}

impl Accumulator for BgpPeerTable {
    const BLOCK_TYPE: BlockType = BlockType::BgpPeer;
    const BLANK_LINES_TO_COMPLETE: usize = 2;

    fn is_entry_point(line: &str) -> Option<EntryMatch> {
        contains_all(line, &["Peer", "MsgRcvd", "State"]).then(EntryMatch::empty)
    }

    fn rules() -> &'static RuleSet<Self> {
        &RULES
    }

    fn is_noise(trimmed: &str) -> bool {
        NOISE.is_match(trimmed)
    }

    fn into_records(self) -> BlockRecords {
        BlockRecords::BgpPeer(self.records)
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::{BlockRecords, ParsingEngine, PARSERS};

    #[test]
    fn vpn_instances_switch_current_instance() {
        let capture = "\
 BGP local router ID : 1.1.1.1
 Local AS number : 100
 Total number of peers : 3                 Peers in established state : 2

  Peer            V          AS  MsgRcvd  MsgSent  OutQ  Up/Down       State  PrefRcv

  2.2.2.2         4         100     1234     1240     0 10d02h    Established        5

  Peer of IPv4-family for vpn instance :

  VPN-Instance vpn1, Router ID 1.1.1.1:
  10.1.1.2        4       65001       50       55     0 00:40:01 Established        3
  10.1.1.6        4     1.65001        0        0     0 00:00:12 Idle(Admin)


<PE1>
";
        let run = ParsingEngine::new(&PARSERS, 10).parse_str(capture);
        assert_eq!(run.blocks.len(), 1);
        let block = &run.blocks[0];
        assert!(block.warnings.is_empty(), "{:?}", block.warnings);
        assert!(block.errors.is_empty(), "{:?}", block.errors);
        let BlockRecords::BgpPeer(records) = &block.records else {
            panic!("expected bgp records");
        };
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].vpn_instance, None);
        assert_eq!(records[0].pref_rcv, Some(5));
        assert_eq!(records[1].vpn_instance.as_deref(), Some("vpn1"));
        assert_eq!(records[1].remote_as, "65001");
        assert_eq!(records[2].remote_as, "1.65001");
        assert_eq!(records[2].state, "Idle(Admin)");
        assert_eq!(records[2].pref_rcv, None);
        assert_eq!(block.stats.rules_matched, 5);
    }
}
