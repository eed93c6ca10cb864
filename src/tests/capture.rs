//! Whole-capture parsing: several commands, prompts and noise in one file.

use super::helpers::{parse_capture, single_block};
use crate::codec::{BlockRecords, BlockType};

const SESSION: &str = "\
Info: The max number of VTY users is 10, and the number
      of current VTY users on line is 1.
<PE1>display version
Huawei Versatile Routing Platform Software
VRP (R) software, Version 8.180 (NE40E V800R011C00SPC200)
Copyright (C) 2012-2018 Huawei Technologies Co., Ltd.
HUAWEI NE40E-X8A uptime is 120 days, 3 hours,  10 minutes
<PE1>display ospf peer brief
          OSPF Process 1 with Router ID 1.1.1.1
                  Peer Statistic Information
 ----------------------------------------------------------------------------
 Area Id          Interface                        Neighbor id      State
 0.0.0.0          GigabitEthernet0/0/1             2.2.2.2          Full
 ----------------------------------------------------------------------------
 Total Peer(s):      1
<PE1>display alarm active
Sequence   AlarmId    Severity Date Time  Description
------------------------------------------------------------------------------
1          0x8520003  Major    2024-01-02 10:11:12 The interface status changes.
                                (ifName=GigabitEthernet0/0/1,
                                AdminStatus=UP, OperStatus=DOWN)
2          0x8130059  Critical 2024-01-02 10:12:00 The board was removed.
------------------------------------------------------------------------------
<PE1>display lldp neighbor brief
Error: Unrecognized command found at '^' position.
<PE1>quit
";

#[test]
fn session_yields_one_block_per_command() {
    let run = parse_capture(SESSION);
    assert_eq!(run.prompt_hostname.as_deref(), Some("PE1"));
    assert!(run.aborted.is_none());
    let types: Vec<BlockType> = run.blocks.iter().map(|b| b.block_type).collect();
    assert_eq!(
        types,
        vec![BlockType::Version, BlockType::OspfPeer, BlockType::Alarm]
    );
    assert_eq!(run.error_count(), 0);
    assert_eq!(run.warning_count(), 0);

    let BlockRecords::Alarm(alarms) = &single_block(&run, BlockType::Alarm).records else {
        panic!("expected alarm records");
    };
    assert_eq!(alarms.len(), 2);
    assert_eq!(
        alarms[0].info,
        "The interface status changes. (ifName=GigabitEthernet0/0/1, AdminStatus=UP, OperStatus=DOWN)"
    );
    assert_eq!(alarms[0].interface.as_deref(), Some("GigabitEthernet0/0/1"));
    assert_eq!(alarms[1].interface, None);
}

#[test]
fn block_serializes_to_transfer_shape() {
    let run = parse_capture(SESSION);
    let block = single_block(&run, BlockType::OspfPeer);
    let value = serde_json::to_value(block).unwrap();
    assert_eq!(value["type"], "ospf_peer");
    assert_eq!(value["records"][0]["neighbor_id"], "2.2.2.2");
    assert_eq!(value["records"][0]["area"], "0.0.0.0");
    assert!(value["errors"].as_array().unwrap().is_empty());
    assert!(value["warnings"].as_array().unwrap().is_empty());
    for field in [
        "lines_processed",
        "rules_matched",
        "noise_dropped",
        "unrecognized",
        "handler_failures",
        "duration_us",
    ] {
        assert!(value["stats"].get(field).is_some(), "missing stats.{field}");
    }
}

#[test]
fn unrecognized_line_is_one_warning_with_excerpt() {
    let run = parse_capture(
        "\
Local Intf       Neighbor Dev             Neighbor Intf             Exptime(s)
GE0/0/1          SW2                      GE0/0/2                   101
this line is not part of any table
GE0/0/3          SW3                      GE0/0/4                   99
",
    );
    let block = single_block(&run, BlockType::LldpNeighbor);
    assert_eq!(block.record_count(), 2);
    assert_eq!(block.warnings.len(), 1);
    assert_eq!(block.warnings[0].excerpt, "this line is not part of any table");
    assert_eq!(block.stats.unrecognized, 1);
}
