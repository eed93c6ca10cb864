//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; later calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// A core router capture. The ARP and LLDP tables are printed before the interface table they
/// reference; `GE0/0/9` does not exist on the device.
#[allow(dead_code)]
pub const CORE_CAPTURE: &str = "\
<CORE-01>display arp all
IP ADDRESS      MAC ADDRESS     EXPIRE(M) TYPE        INTERFACE   VPN-INSTANCE
------------------------------------------------------------------------------
10.1.1.2        00e0-fc12-3456  20        D-0         GE0/0/1
10.9.9.9        00e0-fc12-9999  20        D-0         GE0/0/9
------------------------------------------------------------------------------
Total:2         Dynamic:2       Static:0     Interface:2

<CORE-01>display lldp neighbor brief
Local Intf       Neighbor Dev             Neighbor Intf             Exptime(s)
GE0/0/2          SW2                      GE0/0/24                  101

<CORE-01>display interface brief
Interface                   PHY   Protocol  InUti OutUti   inErrors  outErrors
GigabitEthernet0/0/1        up    up        0.01%  0.01%          0          0
GigabitEthernet0/0/2        *down down         0%     0%          0          3
LoopBack0                   up    up(s)        0%     0%          0          0

<CORE-01>display current-configuration | include sysname
 sysname CORE-01
<CORE-01>display ip routing-table
Route Flags: R - relay, D - download to fib
------------------------------------------------------------------------------
Routing Tables: Public
         Destinations : 2        Routes : 2

Destination/Mask    Proto   Pre  Cost      Flags NextHop         Interface

        0.0.0.0/0   Static  60   0          RD   10.1.1.2        GigabitEthernet0/0/1
      127.0.0.0/8   Direct  0    0           D   127.0.0.1       InLoopBack0

<CORE-01>
";

/// Interfaces written by [`CORE_CAPTURE`].
#[allow(dead_code)]
pub const CORE_INTERFACES: usize = 3;

/// Facts written by [`CORE_CAPTURE`]: one ARP entry, one LLDP neighbor, two routes.
#[allow(dead_code)]
pub const CORE_FACTS: usize = 4;

/// An access switch capture without any prompt. The device is known only by its folder until
/// the sysname line.
#[allow(dead_code)]
pub const ACCESS_CAPTURE: &str = "\
Interface                         IP Address/Mask      Physical   Protocol  VPN
Vlanif10                          10.10.0.1/24         up         up        --
LoopBack0                         2.2.2.2/32           up         up(s)     --

 sysname ACC-07

VRP (R) software, Version 5.170 (S5720 V200R011C10SPC500)
HUAWEI S5720-28X-SI-AC Routing Switch uptime is 0 week, 2 days, 1 hour, 5 minutes

IP ADDRESS      MAC ADDRESS     EXPIRE(M) TYPE        INTERFACE   VPN-INSTANCE
10.10.0.20      00e0-fc00-0020  15        D-0         Vlanif10
";

/// Lay out a capture root with one folder per `(folder, capture)` pair.
#[allow(dead_code)]
pub fn create_capture_root(temp_dir: &TempDir, devices: &[(&str, &str)]) -> PathBuf {
    let root = temp_dir.path().join("captures");
    std::fs::create_dir(&root).unwrap();
    for (folder, capture) in devices {
        write_device(&root, folder, capture);
    }
    root
}

#[allow(dead_code)]
pub fn write_device(root: &Path, folder: &str, capture: &str) {
    let dir = root.join(folder);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("capture.txt"), capture).unwrap();
}
