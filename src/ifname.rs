//! Interface-name utilities.
//!
//! Several commands print ports in an abbreviated form (`GE0/0/1`, `XGE1/0/3`, `Eth-Trunk1`)
//! while interface discovery (`display interface brief`) prints the long form
//! (`GigabitEthernet0/0/1`). [`canonicalize`] maps one to the other with a fixed prefix table.

use once_cell::sync::Lazy;
use regex::Regex;

/// `<hint><numbering>`: the hint is everything up to the last non-digit before the slot/port
/// numbering, the numbering is copied verbatim.
static SPLIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<hint>.*?[A-Za-z\-_ ])(?P<num>\d+(?:/\d+)*(?:[.:]\d+)?)$")
        .expect("interface split regex is valid")
});

static INTERFACE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d*[A-Za-z][A-Za-z0-9\-]*?\d+(?:/\d+)*(?:[.:]\d+)?$")
        .expect("interface token regex is valid")
});

/// Logical interfaces that carry no slot/port numbering.
const LOGICAL_PREFIXES: &[&str] = &[
    "vlanif",
    "loopback",
    "inloopback",
    "eth-trunk",
    "null",
    "tunnel",
    "vbdif",
    "meth",
    "nve",
    "dialer",
    "virtual-template",
];

/// Normalized hint => long-form prefix. Long forms map to themselves so canonicalization is
/// idempotent.
const PREFIXES: &[(&str, &str)] = &[
    ("ge", "GigabitEthernet"),
    ("gi", "GigabitEthernet"),
    ("gigabitethernet", "GigabitEthernet"),
    ("xge", "XGigabitEthernet"),
    ("xgigabitethernet", "XGigabitEthernet"),
    ("te", "TenGigabitEthernet"),
    ("tengigabitethernet", "TenGigabitEthernet"),
    ("10ge", "10GE"),
    ("25ge", "25GE"),
    ("40ge", "40GE"),
    ("50ge", "50GE"),
    ("100ge", "100GE"),
    ("200ge", "200GE"),
    ("400ge", "400GE"),
    ("fe", "Ethernet"),
    ("eth", "Ethernet"),
    ("ethernet", "Ethernet"),
    ("fa", "FastEthernet"),
    ("fastethernet", "FastEthernet"),
    ("hu", "HundredGigE"),
    ("hundredgige", "HundredGigE"),
    ("ethtrunk", "Eth-Trunk"),
    ("trunk", "Eth-Trunk"),
    ("vlanif", "Vlanif"),
    ("vlan", "Vlanif"),
    ("lo", "LoopBack"),
    ("loop", "LoopBack"),
    ("loopback", "LoopBack"),
    ("meth", "MEth"),
    ("tun", "Tunnel"),
    ("tunnel", "Tunnel"),
    ("null", "NULL"),
];

fn normalize_hint(hint: &str) -> String {
    hint.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Long-form name for an (possibly abbreviated) interface name, `None` when the hint is unknown.
pub fn canonicalize(name: &str) -> Option<String> {
    let caps = SPLIT.captures(name.trim())?;
    let hint = normalize_hint(&caps["hint"]);
    PREFIXES
        .iter()
        .find(|(short, _)| *short == hint)
        .map(|(_, long)| format!("{long}{}", &caps["num"]))
}

/// True when a table token is shaped like an interface name rather than a VPN instance or a
/// free-form flag.
pub fn looks_like_interface(token: &str) -> bool {
    if !INTERFACE_TOKEN.is_match(token) {
        return false;
    }
    let lower = token.to_ascii_lowercase();
    token.contains('/') || LOGICAL_PREFIXES.iter().any(|p| lower.starts_with(p))
}
