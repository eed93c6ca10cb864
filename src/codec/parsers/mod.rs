//! Built-in block parser variants (Huawei VRP style `display` output).

use crate::error::NetsnapError;

pub mod alarm;
pub mod arp;
pub mod bgp;
pub mod device;
pub mod interface;
pub mod lldp;
pub mod optical;
pub mod ospf;
pub mod route;
pub mod sysname;
pub mod version;

/// `-` and `--` mean "not applicable" in every VRP table.
pub(crate) fn dash_none(value: &str) -> Option<String> {
    match value.trim() {
        "" | "-" | "--" => None,
        v => Some(v.to_string()),
    }
}

/// `0.01%` => `Some(0.01)`, `--` => `None`.
pub(crate) fn parse_percent(value: &str) -> Result<Option<f64>, NetsnapError> {
    match dash_none(value) {
        None => Ok(None),
        Some(v) => Ok(Some(v.trim_end_matches('%').parse::<f64>()?)),
    }
}

pub(crate) fn parse_opt_u32(value: &str) -> Result<Option<u32>, NetsnapError> {
    match dash_none(value) {
        None => Ok(None),
        Some(v) => Ok(Some(v.parse::<u32>()?)),
    }
}

pub(crate) fn parse_opt_f64(value: &str) -> Result<Option<f64>, NetsnapError> {
    match dash_none(value) {
        None => Ok(None),
        Some(v) => Ok(Some(v.parse::<f64>()?)),
    }
}

/// Collapse every whitespace run to a single space.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_values() {
        assert_eq!(dash_none("--"), None);
        assert_eq!(dash_none(" - "), None);
        assert_eq!(dash_none("up").as_deref(), Some("up"));
        assert_eq!(parse_percent("0.01%").unwrap(), Some(0.01));
        assert_eq!(parse_percent("--").unwrap(), None);
        assert!(parse_percent("abc%").is_err());
        assert_eq!(parse_opt_u32("-").unwrap(), None);
        assert_eq!(parse_opt_f64("-3.5").unwrap(), Some(-3.5));
    }

    #[test]
    fn whitespace_collapse() {
        assert_eq!(collapse_whitespace("  a   b\t c "), "a b c");
    }
}
