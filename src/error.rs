use std::{
    io,
    net::AddrParseError,
    num::{ParseFloatError, ParseIntError, TryFromIntError},
};

use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;
use tokio::task::JoinError;

#[cfg(feature = "service")]
use sqlx::Error as SqlxError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum NetsnapError {
    #[error("Capture aborted: {0}")]
    Aborted(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Custom error: {0}")]
    Custom(String),
    #[error("Ingest error: {0}")]
    Ingest(String),
    #[error("File System error: {0}")]
    Io(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("You do not have permission to access this resource")]
    PermissionDenied,
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
    #[error("Store error: {0}")]
    Store(String),
}

impl NetsnapError {
    /// Shorthand used by rule handlers when a captured field fails to convert.
    pub fn parse(msg: impl Into<String>) -> Self {
        NetsnapError::Parse(msg.into())
    }
}

impl From<toml::de::Error> for NetsnapError {
    fn from(src: toml::de::Error) -> NetsnapError {
        NetsnapError::Config(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for NetsnapError {
    fn from(src: toml::ser::Error) -> NetsnapError {
        NetsnapError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for NetsnapError {
    fn from(src: JsonError) -> NetsnapError {
        NetsnapError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<io::Error> for NetsnapError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => NetsnapError::NotFound(format!("{x}")),
            io::ErrorKind::PermissionDenied => NetsnapError::PermissionDenied,
            _ => NetsnapError::Io(format!("IOError: {}: {x}", x.kind())),
        }
    }
}

impl From<RegexError> for NetsnapError {
    fn from(x: RegexError) -> Self {
        NetsnapError::Parse(format!("Regex parse failed: {x}"))
    }
}

impl From<ParseIntError> for NetsnapError {
    fn from(x: ParseIntError) -> Self {
        NetsnapError::Parse(format!("invalid integer: {x}"))
    }
}

impl From<ParseFloatError> for NetsnapError {
    fn from(x: ParseFloatError) -> Self {
        NetsnapError::Parse(format!("invalid number: {x}"))
    }
}

impl From<TryFromIntError> for NetsnapError {
    fn from(x: TryFromIntError) -> Self {
        NetsnapError::Parse(format!("integer out of range: {x}"))
    }
}

impl From<AddrParseError> for NetsnapError {
    fn from(x: AddrParseError) -> Self {
        NetsnapError::Parse(format!("invalid address: {x}"))
    }
}

impl From<JoinError> for NetsnapError {
    fn from(x: JoinError) -> Self {
        if x.is_panic() {
            NetsnapError::Custom(format!("device task panicked: {x}"))
        } else {
            NetsnapError::Aborted(format!("device task cancelled: {x}"))
        }
    }
}

#[cfg(feature = "service")]
impl From<SqlxError> for NetsnapError {
    fn from(db_error: SqlxError) -> Self {
        NetsnapError::Store(format!("database error: {db_error:?}"))
    }
}

#[cfg(feature = "service")]
impl From<sqlx::migrate::MigrateError> for NetsnapError {
    fn from(db_error: sqlx::migrate::MigrateError) -> Self {
        NetsnapError::Store(format!("migration error: {db_error}"))
    }
}
