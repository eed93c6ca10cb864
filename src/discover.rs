//! Finding device captures under a root directory.
//!
//! Every immediate subdirectory of the root is one device folder, and the folder name is the
//! hostname hint. Loose files directly under the root are single-file devices hinted by their
//! file stem. Hidden entries are ignored.

use serde::Serialize;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

use crate::{config::NetsnapConfig, error::NetsnapError};

/// One device's capture, ready for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSource {
    /// Hostname used until the capture names the device itself
    pub hostname_hint: String,
    pub capture: PathBuf,
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

fn entries(dir: &Path) -> impl Iterator<Item = DirEntry> + '_ {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| match e {
            Ok(e) => Some(e),
            Err(err) => {
                tracing::warn!("[discover] skipping unreadable entry: {}", err);
                None
            }
        })
}

fn file_size(entry: &DirEntry) -> u64 {
    entry.metadata().map(|m| m.len()).unwrap_or(0)
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Pick the capture file of a device folder: the first configured preferred name present, else
/// the largest text-like file, else the first file by name.
pub fn select_capture(folder: &Path, config: &NetsnapConfig) -> Option<PathBuf> {
    let files: Vec<DirEntry> = entries(folder)
        .filter(|e| e.file_type().is_file())
        .collect();

    for preferred in config.capture_file_names.iter() {
        let found = files.iter().find(|e| {
            e.file_name()
                .to_str()
                .map(|name| name.eq_ignore_ascii_case(preferred))
                .unwrap_or(false)
        });
        if let Some(entry) = found {
            return Some(entry.path().to_path_buf());
        }
    }

    let largest_text = files
        .iter()
        .filter(|e| has_extension(e.path(), &config.capture_extensions))
        // max_by_key returns the last maximum; reverse so ties go to the first name.
        .rev()
        .max_by_key(|e| file_size(e));
    if let Some(entry) = largest_text {
        return Some(entry.path().to_path_buf());
    }

    files.first().map(|e| e.path().to_path_buf())
}

/// List the devices under `root`, sorted by hostname hint.
pub fn discover_devices(
    root: &Path,
    config: &NetsnapConfig,
) -> Result<Vec<DeviceSource>, NetsnapError> {
    if !root.is_dir() {
        return Err(NetsnapError::NotFound(format!(
            "capture root {root:?} is not a directory"
        )));
    }
    let mut devices = Vec::new();
    for entry in entries(root) {
        let path = entry.path();
        if entry.file_type().is_dir() {
            let hint = entry.file_name().to_string_lossy().to_string();
            match select_capture(path, config) {
                Some(capture) => devices.push(DeviceSource {
                    hostname_hint: hint,
                    capture,
                }),
                None => tracing::warn!("[discover] device folder {:?} has no files", path),
            }
        } else if entry.file_type().is_file() {
            let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
                continue;
            };
            devices.push(DeviceSource {
                hostname_hint: stem,
                capture: path.to_path_buf(),
            });
        }
    }
    devices.sort_by(|a, b| a.hostname_hint.cmp(&b.hostname_hint));
    tracing::info!("[discover] {} devices under {:?}", devices.len(), root);
    Ok(devices)
}
