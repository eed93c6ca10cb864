//! Batch ingestion: discover device captures, parse each one and ingest its blocks into a fresh
//! snapshot.
//!
//! Devices are processed concurrently, one tokio task per device, bounded by
//! [`NetsnapConfig::max_concurrent_devices`]. A task owns its engine, context and interface cache;
//! only the snapshot and the store handle are shared. A failing device (unreadable file, store
//! error, panic) is recorded in the [`RunSummary`] and its siblings carry on.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, fmt, path::Path, sync::Arc};
use tokio::sync::Semaphore;

use crate::{
    codec::{BlockType, ParserRegistry, ParsingEngine},
    config::NetsnapConfig,
    discover::{discover_devices, DeviceSource},
    error::NetsnapError,
    ingest::{IngestReport, IngestionContext, IngestionOrchestrator},
    store::{NetworkStore, Snapshot},
};

/// Per-block slice of a device report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockSummary {
    pub block_type: BlockType,
    pub records: usize,
    pub errors: usize,
    pub warnings: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum DeviceStatus {
    Ok,
    /// Parsing stopped early; whatever was extracted before that was ingested.
    Aborted(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceReport {
    pub hostname_hint: String,
    /// Final device hostname, once the device made it into the store
    pub hostname: Option<String>,
    pub capture: String,
    /// Hex SHA-256 of the capture file
    pub digest: Option<String>,
    pub status: DeviceStatus,
    pub lines_scanned: usize,
    pub blocks: Vec<BlockSummary>,
    pub ingest: Vec<IngestReport>,
}

impl DeviceReport {
    fn new(source: &DeviceSource) -> Self {
        DeviceReport {
            hostname_hint: source.hostname_hint.clone(),
            hostname: None,
            capture: source.capture.to_string_lossy().to_string(),
            digest: None,
            status: DeviceStatus::Ok,
            lines_scanned: 0,
            blocks: Vec::new(),
            ingest: Vec::new(),
        }
    }

    fn failed(source: &DeviceSource, error: &NetsnapError) -> Self {
        let mut report = DeviceReport::new(source);
        report.status = DeviceStatus::Failed(error.to_string());
        report
    }

    pub fn parse_errors(&self) -> usize {
        self.blocks.iter().map(|b| b.errors).sum()
    }

    pub fn parse_warnings(&self) -> usize {
        self.blocks.iter().map(|b| b.warnings).sum()
    }

    pub fn skipped_records(&self) -> usize {
        self.ingest.iter().map(|r| r.skipped).sum()
    }
}

/// Read, parse and ingest one device capture into `snapshot`.
///
/// The device is first upserted under the capture's prompt hostname, falling back to the hint;
/// identity blocks may rename it during ingestion.
#[tracing::instrument(skip_all, fields(device = %source.hostname_hint))]
pub async fn process_device<S: NetworkStore>(
    source: &DeviceSource,
    snapshot: &Snapshot,
    store: &S,
    registry: &ParserRegistry,
    config: &NetsnapConfig,
) -> Result<DeviceReport, NetsnapError> {
    let mut report = DeviceReport::new(source);
    let bytes = tokio::fs::read(&source.capture).await?;
    report.digest = Some(hex::encode(Sha256::digest(&bytes)));
    let text = String::from_utf8_lossy(&bytes);

    let run = ParsingEngine::new(registry, config.max_consecutive_errors)
        .parse_reader(text.as_bytes())
        .await?;
    report.lines_scanned = run.lines_scanned;
    report.blocks = run
        .blocks
        .iter()
        .map(|b| BlockSummary {
            block_type: b.block_type,
            records: b.record_count(),
            errors: b.errors.len(),
            warnings: b.warnings.len(),
            success_rate: b.stats.success_rate(),
        })
        .collect();
    if let Some(reason) = &run.aborted {
        tracing::warn!(
            "[process_device] {:?} abandoned early: {}",
            source.capture,
            reason
        );
        report.status = DeviceStatus::Aborted(reason.clone());
    }

    let hostname = run
        .prompt_hostname
        .clone()
        .unwrap_or_else(|| source.hostname_hint.clone());
    let device = store.upsert_device(&hostname).await?;
    let mut ctx = IngestionContext::new(snapshot.clone(), device);
    report.ingest = IngestionOrchestrator::builtin()
        .ingest(&run.blocks, &mut ctx, store)
        .await?;
    report.hostname = Some(ctx.device().hostname.clone());

    let (hits, misses) = ctx.resolution_stats();
    tracing::info!(
        "[process_device] {} done: {} lines, {} blocks, {} interface hits, {} misses",
        ctx.device().hostname,
        report.lines_scanned,
        report.blocks.len(),
        hits,
        misses
    );
    Ok(report)
}

/// Outcome of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub snapshot: Snapshot,
    pub devices: Vec<DeviceReport>,
}

impl RunSummary {
    pub fn lines_scanned(&self) -> usize {
        self.devices.iter().map(|d| d.lines_scanned).sum()
    }

    pub fn blocks_by_type(&self) -> BTreeMap<BlockType, usize> {
        let mut counts = BTreeMap::new();
        for block in self.devices.iter().flat_map(|d| d.blocks.iter()) {
            *counts.entry(block.block_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn error_count(&self) -> usize {
        self.devices.iter().map(|d| d.parse_errors()).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.devices.iter().map(|d| d.parse_warnings()).sum()
    }

    pub fn failed_devices(&self) -> usize {
        self.devices
            .iter()
            .filter(|d| matches!(d.status, DeviceStatus::Failed(_)))
            .count()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "snapshot {}: {} devices, {} lines, {} parse errors, {} parse warnings",
            self.snapshot.id,
            self.devices.len(),
            self.lines_scanned(),
            self.error_count(),
            self.warning_count()
        )?;
        for (block_type, count) in self.blocks_by_type() {
            writeln!(f, "  {block_type:<20} {count:>6} blocks")?;
        }
        for device in self.devices.iter() {
            let name = device.hostname.as_deref().unwrap_or(&device.hostname_hint);
            let status = match &device.status {
                DeviceStatus::Ok => "ok".to_string(),
                DeviceStatus::Aborted(reason) => format!("aborted ({reason})"),
                DeviceStatus::Failed(reason) => format!("FAILED ({reason})"),
            };
            writeln!(
                f,
                "  {name}: {status}, {} blocks, {} records skipped",
                device.blocks.len(),
                device.skipped_records()
            )?;
            for block in device.blocks.iter().filter(|b| b.errors + b.warnings > 0) {
                writeln!(
                    f,
                    "    {}: {} records, {} errors, {} warnings, {:.0}% lines matched",
                    block.block_type,
                    block.records,
                    block.errors,
                    block.warnings,
                    block.success_rate * 100.0
                )?;
            }
        }
        Ok(())
    }
}

/// Ingest every device under `root` into a new snapshot.
pub async fn run_batch<S: NetworkStore>(
    root: &Path,
    config: &NetsnapConfig,
    store: S,
    label: Option<String>,
) -> Result<RunSummary, NetsnapError> {
    config.validate()?;
    let sources = discover_devices(root, config)?;
    let snapshot = store.create_snapshot(label).await?;
    tracing::info!(
        "[run_batch] snapshot {} for {} devices",
        snapshot.id,
        sources.len()
    );

    let registry = Arc::new(ParserRegistry::with_enabled(config.enabled_parsers));
    let limit = Arc::new(Semaphore::new(config.max_concurrent_devices));
    let config = Arc::new(config.clone());

    let mut handles = Vec::with_capacity(sources.len());
    for source in sources.iter().cloned() {
        let store = store.clone();
        let snapshot = snapshot.clone();
        let registry = registry.clone();
        let limit = limit.clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            let _permit = match limit.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return Err(NetsnapError::Aborted(e.to_string())),
            };
            process_device(&source, &snapshot, &store, &registry, &config).await
        }));
    }

    let mut devices = Vec::with_capacity(handles.len());
    for (source, handle) in sources.iter().zip(handles) {
        let report = match handle.await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                tracing::warn!("[run_batch] device {} failed: {}", source.hostname_hint, e);
                DeviceReport::failed(source, &e)
            }
            Err(join) => {
                let e = NetsnapError::from(join);
                tracing::warn!("[run_batch] device {} failed: {}", source.hostname_hint, e);
                DeviceReport::failed(source, &e)
            }
        };
        devices.push(report);
    }

    let summary = RunSummary { snapshot, devices };
    tracing::info!(
        "[run_batch] done: {} devices ({} failed), {} lines",
        summary.devices.len(),
        summary.failed_devices(),
        summary.lines_scanned()
    );
    Ok(summary)
}
