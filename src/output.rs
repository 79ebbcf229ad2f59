//! Output formatting and persistence for analysis results.
//!
//! Supports pretty-printed JSON to a file or stdout, and appending one CSV
//! summary row per analyzed segment.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::analyzers::types::AnalysisResult;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// One flat row per analyzed segment, for spreadsheets.
#[derive(Debug, Default, Serialize)]
pub struct SegmentSummary {
    pub file: String,
    pub segment: usize,
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub distance_km: Option<f64>,
    pub overall_sec: Option<f64>,
    pub driving_sec: Option<f64>,
    pub idle_sec: Option<f64>,
    pub fuel_total_l: Option<f64>,
    pub fuel_avg_l100km: Option<f64>,
    pub regen: bool,
    pub regen_duration_sec: Option<f64>,
}

impl SegmentSummary {
    pub fn from_result(file: &str, segment: usize, result: &AnalysisResult) -> Self {
        Self {
            file: file.to_string(),
            segment,
            date: result.date.date.clone(),
            start: result.date.start.clone(),
            end: result.date.end.clone(),
            distance_km: result.overall.distance_km,
            overall_sec: result.overall.duration.overall,
            driving_sec: result.overall.duration.driving,
            idle_sec: result.overall.duration.idle,
            fuel_total_l: result.fuel_consumption.overall.total_l,
            fuel_avg_l100km: result.fuel_consumption.overall.avg_l100km,
            regen: result.fap_regen.is_some(),
            regen_duration_sec: result.fap_regen.as_ref().and_then(|r| r.duration),
        }
    }
}

/// Writes `value` as pretty JSON to `path`, or to stdout when `path` is `None`.
pub fn write_json<T: Serialize>(path: Option<&str>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => {
            if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("failed to create {}", dir.display()))?;
            }
            std::fs::write(path, json).with_context(|| format!("failed to write {path}"))?;
            debug!(path, "JSON written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Appends a [`SegmentSummary`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, summary: &SegmentSummary) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(summary)?;
    writer.flush()?;

    Ok(())
}
