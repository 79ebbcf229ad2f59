use std::time::Instant;

use tracing::{debug, info};

use crate::analyzers::segment::segment_trip;
use crate::analyzers::types::AnalysisResult;
use crate::analyzers::{driving, engine, fap, fap_regen, fuel, overall};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::model::{Segment, Signal, Trip};
use crate::parser::parse_log;

/// Parses a raw log and analyzes every trip segment in it.
///
/// # Errors
///
/// Fails with [`AnalysisError::InvalidInput`] if the log has no valid rows,
/// lacks the `Date`/`Time` columns, or yields no segment long enough to keep.
#[tracing::instrument(skip_all, fields(bytes = bytes.len()))]
pub fn analyze_log(bytes: &[u8], config: &AnalysisConfig) -> Result<Vec<AnalysisResult>> {
    let trip = parse_log(bytes, config)?;
    analyze_trip(&trip, config)
}

/// Splits `trip` into segments and summarizes each one.
#[tracing::instrument(skip_all, fields(rows = trip.len()))]
pub fn analyze_trip(trip: &Trip, config: &AnalysisConfig) -> Result<Vec<AnalysisResult>> {
    let started = Instant::now();

    let segments = segment_trip(trip, config)?;
    if segments.is_empty() {
        return Err(AnalysisError::InvalidInput(format!(
            "no segment with at least {} samples",
            config.min_segment_len
        )));
    }

    let missing: Vec<&str> = Signal::ALL
        .iter()
        .filter(|s| !trip.columns().contains(s))
        .map(|s| s.header())
        .collect();
    if !missing.is_empty() {
        debug!(?missing, "Columns absent from log");
    }

    let results: Vec<AnalysisResult> = segments
        .iter()
        .map(|segment| analyze_segment(segment, config))
        .collect();

    info!(
        segments = results.len(),
        regens = results.iter().filter(|r| r.fap_regen.is_some()).count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Trip analyzed"
    );

    Ok(results)
}

/// Runs every extractor over one segment.
pub fn analyze_segment(segment: &Segment, config: &AnalysisConfig) -> AnalysisResult {
    AnalysisResult {
        date: overall::date(segment),
        overall: overall::extract(segment),
        driving: driving::extract(segment, config),
        engine: engine::extract(segment, config),
        fap: fap::extract(segment, config),
        fap_regen: fap_regen::extract(segment, config),
        fuel_consumption: fuel::extract(segment, config),
    }
}
