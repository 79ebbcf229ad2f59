//! Gap-based trip segmentation.
//!
//! A logger that was paused and resumed leaves one long sampling gap in an
//! otherwise regular series. Any gap above `gap_multiplier` times the median
//! sampling interval starts a new segment.

use tracing::debug;

use crate::analyzers::utility::median;
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::model::{Segment, Trip};

/// Returns the gap threshold in seconds for `trip`.
pub fn gap_threshold(trip: &Trip, multiplier: f64) -> f64 {
    let diffs: Vec<f64> = trip.samples().iter().map(|s| s.time_diff).collect();
    median(&diffs).unwrap_or(0.0) * multiplier
}

/// Indices of the samples that start a new segment after a gap.
pub fn split_points(trip: &Trip, threshold: f64) -> Vec<usize> {
    // a zero threshold would turn every non-duplicate timestamp into a gap
    if threshold <= 0.0 {
        return Vec::new();
    }
    trip.samples()
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, s)| s.time_diff > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Splits `trip` into segments.
///
/// Without any gap the whole trip is the only piece. Every piece shorter than
/// `min_segment_len` is dropped, so the result may be empty.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] for a trip without samples.
pub fn segment_trip(trip: &Trip, config: &AnalysisConfig) -> Result<Vec<Segment>> {
    if trip.is_empty() {
        return Err(AnalysisError::InvalidInput("trip has no samples".into()));
    }

    let threshold = gap_threshold(trip, config.gap_multiplier);
    let splits = split_points(trip, threshold);

    let mut bounds = Vec::with_capacity(splits.len() + 2);
    bounds.push(0);
    bounds.extend(splits);
    bounds.push(trip.len());

    let segments: Vec<Segment> = bounds
        .windows(2)
        .map(|w| w[0]..w[1])
        .filter(|range| range.len() >= config.min_segment_len)
        .map(|range| trip.segment(range))
        .collect();

    debug!(
        threshold_sec = threshold,
        pieces = bounds.len() - 1,
        kept = segments.len(),
        "Trip segmented"
    );

    Ok(segments)
}
