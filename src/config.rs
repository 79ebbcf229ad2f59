//! Analysis tuning parameters.
//!
//! Stored as a JSON object on disk; every field is optional and falls back to
//! the defaults used for a four-cylinder diesel:
//! ```json
//! {
//!   "diesel_density": 0.8375,
//!   "cylinders": 4,
//!   "speed_bucket_edges": [5, 20, 30, 40, 50, 60, 70, 80, 90, 100]
//! }
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Default directory holding uploaded logs, addressed by file id.
pub const DEFAULT_STORAGE_PATH: &str = "/tmp/uploads";

/// Parameters of the analysis engine that vary between vehicles and loggers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// kg/L
    pub diesel_density: f64,
    pub cylinders: u32,
    /// A sample gap above `gap_multiplier * median(timeDiff)` starts a new segment.
    pub gap_multiplier: f64,
    /// Segments with fewer rows are discarded.
    pub min_segment_len: usize,
    /// Lower edges of the fuel speed buckets in km/h. The last edge opens an
    /// unbounded bucket labelled `"<edge>+"`.
    pub speed_bucket_edges: Vec<f64>,
    /// Coolant or oil below this temperature marks a cold start.
    pub cold_start_c: f64,
    pub coolant_warm_c: f64,
    pub oil_warm_c: f64,
    /// Upper engine speed bound for idle filter pressure readings.
    pub idle_max_revs: f64,
    pub sentinels: Sentinels,
}

/// Raw values some ECUs report instead of a real reading. Rows carrying them
/// are dropped while parsing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Sentinels {
    pub fap_pressure: Option<f64>,
    pub fap_temp: Option<f64>,
}

impl Default for Sentinels {
    fn default() -> Self {
        Self {
            fap_pressure: Some(65280.0),
            fap_temp: Some(25855.0),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let mut edges = vec![5.0];
        edges.extend((2..=20).map(|tens| f64::from(tens) * 10.0));

        Self {
            diesel_density: 0.8375,
            cylinders: 4,
            gap_multiplier: 3.0,
            min_segment_len: 5,
            speed_bucket_edges: edges,
            cold_start_c: 40.0,
            coolant_warm_c: 80.0,
            oil_warm_c: 90.0,
            idle_max_revs: 1000.0,
            sentinels: Sentinels::default(),
        }
    }
}

/// One fuel consumption speed range, `[low, high)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedBucket {
    pub label: String,
    pub low: f64,
    pub high: Option<f64>,
}

impl SpeedBucket {
    pub fn contains(&self, speed: f64) -> bool {
        speed >= self.low && self.high.is_none_or(|high| speed < high)
    }
}

impl AnalysisConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read analysis config '{path}'"))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("invalid analysis config '{path}'"))?;
        Ok(config)
    }

    /// Builds the config from the environment: `ANALYSIS_CONFIG` names a JSON
    /// file, `DIESEL_DENSITY` and `CYLINDERS` override single values.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("ANALYSIS_CONFIG") {
            Ok(path) if !path.is_empty() => Self::load(&path)?,
            _ => Self::default(),
        };

        if let Ok(raw) = std::env::var("DIESEL_DENSITY") {
            config.diesel_density = raw
                .parse()
                .with_context(|| format!("DIESEL_DENSITY is not a number: '{raw}'"))?;
        }
        if let Ok(raw) = std::env::var("CYLINDERS") {
            config.cylinders = raw
                .parse()
                .with_context(|| format!("CYLINDERS is not an integer: '{raw}'"))?;
        }

        Ok(config)
    }

    /// Speed ranges in ascending order, derived from `speed_bucket_edges`.
    pub fn speed_buckets(&self) -> Vec<SpeedBucket> {
        let edges = &self.speed_bucket_edges;
        edges
            .iter()
            .enumerate()
            .map(|(i, &low)| match edges.get(i + 1) {
                Some(&high) => SpeedBucket {
                    label: format!("{low}-{high}"),
                    low,
                    high: Some(high),
                },
                None => SpeedBucket {
                    label: format!("{low}+"),
                    low,
                    high: None,
                },
            })
            .collect()
    }
}

/// Resolves a bare file id to `{STORAGE_PATH}/{id}.csv`. Anything that already
/// looks like a path is returned unchanged.
pub fn resolve_storage_path(source: &str) -> PathBuf {
    let as_path = PathBuf::from(source);
    if as_path.extension().is_some() || as_path.components().count() > 1 {
        return as_path;
    }
    let storage =
        std::env::var("STORAGE_PATH").unwrap_or_else(|_| DEFAULT_STORAGE_PATH.to_string());
    PathBuf::from(storage).join(format!("{source}.csv"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buckets_match_fleet_ranges() {
        let buckets = AnalysisConfig::default().speed_buckets();
        assert_eq!(buckets.len(), 20);
        assert_eq!(buckets[0].label, "5-20");
        assert_eq!(buckets[1].label, "20-30");
        assert_eq!(buckets[18].label, "190-200");
        assert_eq!(buckets[19].label, "200+");
        assert_eq!(buckets[19].high, None);
    }

    #[test]
    fn test_bucket_bounds_are_half_open() {
        let buckets = AnalysisConfig::default().speed_buckets();
        assert!(buckets[0].contains(5.0));
        assert!(!buckets[0].contains(20.0));
        assert!(buckets[1].contains(20.0));
        assert!(!buckets[0].contains(4.9));
        assert!(buckets[19].contains(250.0));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AnalysisConfig = serde_json::from_str(r#"{"cylinders": 6}"#).unwrap();
        assert_eq!(config.cylinders, 6);
        assert_eq!(config.diesel_density, 0.8375);
        assert_eq!(config.min_segment_len, 5);
        assert_eq!(config.sentinels.fap_pressure, Some(65280.0));
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AnalysisConfig::load("/nonexistent/analysis.json").is_err());
    }

    #[test]
    fn test_resolve_keeps_explicit_paths() {
        assert_eq!(
            resolve_storage_path("logs/trip.csv"),
            PathBuf::from("logs/trip.csv")
        );
    }
}
