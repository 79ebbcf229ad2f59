//! Fuel consumption, overall and split by vehicle speed range.
//!
//! Regeneration burns extra fuel for the filter, so regen rows are kept out
//! of the speed ranges; their consumption is reported by the regen section.

use std::collections::BTreeMap;

use crate::analyzers::derived::{distance_km, fuel_liters, liters_per_100km};
use crate::analyzers::types::{FuelConsumption, FuelTotals, SpeedRangeStats};
use crate::analyzers::utility::{RoundTo, mean, sum};
use crate::config::{AnalysisConfig, SpeedBucket};
use crate::model::{Segment, Signal};

pub fn extract(segment: &Segment, config: &AnalysisConfig) -> FuelConsumption {
    FuelConsumption {
        overall: totals(segment, config),
        by_speed_range: by_speed_range(segment, config),
    }
}

/// Litres burnt over the segment and the matching L/100 km.
pub fn totals(segment: &Segment, config: &AnalysisConfig) -> FuelTotals {
    let liters = fuel_liters(segment, config.diesel_density, config.cylinders);
    FuelTotals {
        total_l: liters.round_to(2),
        avg_l100km: liters_per_100km(liters, distance_km(segment)).round_to(2),
    }
}

fn by_speed_range(segment: &Segment, config: &AnalysisConfig) -> BTreeMap<String, SpeedRangeStats> {
    if !segment.has(Signal::Speed) {
        return BTreeMap::new();
    }

    let steady = segment.filter(|s| !s.is_regen());
    config
        .speed_buckets()
        .into_iter()
        .filter_map(|bucket| {
            let rows = steady.filter(|s| s.get(Signal::Speed).is_some_and(|v| bucket.contains(v)));
            if rows.is_empty() {
                return None;
            }
            Some((bucket.label.clone(), range_stats(&rows, &bucket, config)))
        })
        .collect()
}

fn range_stats(rows: &Segment, bucket: &SpeedBucket, config: &AnalysisConfig) -> SpeedRangeStats {
    // the first row after a range change carries the interval spent elsewhere
    let km: Vec<f64> = rows
        .samples()
        .iter()
        .filter(|s| s.time_diff > 0.0)
        .filter_map(|s| s.get(Signal::Speed).map(|v| v * s.time_diff / 3600.0))
        .collect();
    let total_km = sum(&km).or(Some(0.0));

    let avg_revs = rows
        .column(Signal::Revs)
        .and_then(|c| mean(&c.to_vec()));

    let liters = fuel_liters(rows, config.diesel_density, config.cylinders);

    tracing::trace!(range = %bucket.label, rows = rows.len(), "Speed range summarized");

    SpeedRangeStats {
        total_km: total_km.round_to(2),
        avg_revs: avg_revs.round_to(2),
        avg_l100km: liters_per_100km(liters, total_km).round_to(2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnSet, Sample, Trip};
    use chrono::NaiveDate;

    // (speed, revs, injFlow, regen), one second apart
    fn segment(rows: &[(f64, f64, f64, f64)]) -> Segment {
        let base = NaiveDate::from_ymd_opt(2025, 3, 28)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        let samples = rows
            .iter()
            .enumerate()
            .map(|(i, &(speed, revs, inj, regen))| {
                Sample::new(i, base + chrono::Duration::seconds(i as i64))
                    .with(Signal::Speed, speed)
                    .with(Signal::Revs, revs)
                    .with(Signal::InjFlow, inj)
                    .with(Signal::Regen, regen)
            })
            .collect();
        let columns: ColumnSet = [Signal::Speed, Signal::Revs, Signal::InjFlow, Signal::Regen]
            .into_iter()
            .collect();
        let trip = Trip::new(samples, columns).unwrap();
        trip.segment(0..trip.len())
    }

    #[test]
    fn test_empty_ranges_are_omitted() {
        let seg = segment(&[
            (0.0, 800.0, 5.0, 0.0),
            (10.0, 1200.0, 10.0, 0.0),
            (12.0, 1300.0, 10.0, 0.0),
            (55.0, 2000.0, 20.0, 0.0),
        ]);
        let fuel = extract(&seg, &AnalysisConfig::default());
        let labels: Vec<&str> = fuel.by_speed_range.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["5-20", "50-60"]);

        let low = &fuel.by_speed_range["5-20"];
        assert_eq!(low.avg_revs, Some(1250.0));
        // 10 km/h and 12 km/h for one second each
        assert_eq!(low.total_km, Some(0.01));
    }

    #[test]
    fn test_regen_rows_are_excluded() {
        let seg = segment(&[
            (30.0, 1500.0, 10.0, 0.0),
            (35.0, 1500.0, 10.0, 1.0),
            (36.0, 1500.0, 10.0, 1.0),
        ]);
        let fuel = extract(&seg, &AnalysisConfig::default());
        assert_eq!(fuel.by_speed_range.len(), 1);
        // the only steady row is the first, whose interval is zero
        let range = &fuel.by_speed_range["30-40"];
        assert_eq!(range.total_km, Some(0.0));
        assert_eq!(range.avg_l100km, None);
    }

    #[test]
    fn test_overall_totals() {
        let seg = segment(&[(72.0, 1800.0, 20.0, 0.0), (72.0, 1800.0, 20.0, 0.0)]);
        let totals = totals(&seg, &AnalysisConfig::default());
        let liters = 1200.0 / 1e6 / 0.8375;
        assert_eq!(totals.total_l, Some(0.0));
        // 72 km/h for 1 s is 20 m
        assert_eq!(totals.avg_l100km, Some((liters * 100.0 / 0.02).round_to(2)));
    }

    #[test]
    fn test_without_speed_column() {
        let columns: ColumnSet = [Signal::Revs].into_iter().collect();
        let base = NaiveDate::from_ymd_opt(2025, 3, 28)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap();
        let seg = Segment::new(vec![Sample::new(0, base).with(Signal::Revs, 900.0)], columns);
        let fuel = extract(&seg, &AnalysisConfig::default());
        assert_eq!(fuel.overall, FuelTotals::default());
        assert!(fuel.by_speed_range.is_empty());
    }
}
