//! Filter regeneration events.
//!
//! A regeneration may stop and resume within one segment, so the flag series
//! is split into blocks of consecutive flagged rows and the duration is the
//! sum of the block spans.

use std::ops::Range;

use crate::analyzers::derived::{distance_km, fuel_liters, liters_per_100km};
use crate::analyzers::fap::soot;
use crate::analyzers::types::{FapRegen, PressureStats, RegenFuel, RevsStats, SpeedStats, TempStats};
use crate::analyzers::utility::RoundTo;
use crate::config::AnalysisConfig;
use crate::model::{Sample, Segment, Signal, seconds_between};

/// Returns `None` when the flag column is absent or never set.
pub fn extract(segment: &Segment, config: &AnalysisConfig) -> Option<FapRegen> {
    segment.column(Signal::Regen)?;
    let blocks = regen_blocks(segment.samples());
    if blocks.is_empty() {
        return None;
    }

    let samples = segment.samples();
    let duration: f64 = blocks
        .iter()
        .map(|b| seconds_between(samples[b.start].timestamp, samples[b.end - 1].timestamp))
        .sum();

    let regen = segment.filter(Sample::is_regen);
    let steady = segment.filter(|s| s.get(Signal::Regen) == Some(0.0));

    let consumption = |rows: &Segment| {
        liters_per_100km(
            fuel_liters(rows, config.diesel_density, config.cylinders),
            distance_km(rows),
        )
        .round_to(2)
    };
    let stats_of = |signal: Signal| regen.column(signal).map(|c| c.to_vec()).unwrap_or_default();

    Some(FapRegen {
        previous_regen: regen.column(Signal::LastRegen).and_then(|c| c.last()).round_to(0),
        duration: Some(duration),
        episodes: u32::try_from(blocks.len()).unwrap_or(u32::MAX),
        distance_km: distance_km(&regen).round_to(2),
        speed: SpeedStats::from_values(&stats_of(Signal::Speed), 2),
        fap_temp: TempStats::from_values(&stats_of(Signal::FapTemp), 2),
        fap_pressure: PressureStats::from_values(&stats_of(Signal::FapPressure), 2),
        revs: RevsStats::from_values(&stats_of(Signal::Revs), 2),
        fap_soot: soot(&regen, 2),
        fuel_consumption: RegenFuel {
            regen: consumption(&regen),
            non_regen: consumption(&steady),
        },
    })
}

/// Index ranges of maximal runs of flagged samples. Any row that is not
/// flagged, null included, ends a run.
pub fn regen_blocks(samples: &[Sample]) -> Vec<Range<usize>> {
    let mut blocks = Vec::new();
    let mut start = None;
    for (i, sample) in samples.iter().enumerate() {
        match (sample.is_regen(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                blocks.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        blocks.push(s..samples.len());
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnSet, Trip};
    use chrono::NaiveDate;

    fn segment(flags: &[f64], extra: impl Fn(usize, Sample) -> Sample, columns: &[Signal]) -> Segment {
        let base = NaiveDate::from_ymd_opt(2025, 2, 5)
            .unwrap()
            .and_hms_opt(16, 20, 0)
            .unwrap();
        let samples = flags
            .iter()
            .enumerate()
            .map(|(i, &flag)| {
                let s = Sample::new(i, base + chrono::Duration::seconds(i as i64))
                    .with(Signal::Regen, flag);
                extra(i, s)
            })
            .collect();
        let mut columns: ColumnSet = columns.iter().copied().collect();
        columns.insert(Signal::Regen);
        let trip = Trip::new(samples, columns).unwrap();
        trip.segment(0..trip.len())
    }

    #[test]
    fn test_duration_sums_block_spans() {
        let flags = [0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0];
        let seg = segment(&flags, |_, s| s, &[]);

        let blocks = regen_blocks(seg.samples());
        assert_eq!(blocks, vec![2..5, 7..9]);

        let regen = extract(&seg, &AnalysisConfig::default()).unwrap();
        assert_eq!(regen.duration, Some(3.0));
        assert_eq!(regen.episodes, 2);
    }

    #[test]
    fn test_no_regen_is_none() {
        let seg = segment(&[0.0, 0.0, 0.0], |_, s| s, &[]);
        assert!(extract(&seg, &AnalysisConfig::default()).is_none());
    }

    #[test]
    fn test_absent_flag_column_is_none() {
        let seg = segment(&[1.0, 1.0], |_, s| s, &[]);
        let without_flag = Segment::new(seg.samples().to_vec(), ColumnSet::new());
        assert!(extract(&without_flag, &AnalysisConfig::default()).is_none());
    }

    #[test]
    fn test_block_running_to_the_end() {
        let seg = segment(&[0.0, 1.0, 1.0, 1.0], |_, s| s, &[]);
        assert_eq!(regen_blocks(seg.samples()), vec![1..4]);
        let regen = extract(&seg, &AnalysisConfig::default()).unwrap();
        assert_eq!(regen.duration, Some(2.0));
    }

    #[test]
    fn test_statistics_use_regen_rows_only() {
        let flags = [0.0, 1.0, 1.0, 0.0];
        let seg = segment(
            &flags,
            |i, s| {
                let s = s
                    .with(Signal::Speed, 36.0 + i as f64)
                    .with(Signal::FapTemp, 300.0 + 100.0 * i as f64)
                    .with(Signal::FapSoot, 20.0 - i as f64);
                if i == 2 { s.with(Signal::LastRegen, 0.0) } else { s.with(Signal::LastRegen, 420.0) }
            },
            &[Signal::Speed, Signal::FapTemp, Signal::FapSoot, Signal::LastRegen],
        );
        let regen = extract(&seg, &AnalysisConfig::default()).unwrap();
        assert_eq!(regen.speed.min, Some(37.0));
        assert_eq!(regen.speed.max, Some(38.0));
        assert_eq!(regen.fap_temp.avg, Some(450.0));
        assert_eq!(regen.fap_soot.start, Some(19.0));
        assert_eq!(regen.fap_soot.diff, Some(-1.0));
        assert_eq!(regen.previous_regen, Some(0.0));
        // 37 and 38 km/h for one second each
        assert_eq!(regen.distance_km, Some(0.02));
        assert_eq!(regen.fuel_consumption, RegenFuel::default());
    }
}
