//! Physically derived quantities: distance, fuel volume and time buckets.

use crate::analyzers::utility::{finite, ratio, sum};
use crate::model::{Sample, Segment, Signal};

/// Distance in km, integrating speed (km/h) over each sample's `time_diff`.
///
/// `None` when the speed column is absent or has no values.
pub fn distance_km(segment: &Segment) -> Option<f64> {
    segment.column(Signal::Speed)?;
    let parts: Vec<f64> = segment
        .samples()
        .iter()
        .filter_map(|s| s.get(Signal::Speed).map(|v| v * s.time_diff / 3600.0))
        .collect();
    sum(&parts)
}

/// Fuel burnt in litres, from injected quantity per stroke and engine speed.
///
/// Per row: `injFlow [mg] * revs/60 * time_diff * cylinders/2`. A four-stroke
/// fires each cylinder every second revolution. Rows missing any input, or
/// yielding a non-finite value, are skipped. `None` when `InjFlow`, `Revs`
/// or `Speed` is absent, or no row is usable.
pub fn fuel_liters(segment: &Segment, diesel_density: f64, cylinders: u32) -> Option<f64> {
    for signal in [Signal::InjFlow, Signal::Revs, Signal::Speed] {
        segment.column(signal)?;
    }

    let injections_per_rev = f64::from(cylinders) / 2.0;
    let milligrams: Vec<f64> = segment
        .samples()
        .iter()
        .filter_map(|s| {
            let inj = s.get(Signal::InjFlow)?;
            let revs = s.get(Signal::Revs)?;
            s.get(Signal::Speed)?;
            finite(inj * (revs / 60.0 * s.time_diff) * injections_per_rev)
        })
        .collect();

    finite(sum(&milligrams)? / 1e6 / diesel_density)
}

/// Litres per 100 km, `None` for zero or missing distance.
pub fn liters_per_100km(liters: Option<f64>, km: Option<f64>) -> Option<f64> {
    match (liters, km) {
        (Some(l), Some(d)) if d > 0.0 => ratio(l * 100.0, d),
        _ => None,
    }
}

/// Time spent per engine and vehicle state, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Durations {
    pub overall: f64,
    pub engine_on: Option<f64>,
    pub engine_off: Option<f64>,
    pub idle: Option<f64>,
    pub driving: Option<f64>,
}

/// Splits a segment's time into state buckets.
///
/// `engine_on` counts rows with `revs > 0`, `engine_off` every other row, so
/// the two always add up to `overall`. `idle` is standing with the engine
/// running; `driving` is moving with the engine running (moving alone when
/// engine speed is not logged).
///
/// With a revs column, `driving` is stricter than `speed > 0`: a car rolling
/// with the engine off adds distance but no `driving` time, so
/// `idle + driving <= engine_on` holds. Driving-time weighted averages skip
/// such rows.
pub fn duration_buckets(segment: &Segment) -> Durations {
    let samples = segment.samples();
    let has_revs = segment.has(Signal::Revs);
    let has_speed = segment.has(Signal::Speed);

    let (engine_on, engine_off, overall) = if has_revs {
        let on = total_time(samples, |s| s.engine_running());
        let off = total_time(samples, |s| !s.engine_running());
        (Some(on), Some(off), on + off)
    } else {
        (None, None, total_time(samples, |_| true))
    };

    let idle = (has_revs && has_speed).then(|| {
        total_time(samples, |s| {
            s.get(Signal::Speed) == Some(0.0) && s.engine_running()
        })
    });

    let driving = has_speed
        .then(|| total_time(samples, |s| s.moving() && (!has_revs || s.engine_running())));

    Durations {
        overall,
        engine_on,
        engine_off,
        idle,
        driving,
    }
}

/// Starts from `+0.0`: `Sum` for `f64` yields `-0.0` on an empty iterator.
fn total_time(samples: &[Sample], keep: impl Fn(&Sample) -> bool) -> f64 {
    samples
        .iter()
        .filter(|s| keep(s))
        .fold(0.0, |acc, s| acc + s.time_diff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnSet, Trip};
    use chrono::NaiveDate;

    fn build(rows: &[(f64, f64, f64)], columns: &[Signal]) -> Segment {
        // rows: (revs, speed, injFlow), one second apart
        let base = NaiveDate::from_ymd_opt(2025, 1, 16)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let samples = rows
            .iter()
            .enumerate()
            .map(|(i, &(revs, speed, inj))| {
                Sample::new(i, base + chrono::Duration::seconds(i as i64))
                    .with(Signal::Revs, revs)
                    .with(Signal::Speed, speed)
                    .with(Signal::InjFlow, inj)
            })
            .collect();
        let columns: ColumnSet = columns.iter().copied().collect();
        let trip = Trip::new(samples, columns).unwrap();
        trip.segment(0..trip.len())
    }

    const ALL: [Signal; 3] = [Signal::Revs, Signal::Speed, Signal::InjFlow];

    fn cruise(n: usize) -> Vec<Sample> {
        let base = NaiveDate::from_ymd_opt(2025, 1, 16)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| {
                Sample::new(i, base + chrono::Duration::seconds(i as i64 * 10))
                    .with(Signal::Speed, 50.0)
            })
            .collect()
    }

    #[test]
    fn test_constant_speed_distance() {
        let samples = cruise(100)
            .into_iter()
            .map(|mut s| {
                s.time_diff = 10.0;
                s
            })
            .collect();
        let segment = Segment::new(samples, [Signal::Speed].into_iter().collect());
        let km = distance_km(&segment).unwrap();
        assert!((km - 100.0 * 10.0 * 50.0 / 3600.0).abs() < 1e-9);
        assert!((km - 13.9).abs() < 0.05);
    }

    #[test]
    fn test_normalized_trip_skips_first_interval() {
        let trip = Trip::new(cruise(100), [Signal::Speed].into_iter().collect()).unwrap();
        let km = distance_km(&trip.segment(0..100)).unwrap();
        assert!((km - 99.0 * 10.0 * 50.0 / 3600.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_absent_speed() {
        let segment = build(&[(800.0, 0.0, 5.0)], &[Signal::Revs]);
        assert_eq!(distance_km(&segment), None);
    }

    #[test]
    fn test_fuel_liters() {
        // 1 s at 1800 rpm, 20 mg/stroke, 4 cylinders -> 30 rev * 2 * 20 mg = 1200 mg
        let segment = build(&[(1800.0, 50.0, 20.0), (1800.0, 50.0, 20.0)], &ALL);
        let liters = fuel_liters(&segment, 0.8375, 4).unwrap();
        assert!((liters - 1200.0 / 1e6 / 0.8375).abs() < 1e-12);
    }

    #[test]
    fn test_fuel_requires_all_columns() {
        let segment = build(&[(1800.0, 50.0, 20.0)], &[Signal::Revs, Signal::Speed]);
        assert_eq!(fuel_liters(&segment, 0.8375, 4), None);
    }

    #[test]
    fn test_liters_per_100km_zero_distance() {
        assert_eq!(liters_per_100km(Some(1.0), Some(0.0)), None);
        assert_eq!(liters_per_100km(None, Some(10.0)), None);
        assert_eq!(liters_per_100km(Some(1.0), Some(20.0)), Some(5.0));
    }

    #[test]
    fn test_duration_buckets_partition() {
        let segment = build(
            &[
                (0.0, 0.0, 0.0),
                (0.0, 0.0, 0.0),
                (800.0, 0.0, 4.0),
                (1500.0, 30.0, 12.0),
                (1600.0, 40.0, 14.0),
                (0.0, 5.0, 0.0),
            ],
            &ALL,
        );
        let d = duration_buckets(&segment);
        assert_eq!(d.overall, 5.0);
        assert_eq!(d.engine_on, Some(3.0));
        assert_eq!(d.engine_off, Some(2.0));
        assert_eq!(d.idle, Some(1.0));
        assert_eq!(d.driving, Some(2.0));
        assert_eq!(d.engine_on.unwrap() + d.engine_off.unwrap(), d.overall);
    }

    #[test]
    fn test_empty_buckets_are_positive_zero() {
        let segment = build(&[(0.0, 30.0, 0.0), (0.0, 30.0, 0.0)], &ALL);
        let d = duration_buckets(&segment);
        assert_eq!(d.engine_on, Some(0.0));
        assert!(d.engine_on.unwrap().is_sign_positive());
        assert!(d.idle.unwrap().is_sign_positive());
        assert!(d.driving.unwrap().is_sign_positive());

        let json = serde_json::to_string(&d.driving).unwrap();
        assert_eq!(json, "0.0");
    }

    #[test]
    fn test_rolling_with_engine_off_is_not_driving() {
        let segment = build(&[(0.0, 30.0, 0.0), (0.0, 30.0, 0.0)], &ALL);
        let d = duration_buckets(&segment);
        assert_eq!(d.driving, Some(0.0));
        assert_eq!(d.engine_off, Some(1.0));
        // the distance is still counted
        assert!(distance_km(&segment).unwrap() > 0.0);
    }

    #[test]
    fn test_duration_without_revs() {
        let segment = build(&[(0.0, 10.0, 0.0), (0.0, 10.0, 0.0)], &[Signal::Speed]);
        let d = duration_buckets(&segment);
        assert_eq!(d.overall, 1.0);
        assert_eq!(d.engine_on, None);
        assert_eq!(d.idle, None);
        assert_eq!(d.driving, Some(1.0));
    }
}
