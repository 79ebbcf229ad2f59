//! Driving behaviour: pedal use, engine speed and vehicle speed.

use crate::analyzers::fuel;
use crate::analyzers::types::{Acceleration, Driving, DrivingRevs, SpeedStats};
use crate::analyzers::utility::{RoundTo, max, mean, min};
use crate::config::AnalysisConfig;
use crate::model::{Segment, Signal};

pub fn extract(segment: &Segment, config: &AnalysisConfig) -> Driving {
    Driving {
        acceleration: acceleration(segment),
        revs: revs(segment),
        speed: segment
            .column(Signal::Speed)
            .map(|c| SpeedStats::from_values(&c.to_vec(), 1))
            .unwrap_or_default(),
        fuel_consumption: fuel::totals(segment, config),
    }
}

fn acceleration(segment: &Segment) -> Acceleration {
    let Some(pedal) = segment.column(Signal::AccelPedalPos) else {
        return Acceleration::default();
    };
    let values = pedal.to_vec();
    // a released pedal is not an acceleration event
    let pressed: Vec<f64> = values.iter().copied().filter(|&v| v > 0.0).collect();

    Acceleration {
        max: max(&values).round_to(2),
        avg: mean(&pressed).round_to(2),
    }
}

fn revs(segment: &Segment) -> DrivingRevs {
    let Some(revs) = segment.column(Signal::Revs) else {
        return DrivingRevs::default();
    };
    let values = revs.to_vec();

    let while_driving: Vec<f64> = segment
        .samples()
        .iter()
        .filter(|s| s.moving())
        .filter_map(|s| s.get(Signal::Revs))
        .collect();

    DrivingRevs {
        min: min(&values).round_to(0),
        max: max(&values).round_to(0),
        avg: mean(&values).round_to(0),
        avg_driving: mean(&while_driving).round_to(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnSet, Sample, Trip};
    use chrono::NaiveDate;

    // (revs, speed, pedal)
    fn segment(rows: &[(f64, f64, Option<f64>)], columns: &[Signal]) -> Segment {
        let base = NaiveDate::from_ymd_opt(2025, 1, 16)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap();
        let samples = rows
            .iter()
            .enumerate()
            .map(|(i, &(revs, speed, pedal))| {
                let mut s = Sample::new(i, base + chrono::Duration::seconds(i as i64))
                    .with(Signal::Revs, revs)
                    .with(Signal::Speed, speed);
                s.set(Signal::AccelPedalPos, pedal);
                s
            })
            .collect();
        let columns: ColumnSet = columns.iter().copied().collect();
        let trip = Trip::new(samples, columns).unwrap();
        trip.segment(0..trip.len())
    }

    const COLUMNS: [Signal; 3] = [Signal::Revs, Signal::Speed, Signal::AccelPedalPos];

    #[test]
    fn test_pedal_average_skips_released_pedal() {
        let seg = segment(
            &[
                (800.0, 0.0, Some(0.0)),
                (1500.0, 20.0, Some(30.0)),
                (2100.0, 40.0, Some(45.5)),
                (900.0, 0.0, None),
            ],
            &COLUMNS,
        );
        let driving = extract(&seg, &AnalysisConfig::default());
        assert_eq!(driving.acceleration.max, Some(45.5));
        assert_eq!(driving.acceleration.avg, Some(37.75));
    }

    #[test]
    fn test_revs_while_driving() {
        let seg = segment(
            &[
                (800.0, 0.0, None),
                (1500.0, 20.0, None),
                (2100.0, 40.0, None),
                (901.0, 0.0, None),
            ],
            &COLUMNS,
        );
        let revs = extract(&seg, &AnalysisConfig::default()).revs;
        assert_eq!(revs.min, Some(800.0));
        assert_eq!(revs.max, Some(2100.0));
        assert_eq!(revs.avg, Some(1325.0));
        assert_eq!(revs.avg_driving, Some(1800.0));
    }

    #[test]
    fn test_speed_is_rounded_to_one_decimal() {
        let seg = segment(
            &[(800.0, 0.0, None), (1500.0, 33.33, None), (1500.0, 50.0, None)],
            &COLUMNS,
        );
        let speed = extract(&seg, &AnalysisConfig::default()).speed;
        assert_eq!(speed.min, Some(0.0));
        assert_eq!(speed.max, Some(50.0));
        assert_eq!(speed.avg, Some(27.8));
    }

    #[test]
    fn test_absent_columns_are_null() {
        let seg = segment(&[(800.0, 0.0, Some(10.0))], &[Signal::Speed]);
        let driving = extract(&seg, &AnalysisConfig::default());
        assert_eq!(driving.acceleration, Acceleration::default());
        assert_eq!(driving.revs, DrivingRevs::default());
        assert_eq!(driving.fuel_consumption.total_l, None);
    }
}
