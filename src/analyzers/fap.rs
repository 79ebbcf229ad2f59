//! Particulate filter state: additive, ash, pressure, soot and temperature.

use crate::analyzers::types::{Additive, Deposits, Fap, FapLife, PressureStats, Soot, TempStats};
use crate::analyzers::utility::{RoundTo, max, mean, median};
use crate::config::AnalysisConfig;
use crate::model::{Segment, Signal};

pub fn extract(segment: &Segment, config: &AnalysisConfig) -> Fap {
    let reduce = |signal: Signal, f: fn(&[f64]) -> Option<f64>, dp: u32| {
        segment
            .column(signal)
            .and_then(|c| f(&c.to_vec()))
            .round_to(dp)
    };
    let last = |signal: Signal| segment.column(signal).and_then(|c| c.last()).round_to(0);

    Fap {
        additive: Additive {
            volume: reduce(Signal::FapAdditiveVol, max, 2),
            remaining: reduce(Signal::FapAdditiveRemain, mean, 2),
        },
        deposits: Deposits {
            percentage: reduce(Signal::FapCinder, mean, 2),
            weight: reduce(Signal::FapDeposits, mean, 2),
        },
        last_regen: last(Signal::LastRegen),
        last_10_regen: last(Signal::Avg10Regen),
        life: FapLife {
            life: reduce(Signal::FapLife, median, 0),
            left: reduce(Signal::FapLifeLeft, median, 0),
        },
        pressure: segment
            .column(Signal::FapPressure)
            .map(|c| PressureStats::from_values(&c.to_vec(), 1))
            .unwrap_or_default(),
        pressure_idle: idle_pressure(segment, config),
        soot: soot(segment, 2),
        temp: segment
            .column(Signal::FapTemp)
            .map(|c| TempStats::from_values(&c.to_vec(), 0))
            .unwrap_or_default(),
    }
}

/// Pressure while standing at low engine speed.
fn idle_pressure(segment: &Segment, config: &AnalysisConfig) -> PressureStats {
    if !(segment.has(Signal::Revs) && segment.has(Signal::Speed)) {
        return PressureStats::default();
    }
    let Some(pressure) = segment.column(Signal::FapPressure) else {
        return PressureStats::default();
    };
    let idle: Vec<f64> = segment
        .samples()
        .iter()
        .zip(pressure.iter())
        .filter(|(s, _)| {
            s.get(Signal::Revs).is_some_and(|r| r < config.idle_max_revs)
                && s.get(Signal::Speed) == Some(0.0)
        })
        .filter_map(|(_, p)| p)
        .collect();
    PressureStats::from_values(&idle, 1)
}

/// First and last soot reading in file order.
pub(crate) fn soot(segment: &Segment, dp: u32) -> Soot {
    let Some((start, end)) = segment
        .column(Signal::FapSoot)
        .and_then(|c| c.collection_bounds())
    else {
        return Soot::default();
    };
    Soot {
        start: Some(start).round_to(dp),
        end: Some(end).round_to(dp),
        diff: Some(end - start).round_to(dp),
    }
}
