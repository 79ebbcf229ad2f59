//! Engine state: battery, fluid temperatures, warm-up time and oil condition.

use crate::analyzers::types::{Battery, Engine, TempStats, Warmup};
use crate::analyzers::utility::{RoundTo, max, mean, median};
use crate::config::AnalysisConfig;
use crate::model::{Segment, Signal, seconds_between};

pub fn extract(segment: &Segment, config: &AnalysisConfig) -> Engine {
    let temps = |signal: Signal| {
        segment
            .column(signal)
            .map(|c| TempStats::from_values(&c.to_vec(), 0))
            .unwrap_or_default()
    };

    Engine {
        battery: battery(segment),
        coolant_temp: temps(Signal::Coolant),
        oil_temp: temps(Signal::OilTemp),
        warmup: warmup(segment, config),
        errors: segment
            .column(Signal::Errors)
            .and_then(|c| max(&c.to_vec())),
        oil_carbonate: segment
            .column(Signal::OilCarbon)
            .and_then(|c| median(&c.to_vec()))
            .round_to(0),
        oil_dilution: segment
            .column(Signal::OilDilution)
            .and_then(|c| median(&c.to_vec()))
            .round_to(0),
    }
}

/// Mean voltage with the engine off before the first start, and with the
/// engine running. If the engine never starts, every reading counts as
/// before-drive.
fn battery(segment: &Segment) -> Battery {
    if !segment.has(Signal::Revs) || !segment.has(Signal::Battery) {
        return Battery::default();
    }
    let samples = segment.samples();

    let Some(first_start) = samples.iter().position(|s| s.engine_running()) else {
        let all: Vec<f64> = samples.iter().filter_map(|s| s.get(Signal::Battery)).collect();
        return Battery {
            before_drive: mean(&all).round_to(2),
            engine_running: None,
        };
    };

    let before: Vec<f64> = samples[..first_start]
        .iter()
        .filter(|s| s.get(Signal::Revs) == Some(0.0))
        .filter_map(|s| s.get(Signal::Battery))
        .collect();
    let running: Vec<f64> = samples
        .iter()
        .filter(|s| s.engine_running())
        .filter_map(|s| s.get(Signal::Battery))
        .collect();

    Battery {
        before_drive: mean(&before).round_to(2),
        engine_running: mean(&running).round_to(2),
    }
}

/// Seconds from the first cold sample until coolant and oil each first reach
/// operating temperature.
fn warmup(segment: &Segment, config: &AnalysisConfig) -> Warmup {
    let has_coolant = segment.has(Signal::Coolant);
    let has_oil = segment.has(Signal::OilTemp);
    if !has_coolant && !has_oil {
        return Warmup::default();
    }

    let is_cold = |v: Option<f64>| v.is_some_and(|t| t < config.cold_start_c);
    let samples = segment.samples();
    let Some(cold) = samples
        .iter()
        .position(|s| is_cold(s.get(Signal::Coolant)) || is_cold(s.get(Signal::OilTemp)))
    else {
        return Warmup::default();
    };
    let start = samples[cold].timestamp;
    let after = &samples[cold..];

    let time_to = |signal: Signal, warm: f64| {
        after
            .iter()
            .find(|s| s.get(signal).is_some_and(|t| t >= warm))
            .map(|s| seconds_between(start, s.timestamp))
    };

    Warmup {
        coolant: if has_coolant { time_to(Signal::Coolant, config.coolant_warm_c) } else { None },
        oil: if has_oil { time_to(Signal::OilTemp, config.oil_warm_c) } else { None },
    }
}
