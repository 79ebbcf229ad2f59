//! Trip-level summary: date, distance, outside temperature and time split.

use crate::analyzers::derived::{distance_km, duration_buckets};
use crate::analyzers::types::{DateSection, DurationStats, Overall, TempStats};
use crate::analyzers::utility::RoundTo;
use crate::model::{Segment, Signal};

pub fn extract(segment: &Segment) -> Overall {
    let durations = duration_buckets(segment);
    let external_temp = segment
        .column(Signal::ExternalTemp)
        .map(|c| TempStats::from_values(&c.to_vec(), 1))
        .unwrap_or_default();

    Overall {
        distance_km: distance_km(segment).round_to(2),
        external_temp,
        // unrounded, so the on/off split adds up to the total exactly
        duration: DurationStats {
            overall: Some(durations.overall),
            engine_on: durations.engine_on,
            engine_off: durations.engine_off,
            idle: durations.idle,
            driving: durations.driving,
        },
    }
}

/// Date of the first sample plus first and last time of day.
pub fn date(segment: &Segment) -> DateSection {
    DateSection {
        date: segment.start().map(|t| t.format("%Y-%m-%d").to_string()),
        start: segment.start().map(|t| t.format("%H:%M:%S").to_string()),
        end: segment.end().map(|t| t.format("%H:%M:%S").to_string()),
    }
}
