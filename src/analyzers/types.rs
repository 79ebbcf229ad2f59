//! Result records produced by the trip analyzer and the cross-trip aggregator.
//!
//! Every statistic is an `Option<f64>`: `None` serializes as JSON `null` and
//! means the input column was absent, entirely null, or the arithmetic was
//! degenerate. Field names follow the `<name>_<unit>` keys consumers of the
//! JSON output expect.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analyzers::utility::{RoundTo, max, mean, min};

/// Declares a `{min, max, avg}` record whose JSON keys carry a unit suffix.
macro_rules! min_max_avg {
    ($(#[$doc:meta])* $name:ident { $min:literal, $max:literal, $avg:literal }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(rename = $min, default)]
            pub min: Option<f64>,
            #[serde(rename = $max, default)]
            pub max: Option<f64>,
            #[serde(rename = $avg, default)]
            pub avg: Option<f64>,
        }

        impl $name {
            /// Summarizes non-null values, rounded to `dp` decimals.
            pub fn from_values(values: &[f64], dp: u32) -> Self {
                Self {
                    min: min(values).round_to(dp),
                    max: max(values).round_to(dp),
                    avg: mean(values).round_to(dp),
                }
            }
        }
    };
}

min_max_avg!(
    /// Temperatures in °C.
    TempStats { "min_c", "max_c", "avg_c" }
);
min_max_avg!(
    /// Vehicle speed in km/h.
    SpeedStats { "min_kmh", "max_kmh", "avg_kmh" }
);
min_max_avg!(
    /// Filter differential pressure in mbar.
    PressureStats { "min_mbar", "max_mbar", "avg_mbar" }
);
min_max_avg!(
    /// Engine speed in rpm.
    RevsStats { "min", "max", "avg" }
);

/// Calendar date and time of day of a segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateSection {
    pub date: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Time per engine/vehicle state, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DurationStats {
    #[serde(rename = "overall_sec", default)]
    pub overall: Option<f64>,
    #[serde(rename = "engineOn_sec", default)]
    pub engine_on: Option<f64>,
    #[serde(rename = "engineOff_sec", default)]
    pub engine_off: Option<f64>,
    #[serde(rename = "idle_sec", default)]
    pub idle: Option<f64>,
    #[serde(rename = "driving_sec", default)]
    pub driving: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overall {
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(rename = "externalTemp", default)]
    pub external_temp: TempStats,
    #[serde(default)]
    pub duration: DurationStats,
}

/// Accelerator pedal position in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acceleration {
    #[serde(rename = "max_perc", default)]
    pub max: Option<f64>,
    /// Mean over pressed-pedal samples only.
    #[serde(rename = "avg_perc", default)]
    pub avg: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrivingRevs {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub avg: Option<f64>,
    #[serde(rename = "avgDriving", default)]
    pub avg_driving: Option<f64>,
}

/// Fuel burnt and the resulting consumption.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelTotals {
    #[serde(default)]
    pub total_l: Option<f64>,
    #[serde(default)]
    pub avg_l100km: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Driving {
    #[serde(default)]
    pub acceleration: Acceleration,
    #[serde(default)]
    pub revs: DrivingRevs,
    #[serde(default)]
    pub speed: SpeedStats,
    #[serde(rename = "fuelConsumption", default)]
    pub fuel_consumption: FuelTotals,
}

/// Battery voltage before the first engine start and while running.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    #[serde(rename = "beforeDrive_v", default)]
    pub before_drive: Option<f64>,
    #[serde(rename = "engineRunning_v", default)]
    pub engine_running: Option<f64>,
}

/// Seconds from a cold start until the fluid reached operating temperature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Warmup {
    #[serde(rename = "coolant_sec", default)]
    pub coolant: Option<f64>,
    #[serde(rename = "oil_sec", default)]
    pub oil: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    #[serde(default)]
    pub battery: Battery,
    #[serde(rename = "coolantTemp", default)]
    pub coolant_temp: TempStats,
    #[serde(rename = "oilTemp", default)]
    pub oil_temp: TempStats,
    #[serde(rename = "engineWarmup", default)]
    pub warmup: Warmup,
    #[serde(default)]
    pub errors: Option<f64>,
    #[serde(rename = "oilCarbonate_perc", default)]
    pub oil_carbonate: Option<f64>,
    #[serde(rename = "oilDilution_perc", default)]
    pub oil_dilution: Option<f64>,
}

/// Filter additive tank, in mL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Additive {
    #[serde(rename = "vol_ml", default)]
    pub volume: Option<f64>,
    #[serde(rename = "remain_ml", default)]
    pub remaining: Option<f64>,
}

/// Ash loading of the filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deposits {
    #[serde(rename = "percentage_perc", default)]
    pub percentage: Option<f64>,
    #[serde(rename = "weight_gram", default)]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FapLife {
    #[serde(rename = "life_km", default)]
    pub life: Option<f64>,
    #[serde(rename = "left_km", default)]
    pub left: Option<f64>,
}

/// Soot loading in g/L. `diff` is negative when soot was burnt off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Soot {
    #[serde(rename = "start_gl", default)]
    pub start: Option<f64>,
    #[serde(rename = "end_gl", default)]
    pub end: Option<f64>,
    #[serde(rename = "diff_gl", default)]
    pub diff: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fap {
    #[serde(default)]
    pub additive: Additive,
    #[serde(default)]
    pub deposits: Deposits,
    #[serde(rename = "lastRegen_km", default)]
    pub last_regen: Option<f64>,
    #[serde(rename = "last10Regen_km", default)]
    pub last_10_regen: Option<f64>,
    #[serde(default)]
    pub life: FapLife,
    #[serde(default)]
    pub pressure: PressureStats,
    #[serde(rename = "pressure_idle", default)]
    pub pressure_idle: PressureStats,
    #[serde(default)]
    pub soot: Soot,
    #[serde(default)]
    pub temp: TempStats,
}

/// Consumption during regeneration compared to the rest of the segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegenFuel {
    #[serde(rename = "regen_l100km", default)]
    pub regen: Option<f64>,
    #[serde(rename = "nonRegen_l100km", default)]
    pub non_regen: Option<f64>,
}

/// Statistics over the rows flagged as filter regeneration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FapRegen {
    #[serde(rename = "previousRegen_km", default)]
    pub previous_regen: Option<f64>,
    #[serde(rename = "duration_sec", default)]
    pub duration: Option<f64>,
    /// Number of separate regeneration blocks.
    #[serde(default)]
    pub episodes: u32,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub speed: SpeedStats,
    #[serde(rename = "fapTemp", default)]
    pub fap_temp: TempStats,
    #[serde(rename = "fapPressure", default)]
    pub fap_pressure: PressureStats,
    #[serde(default)]
    pub revs: RevsStats,
    #[serde(rename = "fapSoot", default)]
    pub fap_soot: Soot,
    #[serde(rename = "fuelConsumption", default)]
    pub fuel_consumption: RegenFuel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedRangeStats {
    #[serde(default)]
    pub total_km: Option<f64>,
    #[serde(default)]
    pub avg_revs: Option<f64>,
    #[serde(default)]
    pub avg_l100km: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuelConsumption {
    #[serde(default)]
    pub overall: FuelTotals,
    /// Keyed by range label (`"5-20"`, `"200+"`). Empty ranges are left out.
    #[serde(rename = "bySpeedRange", default)]
    pub by_speed_range: BTreeMap<String, SpeedRangeStats>,
}

/// Statistics for one trip segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub date: DateSection,
    pub overall: Overall,
    pub driving: Driving,
    pub engine: Engine,
    pub fap: Fap,
    /// `None` when the segment has no regeneration.
    #[serde(rename = "fapRegen")]
    pub fap_regen: Option<FapRegen>,
    #[serde(rename = "fuelConsumption")]
    pub fuel_consumption: FuelConsumption,
}

/// A min/max pair for values with no meaningful average across trips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallAverage {
    #[serde(rename = "numberOfTrips")]
    pub number_of_trips: usize,
    pub distance_km: Option<f64>,
    #[serde(rename = "externalTemp")]
    pub external_temp: TempStats,
    pub duration: DurationStats,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineAverage {
    pub battery: Battery,
    #[serde(rename = "coolantTemp")]
    pub coolant_temp: TempStats,
    #[serde(rename = "oilTemp")]
    pub oil_temp: TempStats,
    #[serde(rename = "engineWarmup")]
    pub warmup: Warmup,
    pub errors: Range,
    #[serde(rename = "oilCarbonate_perc")]
    pub oil_carbonate: Range,
    #[serde(rename = "oilDilution_perc")]
    pub oil_dilution: Range,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FapRegenAverage {
    /// Trips that contained a regeneration.
    #[serde(rename = "numberOfRegens")]
    pub number_of_regens: usize,
    #[serde(flatten)]
    pub stats: FapRegen,
}

/// Cross-trip reduction of a set of [`AnalysisResult`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AverageResult {
    pub overall: OverallAverage,
    pub driving: Driving,
    pub engine: EngineAverage,
    pub fap: Fap,
    #[serde(rename = "fapRegen")]
    pub fap_regen: Option<FapRegenAverage>,
    #[serde(rename = "fuelConsumption")]
    pub fuel_consumption: FuelConsumption,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unit_suffixed_keys() {
        let stats = TempStats::from_values(&[10.0, 20.0, 33.0], 1);
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value, json!({"min_c": 10.0, "max_c": 33.0, "avg_c": 21.0}));
    }

    #[test]
    fn test_empty_values_serialize_as_null() {
        let value = serde_json::to_value(SpeedStats::from_values(&[], 1)).unwrap();
        assert_eq!(
            value,
            json!({"min_kmh": null, "max_kmh": null, "avg_kmh": null})
        );
    }

    #[test]
    fn test_missing_regen_serializes_as_null() {
        let value = serde_json::to_value(AnalysisResult::default()).unwrap();
        assert!(value["fapRegen"].is_null());
        assert!(value["overall"]["duration"]["engineOn_sec"].is_null());
        assert!(value["fuelConsumption"]["bySpeedRange"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_result_deserializes_from_partial_json() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "overall": {"distance_km": 12.5},
            "driving": {},
            "engine": {},
            "fap": {},
            "fapRegen": null,
            "fuelConsumption": {}
        }))
        .unwrap();
        assert_eq!(result.overall.distance_km, Some(12.5));
        assert!(result.fap_regen.is_none());
    }

    #[test]
    fn test_regen_average_flattens_stats() {
        let average = FapRegenAverage {
            number_of_regens: 2,
            stats: FapRegen {
                duration: Some(600.0),
                ..FapRegen::default()
            },
        };
        let value = serde_json::to_value(&average).unwrap();
        assert_eq!(value["numberOfRegens"], json!(2));
        assert_eq!(value["duration_sec"], json!(600.0));
    }
}
