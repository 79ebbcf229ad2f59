use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::analyzers::types::{
    Acceleration, AnalysisResult, AverageResult, Battery, Deposits, Driving, DrivingRevs,
    DurationStats, EngineAverage, Additive, Fap, FapLife, FapRegen, FapRegenAverage,
    FuelConsumption, FuelTotals, OverallAverage, PressureStats, Range, RegenFuel, RevsStats,
    Soot, SpeedRangeStats, SpeedStats, TempStats, Warmup,
};
use crate::analyzers::utility::{RoundTo, max, mean, min, ratio, sum};
use crate::error::{AnalysisError, Result};

/// Decimals kept in every aggregated value.
const DP: u32 = 2;

const DRIVING_SEC: &str = "overall.duration.driving_sec";
const ENGINE_ON_SEC: &str = "overall.duration.engineOn_sec";
const IDLE_SEC: &str = "overall.duration.idle_sec";
const OVERALL_SEC: &str = "overall.duration.overall_sec";
const DISTANCE_KM: &str = "overall.distance_km";
const REGEN_SEC: &str = "fapRegen.duration_sec";

/// One analysis flattened to dotted keys (`driving.speed.avg_kmh`). Null
/// statistics have no entry.
pub type FlatRecord = BTreeMap<String, f64>;

/// Flattens a result into its dotted key space.
pub fn flatten(result: &AnalysisResult) -> Result<FlatRecord> {
    let value = serde_json::to_value(result)?;
    let mut record = FlatRecord::new();
    flatten_into(String::new(), &value, &mut record);
    Ok(record)
}

fn flatten_into(prefix: String, value: &Value, record: &mut FlatRecord) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(path, child, record);
            }
        }
        Value::Number(n) => {
            if let Some(v) = n.as_f64().filter(|v| v.is_finite()) {
                record.insert(prefix, v);
            }
        }
        _ => {}
    }
}

/// Column-wise reducers over flattened analyses. Nulls are skipped by every
/// reducer and all results are rounded to [`DP`] decimals.
struct Table {
    records: Vec<FlatRecord>,
}

impl Table {
    fn values(&self, key: &str) -> Vec<f64> {
        self.records.iter().filter_map(|r| r.get(key).copied()).collect()
    }

    fn sum(&self, key: &str) -> Option<f64> {
        sum(&self.values(key)).round_to(DP)
    }

    fn min(&self, key: &str) -> Option<f64> {
        min(&self.values(key)).round_to(DP)
    }

    fn max(&self, key: &str) -> Option<f64> {
        max(&self.values(key)).round_to(DP)
    }

    fn mean(&self, key: &str) -> Option<f64> {
        mean(&self.values(key)).round_to(DP)
    }

    /// `Σ(value·weight) / Σ(weight)` over the records carrying both. `None`
    /// when the weights add up to zero.
    fn weighted(&self, key: &str, weight_key: &str) -> Option<f64> {
        let (total, weight) = self
            .records
            .iter()
            .filter_map(|r| Some((*r.get(key)?, *r.get(weight_key)?)))
            .fold((0.0, 0.0), |(t, w), (v, wt)| (t + v * wt, w + wt));
        if weight == 0.0 {
            return None;
        }
        ratio(total, weight).round_to(DP)
    }

    fn temps(&self, prefix: &str, weight_key: &str) -> TempStats {
        TempStats {
            min: self.min(&format!("{prefix}.min_c")),
            max: self.max(&format!("{prefix}.max_c")),
            avg: self.weighted(&format!("{prefix}.avg_c"), weight_key),
        }
    }

    fn pressures(&self, prefix: &str, weight_key: &str) -> PressureStats {
        PressureStats {
            min: self.min(&format!("{prefix}.min_mbar")),
            max: self.max(&format!("{prefix}.max_mbar")),
            avg: self.weighted(&format!("{prefix}.avg_mbar"), weight_key),
        }
    }

    fn speeds(&self, prefix: &str, weight_key: &str) -> SpeedStats {
        SpeedStats {
            min: self.min(&format!("{prefix}.min_kmh")),
            max: self.max(&format!("{prefix}.max_kmh")),
            avg: self.weighted(&format!("{prefix}.avg_kmh"), weight_key),
        }
    }

    fn range(&self, key: &str) -> Range {
        Range {
            min: self.min(key),
            max: self.max(key),
        }
    }
}

/// Averages the analyses of one vehicle into a single record.
///
/// Extensive quantities (distance, time, fuel) are summed. Intensive ones
/// are weighted by the duration or distance they were measured over: driving
/// figures by driving time, engine and filter temperatures by engine-on time,
/// idle pressure by idle time, regen figures by regen time and consumption by
/// distance. A section no input carries stays `None`.
///
/// A value whose weight is null is left out of its weighted mean. A log
/// without a `Revs` column has no `engineOn_sec`, so its coolant, oil,
/// battery and filter averages are `None` even when it is the only input.
///
/// # Errors
///
/// Returns [`AnalysisError::AggregationInput`] for an empty list.
#[tracing::instrument(skip_all, fields(inputs = results.len()))]
pub fn average(results: &[AnalysisResult]) -> Result<AverageResult> {
    if results.is_empty() {
        return Err(AnalysisError::AggregationInput(
            "no analyses to average".into(),
        ));
    }

    let records = results.iter().map(flatten).collect::<Result<Vec<_>>>()?;
    let table = Table { records };

    let number_of_regens = results.iter().filter(|r| r.fap_regen.is_some()).count();
    let labels: BTreeSet<&String> = results
        .iter()
        .flat_map(|r| r.fuel_consumption.by_speed_range.keys())
        .collect();

    let average = AverageResult {
        overall: overall(&table, results.len()),
        driving: driving(&table),
        engine: engine(&table),
        fap: fap(&table),
        fap_regen: (number_of_regens > 0).then(|| fap_regen(&table, number_of_regens)),
        fuel_consumption: fuel(&table, labels),
    };

    info!(trips = results.len(), regens = number_of_regens, "Average computed");
    Ok(average)
}

/// Validates raw JSON analyses, then averages them.
///
/// # Errors
///
/// Returns [`AnalysisError::AggregationInput`] naming the first entry that is
/// not an analysis result, or for an empty list.
pub fn average_values(values: Vec<Value>) -> Result<AverageResult> {
    let results = values
        .into_iter()
        .enumerate()
        .map(|(i, value)| {
            serde_json::from_value::<AnalysisResult>(value).map_err(|e| {
                AnalysisError::AggregationInput(format!("entry {i} is not an analysis: {e}"))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    average(&results)
}

fn overall(t: &Table, trips: usize) -> OverallAverage {
    OverallAverage {
        number_of_trips: trips,
        distance_km: t.sum(DISTANCE_KM),
        external_temp: t.temps("overall.externalTemp", OVERALL_SEC),
        duration: DurationStats {
            overall: t.sum(OVERALL_SEC),
            engine_on: t.sum(ENGINE_ON_SEC),
            engine_off: t.sum("overall.duration.engineOff_sec"),
            idle: t.sum(IDLE_SEC),
            driving: t.sum(DRIVING_SEC),
        },
    }
}

fn driving(t: &Table) -> Driving {
    Driving {
        acceleration: Acceleration {
            max: t.max("driving.acceleration.max_perc"),
            avg: t.weighted("driving.acceleration.avg_perc", DRIVING_SEC),
        },
        revs: DrivingRevs {
            min: t.min("driving.revs.min"),
            max: t.max("driving.revs.max"),
            avg: t.weighted("driving.revs.avg", DRIVING_SEC),
            avg_driving: t.weighted("driving.revs.avgDriving", DRIVING_SEC),
        },
        speed: t.speeds("driving.speed", DRIVING_SEC),
        fuel_consumption: FuelTotals {
            total_l: t.sum("driving.fuelConsumption.total_l"),
            avg_l100km: t.weighted("driving.fuelConsumption.avg_l100km", DISTANCE_KM),
        },
    }
}

fn engine(t: &Table) -> EngineAverage {
    EngineAverage {
        battery: Battery {
            before_drive: t.mean("engine.battery.beforeDrive_v"),
            engine_running: t.weighted("engine.battery.engineRunning_v", ENGINE_ON_SEC),
        },
        coolant_temp: t.temps("engine.coolantTemp", ENGINE_ON_SEC),
        oil_temp: t.temps("engine.oilTemp", ENGINE_ON_SEC),
        warmup: Warmup {
            coolant: t.mean("engine.engineWarmup.coolant_sec"),
            oil: t.mean("engine.engineWarmup.oil_sec"),
        },
        errors: t.range("engine.errors"),
        oil_carbonate: t.range("engine.oilCarbonate_perc"),
        oil_dilution: t.range("engine.oilDilution_perc"),
    }
}

fn fap(t: &Table) -> Fap {
    Fap {
        additive: Additive {
            volume: t.max("fap.additive.vol_ml"),
            remaining: t.mean("fap.additive.remain_ml"),
        },
        deposits: Deposits {
            percentage: t.mean("fap.deposits.percentage_perc"),
            weight: t.mean("fap.deposits.weight_gram"),
        },
        last_regen: t.mean("fap.lastRegen_km"),
        last_10_regen: t.mean("fap.last10Regen_km"),
        life: FapLife {
            life: t.mean("fap.life.life_km"),
            left: t.mean("fap.life.left_km"),
        },
        pressure: t.pressures("fap.pressure", ENGINE_ON_SEC),
        pressure_idle: t.pressures("fap.pressure_idle", IDLE_SEC),
        soot: soot(t, "fap.soot"),
        temp: t.temps("fap.temp", ENGINE_ON_SEC),
    }
}

fn soot(t: &Table, prefix: &str) -> Soot {
    Soot {
        start: t.mean(&format!("{prefix}.start_gl")),
        end: t.mean(&format!("{prefix}.end_gl")),
        diff: t.mean(&format!("{prefix}.diff_gl")),
    }
}

fn fap_regen(t: &Table, number_of_regens: usize) -> FapRegenAverage {
    let episodes = t.sum("fapRegen.episodes").unwrap_or(0.0);
    FapRegenAverage {
        number_of_regens,
        stats: FapRegen {
            previous_regen: t.mean("fapRegen.previousRegen_km"),
            duration: t.mean(REGEN_SEC),
            episodes: episodes as u32,
            distance_km: t.weighted("fapRegen.distance_km", REGEN_SEC),
            speed: t.speeds("fapRegen.speed", REGEN_SEC),
            fap_temp: t.temps("fapRegen.fapTemp", REGEN_SEC),
            fap_pressure: t.pressures("fapRegen.fapPressure", REGEN_SEC),
            revs: RevsStats {
                min: t.min("fapRegen.revs.min"),
                max: t.max("fapRegen.revs.max"),
                avg: t.weighted("fapRegen.revs.avg", REGEN_SEC),
            },
            fap_soot: soot(t, "fapRegen.fapSoot"),
            fuel_consumption: RegenFuel {
                regen: t.weighted("fapRegen.fuelConsumption.regen_l100km", REGEN_SEC),
                non_regen: t.weighted("fapRegen.fuelConsumption.nonRegen_l100km", REGEN_SEC),
            },
        },
    }
}

fn fuel(t: &Table, labels: BTreeSet<&String>) -> FuelConsumption {
    let by_speed_range = labels
        .into_iter()
        .filter_map(|label| {
            let key = |field: &str| format!("fuelConsumption.bySpeedRange.{label}.{field}");
            let weight = key("total_km");
            let stats = SpeedRangeStats {
                total_km: t.sum(&weight),
                avg_revs: t.weighted(&key("avg_revs"), &weight),
                avg_l100km: t.weighted(&key("avg_l100km"), &weight),
            };
            (stats != SpeedRangeStats::default()).then(|| (label.clone(), stats))
        })
        .collect();

    FuelConsumption {
        overall: FuelTotals {
            total_l: t.sum("fuelConsumption.overall.total_l"),
            avg_l100km: t.weighted("fuelConsumption.overall.avg_l100km", DISTANCE_KM),
        },
        by_speed_range,
    }
}
