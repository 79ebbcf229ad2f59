//! Row model for engine controller logs.
//!
//! A [`Sample`] is one timestamped log row. A [`Trip`] is the full,
//! time-normalized set of samples from one file, and a [`Segment`] is the
//! slice of a trip that the extractors work on. Column presence is tracked
//! per trip, so an absent column ([`Segment::column`] returns `None`) stays
//! distinct from a present column whose value is null on some rows.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{AnalysisError, Result};

/// Sensor channels recognized in a log header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Signal {
    Revs,
    Speed,
    InjFlow,
    AccelPedalPos,
    Coolant,
    OilTemp,
    Battery,
    ExternalTemp,
    Errors,
    OilCarbon,
    OilDilution,
    FapPressure,
    FapTemp,
    FapSoot,
    FapAdditiveVol,
    FapAdditiveRemain,
    FapCinder,
    FapDeposits,
    FapLife,
    FapLifeLeft,
    LastRegen,
    Avg10Regen,
    Regen,
}

impl Signal {
    pub const COUNT: usize = 23;

    pub const ALL: [Signal; Signal::COUNT] = [
        Signal::Revs,
        Signal::Speed,
        Signal::InjFlow,
        Signal::AccelPedalPos,
        Signal::Coolant,
        Signal::OilTemp,
        Signal::Battery,
        Signal::ExternalTemp,
        Signal::Errors,
        Signal::OilCarbon,
        Signal::OilDilution,
        Signal::FapPressure,
        Signal::FapTemp,
        Signal::FapSoot,
        Signal::FapAdditiveVol,
        Signal::FapAdditiveRemain,
        Signal::FapCinder,
        Signal::FapDeposits,
        Signal::FapLife,
        Signal::FapLifeLeft,
        Signal::LastRegen,
        Signal::Avg10Regen,
        Signal::Regen,
    ];

    /// Column name as written by the logger.
    pub fn header(self) -> &'static str {
        match self {
            Signal::Revs => "Revs",
            Signal::Speed => "Speed",
            Signal::InjFlow => "InjFlow",
            Signal::AccelPedalPos => "AccelPedalPos",
            Signal::Coolant => "Coolant",
            Signal::OilTemp => "OilTemp",
            Signal::Battery => "Battery",
            Signal::ExternalTemp => "ExternalTemp",
            Signal::Errors => "Errors",
            Signal::OilCarbon => "OilCarbon",
            Signal::OilDilution => "OilDilution",
            Signal::FapPressure => "FAPpressure",
            Signal::FapTemp => "FAPtemp",
            Signal::FapSoot => "FAPsoot",
            Signal::FapAdditiveVol => "FAPAdditiveVol",
            Signal::FapAdditiveRemain => "FAPAdditiveRemain",
            Signal::FapCinder => "FAPcinder",
            Signal::FapDeposits => "FAPdeposits",
            Signal::FapLife => "FAP life",
            Signal::FapLifeLeft => "FAPlifeLeft",
            Signal::LastRegen => "LastRegen",
            Signal::Avg10Regen => "Avg10regen",
            Signal::Regen => "REGEN",
        }
    }

    pub fn from_header(name: &str) -> Option<Self> {
        let name = name.trim();
        Signal::ALL.into_iter().find(|s| s.header() == name)
    }

    fn index(self) -> usize {
        self as usize
    }
}

pub type ColumnSet = BTreeSet<Signal>;

/// One log row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Position of the row in the source file, before time sorting.
    pub seq: usize,
    pub timestamp: NaiveDateTime,
    /// Seconds since the previous sample of the same trip or segment.
    pub time_diff: f64,
    readings: [Option<f64>; Signal::COUNT],
}

impl Sample {
    pub fn new(seq: usize, timestamp: NaiveDateTime) -> Self {
        Self {
            seq,
            timestamp,
            time_diff: 0.0,
            readings: [None; Signal::COUNT],
        }
    }

    pub fn get(&self, signal: Signal) -> Option<f64> {
        self.readings[signal.index()]
    }

    /// Stores a reading. Non-finite values are stored as null.
    pub fn set(&mut self, signal: Signal, value: Option<f64>) {
        self.readings[signal.index()] = value.filter(|v| v.is_finite());
    }

    pub fn with(mut self, signal: Signal, value: f64) -> Self {
        self.set(signal, Some(value));
        self
    }

    pub fn is_regen(&self) -> bool {
        self.get(Signal::Regen) == Some(1.0)
    }

    pub fn engine_running(&self) -> bool {
        self.get(Signal::Revs).is_some_and(|r| r > 0.0)
    }

    pub fn moving(&self) -> bool {
        self.get(Signal::Speed).is_some_and(|v| v > 0.0)
    }
}

/// All valid samples of one log, sorted by time with `time_diff` filled in.
#[derive(Debug, Clone)]
pub struct Trip {
    samples: Vec<Sample>,
    columns: ColumnSet,
}

impl Trip {
    /// Sorts samples by timestamp (stable, so ties keep collection order)
    /// and derives each sample's `time_diff`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::InvalidInput`] when `samples` is empty.
    pub fn new(mut samples: Vec<Sample>, columns: ColumnSet) -> Result<Self> {
        if samples.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "log contains no valid timestamped rows".into(),
            ));
        }

        samples.sort_by_key(|s| s.timestamp);
        let mut previous = None;
        for sample in &mut samples {
            sample.time_diff = match previous {
                Some(prev) => seconds_between(prev, sample.timestamp),
                None => 0.0,
            };
            previous = Some(sample.timestamp);
        }

        Ok(Self { samples, columns })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Copies `range` out as a segment. The first sample's `time_diff` is
    /// reset to zero so the gap before the segment is not counted.
    pub fn segment(&self, range: std::ops::Range<usize>) -> Segment {
        let mut samples = self.samples[range].to_vec();
        if let Some(first) = samples.first_mut() {
            first.time_diff = 0.0;
        }
        Segment::new(samples, self.columns.clone())
    }
}

/// Seconds from `from` to `to`, millisecond resolution.
pub fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// A contiguous run of trip samples, or a row-filtered view of one.
#[derive(Debug, Clone)]
pub struct Segment {
    samples: Vec<Sample>,
    columns: ColumnSet,
}

impl Segment {
    pub fn new(samples: Vec<Sample>, columns: ColumnSet) -> Self {
        Self { samples, columns }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn has(&self, signal: Signal) -> bool {
        self.columns.contains(&signal)
    }

    /// The column for `signal`, or `None` when the log does not carry it.
    pub fn column(&self, signal: Signal) -> Option<Column<'_>> {
        self.has(signal).then_some(Column {
            signal,
            samples: &self.samples,
        })
    }

    /// Keeps the rows matching `predicate`. Rows keep their original `time_diff`.
    pub fn filter(&self, predicate: impl Fn(&Sample) -> bool) -> Segment {
        Segment {
            samples: self.samples.iter().filter(|s| predicate(s)).cloned().collect(),
            columns: self.columns.clone(),
        }
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.samples.first().map(|s| s.timestamp)
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.samples.last().map(|s| s.timestamp)
    }
}

/// Borrowed view of one present column.
#[derive(Debug, Clone, Copy)]
pub struct Column<'a> {
    signal: Signal,
    samples: &'a [Sample],
}

impl<'a> Column<'a> {
    pub fn signal(self) -> Signal {
        self.signal
    }

    /// Row values in time order, nulls included.
    pub fn iter(self) -> impl Iterator<Item = Option<f64>> + 'a {
        let signal = self.signal;
        self.samples.iter().map(move |s| s.get(signal))
    }

    /// Non-null values in time order.
    pub fn values(self) -> impl Iterator<Item = f64> + 'a {
        self.iter().flatten()
    }

    pub fn to_vec(self) -> Vec<f64> {
        self.values().collect()
    }

    /// Last non-null value in time order.
    pub fn last(self) -> Option<f64> {
        self.values().last()
    }

    /// First and last non-null values in collection (file row) order.
    pub fn collection_bounds(self) -> Option<(f64, f64)> {
        let signal = self.signal;
        let mut present = self
            .samples
            .iter()
            .filter_map(|s| s.get(signal).map(|v| (s.seq, v)));
        let first = present.next()?;
        let (min, max) = present.fold((first, first), |(lo, hi), item| {
            (
                if item.0 < lo.0 { item } else { lo },
                if item.0 > hi.0 { item } else { hi },
            )
        });
        Some((min.1, max.1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(sec: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 2, 5)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(sec as i64)
    }

    #[test]
    fn test_header_round_trip_for_odd_names() {
        assert_eq!(Signal::from_header("FAP life"), Some(Signal::FapLife));
        assert_eq!(Signal::from_header(" REGEN "), Some(Signal::Regen));
        assert_eq!(Signal::from_header("Avg10regen"), Some(Signal::Avg10Regen));
        assert_eq!(Signal::from_header("Unknown"), None);
    }

    #[test]
    fn test_set_drops_non_finite() {
        let mut s = Sample::new(0, ts(0));
        s.set(Signal::Speed, Some(f64::INFINITY));
        assert_eq!(s.get(Signal::Speed), None);
        s.set(Signal::Speed, Some(12.0));
        assert_eq!(s.get(Signal::Speed), Some(12.0));
    }

    #[test]
    fn test_trip_sorts_and_derives_time_diff() {
        let samples = vec![
            Sample::new(0, ts(10)),
            Sample::new(1, ts(0)),
            Sample::new(2, ts(4)),
        ];
        let trip = Trip::new(samples, ColumnSet::new()).unwrap();
        let diffs: Vec<f64> = trip.samples().iter().map(|s| s.time_diff).collect();
        let seqs: Vec<usize> = trip.samples().iter().map(|s| s.seq).collect();
        assert_eq!(diffs, vec![0.0, 4.0, 6.0]);
        assert_eq!(seqs, vec![1, 2, 0]);
    }

    #[test]
    fn test_empty_trip_is_invalid() {
        let err = Trip::new(vec![], ColumnSet::new()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn test_absent_column_differs_from_null_column() {
        let columns: ColumnSet = [Signal::Speed].into_iter().collect();
        let segment = Segment::new(vec![Sample::new(0, ts(0))], columns);
        assert!(segment.column(Signal::Revs).is_none());
        let speed = segment.column(Signal::Speed).unwrap();
        assert_eq!(speed.iter().collect::<Vec<_>>(), vec![None]);
        assert!(speed.to_vec().is_empty());
    }

    #[test]
    fn test_collection_bounds_ignore_time_order() {
        let columns: ColumnSet = [Signal::FapSoot].into_iter().collect();
        let samples = vec![
            Sample::new(2, ts(0)).with(Signal::FapSoot, 9.0),
            Sample::new(0, ts(1)).with(Signal::FapSoot, 5.0),
            Sample::new(1, ts(2)),
        ];
        let segment = Segment::new(samples, columns);
        let bounds = segment.column(Signal::FapSoot).unwrap().collection_bounds();
        assert_eq!(bounds, Some((5.0, 9.0)));
    }

    #[test]
    fn test_segment_resets_leading_gap() {
        let samples = (0..4).map(|i| Sample::new(i, ts(i as u32 * 100))).collect();
        let trip = Trip::new(samples, ColumnSet::new()).unwrap();
        let segment = trip.segment(2..4);
        assert_eq!(segment.samples()[0].time_diff, 0.0);
        assert_eq!(segment.samples()[1].time_diff, 100.0);
    }
}
