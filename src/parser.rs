//! Parser for semicolon-delimited engine controller logs.

use chrono::NaiveDateTime;
use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, Result};
use crate::model::{ColumnSet, Sample, Signal, Trip};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d.%m.%Y %H:%M",
];

/// Decodes a raw log into a time-normalized [`Trip`].
///
/// Gzip input is decompressed first, and the text is read as Latin-1.
/// Rows without a parseable `Date` + `Time` are dropped, as are rows that
/// carry one of the configured sentinel readings. Unparseable sensor values
/// become null.
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidInput`] if the `Date` or `Time` column is
/// missing or no row has a valid timestamp, and [`AnalysisError::Csv`] for
/// malformed CSV.
pub fn parse_log(bytes: &[u8], config: &AnalysisConfig) -> Result<Trip> {
    let text = decode_latin1(&decompress(bytes)?);

    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let layout = Layout::from_headers(&headers)?;

    let mut samples = Vec::new();
    let mut dropped_timestamps = 0usize;
    let mut dropped_sentinels = 0usize;

    for (seq, record) in reader.records().enumerate() {
        let record = record?;

        let Some(timestamp) = parse_timestamp(
            record.get(layout.date).unwrap_or(""),
            record.get(layout.time).unwrap_or(""),
        ) else {
            dropped_timestamps += 1;
            continue;
        };

        let mut sample = Sample::new(seq, timestamp);
        for &(index, signal) in &layout.signals {
            sample.set(signal, record.get(index).and_then(parse_number));
        }

        if is_sentinel_row(&sample, config) {
            dropped_sentinels += 1;
            continue;
        }

        samples.push(sample);
    }

    if dropped_timestamps > 0 {
        warn!(dropped = dropped_timestamps, "Dropped rows with invalid timestamps");
    }
    debug!(
        rows = samples.len(),
        dropped_sentinels,
        columns = layout.columns.len(),
        "Log parsed"
    );

    Trip::new(samples, layout.columns)
}

/// Column positions resolved from the header row.
struct Layout {
    date: usize,
    time: usize,
    signals: Vec<(usize, Signal)>,
    columns: ColumnSet,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let date = position("Date")
            .ok_or_else(|| AnalysisError::InvalidInput("missing 'Date' column".into()))?;
        let time = position("Time")
            .ok_or_else(|| AnalysisError::InvalidInput("missing 'Time' column".into()))?;

        let mut signals = Vec::new();
        let mut columns = ColumnSet::new();
        for (index, header) in headers.iter().enumerate() {
            if let Some(signal) = Signal::from_header(header) {
                // first occurrence wins on duplicated headers
                if columns.insert(signal) {
                    signals.push((index, signal));
                }
            }
        }

        Ok(Self {
            date,
            time,
            signals,
            columns,
        })
    }
}

fn decompress(bytes: &[u8]) -> Result<Vec<u8>> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(bytes.to_vec());
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Latin-1 maps every byte to the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Combines the `Date` and `Time` fields into one timestamp.
pub fn parse_timestamp(date: &str, time: &str) -> Option<NaiveDateTime> {
    let date = date.trim();
    let time = time.trim();
    if date.is_empty() || time.is_empty() {
        return None;
    }
    let joined = format!("{date} {time}");
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&joined, fmt).ok())
}

/// Coerces a field to a finite number; anything else is null.
pub fn parse_number(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let value = match raw.parse::<f64>() {
        Ok(v) => v,
        Err(_) => raw.replace(',', ".").parse::<f64>().ok()?,
    };
    value.is_finite().then_some(value)
}

fn is_sentinel_row(sample: &Sample, config: &AnalysisConfig) -> bool {
    let hit = |signal: Signal, sentinel: Option<f64>| {
        matches!((sample.get(signal), sentinel), (Some(v), Some(s)) if v == s)
    };
    hit(Signal::FapPressure, config.sentinels.fap_pressure)
        || hit(Signal::FapTemp, config.sentinels.fap_temp)
}
