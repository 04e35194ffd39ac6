use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use csv::StringRecord;
use thiserror::Error;
use tracing::debug;

use crate::data::Bar;

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

const HEADER_NAMES: [&str; 5] = ["date", "datetime", "timestamp", "time", "open_time"];

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to open {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV input")]
    Csv(#[from] csv::Error),

    #[error("input file contains no valid rows")]
    Empty,

    #[error("unable to infer timestamp from record: {0:?}")]
    Timestamp(StringRecord),

    #[error("failed to parse numeric field '{field}' from value '{value}'")]
    ParseNumber { field: &'static str, value: String },

    #[error("no price history for {symbol} ({interval}) under {root:?}")]
    MissingSymbol {
        symbol: String,
        interval: String,
        root: PathBuf,
    },
}

/// Source of bar tables keyed by symbol and interval.
pub trait PriceHistory {
    /// The most recent `bar_count` bars (all of them when `bar_count` is 0),
    /// numbered from 0.
    fn get_price_history(&self, symbol: &str, bar_count: usize, interval: &str) -> Result<Vec<Bar>, LoaderError>;
}

/// CSV files in one directory, named `<symbol>_<interval>.csv` or
/// `<symbol>.csv`.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    pub root: PathBuf,
    pub timezone: Tz,
}

impl CsvDirectory {
    pub fn new(root: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self {
            root: root.into(),
            timezone,
        }
    }

    fn resolve(&self, symbol: &str, interval: &str) -> Option<PathBuf> {
        [
            self.root.join(format!("{symbol}_{interval}.csv")),
            self.root.join(format!("{symbol}.csv")),
        ]
        .into_iter()
        .find(|path| path.is_file())
    }
}

impl PriceHistory for CsvDirectory {
    fn get_price_history(&self, symbol: &str, bar_count: usize, interval: &str) -> Result<Vec<Bar>, LoaderError> {
        let path = self.resolve(symbol, interval).ok_or_else(|| LoaderError::MissingSymbol {
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            root: self.root.clone(),
        })?;
        let bars = load_bars_from_csv(&path, self.timezone)?;
        debug!(symbol, interval, path = ?path, bars = bars.len(), "loaded price history");
        Ok(tail(bars, bar_count))
    }
}

/// Read OHLCV bars from a CSV file.
///
/// Accepts a header row or none, and one of three timestamp layouts: separate
/// date and time columns, one datetime column, or unix epoch seconds or
/// milliseconds. Naive times are read in `tz`. Rows come back sorted by time,
/// duplicates dropped, numbered from 0.
pub fn load_bars_from_csv<P: AsRef<Path>>(path: P, tz: Tz) -> Result<Vec<Bar>, LoaderError> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref).map_err(|source| LoaderError::Io {
        path: path_ref.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        if let Some(bar) = parse_record(&record, tz)? {
            bars.push(bar);
        }
    }

    if bars.is_empty() {
        return Err(LoaderError::Empty);
    }

    bars.sort_by_key(|bar| bar.timestamp);
    bars.dedup_by_key(|bar| bar.timestamp);
    Ok(renumber(bars))
}

/// Keep the last `count` bars and renumber them from 0.
fn tail(mut bars: Vec<Bar>, count: usize) -> Vec<Bar> {
    if count > 0 && bars.len() > count {
        bars.drain(..bars.len() - count);
    }
    renumber(bars)
}

fn renumber(mut bars: Vec<Bar>) -> Vec<Bar> {
    for (idx, bar) in bars.iter_mut().enumerate() {
        bar.bar_number = idx;
    }
    bars
}

fn parse_record(record: &StringRecord, tz: Tz) -> Result<Option<Bar>, LoaderError> {
    if let Some(first) = record.get(0) {
        let first = first.trim();
        if HEADER_NAMES.iter().any(|name| first.eq_ignore_ascii_case(name)) {
            return Ok(None);
        }
    }

    let fields: Vec<&str> = record.iter().map(str::trim).filter(|f| !f.is_empty()).collect();
    if fields.len() < 6 {
        return Ok(None);
    }

    let (timestamp, offset) = if fields.len() >= 7 {
        let naive = parse_datetime_pair(fields[0], fields[1])?;
        (localize(tz, &naive), 2)
    } else if let Some(instant) = parse_epoch(fields[0]) {
        (instant.with_timezone(&tz), 1)
    } else {
        let naive = parse_datetime_string(fields[0]).ok_or_else(|| LoaderError::Timestamp(record.clone()))?;
        (localize(tz, &naive), 1)
    };

    let number = |idx: usize, field: &'static str| parse_number(fields.get(offset + idx).copied(), field);
    Ok(Some(Bar {
        bar_number: 0,
        timestamp: Some(timestamp),
        open: number(0, "open")?,
        high: number(1, "high")?,
        low: number(2, "low")?,
        close: number(3, "close")?,
        volume: number(4, "volume")?,
    }))
}

fn localize(tz: Tz, naive: &NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => tz.from_utc_datetime(naive),
    }
}

fn parse_epoch(value: &str) -> Option<DateTime<Utc>> {
    let raw: i64 = value.parse().ok()?;
    if raw > EPOCH_MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(raw)
    } else {
        DateTime::from_timestamp(raw, 0)
    }
}

fn parse_number(value: Option<&str>, field: &'static str) -> Result<f64, LoaderError> {
    let value = value.ok_or_else(|| LoaderError::ParseNumber {
        field,
        value: String::from("<missing>"),
    })?;
    value.replace(',', "").parse::<f64>().map_err(|_| LoaderError::ParseNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_datetime_pair(date_str: &str, time_str: &str) -> Result<NaiveDateTime, LoaderError> {
    let date = parse_date(date_str)?;
    let time = parse_time(time_str)?;
    Ok(NaiveDateTime::new(date, time))
}

fn parse_datetime_string(value: &str) -> Option<NaiveDateTime> {
    let patterns = [
        "%Y-%m-%d %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    patterns
        .iter()
        .find_map(|pattern| NaiveDateTime::parse_from_str(value, pattern).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

fn parse_date(value: &str) -> Result<NaiveDate, LoaderError> {
    let patterns = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    patterns
        .iter()
        .find_map(|pattern| NaiveDate::parse_from_str(value, pattern).ok())
        .ok_or_else(|| LoaderError::Timestamp(StringRecord::from(vec![value])))
}

fn parse_time(value: &str) -> Result<NaiveTime, LoaderError> {
    let patterns = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
    patterns
        .iter()
        .find_map(|pattern| NaiveTime::parse_from_str(value, pattern).ok())
        .ok_or_else(|| LoaderError::Timestamp(StringRecord::from(vec![value])))
}
