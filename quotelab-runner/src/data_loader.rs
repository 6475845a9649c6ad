//! Bar loading for the runner.
//!
//! Real data lives in one CSV per symbol, `<dir>/<SYMBOL>.csv`, with columns
//! `timestamp,open,high,low,close` and an optional `volume`. Header names are
//! matched case-insensitively, `unix` is accepted for `timestamp`, and extra
//! columns are ignored. Timestamps may be RFC 3339 or unix seconds,
//! milliseconds or microseconds.
//!
//! Rows are sorted, duplicate timestamps dropped (first row wins) and the
//! symbols aligned on the timestamps they all share. Synthetic data skips the
//! files but goes through the same fingerprinting.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use quotelab_core::data::{align_on_common_timestamps, MarketData};
use quotelab_core::domain::Bar;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DataConfig;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data file for '{symbol}' at {path}")]
    MissingFile { symbol: String, path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}:{line}: unparseable timestamp '{value}'")]
    Timestamp { path: PathBuf, line: usize, value: String },

    #[error("{path}:{line}: not a sane OHLC bar")]
    InvalidBar { path: PathBuf, line: usize },

    #[error("no rows for '{symbol}'")]
    Empty { symbol: String },

    #[error("symbols share no timestamps")]
    NoCommonTimestamps,

    #[error("invalid synthetic data settings: {0}")]
    Synthetic(String),
}

/// Aligned data plus its provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub data: MarketData,
    /// BLAKE3 over symbols, timestamps and OHLC values.
    pub dataset_hash: String,
    /// Rows discarded per symbol during alignment.
    pub dropped: BTreeMap<String, usize>,
    pub synthetic: bool,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "unix")]
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    #[allow(dead_code)]
    volume: Option<f64>,
}

#[derive(Debug, Serialize)]
struct CsvOutRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

/// Resolve `source` into aligned market data for `symbols`.
///
/// `dir_override` replaces the CSV directory, and forces CSV loading even when
/// the config asks for synthetic data.
pub fn load_market_data(
    source: &DataConfig,
    symbols: &[String],
    dir_override: Option<&Path>,
) -> Result<LoadedData, LoadError> {
    match (source, dir_override) {
        (_, Some(dir)) => load_csv_dir(dir, symbols),
        (DataConfig::Csv { dir }, None) => load_csv_dir(dir, symbols),
        (DataConfig::Synthetic(synthetic), None) => {
            synthetic.validate().map_err(LoadError::Synthetic)?;
            let data = synthetic.generate(symbols);
            info!(symbols = symbols.len(), bars = synthetic.bars, seed = synthetic.seed, "generated synthetic data");
            Ok(LoadedData {
                dataset_hash: dataset_hash(&data),
                data,
                dropped: BTreeMap::new(),
                synthetic: true,
            })
        }
    }
}

/// Load `<dir>/<SYMBOL>.csv` for every symbol and align them.
pub fn load_csv_dir(dir: &Path, symbols: &[String]) -> Result<LoadedData, LoadError> {
    let mut raw = BTreeMap::new();
    for symbol in symbols {
        let path = dir.join(format!("{symbol}.csv"));
        if !path.is_file() {
            return Err(LoadError::MissingFile {
                symbol: symbol.clone(),
                path,
            });
        }
        let bars = read_csv_bars(&path)?;
        if bars.is_empty() {
            return Err(LoadError::Empty { symbol: symbol.clone() });
        }
        raw.insert(symbol.clone(), bars);
    }

    let aligned = align_on_common_timestamps(raw);
    for (symbol, &count) in &aligned.dropped {
        if count > 0 {
            warn!(symbol = %symbol, dropped = count, "rows without a common timestamp dropped");
        }
    }
    if aligned.data.iter().any(|(_, series)| series.is_empty()) {
        return Err(LoadError::NoCommonTimestamps);
    }

    info!(dir = %dir.display(), symbols = symbols.len(), steps = aligned.data.num_steps(), "loaded CSV data");
    Ok(LoadedData {
        dataset_hash: dataset_hash(&aligned.data),
        data: aligned.data,
        dropped: aligned.dropped,
        synthetic: false,
    })
}

/// Bars of one CSV file, ascending, one per timestamp.
pub fn read_csv_bars(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;
    let headers: csv::StringRecord = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    reader.set_headers(headers);

    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let line = i + 2;
        let row = row.map_err(csv_err)?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.to_path_buf(),
            line,
            value: row.timestamp.clone(),
        })?;
        let bar = Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
        };
        if !bar.is_sane() {
            return Err(LoadError::InvalidBar {
                path: path.to_path_buf(),
                line,
            });
        }
        bars.push(bar);
    }

    bars.sort_by_key(|b| b.timestamp);
    let before = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    if bars.len() < before {
        debug!(path = %path.display(), duplicates = before - bars.len(), "duplicate timestamps dropped");
    }
    Ok(bars)
}

/// RFC 3339, or an integer unix time whose magnitude picks the unit.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    let n: i64 = value.parse().ok()?;
    match n.unsigned_abs() {
        0..=99_999_999_999 => DateTime::from_timestamp(n, 0),
        100_000_000_000..=99_999_999_999_999 => DateTime::from_timestamp_millis(n),
        _ => DateTime::from_timestamp_micros(n),
    }
}

/// Write bars in the format `read_csv_bars` reads.
pub fn write_bars_csv(path: &Path, bars: &[Bar]) -> Result<(), LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for bar in bars {
        writer
            .serialize(CsvOutRow {
                timestamp: bar.timestamp.to_rfc3339(),
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
            })
            .map_err(csv_err)?;
    }
    writer.flush().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// BLAKE3 fingerprint of the data a run sees.
pub fn dataset_hash(data: &MarketData) -> String {
    let mut hasher = blake3::Hasher::new();
    for (symbol, series) in data.iter() {
        hasher.update(symbol.as_bytes());
        hasher.update(&(series.len() as u64).to_le_bytes());
        for i in 0..series.len() {
            hasher.update(&series.timestamps[i].timestamp_millis().to_le_bytes());
            for column in [&series.open, &series.high, &series.low, &series.close] {
                hasher.update(&column[i].to_le_bytes());
            }
        }
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticConfig;
    use std::fs;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn parses_timestamp_formats() {
        let expected = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(parse_timestamp("1700000000"), Some(expected));
        assert_eq!(parse_timestamp("1700000000000"), Some(expected));
        assert_eq!(parse_timestamp("1700000000000000"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-14T22:13:20Z"), Some(expected));
        assert_eq!(parse_timestamp("2023-11-14T23:13:20+01:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn reads_sorts_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "BTC.csv",
            "Unix,Symbol,Open,High,Low,Close,Volume\n\
             7200,BTC,101,102,100,101.5,3\n\
             3600,BTC,100,101,99,101,2\n\
             3600,BTC,1,1,1,1,0\n\
             0,BTC,99,100,98,100,1\n",
        );
        let bars = read_csv_bars(&path).unwrap();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp.timestamp(), 0);
        assert_eq!(bars[1].open, 100.0);
        assert_eq!(bars[2].close, 101.5);
    }

    #[test]
    fn bad_rows_carry_their_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "X.csv", "timestamp,open,high,low,close\n0,1,2,0.5,1\nsoon,1,2,0.5,1\n");
        match read_csv_bars(&path).unwrap_err() {
            LoadError::Timestamp { line, value, .. } => {
                assert_eq!(line, 3);
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected {other:?}"),
        }

        let path = write(dir.path(), "Y.csv", "timestamp,open,high,low,close\n0,1,0.9,0.5,1\n");
        assert!(matches!(read_csv_bars(&path).unwrap_err(), LoadError::InvalidBar { line: 2, .. }));
    }

    #[test]
    fn aligns_symbols_on_shared_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "A.csv",
            "timestamp,open,high,low,close\n0,10,11,9,10\n3600,10,11,9,10\n7200,10,11,9,10\n",
        );
        write(dir.path(), "B.csv", "timestamp,open,high,low,close\n3600,20,21,19,20\n7200,20,21,19,20\n");
        let symbols = vec!["A".to_string(), "B".to_string()];
        let loaded = load_csv_dir(dir.path(), &symbols).unwrap();
        assert_eq!(loaded.data.validate().unwrap(), 2);
        assert_eq!(loaded.dropped["A"], 1);
        assert_eq!(loaded.dropped["B"], 0);
        assert!(!loaded.synthetic);
    }

    #[test]
    fn missing_file_and_disjoint_data_fail() {
        let dir = tempfile::tempdir().unwrap();
        let symbols = vec!["A".to_string(), "B".to_string()];
        write(dir.path(), "A.csv", "timestamp,open,high,low,close\n0,10,11,9,10\n");
        assert!(matches!(
            load_csv_dir(dir.path(), &symbols).unwrap_err(),
            LoadError::MissingFile { ref symbol, .. } if symbol == "B"
        ));

        write(dir.path(), "B.csv", "timestamp,open,high,low,close\n3600,10,11,9,10\n");
        assert!(matches!(load_csv_dir(dir.path(), &symbols).unwrap_err(), LoadError::NoCommonTimestamps));
    }

    #[test]
    fn written_bars_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let bars = SyntheticConfig {
            bars: 25,
            ..SyntheticConfig::default()
        }
        .generate_bars("SYN");
        let path = dir.path().join("SYN.csv");
        write_bars_csv(&path, &bars).unwrap();
        assert_eq!(read_csv_bars(&path).unwrap(), bars);
    }

    #[test]
    fn synthetic_source_and_override() {
        let symbols = vec!["S".to_string()];
        let source = DataConfig::Synthetic(SyntheticConfig {
            bars: 10,
            ..SyntheticConfig::default()
        });
        let loaded = load_market_data(&source, &symbols, None).unwrap();
        assert!(loaded.synthetic);
        assert_eq!(loaded.data.num_steps(), 10);

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_market_data(&source, &symbols, Some(dir.path())).unwrap_err(),
            LoadError::MissingFile { .. }
        ));
    }

    #[test]
    fn dataset_hash_tracks_content() {
        let cfg = SyntheticConfig {
            bars: 20,
            ..SyntheticConfig::default()
        };
        let symbols = vec!["S".to_string()];
        let a = dataset_hash(&cfg.generate(&symbols));
        let b = dataset_hash(&cfg.generate(&symbols));
        let c = dataset_hash(&SyntheticConfig { seed: 1, ..cfg }.generate(&symbols));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
