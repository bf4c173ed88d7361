use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

use super::validator::CandleValidator;
use crate::models::Candle;

/// One line of a Kraken OHLCVT export
///
/// The export has no header row; columns are positional:
/// `date, open, high, low, close, volume, amount`.
#[derive(Debug, Deserialize)]
struct KrakenRow {
    date: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    amount: f64,
}

/// Outcome counters of a history import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadStats {
    pub parsed_rows: usize,
    pub skipped_rows: usize,
}

/// Import historical price data exported from the Kraken exchange
///
/// Timestamps are Unix seconds and are converted to UTC. Rows come back in
/// file order; rows failing validation are dropped.
pub fn read_kraken_history<P: AsRef<Path>>(path: P) -> Result<Vec<Candle>> {
    read_kraken_history_with_stats(path).map(|(candles, _)| candles)
}

/// Same as [`read_kraken_history`] but also reports how many rows were skipped
pub fn read_kraken_history_with_stats<P: AsRef<Path>>(path: P) -> Result<(Vec<Candle>, LoadStats)> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open price history: {:?}", path))?;

    let validator = CandleValidator::new();
    let mut stats = LoadStats::default();
    let mut candles = Vec::new();

    for (line, result) in reader.deserialize::<KrakenRow>().enumerate() {
        let row = result.with_context(|| format!("Malformed row {} in {:?}", line + 1, path))?;
        stats.parsed_rows += 1;

        let timestamp = DateTime::<Utc>::from_timestamp(row.date, 0).with_context(|| {
            format!("Timestamp {} out of range on row {} in {:?}", row.date, line + 1, path)
        })?;

        let candle = Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            amount: row.amount,
        };

        if let Err(e) = validator.validate(&candle) {
            tracing::warn!("Skipping row {} at {}: {}", line + 1, candle.timestamp, e);
            stats.skipped_rows += 1;
            continue;
        }

        candles.push(candle);
    }

    tracing::info!(
        "Loaded {} candles from {:?} ({} skipped)",
        candles.len(),
        path,
        stats.skipped_rows
    );

    Ok((candles, stats))
}

/// Write candles in the Kraken export layout (no header, Unix seconds)
pub fn write_candles<P: AsRef<Path>>(path: P, candles: &[Candle]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("Failed to create file: {:?}", path))?;

    for candle in candles {
        writer.write_record(&[
            candle.timestamp.timestamp().to_string(),
            candle.open.to_string(),
            candle.high.to_string(),
            candle.low.to_string(),
            candle.close.to_string(),
            candle.volume.to_string(),
            candle.amount.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_read_kraken_history() {
        let file = write_file(
            "1381017600,122.0,122.0,122.0,122.0,0.1,1\n\
             1381104000,123.61,123.61,122.0,123.61,0.1,2\n",
        );

        let candles = read_kraken_history(file.path()).unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp.timestamp(), 1_381_017_600);
        assert_eq!(candles[0].timestamp.to_rfc3339(), "2013-10-06T00:00:00+00:00");
        assert_eq!(candles[1].open, 123.61);
        assert_eq!(candles[1].low, 122.0);
        assert_eq!(candles[1].close, 123.61);
        assert_eq!(candles[1].amount, 2.0);
    }

    #[test]
    fn test_invalid_rows_are_skipped() {
        let file = write_file(
            "1381017600,122.0,122.0,122.0,122.0,0.1,1\n\
             1381104000,-1.0,123.61,122.0,123.61,0.1,2\n\
             1381190400,123.0,124.0,121.0,123.5,0.4,3\n",
        );

        let (candles, stats) = read_kraken_history_with_stats(file.path()).unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(stats.parsed_rows, 3);
        assert_eq!(stats.skipped_rows, 1);
        assert_eq!(candles[1].close, 123.5);
    }

    #[test]
    fn test_malformed_row_is_error() {
        let file = write_file("1381017600,122.0,abc,122.0,122.0,0.1,1\n");

        let err = read_kraken_history(file.path()).unwrap_err();
        assert!(err.to_string().contains("Malformed row 1"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = read_kraken_history("/definitely/not/here.csv").unwrap_err();
        assert!(err.to_string().contains("Failed to open price history"));
    }

    #[test]
    fn test_write_then_read_preserves_layout() {
        let file = write_file("1381017600,122.0,125.0,121.0,124.0,0.5,7\n");
        let candles = read_kraken_history(file.path()).unwrap();

        let out = NamedTempFile::new().unwrap();
        write_candles(out.path(), &candles).unwrap();

        let written = std::fs::read_to_string(out.path()).unwrap();
        assert_eq!(written.trim(), "1381017600,122,125,121,124,0.5,7");
    }

    #[test]
    fn test_out_of_range_timestamp_is_error() {
        let file = write_file("99999999999999999,1.0,1.0,1.0,1.0,1.0,1\n");

        let err = read_kraken_history(file.path()).unwrap_err();
        assert!(err.to_string().contains("out of range on row 1"));
    }

    #[test]
    fn test_long_synthetic_history_loads_every_row() {
        use crate::io::{MarketScenario, SyntheticDataGenerator};

        // Ten years from 2020 runs well past the current date
        let candles = SyntheticDataGenerator::new(42).generate(MarketScenario::Sideways, 3500);
        let out = NamedTempFile::new().unwrap();
        write_candles(out.path(), &candles).unwrap();

        let (loaded, stats) = read_kraken_history_with_stats(out.path()).unwrap();

        assert_eq!(loaded.len(), 3500);
        assert_eq!(stats.parsed_rows, 3500);
        assert_eq!(stats.skipped_rows, 0);
        assert_eq!(loaded.last().unwrap().timestamp, candles.last().unwrap().timestamp);
    }
}
