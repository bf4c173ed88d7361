use anyhow::Context;
use std::ops::Range;
use std::path::Path;

use super::ProcessingError;
use crate::models::Candle;

/// Price columns every table carries, in export order
pub const PRICE_COLUMNS: [&str; 6] = ["open", "high", "low", "close", "volume", "amount"];

/// Resolved column lookup, so hot loops skip the name search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRef {
    Open,
    High,
    Low,
    Close,
    Volume,
    Amount,
    Derived(usize),
}

/// One period of price data plus its derived values
///
/// `None` marks a value that could not be computed (indicator warm-up,
/// missing label) and gets the row dropped by [`FeatureTable::dropna`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub candle: Candle,
    pub values: Vec<Option<f64>>,
}

impl FeatureRow {
    pub fn get(&self, column: ColumnRef) -> Option<f64> {
        match column {
            ColumnRef::Open => Some(self.candle.open),
            ColumnRef::High => Some(self.candle.high),
            ColumnRef::Low => Some(self.candle.low),
            ColumnRef::Close => Some(self.candle.close),
            ColumnRef::Volume => Some(self.candle.volume),
            ColumnRef::Amount => Some(self.candle.amount),
            ColumnRef::Derived(index) => self.values.get(index).copied().flatten(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|v| v.is_some())
    }
}

/// Tabular price history with named derived columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn from_candles(candles: Vec<Candle>) -> Self {
        let rows = candles
            .into_iter()
            .map(|candle| FeatureRow {
                candle,
                values: Vec::new(),
            })
            .collect();

        Self {
            columns: Vec::new(),
            rows,
        }
    }

    /// Derived column names (price columns are implicit)
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&FeatureRow> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn candles(&self) -> impl Iterator<Item = &Candle> {
        self.rows.iter().map(|r| &r.candle)
    }

    /// Append a derived column; `values` must line up with the rows
    pub fn add_column(
        &mut self,
        name: &str,
        values: Vec<Option<f64>>,
    ) -> Result<(), ProcessingError> {
        if self.resolve(name).is_some() {
            return Err(ProcessingError::DuplicateColumn(name.to_string()));
        }
        if values.len() != self.rows.len() {
            return Err(ProcessingError::ColumnLength {
                name: name.to_string(),
                expected: self.rows.len(),
                got: values.len(),
            });
        }

        self.columns.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.values.push(value);
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Option<ColumnRef> {
        match name {
            "open" => Some(ColumnRef::Open),
            "high" => Some(ColumnRef::High),
            "low" => Some(ColumnRef::Low),
            "close" => Some(ColumnRef::Close),
            "volume" => Some(ColumnRef::Volume),
            "amount" => Some(ColumnRef::Amount),
            _ => self
                .columns
                .iter()
                .position(|c| c == name)
                .map(ColumnRef::Derived),
        }
    }

    /// Value of `name` in row `index`, `None` if missing or unknown
    pub fn value(&self, index: usize, name: &str) -> Option<f64> {
        let column = self.resolve(name)?;
        self.rows.get(index)?.get(column)
    }

    /// Full column by name
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let column = self.resolve(name)?;
        Some(self.rows.iter().map(|r| r.get(column)).collect())
    }

    /// Copy without rows that have a missing value
    pub fn dropna(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| r.is_complete()).cloned().collect(),
        }
    }

    /// Positional sub-table; out-of-range bounds are clamped
    pub fn slice(&self, range: Range<usize>) -> Self {
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);

        Self {
            columns: self.columns.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    pub(crate) fn retain_rows<F: FnMut(&FeatureRow) -> bool>(&mut self, f: F) {
        self.rows.retain(f);
    }

    pub(crate) fn sort_by_date(&mut self) {
        self.rows.sort_by_key(|r| r.candle.timestamp);
    }

    /// Write with a header row: `date` (RFC 3339), price columns, derived columns
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;

        let mut header = vec!["date".to_string()];
        header.extend(PRICE_COLUMNS.iter().map(|c| c.to_string()));
        header.extend(self.columns.iter().cloned());
        writer.write_record(&header)?;

        for row in &self.rows {
            let c = &row.candle;
            let mut record = vec![
                c.timestamp.to_rfc3339(),
                c.open.to_string(),
                c.high.to_string(),
                c.low.to_string(),
                c.close.to_string(),
                c.volume.to_string(),
                c.amount.to_string(),
            ];
            record.extend(
                row.values
                    .iter()
                    .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
            );
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn candles(n: usize) -> Vec<Candle> {
        let start = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        (0..n)
            .map(|i| Candle {
                timestamp: start + Duration::days(i as i64),
                open: 100.0 + i as f64,
                high: 102.0 + i as f64,
                low: 99.0 + i as f64,
                close: 101.0 + i as f64,
                volume: 10.0,
                amount: 5.0,
            })
            .collect()
    }

    #[test]
    fn test_add_and_lookup_column() {
        let mut table = FeatureTable::from_candles(candles(3));
        table
            .add_column("signal", vec![None, Some(1.0), Some(2.0)])
            .unwrap();

        assert_eq!(table.columns(), &["signal".to_string()]);
        assert_eq!(table.value(0, "signal"), None);
        assert_eq!(table.value(2, "signal"), Some(2.0));
        assert_eq!(table.value(1, "close"), Some(102.0));
        assert_eq!(table.value(1, "unknown"), None);
    }

    #[test]
    fn test_add_column_length_mismatch() {
        let mut table = FeatureTable::from_candles(candles(3));
        let err = table.add_column("x", vec![Some(1.0)]).unwrap_err();
        assert!(matches!(err, ProcessingError::ColumnLength { expected: 3, got: 1, .. }));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut table = FeatureTable::from_candles(candles(2));
        table.add_column("x", vec![Some(1.0), Some(2.0)]).unwrap();
        assert!(table.add_column("x", vec![None, None]).is_err());
        assert!(table.add_column("close", vec![None, None]).is_err());
    }

    #[test]
    fn test_dropna() {
        let mut table = FeatureTable::from_candles(candles(4));
        table
            .add_column("a", vec![None, Some(1.0), Some(2.0), Some(3.0)])
            .unwrap();
        table
            .add_column("b", vec![Some(0.0), Some(1.0), Some(2.0), None])
            .unwrap();

        let clean = table.dropna();
        assert_eq!(clean.len(), 2);
        assert_eq!(clean.value(0, "open"), Some(101.0));
        assert_eq!(clean.value(1, "open"), Some(102.0));
    }

    #[test]
    fn test_slice_clamps() {
        let table = FeatureTable::from_candles(candles(5));
        assert_eq!(table.slice(1..3).len(), 2);
        assert_eq!(table.slice(3..10).len(), 2);
        assert_eq!(table.slice(8..10).len(), 0);
    }

    #[test]
    fn test_write_csv() {
        let mut table = FeatureTable::from_candles(candles(2));
        table.add_column("a", vec![None, Some(1.5)]).unwrap();

        let file = tempfile::NamedTempFile::new().unwrap();
        table.write_csv(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "date,open,high,low,close,volume,amount,a");
        assert!(lines[1].ends_with(",10,5,"));
        assert!(lines[2].ends_with(",1.5"));
    }
}
