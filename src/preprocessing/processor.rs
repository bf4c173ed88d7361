use chrono::{DateTime, Utc};

use super::indicators::IndicatorSpec;
use super::labels::{next_period_labels, quantile};
use super::table::FeatureTable;
use super::ProcessingError;
use crate::models::{Candle, PriceMovement};

/// Prepares price history for the trading environment
///
/// Adds technical indicator columns and the one-hot `fall`, `neutral`,
/// `rise` labels of the next period's move, then splits the result into
/// train / validation / trade partitions.
///
/// `fall_quantile` is the upper bound of the "fall" class: with 0.25 the
/// lowest 25% of percentage changes are labelled fall. `rise_quantile` is
/// the upper bound of "neutral"; everything above it is "rise".
pub struct CryptoHistoryTradingProcessor {
    price_data: Vec<Candle>,
    tech_indicators: Vec<(String, IndicatorSpec)>,
    fall_quantile: f64,
    rise_quantile: f64,
    prep_data: FeatureTable,
    thresholds: Option<(f64, f64)>,
}

impl CryptoHistoryTradingProcessor {
    pub fn new(
        price_data: Vec<Candle>,
        tech_indicators: &[String],
        fall_quantile: f64,
        rise_quantile: f64,
    ) -> Result<Self, ProcessingError> {
        if !(0.0..=1.0).contains(&fall_quantile)
            || !(0.0..=1.0).contains(&rise_quantile)
            || fall_quantile > rise_quantile
        {
            return Err(ProcessingError::InvalidQuantiles {
                fall: fall_quantile,
                rise: rise_quantile,
            });
        }

        let tech_indicators = tech_indicators
            .iter()
            .map(|name| IndicatorSpec::parse(name).map(|spec| (name.clone(), spec)))
            .collect::<Result<Vec<_>, _>>()?;

        let prep_data = FeatureTable::from_candles(price_data.clone());

        Ok(Self {
            price_data,
            tech_indicators,
            fall_quantile,
            rise_quantile,
            prep_data,
            thresholds: None,
        })
    }

    /// Create technical indicators and the labels
    ///
    /// Starts over from the raw price data, so calling it twice is harmless.
    pub fn preprocess_data(&mut self) -> Result<&mut Self, ProcessingError> {
        self.prep_data = FeatureTable::from_candles(self.price_data.clone());
        self.thresholds = None;

        self.add_tech_indicators()?;
        self.create_labels()?;

        tracing::info!(
            "Prepared {} rows ({} after dropping incomplete rows) with {} indicators",
            self.prep_data.len(),
            self.prep_data.dropna().len(),
            self.tech_indicators.len()
        );

        Ok(self)
    }

    fn add_tech_indicators(&mut self) -> Result<(), ProcessingError> {
        let candles: Vec<Candle> = self.prep_data.candles().cloned().collect();

        for (name, spec) in &self.tech_indicators {
            let values = spec.compute(name, &candles)?;
            self.prep_data.add_column(name, values)?;
        }

        self.prep_data = self.prep_data.dropna();
        Ok(())
    }

    /// Label each row with the quantile class of the following period
    fn create_labels(&mut self) -> Result<(), ProcessingError> {
        let changes: Vec<f64> = self
            .prep_data
            .candles()
            .map(Candle::percentage_change)
            .collect();

        let labels = if changes.is_empty() {
            Vec::new()
        } else {
            let q1 = quantile(&changes, self.fall_quantile)?;
            let q2 = quantile(&changes, self.rise_quantile)?;
            tracing::debug!("Label thresholds: fall <= {:.6} < neutral <= {:.6} < rise", q1, q2);
            self.thresholds = Some((q1, q2));
            next_period_labels(&changes, q1, q2)
        };

        for (position, name) in PriceMovement::COLUMNS.iter().enumerate() {
            let column = labels
                .iter()
                .map(|label| label.map(|l| l.one_hot()[position]))
                .collect();
            self.prep_data.add_column(name, column)?;
        }

        Ok(())
    }

    /// Keep only observations with `start <= date < end` (or `date >= start`)
    pub fn slice_data(&mut self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> &mut Self {
        self.prep_data.retain_rows(|row| {
            let date = row.candle.timestamp;
            date >= start && end.map_or(true, |e| date < e)
        });
        self.prep_data.sort_by_date();
        self
    }

    /// Split into train, validation and trade sets
    ///
    /// Train and validation get the given fractions of the rows (boundaries
    /// truncate towards zero); trade gets the remainder. Each partition drops
    /// rows with missing values.
    pub fn make_subsets(
        &self,
        train_size: f64,
        val_size: f64,
    ) -> Result<(FeatureTable, FeatureTable, FeatureTable), ProcessingError> {
        if train_size < 0.0 || val_size < 0.0 || train_size + val_size > 1.0 {
            return Err(ProcessingError::InvalidSplit {
                train: train_size,
                val: val_size,
            });
        }

        let len = self.prep_data.len();
        let train_end = (train_size * len as f64) as usize;
        let val_end = (len as f64 * (train_size + val_size)) as usize;

        let train = self.prep_data.slice(0..train_end).dropna();
        let validation = self.prep_data.slice(train_end..val_end).dropna();
        let trade = self.prep_data.slice(val_end..len).dropna();

        tracing::info!(
            "Split {} rows into train={} validation={} trade={}",
            len,
            train.len(),
            validation.len(),
            trade.len()
        );

        Ok((train, validation, trade))
    }

    /// The prepared table without incomplete rows
    pub fn prep_data(&self) -> FeatureTable {
        self.prep_data.dropna()
    }

    /// `(fall, rise)` thresholds of the last preprocessing run
    pub fn quantile_thresholds(&self) -> Option<(f64, f64)> {
        self.thresholds
    }

    pub fn tech_indicators(&self) -> Vec<String> {
        self.tech_indicators.iter().map(|(n, _)| n.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{MarketScenario, SyntheticDataGenerator};
    use chrono::{Duration, TimeZone};

    fn indicators() -> Vec<String> {
        ["close_10_sma", "close_20_sma", "macd", "macds", "rsi_6"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn processed(days: usize) -> CryptoHistoryTradingProcessor {
        let candles = SyntheticDataGenerator::new(42).generate(MarketScenario::Volatile, days);
        let mut processor =
            CryptoHistoryTradingProcessor::new(candles, &indicators(), 0.33, 0.66).unwrap();
        processor.preprocess_data().unwrap();
        processor
    }

    #[test]
    fn test_invalid_quantiles() {
        let result = CryptoHistoryTradingProcessor::new(vec![], &[], 0.7, 0.3);
        assert!(matches!(result, Err(ProcessingError::InvalidQuantiles { .. })));

        let result = CryptoHistoryTradingProcessor::new(vec![], &[], -0.1, 0.3);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_indicator() {
        let result =
            CryptoHistoryTradingProcessor::new(vec![], &["wobble".to_string()], 0.3, 0.6);
        assert!(matches!(result, Err(ProcessingError::UnknownIndicator(_))));
    }

    #[test]
    fn test_preprocess_drops_first_and_last_row() {
        let processor = processed(200);
        let prep = processor.prep_data();

        // rsi has no value on the first row; the last row has no next-period label
        assert_eq!(prep.len(), 200 - 1 - 1);
        let candles = SyntheticDataGenerator::new(42).generate(MarketScenario::Volatile, 200);
        assert_eq!(prep.rows()[0].candle.timestamp, candles[1].timestamp);
        assert_eq!(
            prep.columns(),
            &[
                "close_10_sma",
                "close_20_sma",
                "macd",
                "macds",
                "rsi_6",
                "fall",
                "neutral",
                "rise"
            ]
        );
    }

    #[test]
    fn test_labels_are_one_hot_and_follow_quantiles() {
        let processor = processed(300);
        let prep = processor.prep_data();
        let (q1, q2) = processor.quantile_thresholds().unwrap();
        assert!(q1 <= q2);

        for i in 0..prep.len() - 1 {
            let fall = prep.value(i, "fall").unwrap();
            let neutral = prep.value(i, "neutral").unwrap();
            let rise = prep.value(i, "rise").unwrap();
            assert_eq!(fall + neutral + rise, 1.0);

            // Label of row i describes row i + 1
            let next_change = prep.rows()[i + 1].candle.percentage_change();
            let expected = PriceMovement::classify(next_change, q1, q2);
            assert_eq!([fall, neutral, rise], expected.one_hot());
        }
    }

    #[test]
    fn test_class_proportions_roughly_match_quantiles() {
        let processor = processed(600);
        let prep = processor.prep_data();
        let n = prep.len() as f64;

        let falls: f64 = prep.column("fall").unwrap().iter().flatten().sum();
        let rises: f64 = prep.column("rise").unwrap().iter().flatten().sum();

        assert!((falls / n - 0.33).abs() < 0.05);
        assert!((rises / n - 0.34).abs() < 0.05);
    }

    #[test]
    fn test_preprocess_is_repeatable() {
        let mut processor = processed(120);
        let first = processor.prep_data();
        processor.preprocess_data().unwrap();
        assert_eq!(first, processor.prep_data());
    }

    #[test]
    fn test_make_subsets_positional() {
        let processor = processed(200);
        let total = processor.prep_data.len();
        let (train, val, trade) = processor.make_subsets(0.8, 0.1).unwrap();

        let train_end = (0.8 * total as f64) as usize;
        let val_end = (total as f64 * 0.9) as usize;
        assert_eq!(train.len(), train_end);
        assert_eq!(val.len(), val_end - train_end);
        // Trade partition loses the unlabeled last row
        assert_eq!(trade.len(), total - val_end - 1);

        assert!(train.rows().last().unwrap().candle.timestamp < val.rows()[0].candle.timestamp);
        assert!(val.rows().last().unwrap().candle.timestamp < trade.rows()[0].candle.timestamp);
    }

    #[test]
    fn test_make_subsets_invalid_sizes() {
        let processor = processed(100);
        assert!(processor.make_subsets(0.9, 0.2).is_err());
        assert!(processor.make_subsets(-0.1, 0.2).is_err());
    }

    #[test]
    fn test_slice_data() {
        let mut processor = processed(200);
        let first = processor.prep_data().rows()[0].candle.timestamp;
        let start = first + Duration::days(10);
        let end = first + Duration::days(20);

        processor.slice_data(start, Some(end));
        let sliced = processor.prep_data();
        assert_eq!(sliced.len(), 10);
        assert_eq!(sliced.rows()[0].candle.timestamp, start);

        processor.slice_data(start + Duration::days(5), None);
        assert_eq!(processor.prep_data().len(), 5);
    }

    #[test]
    fn test_empty_input() {
        let mut processor =
            CryptoHistoryTradingProcessor::new(Vec::new(), &indicators(), 0.33, 0.66).unwrap();
        processor.preprocess_data().unwrap();

        assert!(processor.prep_data().is_empty());
        assert!(processor.quantile_thresholds().is_none());
        let (train, val, trade) = processor.make_subsets(0.8, 0.1).unwrap();
        assert!(train.is_empty() && val.is_empty() && trade.is_empty());
    }

    #[test]
    fn test_short_history() {
        let start = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let candles: Vec<Candle> = (0..5)
            .map(|i| Candle {
                timestamp: start + Duration::days(i),
                open: 10.0,
                high: 11.0,
                low: 9.0,
                close: 10.5,
                volume: 1.0,
                amount: 1.0,
            })
            .collect();

        let mut processor =
            CryptoHistoryTradingProcessor::new(candles.clone(), &indicators(), 0.33, 0.66).unwrap();
        processor.preprocess_data().unwrap();
        assert_eq!(processor.prep_data().len(), 3);
        assert_eq!(processor.prep_data().value(0, "close_20_sma"), Some(10.5));

        let mut processor =
            CryptoHistoryTradingProcessor::new(candles[..1].to_vec(), &indicators(), 0.33, 0.66)
                .unwrap();
        processor.preprocess_data().unwrap();
        assert!(processor.prep_data().is_empty());
    }
}
