// Feature engineering: indicators, quantile labels, dataset splits
pub mod indicators;
pub mod labels;
pub mod processor;
pub mod table;

pub use indicators::IndicatorSpec;
pub use labels::quantile;
pub use processor::CryptoHistoryTradingProcessor;
pub use table::{ColumnRef, FeatureRow, FeatureTable, PRICE_COLUMNS};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("unknown technical indicator: {0}")]
    UnknownIndicator(String),

    #[error("invalid period '{period}' in indicator {name}")]
    InvalidPeriod { name: String, period: String },

    #[error("indicator {name} failed: {reason}")]
    Indicator { name: String, reason: String },

    #[error("invalid quantiles: fall={fall}, rise={rise} (need 0 <= fall <= rise <= 1)")]
    InvalidQuantiles { fall: f64, rise: f64 },

    #[error("invalid split: train={train}, val={val} (need non-negative sizes summing to at most 1)")]
    InvalidSplit { train: f64, val: f64 },

    #[error("cannot take a quantile of an empty series")]
    EmptySeries,

    #[error("column {name} has {got} values, table has {expected} rows")]
    ColumnLength {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("column {0} already exists")]
    DuplicateColumn(String),
}
