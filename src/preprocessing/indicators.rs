//! Technical indicator columns
//!
//! Names follow the stockstats convention used in research notebooks
//! (`close_10_sma`, `macd`, `rsi_6`, ...). The smoothing itself is done by
//! `yata` methods; this module only wires series together. Averages are
//! emitted from the first row, SMA as an expanding mean until its window
//! fills. RSI has no value on the first row.

use yata::core::{Method, PeriodType, ValueType};
use yata::methods::{EMA, SMA, WSMA};

use super::ProcessingError;
use crate::models::Candle;

const MACD_FAST: PeriodType = 12;
const MACD_SLOW: PeriodType = 26;
const MACD_SIGNAL: PeriodType = 9;

/// Price column an averaging indicator runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "open" => Some(Self::Open),
            "high" => Some(Self::High),
            "low" => Some(Self::Low),
            "close" => Some(Self::Close),
            "volume" => Some(Self::Volume),
            _ => None,
        }
    }

    fn extract(&self, candle: &Candle) -> ValueType {
        match self {
            Self::Open => candle.open,
            Self::High => candle.high,
            Self::Low => candle.low,
            Self::Close => candle.close,
            Self::Volume => candle.volume,
        }
    }
}

/// A parsed indicator column name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorSpec {
    Sma { field: PriceField, period: PeriodType },
    Ema { field: PriceField, period: PeriodType },
    /// EMA(12) - EMA(26) of close
    Macd,
    /// EMA(9) of MACD
    MacdSignal,
    /// MACD - signal
    MacdHistogram,
    /// Wilder-smoothed RSI of close, 0..100
    Rsi { period: PeriodType },
}

impl IndicatorSpec {
    pub fn parse(name: &str) -> Result<Self, ProcessingError> {
        match name {
            "macd" => return Ok(Self::Macd),
            "macds" => return Ok(Self::MacdSignal),
            "macdh" => return Ok(Self::MacdHistogram),
            _ => {}
        }

        let parts: Vec<&str> = name.split('_').collect();
        match parts.as_slice() {
            ["rsi", n] => Ok(Self::Rsi {
                period: parse_period(name, n)?,
            }),
            [field, n, kind @ ("sma" | "ema")] => {
                let field = PriceField::parse(field)
                    .ok_or_else(|| ProcessingError::UnknownIndicator(name.to_string()))?;
                let period = parse_period(name, n)?;
                Ok(if *kind == "sma" {
                    Self::Sma { field, period }
                } else {
                    Self::Ema { field, period }
                })
            }
            _ => Err(ProcessingError::UnknownIndicator(name.to_string())),
        }
    }

    /// Number of input rows needed before the first value is emitted
    pub fn warmup(&self) -> usize {
        match self {
            // RSI needs one price change
            Self::Rsi { .. } => 2,
            _ => 1,
        }
    }

    /// Compute the column for `candles`; warm-up positions are `None`
    pub fn compute(&self, name: &str, candles: &[Candle]) -> Result<Vec<Option<f64>>, ProcessingError> {
        let wrap = |e: yata::core::Error| ProcessingError::Indicator {
            name: name.to_string(),
            reason: format!("{:?}", e),
        };

        let series = match self {
            Self::Sma { field, period } => {
                let input: Vec<ValueType> = candles.iter().map(|c| field.extract(c)).collect();
                sma(*period, &input).map_err(wrap)?
            }
            Self::Ema { field, period } => {
                let input: Vec<ValueType> = candles.iter().map(|c| field.extract(c)).collect();
                run_method::<EMA>(*period, &input).map_err(wrap)?
            }
            Self::Macd => macd_lines(&closes(candles)).map_err(wrap)?.0,
            Self::MacdSignal => macd_lines(&closes(candles)).map_err(wrap)?.1,
            Self::MacdHistogram => {
                let (macd, signal) = macd_lines(&closes(candles)).map_err(wrap)?;
                macd.iter().zip(&signal).map(|(m, s)| m - s).collect()
            }
            Self::Rsi { period } => rsi(*period, &closes(candles)).map_err(wrap)?,
        };

        Ok(mask_warmup(series, self.warmup()))
    }
}

fn parse_period(name: &str, raw: &str) -> Result<PeriodType, ProcessingError> {
    let invalid = || ProcessingError::InvalidPeriod {
        name: name.to_string(),
        period: raw.to_string(),
    };
    let period: usize = raw.parse().map_err(|_| invalid())?;
    match PeriodType::try_from(period) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(invalid()),
    }
}

fn closes(candles: &[Candle]) -> Vec<ValueType> {
    candles.iter().map(|c| c.close).collect()
}

/// Feed `values` through a yata method seeded with the first value
fn run_method<M>(period: PeriodType, values: &[ValueType]) -> Result<Vec<ValueType>, yata::core::Error>
where
    M: Method<Params = PeriodType, Input = ValueType, Output = ValueType>,
{
    let Some(first) = values.first() else {
        return Ok(Vec::new());
    };

    let mut method = M::new(period, first)?;
    Ok(values.iter().map(|v| method.next(v)).collect())
}

/// Simple moving average, an expanding mean until `period` values are in
fn sma(period: PeriodType, values: &[ValueType]) -> Result<Vec<ValueType>, yata::core::Error> {
    let mut out = run_method::<SMA>(period, values)?;

    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate().take(period as usize - 1) {
        sum += v;
        out[i] = sum / (i + 1) as ValueType;
    }
    Ok(out)
}

/// MACD line and its signal line
fn macd_lines(closes: &[ValueType]) -> Result<(Vec<ValueType>, Vec<ValueType>), yata::core::Error> {
    let fast = run_method::<EMA>(MACD_FAST, closes)?;
    let slow = run_method::<EMA>(MACD_SLOW, closes)?;
    let macd: Vec<ValueType> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();

    let signal = run_method::<EMA>(MACD_SIGNAL, &macd)?;
    Ok((macd, signal))
}

/// Relative strength index from Wilder-smoothed gains and losses
fn rsi(period: PeriodType, closes: &[ValueType]) -> Result<Vec<ValueType>, yata::core::Error> {
    if closes.len() < 2 {
        return Ok(vec![ValueType::NAN; closes.len()]);
    }

    let (gains, losses): (Vec<ValueType>, Vec<ValueType>) = closes
        .windows(2)
        .map(|w| {
            let change = w[1] - w[0];
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let avg_gain = run_method::<WSMA>(period, &gains)?;
    let avg_loss = run_method::<WSMA>(period, &losses)?;

    // First close has no change
    let mut out = vec![ValueType::NAN];
    out.extend(avg_gain.iter().zip(&avg_loss).map(|(g, l)| {
        if *l == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + g / l)
        }
    }));
    Ok(out)
}

fn mask_warmup(series: Vec<ValueType>, warmup: usize) -> Vec<Option<f64>> {
    series
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            if i + 1 < warmup || !v.is_finite() {
                None
            } else {
                Some(v)
            }
        })
        .collect()
}
