use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// OHLCV candlestick as exported by the exchange
///
/// `amount` is the number of trades in the period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
}

impl Candle {
    /// Relative move from open to close, e.g. 0.02 for +2%
    pub fn percentage_change(&self) -> f64 {
        (self.close - self.open) / self.open
    }
}

/// First component of an action: what to do with the position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ActionType {
    Buy,
    Sell,
    Hold,
}

impl ActionType {
    pub const COUNT: usize = 3;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ActionType::Buy),
            1 => Some(ActionType::Sell),
            2 => Some(ActionType::Hold),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ActionType::Buy => 0,
            ActionType::Sell => 1,
            ActionType::Hold => 2,
        }
    }
}

/// Action of the trading environment: `MultiDiscrete([3, 10])`
///
/// The second component is the traded share in tenths: of the cash balance
/// for a buy, of the held coins for a sell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TradeAction {
    pub action_type: ActionType,
    pub fraction_tenths: u8,
}

impl TradeAction {
    pub const FRACTION_STEPS: usize = 10;

    pub fn new(action_type: ActionType, fraction_tenths: u8) -> Self {
        Self {
            action_type,
            fraction_tenths,
        }
    }

    pub fn hold() -> Self {
        Self::new(ActionType::Hold, 0)
    }

    /// Build from the raw discrete components, rejecting out-of-range values
    pub fn from_raw(raw: [usize; 2]) -> Option<Self> {
        let action_type = ActionType::from_index(raw[0])?;
        if raw[1] >= Self::FRACTION_STEPS {
            return None;
        }
        Some(Self::new(action_type, raw[1] as u8))
    }

    pub fn to_raw(&self) -> [usize; 2] {
        [self.action_type.index(), self.fraction_tenths as usize]
    }

    pub fn fraction(&self) -> f64 {
        f64::from(self.fraction_tenths) / 10.0
    }

    pub fn is_valid(&self) -> bool {
        (self.fraction_tenths as usize) < Self::FRACTION_STEPS
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.to_raw();
        write!(f, "[{} {}]", a, b)
    }
}

/// Quantile class of a period's percentage price change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PriceMovement {
    Fall,
    Neutral,
    Rise,
}

impl PriceMovement {
    pub const COLUMNS: [&'static str; 3] = ["fall", "neutral", "rise"];

    /// Classify a change against the fall/rise quantile thresholds
    pub fn classify(change: f64, fall_threshold: f64, rise_threshold: f64) -> Self {
        if change <= fall_threshold {
            PriceMovement::Fall
        } else if change <= rise_threshold {
            PriceMovement::Neutral
        } else {
            PriceMovement::Rise
        }
    }

    /// One-hot encoding in `fall, neutral, rise` column order
    pub fn one_hot(&self) -> [f64; 3] {
        match self {
            PriceMovement::Fall => [1.0, 0.0, 0.0],
            PriceMovement::Neutral => [0.0, 1.0, 0.0],
            PriceMovement::Rise => [0.0, 0.0, 1.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_percentage_change() {
        let candle = Candle {
            timestamp: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
            open: 100.0,
            high: 110.0,
            low: 95.0,
            close: 105.0,
            volume: 12.5,
            amount: 40.0,
        };

        assert!((candle.percentage_change() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_trade_action_from_raw() {
        let action = TradeAction::from_raw([0, 5]).unwrap();
        assert_eq!(action.action_type, ActionType::Buy);
        assert_eq!(action.fraction(), 0.5);
        assert_eq!(action.to_raw(), [0, 5]);

        assert!(TradeAction::from_raw([3, 0]).is_none());
        assert!(TradeAction::from_raw([1, 10]).is_none());
    }

    #[test]
    fn test_classify_boundaries() {
        // Thresholds are inclusive upper bounds
        assert_eq!(PriceMovement::classify(-0.01, -0.01, 0.02), PriceMovement::Fall);
        assert_eq!(PriceMovement::classify(0.02, -0.01, 0.02), PriceMovement::Neutral);
        assert_eq!(PriceMovement::classify(0.03, -0.01, 0.02), PriceMovement::Rise);
    }
}
