use crate::models::Candle;
use crate::Result;

/// Validates OHLCV candle data for sanity and correctness
pub struct CandleValidator;

impl CandleValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a candle for correctness
    pub fn validate(&self, candle: &Candle) -> Result<()> {
        self.validate_prices(candle)?;
        self.validate_ohlc_relationship(candle)?;
        Ok(())
    }

    /// Prices must be positive and finite, volume and trade count non-negative
    fn validate_prices(&self, candle: &Candle) -> Result<()> {
        for (name, price) in [
            ("open", candle.open),
            ("high", candle.high),
            ("low", candle.low),
            ("close", candle.close),
        ] {
            if !price.is_finite() || price <= 0.0 {
                return Err(format!("Invalid {} price: {}", name, price).into());
            }
        }
        // Volume can be 0.0 on days without trades
        if !candle.volume.is_finite() || candle.volume < 0.0 {
            return Err(format!("Invalid volume: {}", candle.volume).into());
        }
        if !candle.amount.is_finite() || candle.amount < 0.0 {
            return Err(format!("Invalid trade count: {}", candle.amount).into());
        }
        Ok(())
    }

    /// High must bound open/close from above, low from below
    fn validate_ohlc_relationship(&self, candle: &Candle) -> Result<()> {
        if candle.high < candle.low {
            return Err(format!("High ({}) is less than low ({})", candle.high, candle.low).into());
        }

        if candle.high < candle.open.max(candle.close) {
            return Err(format!(
                "High ({}) is below open/close ({} / {})",
                candle.high, candle.open, candle.close
            )
            .into());
        }

        if candle.low > candle.open.min(candle.close) {
            return Err(format!(
                "Low ({}) is above open/close ({} / {})",
                candle.low, candle.open, candle.close
            )
            .into());
        }

        Ok(())
    }
}

impl Default for CandleValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn valid_candle() -> Candle {
        Candle {
            timestamp: Utc::now() - Duration::days(1),
            open: 100.0,
            high: 110.0,
            low: 90.0,
            close: 105.0,
            volume: 1000.0,
            amount: 250.0,
        }
    }

    #[test]
    fn test_valid_candle() {
        let validator = CandleValidator::new();
        assert!(validator.validate(&valid_candle()).is_ok());
    }

    #[test]
    fn test_zero_volume_allowed() {
        let validator = CandleValidator::new();
        let mut candle = valid_candle();
        candle.volume = 0.0;
        candle.amount = 0.0;
        assert!(validator.validate(&candle).is_ok());
    }

    #[test]
    fn test_negative_price_rejected() {
        let validator = CandleValidator::new();
        let mut candle = valid_candle();
        candle.low = -1.0;
        let err = validator.validate(&candle).unwrap_err();
        assert!(err.to_string().contains("Invalid low price"));
    }

    #[test]
    fn test_nan_close_rejected() {
        let validator = CandleValidator::new();
        let mut candle = valid_candle();
        candle.close = f64::NAN;
        assert!(validator.validate(&candle).is_err());
    }

    #[test]
    fn test_timestamp_not_checked_against_clock() {
        let validator = CandleValidator::new();
        let mut candle = valid_candle();
        candle.timestamp = Utc::now() + Duration::days(3650);
        assert!(validator.validate(&candle).is_ok());

        candle.timestamp = Utc.timestamp_opt(0, 0).unwrap();
        assert!(validator.validate(&candle).is_ok());
    }

    #[test]
    fn test_high_below_close_rejected() {
        let validator = CandleValidator::new();
        let mut candle = valid_candle();
        candle.high = 104.0;
        assert!(validator.validate(&candle).is_err());
    }

    #[test]
    fn test_low_above_open_rejected() {
        let validator = CandleValidator::new();
        let mut candle = valid_candle();
        candle.low = 101.0;
        assert!(validator.validate(&candle).is_err());
    }
}
