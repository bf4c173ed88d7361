use crate::models::Candle;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+0.5% daily drift)
    Uptrend,
    /// Steady downtrend with noise (-0.5% daily drift)
    Downtrend,
    /// Mean-reverting random walk around the base price
    Sideways,
    /// Large swings (±8% per day)
    Volatile,
    /// Slow growth followed by a 60% collapse
    Crash,
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "uptrend" => Ok(Self::Uptrend),
            "downtrend" => Ok(Self::Downtrend),
            "sideways" => Ok(Self::Sideways),
            "volatile" => Ok(Self::Volatile),
            "crash" => Ok(Self::Crash),
            other => Err(format!("Unknown market scenario: {}", other)),
        }
    }
}

impl fmt::Display for MarketScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uptrend => "uptrend",
            Self::Downtrend => "downtrend",
            Self::Sideways => "sideways",
            Self::Volatile => "volatile",
            Self::Crash => "crash",
        };
        f.write_str(name)
    }
}

/// Generates daily candles shaped like a Kraken OHLCVT export
///
/// Output is fully determined by the seed, including timestamps.
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start_time: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 8_000.0,
            base_volume: 1_500.0,
            // 2020-01-01T00:00:00Z
            start_time: Utc
                .timestamp_opt(1_577_836_800, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate `num_days` daily candles for a scenario
    pub fn generate(&mut self, scenario: MarketScenario, num_days: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(num_days);
        let mut price = self.base_price;

        for day in 0..num_days {
            let open = price;
            price = self.next_close(scenario, price, day, num_days);

            let timestamp = self.start_time + Duration::days(day as i64);
            candles.push(self.create_candle(open, price, timestamp));
        }

        candles
    }

    fn next_close(&mut self, scenario: MarketScenario, price: f64, day: usize, num_days: usize) -> f64 {
        let next = match scenario {
            MarketScenario::Uptrend => price * (1.0 + 0.005 + self.rng.gen_range(-0.01..0.01)),
            MarketScenario::Downtrend => price * (1.0 - 0.005 + self.rng.gen_range(-0.01..0.01)),
            MarketScenario::Sideways => {
                // 10% pull to mean plus noise
                let reversion = (self.base_price - price) * 0.1;
                price + reversion + price * self.rng.gen_range(-0.02..0.02)
            }
            MarketScenario::Volatile => price * (1.0 + self.rng.gen_range(-0.08..0.08)),
            MarketScenario::Crash => {
                if day < num_days / 2 {
                    price * (1.0 + self.rng.gen_range(-0.005..0.01))
                } else {
                    let drop_rate = -0.6 / (num_days as f64 / 2.0);
                    price * (1.0 + drop_rate + self.rng.gen_range(-0.005..0.005))
                }
            }
        };

        // Keep prices strictly positive
        next.max(self.base_price * 0.01)
    }

    /// Build a candle whose high/low envelope contains open and close
    fn create_candle(&mut self, open: f64, close: f64, timestamp: DateTime<Utc>) -> Candle {
        let wick_pct = 0.01;

        let high = open.max(close) * (1.0 + self.rng.gen_range(0.0..wick_pct));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.0..wick_pct));

        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);
        let amount = (volume * self.rng.gen_range(2.0..4.0)).round();

        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            amount,
        }
    }
}
