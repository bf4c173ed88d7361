// Price history import/export and synthetic data
pub mod kraken;
pub mod synthetic;
pub mod validator;

pub use kraken::{read_kraken_history, read_kraken_history_with_stats, write_candles, LoadStats};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
pub use validator::CandleValidator;
