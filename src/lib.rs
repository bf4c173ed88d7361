// Core modules
pub mod agents;
pub mod config;
pub mod environments;
pub mod io;
pub mod models;
pub mod preprocessing;
pub mod training;

// Re-export commonly used types
pub use agents::Agent;
pub use environments::{CoinEnvSetup, CryptoTradingEnv, Environment, Sense};
pub use models::*;
pub use preprocessing::CryptoHistoryTradingProcessor;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
