// RL environment interface and the crypto trading simulation
pub mod crypto_env;
pub mod monitor;
pub mod setup;
pub mod vec_env;

pub use crypto_env::{CryptoTradingEnv, EnvParams, LedgerEntry};
pub use monitor::{EpisodeSummary, Monitor};
pub use setup::{CoinEnvSetup, Sense};
pub use vec_env::{DummyVecEnv, VecStepResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::TradeAction;

/// Flat state vector handed to the agent
pub type Observation = Vec<f64>;

/// Shape of an action or observation space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Space {
    /// One discrete choice per entry, `0..n`
    MultiDiscrete(Vec<usize>),
    /// Continuous box with uniform bounds
    Box { shape: Vec<usize>, low: f64, high: f64 },
}

impl Space {
    /// Flat dimension of the space
    pub fn dim(&self) -> usize {
        match self {
            Space::MultiDiscrete(nvec) => nvec.len(),
            Space::Box { shape, .. } => shape.iter().product(),
        }
    }

    pub fn contains_action(&self, action: &TradeAction) -> bool {
        match self {
            Space::MultiDiscrete(nvec) => {
                let raw = action.to_raw();
                nvec.len() == raw.len() && raw.iter().zip(nvec).all(|(a, n)| a < n)
            }
            Space::Box { .. } => false,
        }
    }
}

/// Side information of a step
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    pub date: DateTime<Utc>,
    pub step: usize,
    pub net_worth: f64,
    pub balance: f64,
    pub coins: f64,
    /// Set by [`Monitor`] on the last step of an episode
    pub episode: Option<EpisodeSummary>,
    /// Set by [`DummyVecEnv`] when it auto-resets a finished environment
    pub terminal_observation: Option<Observation>,
}

impl StepInfo {
    /// Look up a scalar by the keyword used in monitor logs
    pub fn keyword(&self, key: &str) -> Option<f64> {
        match key {
            "NW" => Some(self.net_worth),
            "balance" => Some(self.balance),
            "coins" => Some(self.coins),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Standard reset/step interface of an RL environment
pub trait Environment {
    /// Start a new episode and return the first observation
    fn reset(&mut self) -> Observation;

    fn step(&mut self, action: &TradeAction) -> Result<StepOutcome, EnvError>;

    fn action_space(&self) -> Space;

    fn observation_space(&self) -> Space;

    /// Current observation
    fn render(&self) -> Observation;

    /// Identifier written to monitor logs
    fn id(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("environment must be reset before stepping")]
    NotReset,

    #[error("episode has finished; reset the environment")]
    EpisodeFinished,

    #[error("action {0} is outside the action space")]
    InvalidAction(TradeAction),

    #[error("need at least {required} rows of data, got {rows}")]
    NotEnoughData { rows: usize, required: usize },

    #[error("column {0} is not in the data")]
    MissingColumn(String),

    #[error("row {row} has no value for column {column}")]
    MissingValue { row: usize, column: String },

    #[error("state space is {got}, observation has {expected} entries")]
    StateSpaceMismatch { expected: usize, got: usize },

    #[error("invalid environment parameter: {0}")]
    InvalidParameter(String),

    #[error("expected {expected} actions, got {got}")]
    ActionCount { expected: usize, got: usize },

    #[error("monitor log: {0}")]
    Log(#[from] csv::Error),

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActionType;

    #[test]
    fn test_space_dim() {
        assert_eq!(Space::MultiDiscrete(vec![3, 10]).dim(), 2);
        let space = Space::Box {
            shape: vec![19],
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
        };
        assert_eq!(space.dim(), 19);
    }

    #[test]
    fn test_space_contains_action() {
        let space = Space::MultiDiscrete(vec![3, 10]);
        assert!(space.contains_action(&TradeAction::new(ActionType::Sell, 9)));
        assert!(!space.contains_action(&TradeAction::new(ActionType::Sell, 10)));

        let narrow = Space::MultiDiscrete(vec![3, 5]);
        assert!(!narrow.contains_action(&TradeAction::new(ActionType::Buy, 7)));
    }
}
