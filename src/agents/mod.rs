// Trading agents and their persisted form
pub mod buy_and_hold;
pub mod random;

pub use buy_and_hold::BuyAndHoldAgent;
pub use random::RandomAgent;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::models::TradeAction;

/// One environment transition as seen by a learning agent
#[derive(Debug, Clone)]
pub struct Transition<'a> {
    pub observation: &'a [f64],
    pub action: TradeAction,
    pub reward: f64,
    pub next_observation: &'a [f64],
    pub done: bool,
}

/// Policy driving a trading environment
///
/// Learning algorithms plug in here: `predict` picks actions and `observe`
/// receives every transition during training.
pub trait Agent {
    fn name(&self) -> &str;

    fn predict(&mut self, observation: &[f64], deterministic: bool) -> TradeAction;

    fn observe(&mut self, _transition: &Transition<'_>) {}

    fn to_saved(&self) -> SavedAgent;
}

/// Never trades
#[derive(Debug, Clone, Default)]
pub struct HoldAgent;

impl Agent for HoldAgent {
    fn name(&self) -> &str {
        "Hold"
    }

    fn predict(&mut self, _observation: &[f64], _deterministic: bool) -> TradeAction {
        TradeAction::hold()
    }

    fn to_saved(&self) -> SavedAgent {
        SavedAgent::Hold
    }
}

/// Serializable description of an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SavedAgent {
    Random { seed: u64 },
    BuyAndHold,
    Hold,
}

impl SavedAgent {
    pub fn into_agent(self) -> Box<dyn Agent> {
        match self {
            SavedAgent::Random { seed } => Box::new(RandomAgent::new(seed)),
            SavedAgent::BuyAndHold => Box::new(BuyAndHoldAgent::new()),
            SavedAgent::Hold => Box::new(HoldAgent),
        }
    }
}

/// Agent saved together with the run that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCheckpoint {
    pub run_id: Uuid,
    pub saved_at: DateTime<Utc>,
    /// Training steps taken when the checkpoint was written
    pub timesteps: usize,
    /// Mean evaluation reward that made this the best agent
    pub mean_reward: f64,
    pub agent: SavedAgent,
}

impl AgentCheckpoint {
    pub fn new(run_id: Uuid, agent: &dyn Agent, timesteps: usize, mean_reward: f64) -> Self {
        Self {
            run_id,
            saved_at: Utc::now(),
            timesteps,
            mean_reward,
            agent: agent.to_saved(),
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("Failed to write checkpoint: {:?}", path))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read checkpoint: {:?}", path))?;
        serde_json::from_str(&json).with_context(|| format!("Invalid checkpoint: {:?}", path))
    }
}
