use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use super::evaluate_policy;
use crate::agents::{Agent, AgentCheckpoint};
use crate::environments::{DummyVecEnv, Environment};

/// File name of the best agent inside the save directory
pub const BEST_MODEL_FILE: &str = "best_model.json";

/// Hook invoked by [`learn`](super::learn) after every environment step
pub trait Callback {
    /// Return `Ok(false)` to stop training
    fn on_step(&mut self, agent: &mut dyn Agent, num_timesteps: usize) -> anyhow::Result<bool>;
}

/// Result of one periodic evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub timesteps: usize,
    pub mean_reward: f64,
    pub std_reward: f64,
}

/// Periodically evaluates the agent on a separate environment and keeps the best one
pub struct EvalCallback<E> {
    eval_env: DummyVecEnv<E>,
    pub n_eval_episodes: usize,
    /// Evaluate every this many calls; 0 disables evaluation
    pub eval_freq: usize,
    pub deterministic: bool,
    pub best_model_save_path: Option<PathBuf>,
    run_id: Uuid,
    n_calls: usize,
    best_mean_reward: f64,
    evaluations: Vec<Evaluation>,
}

impl<E: Environment> EvalCallback<E> {
    pub fn new(eval_env: DummyVecEnv<E>, n_eval_episodes: usize, eval_freq: usize) -> Self {
        Self {
            eval_env,
            n_eval_episodes,
            eval_freq,
            deterministic: true,
            best_model_save_path: None,
            run_id: Uuid::new_v4(),
            n_calls: 0,
            best_mean_reward: f64::NEG_INFINITY,
            evaluations: Vec::new(),
        }
    }

    pub fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    /// Save the best agent as `best_model.json` in this directory
    pub fn with_best_model_save_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.best_model_save_path = Some(path.into());
        self
    }

    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    /// Best mean reward seen so far, if any evaluation ran
    pub fn best_mean_reward(&self) -> Option<f64> {
        if self.evaluations.is_empty() {
            None
        } else {
            Some(self.best_mean_reward)
        }
    }

    pub fn best_model_path(&self) -> Option<PathBuf> {
        self.best_model_save_path
            .as_ref()
            .map(|dir| dir.join(BEST_MODEL_FILE))
    }

    pub fn eval_env(&self) -> &DummyVecEnv<E> {
        &self.eval_env
    }

    fn evaluate(&mut self, agent: &mut dyn Agent, num_timesteps: usize) -> anyhow::Result<()> {
        let (mean_reward, std_reward) = evaluate_policy(
            agent,
            &mut self.eval_env,
            self.n_eval_episodes,
            self.deterministic,
        )?;

        tracing::info!(
            "Eval num_timesteps={}, episode_reward={:.2} +/- {:.2}",
            num_timesteps,
            mean_reward,
            std_reward
        );

        self.evaluations.push(Evaluation {
            timesteps: num_timesteps,
            mean_reward,
            std_reward,
        });

        if mean_reward > self.best_mean_reward {
            tracing::info!("New best mean reward: {:.2}", mean_reward);
            self.best_mean_reward = mean_reward;

            if let Some(path) = self.best_model_path() {
                AgentCheckpoint::new(self.run_id, agent, num_timesteps, mean_reward).save(&path)?;
                tracing::info!("Saved best agent to {:?}", path);
            }
        }

        Ok(())
    }
}

impl<E: Environment> Callback for EvalCallback<E> {
    fn on_step(&mut self, agent: &mut dyn Agent, num_timesteps: usize) -> anyhow::Result<bool> {
        self.n_calls += 1;
        if self.eval_freq > 0 && self.n_calls % self.eval_freq == 0 {
            self.evaluate(agent, num_timesteps)?;
        }
        Ok(true)
    }
}
