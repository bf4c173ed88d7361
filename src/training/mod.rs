// Training, evaluation and replay loops
pub mod callbacks;
pub mod report;

pub use callbacks::{Callback, EvalCallback, Evaluation};
pub use report::EpisodeReport;

use std::time::Instant;

use crate::agents::{Agent, Transition};
use crate::environments::{DummyVecEnv, EnvError, Environment, StepOutcome};
use crate::models::TradeAction;

/// Totals of a [`learn`] run
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    pub timesteps: usize,
    pub episodes: usize,
    pub episode_rewards: Vec<f64>,
    pub elapsed_secs: f64,
    /// A callback asked to stop before `total_timesteps` was reached
    pub stopped_early: bool,
}

impl TrainingSummary {
    pub fn mean_episode_reward(&self) -> Option<f64> {
        if self.episode_rewards.is_empty() {
            return None;
        }
        Some(self.episode_rewards.iter().sum::<f64>() / self.episode_rewards.len() as f64)
    }
}

/// Run the agent on the vectorized environment for `total_timesteps` steps
///
/// Every transition goes to [`Agent::observe`]. One timestep is one step of
/// one environment, so a batch of `n` environments advances the count by `n`.
/// The callback runs after every batch and may stop training early.
pub fn learn<E: Environment>(
    agent: &mut dyn Agent,
    env: &mut DummyVecEnv<E>,
    total_timesteps: usize,
    mut callback: Option<&mut dyn Callback>,
) -> anyhow::Result<TrainingSummary> {
    let started = Instant::now();
    let mut summary = TrainingSummary::default();
    let mut running_rewards = vec![0.0; env.num_envs()];

    tracing::info!(
        "Training {} for {} timesteps on {} environment(s)",
        agent.name(),
        total_timesteps,
        env.num_envs()
    );

    let mut observations = env.reset();

    while summary.timesteps < total_timesteps {
        let actions: Vec<TradeAction> = observations
            .iter()
            .map(|obs| agent.predict(obs, false))
            .collect();
        let result = env.step(&actions)?;

        for (i, action) in actions.iter().enumerate() {
            let next_observation = result.infos[i]
                .terminal_observation
                .as_deref()
                .unwrap_or(&result.observations[i]);

            agent.observe(&Transition {
                observation: &observations[i],
                action: *action,
                reward: result.rewards[i],
                next_observation,
                done: result.dones[i],
            });

            running_rewards[i] += result.rewards[i];
            if result.dones[i] {
                summary.episodes += 1;
                summary.episode_rewards.push(running_rewards[i]);
                running_rewards[i] = 0.0;
            }
        }

        summary.timesteps += env.num_envs();
        observations = result.observations;

        if let Some(cb) = callback.as_deref_mut() {
            if !cb.on_step(agent, summary.timesteps)? {
                tracing::info!("Training stopped by callback at {} timesteps", summary.timesteps);
                summary.stopped_early = true;
                break;
            }
        }
    }

    summary.elapsed_secs = started.elapsed().as_secs_f64();

    tracing::info!(
        "Training finished: {} timesteps, {} episodes in {:.2}s",
        summary.timesteps,
        summary.episodes,
        summary.elapsed_secs
    );

    Ok(summary)
}

/// Mean and standard deviation of the reward over `n_eval_episodes` episodes
///
/// Episodes are spread evenly over the batched environments.
pub fn evaluate_policy<E: Environment>(
    agent: &mut dyn Agent,
    env: &mut DummyVecEnv<E>,
    n_eval_episodes: usize,
    deterministic: bool,
) -> Result<(f64, f64), EnvError> {
    if n_eval_episodes == 0 {
        return Err(EnvError::InvalidParameter(
            "evaluation needs at least one episode".to_string(),
        ));
    }

    let n_envs = env.num_envs();
    let targets: Vec<usize> = (0..n_envs).map(|i| (n_eval_episodes + i) / n_envs).collect();
    let mut counts = vec![0usize; n_envs];
    let mut current = vec![0.0; n_envs];
    let mut episode_rewards = Vec::with_capacity(n_eval_episodes);

    let mut observations = env.reset();

    while counts.iter().zip(&targets).any(|(c, t)| c < t) {
        let actions: Vec<TradeAction> = observations
            .iter()
            .map(|obs| agent.predict(obs, deterministic))
            .collect();
        let result = env.step(&actions)?;

        for i in 0..n_envs {
            if counts[i] >= targets[i] {
                continue;
            }
            current[i] += result.rewards[i];
            if result.dones[i] {
                episode_rewards.push(current[i]);
                counts[i] += 1;
                current[i] = 0.0;
            }
        }

        observations = result.observations;
    }

    Ok(mean_std(&episode_rewards))
}

/// Drive an agent through one episode for at most `steps` steps
///
/// Stops early when the episode ends. The environment is not reset at the
/// end, so its state (e.g. a trading ledger) can be inspected afterwards.
pub fn replay<E: Environment>(
    agent: &mut dyn Agent,
    env: &mut E,
    steps: usize,
    deterministic: bool,
) -> Result<Vec<StepOutcome>, EnvError> {
    let mut outcomes = Vec::with_capacity(steps);
    let mut observation = env.reset();

    for _ in 0..steps {
        let action = agent.predict(&observation, deterministic);
        let outcome = env.step(&action)?;
        let done = outcome.done;
        observation = outcome.observation.clone();
        outcomes.push(outcome);
        if done {
            break;
        }
    }

    tracing::info!("Replayed {} for {} steps", agent.name(), outcomes.len());
    Ok(outcomes)
}

/// Population mean and standard deviation
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
