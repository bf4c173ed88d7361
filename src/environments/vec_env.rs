use super::{EnvError, Environment, Observation, Space, StepInfo};
use crate::models::TradeAction;

/// Batched result of stepping every environment once
#[derive(Debug, Clone)]
pub struct VecStepResult {
    pub observations: Vec<Observation>,
    pub rewards: Vec<f64>,
    pub dones: Vec<bool>,
    pub infos: Vec<StepInfo>,
}

/// Runs several environments sequentially behind a batched interface
///
/// A finished environment is reset right away; the observation returned for
/// it is the first one of the new episode and the last observation of the
/// old episode goes to `info.terminal_observation`.
pub struct DummyVecEnv<E> {
    envs: Vec<E>,
}

impl<E: Environment> DummyVecEnv<E> {
    pub fn new(envs: Vec<E>) -> Result<Self, EnvError> {
        if envs.is_empty() {
            return Err(EnvError::InvalidParameter(
                "vectorized environment needs at least one environment".to_string(),
            ));
        }
        Ok(Self { envs })
    }

    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    pub fn envs(&self) -> &[E] {
        &self.envs
    }

    pub fn envs_mut(&mut self) -> &mut [E] {
        &mut self.envs
    }

    pub fn into_envs(self) -> Vec<E> {
        self.envs
    }

    pub fn action_space(&self) -> Space {
        self.envs[0].action_space()
    }

    pub fn observation_space(&self) -> Space {
        self.envs[0].observation_space()
    }

    pub fn reset(&mut self) -> Vec<Observation> {
        self.envs.iter_mut().map(|env| env.reset()).collect()
    }

    pub fn step(&mut self, actions: &[TradeAction]) -> Result<VecStepResult, EnvError> {
        if actions.len() != self.envs.len() {
            return Err(EnvError::ActionCount {
                expected: self.envs.len(),
                got: actions.len(),
            });
        }

        let mut result = VecStepResult {
            observations: Vec::with_capacity(self.envs.len()),
            rewards: Vec::with_capacity(self.envs.len()),
            dones: Vec::with_capacity(self.envs.len()),
            infos: Vec::with_capacity(self.envs.len()),
        };

        for (env, action) in self.envs.iter_mut().zip(actions) {
            let mut outcome = env.step(action)?;

            let observation = if outcome.done {
                outcome.info.terminal_observation = Some(outcome.observation);
                env.reset()
            } else {
                outcome.observation
            };

            result.observations.push(observation);
            result.rewards.push(outcome.reward);
            result.dones.push(outcome.done);
            result.infos.push(outcome.info);
        }

        Ok(result)
    }

    pub fn render(&self) -> Vec<Observation> {
        self.envs.iter().map(|env| env.render()).collect()
    }
}
