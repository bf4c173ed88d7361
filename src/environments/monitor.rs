use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use super::{EnvError, Environment, Observation, Space, StepOutcome};
use crate::models::TradeAction;

/// Totals of a finished episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSummary {
    /// Sum of rewards
    pub r: f64,
    /// Number of steps
    pub l: usize,
    /// Seconds since the monitor was created
    pub t: f64,
}

/// Episode bookkeeping wrapper
///
/// Sums rewards per episode and, when given a file, appends one CSV line per
/// finished episode: `r,l,t` followed by the requested info keywords. The
/// file starts with a `#{json}` comment line holding the start time and the
/// environment id.
pub struct Monitor<E> {
    env: E,
    writer: Option<csv::Writer<File>>,
    info_keywords: Vec<String>,
    t_start: Instant,
    rewards: Vec<f64>,
    episode_rewards: Vec<f64>,
    episode_lengths: Vec<usize>,
    episode_times: Vec<f64>,
    total_steps: usize,
}

impl<E: Environment> Monitor<E> {
    pub fn new(env: E, filename: Option<&Path>, info_keywords: &[&str]) -> Result<Self, EnvError> {
        let info_keywords: Vec<String> = info_keywords.iter().map(|k| k.to_string()).collect();

        let writer = match filename {
            Some(path) => Some(Self::open_log(path, env.id(), &info_keywords)?),
            None => None,
        };

        Ok(Self {
            env,
            writer,
            info_keywords,
            t_start: Instant::now(),
            rewards: Vec::new(),
            episode_rewards: Vec::new(),
            episode_lengths: Vec::new(),
            episode_times: Vec::new(),
            total_steps: 0,
        })
    }

    fn open_log(path: &Path, env_id: &str, info_keywords: &[String]) -> Result<csv::Writer<File>, EnvError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = File::create(path)?;
        let header = serde_json::json!({
            "t_start": chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            "env_id": env_id,
        });
        writeln!(file, "#{}", header)?;

        let mut writer = csv::Writer::from_writer(file);
        let mut columns = vec!["r".to_string(), "l".to_string(), "t".to_string()];
        columns.extend(info_keywords.iter().cloned());
        writer.write_record(&columns)?;
        writer.flush()?;

        tracing::debug!("Monitor logging to {:?}", path);
        Ok(writer)
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn into_inner(self) -> E {
        self.env
    }

    pub fn episode_rewards(&self) -> &[f64] {
        &self.episode_rewards
    }

    pub fn episode_lengths(&self) -> &[usize] {
        &self.episode_lengths
    }

    pub fn episode_times(&self) -> &[f64] {
        &self.episode_times
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    fn finish_episode(&mut self, outcome: &mut StepOutcome) -> Result<(), EnvError> {
        let summary = EpisodeSummary {
            r: round6(self.rewards.iter().sum()),
            l: self.rewards.len(),
            t: round6(self.t_start.elapsed().as_secs_f64()),
        };

        self.episode_rewards.push(summary.r);
        self.episode_lengths.push(summary.l);
        self.episode_times.push(summary.t);

        if let Some(writer) = self.writer.as_mut() {
            let mut record = vec![summary.r.to_string(), summary.l.to_string(), summary.t.to_string()];
            for key in &self.info_keywords {
                record.push(
                    outcome
                        .info
                        .keyword(key)
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                );
            }
            writer.write_record(&record)?;
            writer.flush()?;
        }

        tracing::debug!(
            "Episode finished: reward={:.4} length={} NW={:.2}",
            summary.r,
            summary.l,
            outcome.info.net_worth
        );

        outcome.info.episode = Some(summary);
        Ok(())
    }
}

impl<E: Environment> Environment for Monitor<E> {
    fn reset(&mut self) -> Observation {
        self.rewards.clear();
        self.env.reset()
    }

    fn step(&mut self, action: &TradeAction) -> Result<StepOutcome, EnvError> {
        let mut outcome = self.env.step(action)?;

        self.rewards.push(outcome.reward);
        self.total_steps += 1;

        if outcome.done {
            self.finish_episode(&mut outcome)?;
        }

        Ok(outcome)
    }

    fn action_space(&self) -> Space {
        self.env.action_space()
    }

    fn observation_space(&self) -> Space {
        self.env.observation_space()
    }

    fn render(&self) -> Observation {
        self.env.render()
    }

    fn id(&self) -> &'static str {
        self.env.id()
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
