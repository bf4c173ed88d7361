use std::path::PathBuf;

use super::{CryptoTradingEnv, DummyVecEnv, EnvError, EnvParams, Environment, Monitor};
use crate::config::Settings;
use crate::preprocessing::FeatureTable;

/// Info keywords copied into monitor logs
const MONITOR_KEYWORDS: [&str; 1] = ["NW"];

/// What an environment is built for; selects the monitor log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Train,
    Validation,
}

impl Sense {
    fn log_name(&self) -> &'static str {
        match self {
            Sense::Train => "train.csv",
            Sense::Validation => "val.csv",
        }
    }
}

/// Builds monitored, vectorized trading environments from shared settings
#[derive(Debug, Clone)]
pub struct CoinEnvSetup {
    pub initial_balance: f64,
    pub commission: f64,
    pub technical_indicators: Vec<String>,
    pub add_features: Vec<String>,
    pub state_space: usize,
    /// Per-period rate: annual inflation divided by periods per year
    pub inflation_rate: f64,
    pub log_dir: Option<PathBuf>,
}

impl CoinEnvSetup {
    pub fn new(
        initial_balance: f64,
        commission: f64,
        technical_indicators: Vec<String>,
        add_features: Vec<String>,
        state_space: usize,
        annual_inflation: f64,
        frequency: f64,
    ) -> Self {
        Self {
            initial_balance,
            commission,
            technical_indicators,
            add_features,
            state_space,
            inflation_rate: annual_inflation / frequency,
            log_dir: None,
        }
    }

    /// Setup matching the configured indicators and features
    pub fn from_settings(settings: &Settings) -> Self {
        let technical_indicators = settings.data.technical_indicators.clone();
        let add_features = settings.env.add_features.clone();
        let state_space = Self::state_space_for(technical_indicators.len(), add_features.len());

        Self::new(
            settings.env.initial_balance,
            settings.env.commission,
            technical_indicators,
            add_features,
            state_space,
            settings.env.annual_inflation,
            settings.env.frequency,
        )
        .with_log_dir(settings.output.log_dir.clone())
    }

    /// Write monitor logs below `dir/monitor/`
    pub fn with_log_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn state_space_for(technical_indicators: usize, add_features: usize) -> usize {
        CryptoTradingEnv::observation_len(technical_indicators, add_features)
    }

    pub fn env_params(&self) -> EnvParams {
        EnvParams {
            technical_indicators: self.technical_indicators.clone(),
            add_features: self.add_features.clone(),
            state_space: self.state_space,
            commission: self.commission,
            initial_balance: self.initial_balance,
            inflation_rate: self.inflation_rate,
        }
    }

    pub fn monitor_path(&self, sense: Sense) -> Option<PathBuf> {
        self.log_dir
            .as_ref()
            .map(|dir| dir.join("monitor").join(sense.log_name()))
    }

    /// Monitored, single-instance vectorized [`CryptoTradingEnv`]
    pub fn create_env(
        &self,
        data: FeatureTable,
        sense: Sense,
    ) -> Result<DummyVecEnv<Monitor<CryptoTradingEnv>>, EnvError> {
        self.create_env_with(data, sense, CryptoTradingEnv::new)
    }

    /// Same as [`create_env`](Self::create_env) for any environment constructor
    pub fn create_env_with<E, F>(
        &self,
        data: FeatureTable,
        sense: Sense,
        factory: F,
    ) -> Result<DummyVecEnv<Monitor<E>>, EnvError>
    where
        E: Environment,
        F: FnOnce(FeatureTable, EnvParams) -> Result<E, EnvError>,
    {
        let rows = data.len();
        let env = factory(data, self.env_params())?;
        let path = self.monitor_path(sense);
        let monitor = Monitor::new(env, path.as_deref(), &MONITOR_KEYWORDS)?;

        tracing::info!(
            "Created {:?} environment over {} rows (state space {})",
            sense,
            rows,
            self.state_space
        );

        DummyVecEnv::new(vec![monitor])
    }
}
