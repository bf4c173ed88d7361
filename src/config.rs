use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory (any format `config` reads)
pub const CONFIG_FILE: &str = "tuliptrader";

/// Prefix of environment overrides, e.g. `TULIP__ENV__COMMISSION=0.0026`
pub const ENV_PREFIX: &str = "TULIP";

pub const DEFAULT_INDICATORS: [&str; 8] = [
    "close_10_sma",
    "close_20_sma",
    "close_30_sma",
    "macd",
    "macds",
    "rsi_6",
    "rsi_12",
    "rsi_24",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub env: EnvSettings,
    pub training: TrainingSettings,
    pub output: OutputSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Kraken OHLCVT export
    pub path: PathBuf,
    pub technical_indicators: Vec<String>,
    pub fall_quantile: f64,
    pub rise_quantile: f64,
    pub train_size: f64,
    pub val_size: f64,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("local_input/XBTEUR_1440.csv"),
            technical_indicators: DEFAULT_INDICATORS.iter().map(|s| s.to_string()).collect(),
            fall_quantile: 0.33,
            rise_quantile: 0.66,
            train_size: 0.8,
            val_size: 0.2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
    pub initial_balance: f64,
    pub commission: f64,
    pub add_features: Vec<String>,
    pub annual_inflation: f64,
    /// Periods per year of the price data (365 for daily candles)
    pub frequency: f64,
}

impl Default for EnvSettings {
    fn default() -> Self {
        Self {
            initial_balance: 1000.0,
            commission: 0.02,
            add_features: vec!["fall".to_string(), "neutral".to_string(), "rise".to_string()],
            annual_inflation: 0.02,
            frequency: 365.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    /// Passes over the training partition
    pub epochs: usize,
    pub n_eval_episodes: usize,
    /// Evaluate every this many steps; 0 means once per pass over the training data
    pub eval_freq: usize,
    pub deterministic_eval: bool,
    pub seed: u64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            epochs: 8,
            n_eval_episodes: 10,
            eval_freq: 0,
            deterministic_eval: false,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Monitor logs go to `<log_dir>/monitor/`
    pub log_dir: PathBuf,
    pub model_dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("local_output/logs"),
            model_dir: PathBuf::from("local_output/models"),
        }
    }
}

impl Settings {
    /// Load `tuliptrader.{toml,json,yaml}` if present, then `TULIP__*` overrides
    pub fn load() -> anyhow::Result<Self> {
        Self::build(
            config::Config::builder().add_source(config::File::with_name(CONFIG_FILE).required(false)),
        )
    }

    /// Load from an explicit file, then `TULIP__*` overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        Self::build(config::Config::builder().add_source(config::File::from(path)))
            .with_context(|| format!("Failed to load settings from {:?}", path))
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> anyhow::Result<Self> {
        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("data.technical_indicators")
                    .with_list_parse_key("env.add_features"),
            )
            .build()
            .context("Failed to build settings")?;

        let settings: Settings = settings
            .try_deserialize()
            .context("Failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.env.frequency <= 0.0 {
            anyhow::bail!("env.frequency must be positive, got {}", self.env.frequency);
        }
        if self.training.epochs == 0 {
            anyhow::bail!("training.epochs must be at least 1");
        }
        if self.training.n_eval_episodes == 0 {
            anyhow::bail!("training.n_eval_episodes must be at least 1");
        }
        Ok(())
    }
}
