//! Single-asset trading simulation
//!
//! Each step settles one row of the price table: the agent buys with a share
//! of its cash, sells a share of its coins, or holds. Commission is charged
//! on the traded price, cash loses value to inflation every period, and the
//! reward is the change in net worth over the step.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use super::{EnvError, Environment, Observation, Space, StepInfo, StepOutcome};
use crate::models::{ActionType, TradeAction};
use crate::preprocessing::{ColumnRef, FeatureTable};

/// Price columns appended to every observation, in order
const OBSERVED_PRICES: [ColumnRef; 6] = [
    ColumnRef::Open,
    ColumnRef::High,
    ColumnRef::Low,
    ColumnRef::Volume,
    ColumnRef::Close,
    ColumnRef::Amount,
];

/// Minimum table length: the episode ends two rows before the data does
const MIN_ROWS: usize = 3;

/// Configuration of a [`CryptoTradingEnv`]
#[derive(Debug, Clone, PartialEq)]
pub struct EnvParams {
    pub technical_indicators: Vec<String>,
    pub add_features: Vec<String>,
    pub state_space: usize,
    /// Fraction of the price paid on each trade, e.g. 0.0026
    pub commission: f64,
    pub initial_balance: f64,
    /// Per-period decay of the cash balance
    pub inflation_rate: f64,
}

/// One period of the trading ledger
///
/// Start fields are known when the period opens; the rest are filled in
/// when the step settles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub date: DateTime<Utc>,
    pub action_type: Option<ActionType>,
    pub fraction: Option<f64>,
    /// Coins bought (positive) or sold (negative)
    pub coins_traded: Option<f64>,
    pub balance_start: f64,
    pub balance_end: Option<f64>,
    pub nw_start: f64,
    pub nw_end: Option<f64>,
    pub coins_start: f64,
    pub coins_end: Option<f64>,
    /// Cash flow of the trade: negative for a buy, positive for a sell
    pub total: Option<f64>,
    pub reward: Option<f64>,
}

impl LedgerEntry {
    fn open(date: DateTime<Utc>, balance: f64, net_worth: f64, coins: f64) -> Self {
        Self {
            date,
            action_type: None,
            fraction: None,
            coins_traded: None,
            balance_start: balance,
            balance_end: None,
            nw_start: net_worth,
            nw_end: None,
            coins_start: coins,
            coins_end: None,
            total: None,
            reward: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.reward.is_some()
    }
}

pub struct CryptoTradingEnv {
    data: FeatureTable,
    params: EnvParams,
    tech_columns: Vec<ColumnRef>,
    feature_columns: Vec<ColumnRef>,
    current_step: usize,
    terminal: bool,
    history: Vec<LedgerEntry>,
    state: Option<Observation>,
}

impl CryptoTradingEnv {
    pub fn new(data: FeatureTable, params: EnvParams) -> Result<Self, EnvError> {
        if data.len() < MIN_ROWS {
            return Err(EnvError::NotEnoughData {
                rows: data.len(),
                required: MIN_ROWS,
            });
        }
        if !(0.0..1.0).contains(&params.commission) {
            return Err(EnvError::InvalidParameter(format!(
                "commission must be in [0, 1), got {}",
                params.commission
            )));
        }
        if params.initial_balance.is_nan() || params.initial_balance <= 0.0 {
            return Err(EnvError::InvalidParameter(format!(
                "initial balance must be positive, got {}",
                params.initial_balance
            )));
        }
        if !(0.0..1.0).contains(&params.inflation_rate) {
            return Err(EnvError::InvalidParameter(format!(
                "inflation rate must be in [0, 1), got {}",
                params.inflation_rate
            )));
        }

        let expected =
            Self::observation_len(params.technical_indicators.len(), params.add_features.len());
        if params.state_space != expected {
            return Err(EnvError::StateSpaceMismatch {
                expected,
                got: params.state_space,
            });
        }

        let tech_columns = resolve_columns(&data, &params.technical_indicators)?;
        let feature_columns = resolve_columns(&data, &params.add_features)?;

        Ok(Self {
            data,
            params,
            tech_columns,
            feature_columns,
            current_step: 0,
            terminal: false,
            history: Vec::new(),
            state: None,
        })
    }

    /// Observation length: balance, coins, indicators, features, six price columns
    pub fn observation_len(technical_indicators: usize, add_features: usize) -> usize {
        2 + technical_indicators + add_features + OBSERVED_PRICES.len()
    }

    pub fn params(&self) -> &EnvParams {
        &self.params
    }

    pub fn data(&self) -> &FeatureTable {
        &self.data
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    /// Number of steps in a full episode
    pub fn episode_length(&self) -> usize {
        self.data.len() - 2
    }

    /// Trading ledger of the current episode
    pub fn history(&self) -> &[LedgerEntry] {
        &self.history
    }

    /// Net worth at the end of the last settled step
    pub fn net_worth(&self) -> Option<f64> {
        self.history
            .iter()
            .rev()
            .find_map(|e| e.nw_end)
            .or_else(|| self.history.first().map(|e| e.nw_start))
    }

    /// Export the ledger as CSV
    pub fn write_history<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create file: {:?}", path))?;
        for entry in &self.history {
            writer.serialize(entry)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn build_state(&self) -> Result<Observation, EnvError> {
        let row = self
            .data
            .row(self.current_step)
            .ok_or(EnvError::NotEnoughData {
                rows: self.data.len(),
                required: self.current_step + 1,
            })?;
        let entry = self.history.last().ok_or(EnvError::NotReset)?;

        let mut state = Vec::with_capacity(self.params.state_space);
        state.push(entry.balance_start);
        state.push(entry.coins_start);

        let names = self
            .params
            .technical_indicators
            .iter()
            .chain(&self.params.add_features);
        for (column, name) in self.tech_columns.iter().chain(&self.feature_columns).zip(names) {
            let value = row.get(*column).ok_or_else(|| EnvError::MissingValue {
                row: self.current_step,
                column: name.clone(),
            })?;
            state.push(value);
        }

        for column in OBSERVED_PRICES {
            // Price columns always resolve
            state.push(row.get(column).unwrap_or(f64::NAN));
        }

        Ok(state)
    }

    fn try_reset(&mut self) -> Result<Observation, EnvError> {
        self.current_step = 0;
        self.terminal = false;

        let date = self
            .data
            .row(0)
            .map(|r| r.candle.timestamp)
            .ok_or(EnvError::NotEnoughData {
                rows: 0,
                required: MIN_ROWS,
            })?;
        let balance = self.params.initial_balance;
        self.history = vec![LedgerEntry::open(date, balance, balance, 0.0)];

        let state = self.build_state()?;
        self.state = Some(state.clone());
        Ok(state)
    }
}

impl Environment for CryptoTradingEnv {
    /// Start a new episode at the first row
    ///
    /// Cannot fail on an environment built by [`CryptoTradingEnv::new`], which
    /// checks the row count and every observed column. The fallback below marks
    /// the episode finished and returns a NaN observation.
    fn reset(&mut self) -> Observation {
        match self.try_reset() {
            Ok(state) => state,
            Err(e) => {
                debug_assert!(false, "reset failed on a validated table: {}", e);
                tracing::error!("Reset failed: {}", e);
                self.terminal = true;
                self.state = Some(vec![f64::NAN; self.params.state_space]);
                vec![f64::NAN; self.params.state_space]
            }
        }
    }

    fn step(&mut self, action: &TradeAction) -> Result<StepOutcome, EnvError> {
        if self.state.is_none() {
            return Err(EnvError::NotReset);
        }
        if self.terminal {
            return Err(EnvError::EpisodeFinished);
        }
        if !self.action_space().contains_action(action) {
            return Err(EnvError::InvalidAction(*action));
        }

        let (date, close) = {
            let row = self.data.row(self.current_step).ok_or(EnvError::EpisodeFinished)?;
            (row.candle.timestamp, row.candle.close)
        };
        tracing::debug!("{} {}", date, action);

        let commission = self.params.commission;
        let inflation = self.params.inflation_rate;
        let real_cost_per_coin = close * (1.0 + commission);
        let real_value_per_coin = close * (1.0 - commission);
        let fraction = action.fraction();

        let entry = self.history.last_mut().ok_or(EnvError::NotReset)?;

        let (coins_traded, total) = match action.action_type {
            ActionType::Buy => {
                let total = -(entry.balance_start * fraction);
                (total.abs() / real_cost_per_coin, total)
            }
            ActionType::Sell => {
                let coins_traded = -(entry.coins_start * fraction);
                (coins_traded, coins_traded.abs() * real_value_per_coin)
            }
            ActionType::Hold => (0.0, 0.0),
        };

        let coins_end = entry.coins_start + coins_traded;
        let balance_end = (entry.balance_start + total) * (1.0 - inflation);
        let nw_end = balance_end + coins_end * close;
        // Reward of the row just settled, also on the terminal step, never the previous row's
        let reward = nw_end - entry.nw_start;

        entry.action_type = Some(action.action_type);
        entry.fraction = Some(fraction);
        entry.coins_traded = Some(coins_traded);
        entry.total = Some(total);
        entry.coins_end = Some(coins_end);
        entry.balance_end = Some(balance_end);
        entry.nw_end = Some(nw_end);
        entry.reward = Some(reward);

        self.current_step += 1;
        self.terminal = nw_end <= 0.0 || self.current_step >= self.episode_length();

        if !self.terminal {
            let next_date = self
                .data
                .row(self.current_step)
                .map(|r| r.candle.timestamp)
                .ok_or(EnvError::EpisodeFinished)?;
            self.history
                .push(LedgerEntry::open(next_date, balance_end, nw_end, coins_end));
            self.state = Some(self.build_state()?);
        }

        Ok(StepOutcome {
            observation: self.render(),
            reward,
            done: self.terminal,
            info: StepInfo {
                date,
                step: self.current_step,
                net_worth: nw_end,
                balance: balance_end,
                coins: coins_end,
                episode: None,
                terminal_observation: None,
            },
        })
    }

    fn action_space(&self) -> Space {
        Space::MultiDiscrete(vec![ActionType::COUNT, TradeAction::FRACTION_STEPS])
    }

    fn observation_space(&self) -> Space {
        Space::Box {
            shape: vec![self.params.state_space],
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
        }
    }

    fn render(&self) -> Observation {
        self.state.clone().unwrap_or_default()
    }

    fn id(&self) -> &'static str {
        "CryptoTradingEnv"
    }
}

/// Resolve column names and check that every row has a value for them
fn resolve_columns(data: &FeatureTable, names: &[String]) -> Result<Vec<ColumnRef>, EnvError> {
    names
        .iter()
        .map(|name| {
            let column = data
                .resolve(name)
                .ok_or_else(|| EnvError::MissingColumn(name.clone()))?;
            if let Some(row) = data.rows().iter().position(|r| r.get(column).is_none()) {
                return Err(EnvError::MissingValue {
                    row,
                    column: name.clone(),
                });
            }
            Ok(column)
        })
        .collect()
}
