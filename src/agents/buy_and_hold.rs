use super::{Agent, SavedAgent};
use crate::models::{ActionType, TradeAction};

/// Position of the coin holdings in an observation
const COINS_INDEX: usize = 1;

/// Share of the balance spent on the single buy, in tenths
const BUY_TENTHS: u8 = 9;

/// Buy-and-Hold baseline agent
///
/// Buys with 90% of the balance while it holds no coins, then holds forever.
/// Used as a baseline to compare learned agents against.
#[derive(Debug, Clone)]
pub struct BuyAndHoldAgent;

impl BuyAndHoldAgent {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BuyAndHoldAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl Agent for BuyAndHoldAgent {
    fn name(&self) -> &str {
        "BuyAndHold"
    }

    fn predict(&mut self, observation: &[f64], _deterministic: bool) -> TradeAction {
        let coins = observation.get(COINS_INDEX).copied().unwrap_or(0.0);
        if coins > 0.0 {
            TradeAction::hold()
        } else {
            TradeAction::new(ActionType::Buy, BUY_TENTHS)
        }
    }

    fn to_saved(&self) -> SavedAgent {
        SavedAgent::BuyAndHold
    }
}
