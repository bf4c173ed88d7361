use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Agent, SavedAgent};
use crate::models::{ActionType, TradeAction};

/// Samples actions uniformly from the action space
///
/// In deterministic mode it holds, so evaluation runs are repeatable.
pub struct RandomAgent {
    seed: u64,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        "Random"
    }

    fn predict(&mut self, _observation: &[f64], deterministic: bool) -> TradeAction {
        if deterministic {
            return TradeAction::hold();
        }

        let action_type = ActionType::from_index(self.rng.gen_range(0..ActionType::COUNT))
            .unwrap_or(ActionType::Hold);
        let tenths = self.rng.gen_range(0..TradeAction::FRACTION_STEPS) as u8;
        TradeAction::new(action_type, tenths)
    }

    fn to_saved(&self) -> SavedAgent {
        SavedAgent::Random { seed: self.seed }
    }
}
