use serde::{Deserialize, Serialize};

use crate::environments::LedgerEntry;
use crate::models::ActionType;

/// Performance of one replayed episode, computed from the trading ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeReport {
    pub steps: usize,
    pub initial_net_worth: f64,
    pub final_net_worth: f64,
    pub total_reward: f64,
    pub total_return_pct: f64,

    // Actions (zero-sized buys and sells count as holds)
    pub buys: usize,
    pub sells: usize,
    pub holds: usize,

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,

    /// Commission implied by the traded cash flows
    pub commission_paid: f64,
    pub final_balance: f64,
    pub final_coins: f64,
}

impl EpisodeReport {
    /// Build the report from settled ledger entries; open entries are ignored
    pub fn from_history(history: &[LedgerEntry], initial_balance: f64, commission: f64) -> Self {
        let settled: Vec<&LedgerEntry> = history.iter().filter(|e| e.is_settled()).collect();

        let initial_net_worth = settled
            .first()
            .map(|e| e.nw_start)
            .unwrap_or(initial_balance);
        let last = settled.last();
        let final_net_worth = last.and_then(|e| e.nw_end).unwrap_or(initial_net_worth);
        let final_balance = last.and_then(|e| e.balance_end).unwrap_or(initial_balance);
        let final_coins = last.and_then(|e| e.coins_end).unwrap_or(0.0);

        let total_reward: f64 = settled.iter().filter_map(|e| e.reward).sum();
        let total_return_pct = if initial_net_worth != 0.0 {
            (final_net_worth - initial_net_worth) / initial_net_worth * 100.0
        } else {
            0.0
        };

        let mut buys = 0;
        let mut sells = 0;
        let mut holds = 0;
        let mut commission_paid = 0.0;

        for entry in &settled {
            let traded = entry.coins_traded.unwrap_or(0.0) != 0.0;
            let total = entry.total.unwrap_or(0.0).abs();
            match entry.action_type {
                Some(ActionType::Buy) if traded => {
                    buys += 1;
                    commission_paid += total * commission / (1.0 + commission);
                }
                Some(ActionType::Sell) if traded => {
                    sells += 1;
                    commission_paid += total * commission / (1.0 - commission);
                }
                _ => holds += 1,
            }
        }

        let net_worths: Vec<f64> = std::iter::once(initial_net_worth)
            .chain(settled.iter().filter_map(|e| e.nw_end))
            .collect();
        let (max_drawdown, max_drawdown_pct) = Self::calculate_drawdown(&net_worths);
        let sharpe_ratio = Self::calculate_sharpe_ratio(&net_worths);

        Self {
            steps: settled.len(),
            initial_net_worth,
            final_net_worth,
            total_reward,
            total_return_pct,
            buys,
            sells,
            holds,
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio,
            commission_paid,
            final_balance,
            final_coins,
        }
    }

    /// Largest fall from a running peak, absolute and as % of that peak
    fn calculate_drawdown(net_worths: &[f64]) -> (f64, f64) {
        let mut peak = f64::NEG_INFINITY;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;

        for &value in net_worths {
            if value > peak {
                peak = value;
            }

            let drawdown = peak - value;
            if drawdown > max_dd {
                max_dd = drawdown;
                max_dd_pct = if peak > 0.0 { drawdown / peak * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Sharpe ratio of per-step net worth returns (risk-free rate 0, not annualized)
    fn calculate_sharpe_ratio(net_worths: &[f64]) -> f64 {
        let returns: Vec<f64> = net_worths
            .windows(2)
            .filter(|w| w[0] != 0.0)
            .map(|w| w[1] / w[0] - 1.0)
            .collect();

        if returns.is_empty() {
            return 0.0;
        }

        let mean_return = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance = returns
            .iter()
            .map(|r| {
                let diff = r - mean_return;
                diff * diff
            })
            .sum::<f64>()
            / returns.len() as f64;

        let std_dev = variance.sqrt();

        if std_dev > 0.0 {
            mean_return / std_dev
        } else {
            0.0
        }
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║               EPISODE PERFORMANCE REPORT              ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 NET WORTH");
        println!("  Initial:               {:.2}", self.initial_net_worth);
        println!("  Final:                 {:.2}", self.final_net_worth);
        println!(
            "  Total Reward:          {:.2} ({:+.2}%)",
            self.total_reward, self.total_return_pct
        );
        println!("  Final Balance:         {:.2}", self.final_balance);
        println!("  Final Coins:           {:.6}", self.final_coins);

        println!("\n📈 ACTIONS");
        println!("  Steps:                 {}", self.steps);
        println!("  Buys:                  {}", self.buys);
        println!("  Sells:                 {}", self.sells);
        println!("  Holds:                 {}", self.holds);
        println!("  Commission Paid:       {:.2}", self.commission_paid);

        println!("\n⚠️  RISK METRICS");
        println!(
            "  Max Drawdown:          {:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );
        println!("  Sharpe Ratio:          {:.2}", self.sharpe_ratio);

        println!("\n═════════════════════════════════════════════════════════\n");
    }
}
