//! Single Monte Carlo path

use rand::Rng;

use super::{SimulatedBet, SimulationStrategy};

/// Peak / drawdown tracking along one bankroll path.
#[derive(Debug, Clone)]
struct DrawdownTracker {
    bankroll: f64,
    peak: f64,
    max_drawdown: f64,
}

impl DrawdownTracker {
    fn new(initial: f64) -> Self {
        Self {
            bankroll: initial,
            peak: initial,
            max_drawdown: 0.0,
        }
    }

    fn record(&mut self, bankroll: f64) {
        self.bankroll = bankroll.max(0.0);
        if self.bankroll > self.peak {
            self.peak = self.bankroll;
        }
        if self.peak > 0.0 {
            let drawdown = ((self.peak - self.bankroll) / self.peak).clamp(0.0, 1.0);
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PathOutcome {
    pub terminal_bankroll: f64,
    pub max_drawdown: f64,
    pub bets_placed: usize,
}

/// Plays `bets` in order under `strategy`.
///
/// One uniform draw is consumed per bet even after the path stops, so two
/// strategies run on the same stream see the same win/loss sequence.
pub(crate) fn simulate_path<R: Rng>(
    initial_bankroll: f64,
    bets: &[SimulatedBet],
    strategy: &SimulationStrategy,
    rng: &mut R,
) -> PathOutcome {
    let mut tracker = DrawdownTracker::new(initial_bankroll);
    let mut bets_placed = 0;
    let mut stopped = false;

    for bet in bets {
        let draw: f64 = rng.gen();
        if stopped {
            continue;
        }

        let current = tracker.bankroll;
        let stake = strategy
            .stake_usd(bet, current, initial_bankroll)
            .clamp(0.0, current);
        if stake <= 0.0 {
            stopped = true;
            continue;
        }

        let won = draw < bet.win_prob;
        let pnl = if won {
            stake * (1.0 / bet.price - 1.0)
        } else {
            -stake
        };
        tracker.record(current + pnl);
        bets_placed += 1;
    }

    PathOutcome {
        terminal_bankroll: tracker.bankroll,
        max_drawdown: tracker.max_drawdown,
        bets_placed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_tracker_drawdown() {
        let mut t = DrawdownTracker::new(100.0);
        t.record(120.0);
        t.record(90.0);
        t.record(130.0);
        assert!((t.max_drawdown - 0.25).abs() < 1e-12);
        assert_eq!(t.peak, 130.0);
    }

    #[test]
    fn test_certain_win_and_loss() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let strategy = SimulationStrategy::Flat { stake_usd: 10.0 };

        let wins = vec![SimulatedBet::new(1.0, 0.5); 3];
        let out = simulate_path(100.0, &wins, &strategy, &mut rng);
        assert_eq!(out.terminal_bankroll, 130.0);
        assert_eq!(out.max_drawdown, 0.0);
        assert_eq!(out.bets_placed, 3);

        let losses = vec![SimulatedBet::new(0.0, 0.5); 3];
        let out = simulate_path(100.0, &losses, &strategy, &mut rng);
        assert_eq!(out.terminal_bankroll, 70.0);
        assert!((out.max_drawdown - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_stake_clamped_to_bankroll_then_stops() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let strategy = SimulationStrategy::Flat { stake_usd: 60.0 };
        let losses = vec![SimulatedBet::new(0.0, 0.5); 4];
        let out = simulate_path(100.0, &losses, &strategy, &mut rng);
        // 60, then the remaining 40, then broke
        assert_eq!(out.terminal_bankroll, 0.0);
        assert_eq!(out.bets_placed, 2);
        assert_eq!(out.max_drawdown, 1.0);
    }

    #[test]
    fn test_kelly_without_edge_never_bets() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let strategy = SimulationStrategy::Kelly { kelly_fraction: 0.5 };
        let bets = vec![SimulatedBet::new(0.4, 0.5); 10];
        let out = simulate_path(100.0, &bets, &strategy, &mut rng);
        assert_eq!(out.bets_placed, 0);
        assert_eq!(out.terminal_bankroll, 100.0);
    }
}
