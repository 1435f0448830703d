//! Integration tests for the strategy simulator
//!
//! Directional checks only: exact figures depend on the RNG stream.

use betterbot_sizing::simulator::{
    run_strategy_comparison_with_config, SimulatorConfig, RUIN_THRESHOLD,
};
use betterbot_sizing::{run_strategy_comparison, SimulatedBet, SimulationStrategy};

const FLAT: SimulationStrategy = SimulationStrategy::FlatFraction {
    fraction_of_initial: 0.02,
};
const HALF_KELLY: SimulationStrategy = SimulationStrategy::Kelly { kelly_fraction: 0.5 };

fn hundred_bets() -> Vec<SimulatedBet> {
    vec![SimulatedBet::new(0.55, 0.50); 100]
}

#[test]
fn test_half_kelly_beats_flat_with_deeper_drawdowns() {
    let comparison =
        run_strategy_comparison(1000.0, &hundred_bets(), Some(vec![FLAT, HALF_KELLY]), None)
            .expect("simulate");

    assert_eq!(comparison.num_bets, 100);
    assert_eq!(comparison.strategies.len(), 2);

    let flat = comparison.get(&FLAT).expect("flat stats");
    let kelly = comparison.get(&HALF_KELLY).expect("kelly stats");
    assert_eq!(flat.paths_completed, 10_000);
    assert_eq!(kelly.paths_completed, 10_000);

    assert!(kelly.terminal_bankroll.median > flat.terminal_bankroll.median);
    assert!(kelly.max_drawdown.p95 > flat.max_drawdown.p95);

    // Positive edge: both strategies grow the median bankroll
    assert!(flat.terminal_bankroll.median > 1000.0);
    assert!(kelly.terminal_bankroll.median > 1000.0);
}

#[test]
fn test_distributions_are_ordered() {
    let config = SimulatorConfig {
        num_runs: 500,
        seed: 11,
        time_limit_ms: None,
    };
    let comparison =
        run_strategy_comparison_with_config(500.0, &hundred_bets(), &[FLAT, HALF_KELLY], &config)
            .expect("simulate");

    for stats in &comparison.strategies {
        let t = &stats.terminal_bankroll;
        assert!(t.p5 <= t.p25 && t.p25 <= t.median && t.median <= t.p75 && t.p75 <= t.p95);
        let d = &stats.max_drawdown;
        assert!(d.p5 >= 0.0 && d.p95 <= 1.0 && d.p5 <= d.p95);
        assert!((0.0..=1.0).contains(&stats.ruin_rate));
        assert!(t.p5 >= 0.0);
    }
}

#[test]
fn test_same_seed_same_numbers() {
    let config = SimulatorConfig {
        num_runs: 300,
        seed: 2024,
        time_limit_ms: None,
    };
    let a = run_strategy_comparison_with_config(1000.0, &hundred_bets(), &[HALF_KELLY], &config)
        .expect("a");
    let b = run_strategy_comparison_with_config(1000.0, &hundred_bets(), &[HALF_KELLY], &config)
        .expect("b");
    assert_eq!(a, b);
}

#[test]
fn test_oversized_flat_stake_goes_broke() {
    // Stake equal to the whole starting bankroll on a losing bet sequence
    let bets = vec![SimulatedBet::new(0.30, 0.50); 20];
    let all_in = SimulationStrategy::Flat { stake_usd: 100.0 };
    let config = SimulatorConfig {
        num_runs: 200,
        seed: 5,
        time_limit_ms: None,
    };
    let comparison = run_strategy_comparison_with_config(100.0, &bets, &[all_in.clone()], &config)
        .expect("simulate");
    let stats = comparison.get(&all_in).expect("stats");

    // Under 1% of paths survive twenty 30% flips at one-unit stakes
    assert!(stats.ruin_rate > 0.9);
    assert!(stats.terminal_bankroll.median < 100.0 * RUIN_THRESHOLD);
}

#[test]
fn test_default_strategy_set() {
    let comparison =
        run_strategy_comparison(1000.0, &hundred_bets()[..10], None, Some(50)).expect("simulate");
    let labels: Vec<&str> = comparison.strategies.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["flat_fraction(0.02)", "kelly(0.25)", "kelly(0.5)"]);
}

#[test]
fn test_bad_inputs_are_rejected() {
    assert!(run_strategy_comparison(0.0, &hundred_bets(), None, Some(10)).is_err());
    assert!(run_strategy_comparison(1000.0, &hundred_bets(), None, Some(0)).is_err());
    assert!(run_strategy_comparison(
        1000.0,
        &[SimulatedBet::new(1.5, 0.5)],
        None,
        Some(10)
    )
    .is_err());
    assert!(run_strategy_comparison(
        1000.0,
        &hundred_bets(),
        Some(vec![SimulationStrategy::Kelly { kelly_fraction: 0.0 }]),
        Some(10)
    )
    .is_err());
}

#[test]
fn test_strategy_json_shape() {
    let parsed: Vec<SimulationStrategy> = serde_json::from_str(
        r#"[{"type": "flat", "stakeUsd": 10}, {"type": "flat_fraction", "fractionOfInitial": 0.02}, {"type": "kelly", "kellyFraction": 0.5}]"#,
    )
    .expect("parse");
    assert_eq!(parsed[1], FLAT);
    assert_eq!(parsed[2], HALF_KELLY);
    assert_eq!(parsed[0], SimulationStrategy::Flat { stake_usd: 10.0 });
}
