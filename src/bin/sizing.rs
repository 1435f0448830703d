//! Sizing CLI
//!
//! JSON in, JSON out wrapper around the sizing library.
//!
//! Usage:
//!   sizing decide --input candidates.json
//!   sizing risk < portfolio.json
//!   sizing simulate --input bets.json --runs 20000
//!   sizing size --input bet.json
//!   sizing bench --challenger exhaustive --synthetic 30
//!   sizing optimizers
//!
//! Input is read from `--input` or stdin. Logs go to stderr so stdout stays
//! machine-readable.
//!
//! Environment Variables:
//!   SIZING_CONFIG_PATH - TOML config file (default: sizing.toml)
//!   RUST_LOG - log filter (default: betterbot_sizing=info)

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use betterbot_sizing::bankroll::{recommend_stake, KellyParams};
use betterbot_sizing::optimizer::{
    available_optimizers, compare_with_greedy, make_optimizer, solve_with_timeout,
    CandidateCorrelation, SyntheticCandidateGenerator,
};
use betterbot_sizing::risk::RiskAnalysisOptions;
use betterbot_sizing::simulator::{
    default_strategies, run_strategy_comparison_with_config, SimulatedBet, SimulationStrategy,
};
use betterbot_sizing::{CandidateBet, DecisionEngineConstraints, EngineConfig, Portfolio};

#[derive(Parser, Debug)]
#[command(name = "sizing")]
#[command(about = "Wager selection, sizing and portfolio risk analysis")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, env = "SIZING_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Emit compact JSON instead of pretty-printed
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Select and size positions from candidate bets
    Decide {
        /// JSON request file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Optimizer name (overrides config)
        #[arg(short, long)]
        optimizer: Option<String>,

        /// Host-side timeout for the solve (ms)
        #[arg(long, default_value = "5000")]
        timeout_ms: u64,
    },

    /// Analyse exposure and correlation of an existing portfolio
    Risk {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Compare sizing strategies by Monte Carlo simulation
    Simulate {
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Paths per strategy (overrides request and config)
        #[arg(short, long)]
        runs: Option<usize>,

        /// RNG seed (overrides request and config)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Recommend a stake for a single bet
    Size {
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Benchmark an optimizer against the greedy baseline
    Bench {
        /// Decide-style request file; a synthetic fixture is used when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,

        #[arg(long, default_value = "exhaustive")]
        challenger: String,

        /// Repeated solves per optimizer
        #[arg(short, long, default_value = "20")]
        runs: usize,

        /// Synthetic fixture size
        #[arg(long, default_value = "25")]
        synthetic: usize,

        /// Factor groups in the synthetic fixture
        #[arg(long, default_value = "5")]
        factors: usize,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Bankroll for the synthetic fixture
        #[arg(long, default_value = "2000")]
        bankroll: f64,
    },

    /// List available optimizers
    Optimizers,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecideRequest {
    candidates: Vec<CandidateBet>,
    /// Full constraint set; built from config defaults and `bankrollUsd` when absent
    #[serde(default)]
    constraints: Option<DecisionEngineConstraints>,
    #[serde(default)]
    bankroll_usd: Option<f64>,
    #[serde(default)]
    correlations: Vec<CandidateCorrelation>,
    #[serde(default)]
    optimizer: Option<String>,
}

impl DecideRequest {
    fn constraints(&self, config: &EngineConfig) -> Result<DecisionEngineConstraints> {
        match (&self.constraints, self.bankroll_usd) {
            (Some(c), _) => Ok(c.clone()),
            (None, Some(bankroll)) => Ok(config.constraints_for(bankroll)),
            (None, None) => anyhow::bail!("request needs either `constraints` or `bankrollUsd`"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RiskRequest {
    #[serde(flatten)]
    portfolio: Portfolio,
    #[serde(flatten)]
    options: RiskAnalysisOptions,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulateRequest {
    initial_bankroll_usd: f64,
    bets: Vec<SimulatedBet>,
    #[serde(default)]
    strategies: Option<Vec<SimulationStrategy>>,
    #[serde(default)]
    num_runs: Option<usize>,
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SizeRequest {
    win_prob: f64,
    price: f64,
    #[serde(flatten)]
    params: KellyParams,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "betterbot_sizing=info,sizing=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_request<T: DeserializeOwned>(input: Option<&PathBuf>) -> Result<T> {
    let raw = match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("parsing request JSON")
}

fn emit<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let out = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", out);
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::from_env()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Decide {
            input,
            optimizer,
            timeout_ms,
        } => {
            let request: DecideRequest = read_request(input.as_ref())?;
            let constraints = request.constraints(&config)?;
            let name = optimizer
                .or(request.optimizer)
                .unwrap_or_else(|| config.optimizer.name.clone());
            let solver = Arc::from(make_optimizer(&name)?);

            info!(
                candidates = request.candidates.len(),
                solver = %name,
                bankroll = constraints.bankroll_usd,
                "running decision engine"
            );
            let result = solve_with_timeout(
                solver,
                request.candidates,
                constraints,
                config.solve_options(request.correlations),
                Duration::from_millis(timeout_ms),
            )
            .await?;
            emit(&result, cli.compact)
        }
        Commands::Risk { input } => {
            let request: RiskRequest = read_request(input.as_ref())?;
            let report = config
                .risk_engine()
                .analyze(&request.portfolio, &request.options)?;
            emit(&report, cli.compact)
        }
        Commands::Simulate { input, runs, seed } => {
            let request: SimulateRequest = read_request(input.as_ref())?;
            let mut sim = config.simulator_config();
            if let Some(n) = runs.or(request.num_runs) {
                sim.num_runs = n;
            }
            if let Some(s) = seed.or(request.seed) {
                sim.seed = s;
            }
            let strategies = request.strategies.unwrap_or_else(default_strategies);

            // CPU-bound; keep it off the async workers
            let comparison = tokio::task::spawn_blocking(move || {
                run_strategy_comparison_with_config(
                    request.initial_bankroll_usd,
                    &request.bets,
                    &strategies,
                    &sim,
                )
            })
            .await
            .context("simulation task failed")??;
            emit(&comparison, cli.compact)
        }
        Commands::Size { input } => {
            let request: SizeRequest = read_request(input.as_ref())?;
            let recommendation = recommend_stake(request.win_prob, request.price, &request.params);
            emit(&recommendation, cli.compact)
        }
        Commands::Bench {
            input,
            challenger,
            runs,
            synthetic,
            factors,
            seed,
            bankroll,
        } => {
            let (candidates, constraints, correlations) = match input {
                Some(path) => {
                    let request: DecideRequest = read_request(Some(&path))?;
                    let constraints = request.constraints(&config)?;
                    (request.candidates, constraints, request.correlations)
                }
                None => {
                    let mut generator = SyntheticCandidateGenerator::new(seed);
                    let candidates = generator.generate(synthetic, factors, (0.01, 0.035));
                    (candidates, config.constraints_for(bankroll), Vec::new())
                }
            };
            let challenger = make_optimizer(&challenger)?;
            let comparison = compare_with_greedy(
                challenger.as_ref(),
                &candidates,
                &constraints,
                &config.solve_options(correlations),
                runs,
            )?;
            emit(&comparison, cli.compact)
        }
        Commands::Optimizers => emit(&available_optimizers(), cli.compact),
    }
}
