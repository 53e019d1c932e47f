//! Bootstrap robustness analysis of a realized equity curve.
//!
//! Daily returns are resampled with replacement to build synthetic equity paths.
//! Each path is scored with the same total return, Sharpe and drawdown math used
//! for the point estimate, and the spread of those scores is summarized with
//! percentiles computed by linear interpolation between order statistics.

use crate::models::{EquityPoint, MonteCarloResult, PercentileSummary};
use crate::performance::{
    daily_returns, equity_values, max_drawdown_pct, sharpe_ratio, total_return_pct,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use statrs::statistics::Statistics;
use thiserror::Error;

pub const DEFAULT_SIMULATION_COUNT: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonteCarloError {
    #[error("equity curve needs at least 2 points to derive daily returns (got {0})")]
    InsufficientHistory(usize),
    #[error("simulation count must be at least 1")]
    InvalidSimulationCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonteCarloConfig {
    pub simulation_count: usize,
    pub seed: Option<u64>,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            simulation_count: DEFAULT_SIMULATION_COUNT,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TrialOutcome {
    total_return_pct: f64,
    sharpe_ratio: f64,
    max_drawdown_pct: f64,
}

/// Seeds a `StdRng` from the config (or OS entropy) and runs sequentially.
pub fn run_with_config(
    equity_curve: &[EquityPoint],
    config: &MonteCarloConfig,
) -> Result<MonteCarloResult, MonteCarloError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    run_monte_carlo(equity_curve, config.simulation_count, &mut rng)
}

/// Runs `simulation_count` bootstrap trials drawing from `rng` in trial order.
///
/// The same seeded generator and inputs always give a bit-identical result.
pub fn run_monte_carlo<R: Rng + ?Sized>(
    equity_curve: &[EquityPoint],
    simulation_count: usize,
    rng: &mut R,
) -> Result<MonteCarloResult, MonteCarloError> {
    let (initial_equity, returns) = prepare(equity_curve, simulation_count)?;

    let mut drawn = Vec::with_capacity(returns.len());
    let outcomes: Vec<TrialOutcome> = (0..simulation_count)
        .map(|_| run_trial(initial_equity, &returns, &mut drawn, rng))
        .collect();

    Ok(aggregate(&outcomes))
}

/// Parallel variant. Trial `k` draws from its own generator derived from `(seed, k)`,
/// so the output depends only on the seed and never on the thread count.
pub fn run_monte_carlo_parallel(
    equity_curve: &[EquityPoint],
    simulation_count: usize,
    seed: u64,
) -> Result<MonteCarloResult, MonteCarloError> {
    let (initial_equity, returns) = prepare(equity_curve, simulation_count)?;

    let outcomes: Vec<TrialOutcome> = (0..simulation_count)
        .into_par_iter()
        .map_init(
            || Vec::with_capacity(returns.len()),
            |drawn, trial| {
                let mut rng = StdRng::seed_from_u64(trial_seed(seed, trial as u64));
                run_trial(initial_equity, &returns, drawn, &mut rng)
            },
        )
        .collect();

    Ok(aggregate(&outcomes))
}

fn prepare(
    equity_curve: &[EquityPoint],
    simulation_count: usize,
) -> Result<(f64, Vec<f64>), MonteCarloError> {
    if equity_curve.len() < 2 {
        return Err(MonteCarloError::InsufficientHistory(equity_curve.len()));
    }
    if simulation_count == 0 {
        return Err(MonteCarloError::InvalidSimulationCount);
    }
    let equities = equity_values(equity_curve);
    Ok((equities[0], daily_returns(&equities)))
}

fn run_trial<R: Rng + ?Sized>(
    initial_equity: f64,
    returns: &[f64],
    drawn: &mut Vec<f64>,
    rng: &mut R,
) -> TrialOutcome {
    drawn.clear();
    drawn.extend((0..returns.len()).map(|_| returns[rng.gen_range(0..returns.len())]));

    let mut path = Vec::with_capacity(drawn.len() + 1);
    let mut equity = initial_equity;
    path.push(equity);
    for r in drawn.iter() {
        equity *= 1.0 + r;
        path.push(equity);
    }

    TrialOutcome {
        total_return_pct: total_return_pct(&path),
        sharpe_ratio: sharpe_ratio(drawn),
        max_drawdown_pct: max_drawdown_pct(&path),
    }
}

fn aggregate(outcomes: &[TrialOutcome]) -> MonteCarloResult {
    let all_total_returns: Vec<f64> = outcomes.iter().map(|o| o.total_return_pct).collect();
    let sharpe_ratios: Vec<f64> = outcomes.iter().map(|o| o.sharpe_ratio).collect();
    let drawdowns: Vec<f64> = outcomes.iter().map(|o| o.max_drawdown_pct).collect();

    let losses = all_total_returns.iter().filter(|r| **r < 0.0).count();

    MonteCarloResult {
        simulation_count: outcomes.len(),
        total_return_pct: summarize_distribution(&all_total_returns),
        sharpe_ratio: summarize_distribution(&sharpe_ratios),
        max_drawdown_pct: summarize_distribution(&drawdowns),
        probability_of_loss: losses as f64 / outcomes.len() as f64,
        all_total_returns,
    }
}

fn summarize_distribution(values: &[f64]) -> PercentileSummary {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    PercentileSummary {
        p5: percentile(&sorted, 0.05),
        p25: percentile(&sorted, 0.25),
        p50: percentile(&sorted, 0.50),
        p75: percentile(&sorted, 0.75),
        p95: percentile(&sorted, 0.95),
        mean: if values.is_empty() {
            0.0
        } else {
            values.iter().mean()
        },
    }
}

/// Linear interpolation between the order statistics at rank `(n - 1) * q`.
/// `sorted` must be ascending.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (n - 1) as f64 * q.clamp(0.0, 1.0);
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let weight = rank - lower as f64;
            if lower == upper {
                sorted[lower]
            } else {
                sorted[lower] + (sorted[upper] - sorted[lower]) * weight
            }
        }
    }
}

/// SplitMix64 finalizer over the seed and trial index.
fn trial_seed(seed: u64, trial: u64) -> u64 {
    let mut z = seed ^ trial.wrapping_add(1).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}
