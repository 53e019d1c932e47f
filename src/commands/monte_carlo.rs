use super::{execute_run, format_report, write_json, RunExport, RunOptions, RunOutcome};
use crate::models::{MonteCarloResult, PercentileSummary};
use crate::monte_carlo::{run_monte_carlo_parallel, run_with_config, MonteCarloConfig};
use anyhow::{Context, Result};
use log::info;
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationOptions {
    pub simulation_count: usize,
    pub seed: Option<u64>,
    pub parallel: bool,
}

pub fn run(
    options: &RunOptions,
    simulation: SimulationOptions,
) -> Result<(RunOutcome, MonteCarloResult)> {
    info!(
        "Received monte-carlo command for template_id={} ({} simulations)",
        options.template_id, simulation.simulation_count
    );
    let outcome = execute_run(options)?;
    print!("{}", format_report(&outcome));

    let equity_curve = &outcome.run.equity_curve;
    let result = if simulation.parallel {
        // Parallel trials derive their generators from one base seed, so pick one up front.
        let seed = simulation.seed.unwrap_or_else(rand::random);
        info!("Running parallel simulations with seed {}", seed);
        run_monte_carlo_parallel(equity_curve, simulation.simulation_count, seed)
    } else {
        run_with_config(
            equity_curve,
            &MonteCarloConfig {
                simulation_count: simulation.simulation_count,
                seed: simulation.seed,
            },
        )
    }
    .context("Monte Carlo simulation failed")?;

    print!("{}", format_simulation(&result));

    if let Some(path) = options.output.as_deref() {
        write_json(path, &RunExport::new(&outcome, Some(&result)))?;
    }

    info!(
        "Completed {} simulations: median return {:.2}%, probability of loss {:.1}%",
        result.simulation_count,
        result.total_return_pct.p50,
        result.probability_of_loss * 100.0
    );
    Ok((outcome, result))
}

pub fn format_simulation(result: &MonteCarloResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Monte Carlo simulation ({} runs)",
        result.simulation_count
    );
    let _ = writeln!(out, "{}", "=".repeat(64));
    let _ = writeln!(
        out,
        "{:<16}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
        "", "P5", "P25", "P50", "P75", "P95", "Mean"
    );
    write_percentile_row(&mut out, "Total Return %", &result.total_return_pct);
    write_percentile_row(&mut out, "Sharpe Ratio", &result.sharpe_ratio);
    write_percentile_row(&mut out, "Max Drawdown %", &result.max_drawdown_pct);
    let _ = writeln!(
        out,
        "{:<16}{:>7.1}%",
        "P(Loss)",
        result.probability_of_loss * 100.0
    );
    out
}

fn write_percentile_row(out: &mut String, label: &str, summary: &PercentileSummary) {
    let _ = writeln!(
        out,
        "{:<16}{:>8.2}{:>8.2}{:>8.2}{:>8.2}{:>8.2}{:>8.2}",
        label, summary.p5, summary.p25, summary.p50, summary.p75, summary.p95, summary.mean
    );
}
