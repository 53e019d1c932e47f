use anyhow::{anyhow, Result};
use backtest::{
    commands::{self, monte_carlo::SimulationOptions, RunOptions},
    config::{parse_date, BacktestConfig},
    monte_carlo::DEFAULT_SIMULATION_COUNT,
    strategy::STRATEGY_TEMPLATES,
};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

const SETTINGS_PREFIX: &str = "BACKTEST_";
const DEFAULT_TEMPLATE_ID: &str = "sma_crossover";

#[derive(Parser)]
#[command(name = "backtest")]
#[command(about = "Daily-bar strategy backtester with Monte Carlo robustness analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a strategy over a price file and print its performance summary
    Backtest {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Backtest, then bootstrap the daily returns to estimate outcome ranges
    MonteCarlo {
        #[command(flatten)]
        run: RunArgs,
        /// Number of bootstrap trials
        #[arg(long, default_value_t = DEFAULT_SIMULATION_COUNT)]
        simulations: usize,
        /// Seed for reproducible trials
        #[arg(long)]
        seed: Option<u64>,
        /// Spread trials across threads
        #[arg(long)]
        parallel: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Path to the JSON price file ({"symbol": ..., "bars": [...]})
    #[arg(long = "data-file", value_name = "PATH")]
    data_file: PathBuf,
    /// Strategy template id
    #[arg(long, default_value = DEFAULT_TEMPLATE_ID)]
    strategy: String,
    /// Strategy parameter override, repeatable (e.g. --param shortWindow=10)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, f64)>,
    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,
    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,
    /// Starting cash
    #[arg(long)]
    capital: Option<f64>,
    /// Commission as a fraction of traded notional
    #[arg(long)]
    commission: Option<f64>,
    /// Write the equity curve, benchmark, drawdown and metrics as JSON
    #[arg(short, long = "output", value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting backtest. Past performance does not guarantee future results.");

    match cli.command {
        Commands::Backtest { run } => {
            let options = build_run_options(run)?;
            commands::backtest::run(&options)?;
        }
        Commands::MonteCarlo {
            run,
            simulations,
            seed,
            parallel,
        } => {
            let options = build_run_options(run)?;
            commands::monte_carlo::run(
                &options,
                SimulationOptions {
                    simulation_count: simulations,
                    seed,
                    parallel,
                },
            )?;
        }
    }

    Ok(())
}

fn build_run_options(args: RunArgs) -> Result<RunOptions> {
    if !STRATEGY_TEMPLATES.contains(&args.strategy.as_str()) {
        return Err(anyhow!(
            "Unknown strategy '{}'. Available: {}",
            args.strategy,
            STRATEGY_TEMPLATES.join(", ")
        ));
    }

    let settings: HashMap<String, String> = env::vars()
        .filter(|(key, _)| key.starts_with(SETTINGS_PREFIX))
        .collect();
    let mut config = BacktestConfig::from_settings_map(&settings)?;

    if let Some(raw) = args.start.as_deref() {
        config.start_date = parse_date("--start", raw)?;
    }
    if let Some(raw) = args.end.as_deref() {
        config.end_date = parse_date("--end", raw)?;
    }
    if let Some(capital) = args.capital {
        config.starting_capital = capital;
    }
    if let Some(commission) = args.commission {
        config.commission_rate = commission;
    }
    config.validate()?;

    Ok(RunOptions {
        data_file: args.data_file,
        template_id: args.strategy,
        parameters: args.params.into_iter().collect(),
        config,
        output: args.output,
    })
}

fn parse_param(raw: &str) -> Result<(String, f64), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in '{}'", raw));
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("parameter {} must be a number (value: {})", key, value))?;
    Ok((key.to_string(), value))
}
