pub mod backtest;
pub mod monte_carlo;

use crate::config::BacktestConfig;
use crate::engine::Engine;
use crate::models::{BacktestRun, EquityPoint, ExecutedFill, MonteCarloResult, PerformanceReport};
use crate::performance::{buy_and_hold_curve, drawdown_series, PerformanceCalculator};
use crate::price_data::PriceSeries;
use crate::strategy::create_strategy;
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Inputs shared by every command that replays a strategy over a price file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data_file: PathBuf,
    pub template_id: String,
    pub parameters: HashMap<String, f64>,
    pub config: BacktestConfig,
    pub output: Option<PathBuf>,
}

/// Everything a single strategy replay produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub config: BacktestConfig,
    pub series: PriceSeries,
    pub run: BacktestRun,
    pub report: PerformanceReport,
}

/// JSON document written by `--output`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunExport<'a> {
    pub symbol: &'a str,
    pub strategy: &'a str,
    pub performance: &'a PerformanceReport,
    pub equity_curve: &'a [EquityPoint],
    pub buy_and_hold_curve: Vec<EquityPoint>,
    pub drawdown: Vec<EquityPoint>,
    pub fills: &'a [ExecutedFill],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monte_carlo: Option<&'a MonteCarloResult>,
}

impl<'a> RunExport<'a> {
    pub fn new(outcome: &'a RunOutcome, monte_carlo: Option<&'a MonteCarloResult>) -> Self {
        Self {
            symbol: &outcome.run.symbol,
            strategy: &outcome.run.strategy,
            performance: &outcome.report,
            equity_curve: &outcome.run.equity_curve,
            buy_and_hold_curve: buy_and_hold_curve(
                &outcome.series.bars,
                outcome.run.starting_capital,
            ),
            drawdown: drawdown_series(&outcome.run.equity_curve),
            fills: &outcome.run.fills,
            monte_carlo,
        }
    }
}

pub(crate) fn execute_run(options: &RunOptions) -> Result<RunOutcome> {
    options.config.validate()?;

    let series = PriceSeries::load_from_file(&options.data_file)?.restrict_to_date_range(
        Some(options.config.start_date),
        Some(options.config.end_date),
    );
    if series.bars.is_empty() {
        return Err(anyhow!(
            "No {} bars between {} and {} in {}",
            series.symbol,
            options.config.start_date,
            options.config.end_date,
            options.data_file.display()
        ));
    }

    let mut config = options.config.clone();
    if config.symbol != series.symbol {
        warn!(
            "Configured symbol {} does not match price data symbol {}; using {}",
            config.symbol, series.symbol, series.symbol
        );
        config.symbol = series.symbol.clone();
    }

    let mut strategy = create_strategy(
        &options.template_id,
        &config.symbol,
        options.parameters.clone(),
    )?;
    if series.bars.len() < strategy.min_data_points() {
        warn!(
            "{} needs {} bars before it can trade but only {} are available",
            options.template_id,
            strategy.min_data_points(),
            series.bars.len()
        );
    }

    info!(
        "Running {} on {} over {} bars ({} - {})",
        options.template_id,
        config.symbol,
        series.bars.len(),
        series
            .first_date()
            .map(|date| date.to_string())
            .unwrap_or_default(),
        series
            .last_date()
            .map(|date| date.to_string())
            .unwrap_or_default()
    );

    let engine = Engine::new(config.clone());
    let run = engine
        .backtest(strategy.as_mut(), &series.bars)
        .with_context(|| format!("Backtest of {} failed", options.template_id))?;
    if run.rejected_orders > 0 {
        info!("{} order(s) were rejected during the run", run.rejected_orders);
    }

    let report = PerformanceCalculator::summarize(&run.equity_curve, &run.fills, &series.bars);
    Ok(RunOutcome {
        config,
        series,
        run,
        report,
    })
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {}", parent.display()))?;
        }
    }
    let file = File::create(path)
        .with_context(|| format!("Unable to create output file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write results to {}", path.display()))?;
    info!("Wrote results to {}", path.display());
    Ok(())
}

/// Renders the metrics table printed after every run.
pub fn format_report(outcome: &RunOutcome) -> String {
    let report = &outcome.report;
    let config = &outcome.config;
    let sep = "=".repeat(52);
    let div = "-".repeat(52);

    let mut out = String::new();
    let _ = writeln!(out, "\n{}", sep);
    let _ = writeln!(out, "  Strategy : {}", outcome.run.strategy);
    let _ = writeln!(out, "  Ticker   : {}", outcome.run.symbol);
    let _ = writeln!(
        out,
        "  Period   : {}  ->  {}",
        config.start_date, config.end_date
    );
    let _ = writeln!(
        out,
        "  Capital  : ${}",
        format_thousands(config.starting_capital)
    );
    let _ = writeln!(out, "{}", sep);

    let rows = [
        ("Total Return", format!("{:+.2}%", report.total_return_pct)),
        (
            "Annualized Return",
            format!("{:+.2}%", report.annualized_return_pct),
        ),
        ("Sharpe Ratio", format!("{:.3}", report.sharpe_ratio)),
        ("Max Drawdown", format!("{:.2}%", report.max_drawdown_pct)),
        ("Total Trades", report.total_trades.to_string()),
        ("Win Rate", format!("{:.1}%", report.win_rate_pct)),
    ];
    for (label, value) in rows {
        let _ = writeln!(out, "  {:<22}  {:>10}", label, value);
    }

    let _ = writeln!(out, "{}", div);
    let _ = writeln!(
        out,
        "  {:<22}  {:>+10.2}%",
        "Buy & Hold Return", report.buy_and_hold_return_pct
    );
    let _ = writeln!(out, "{}\n", sep);
    out
}

/// Two-decimal amount with comma-grouped thousands.
fn format_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (whole, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, fraction)
}
