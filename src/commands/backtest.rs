use super::{execute_run, format_report, write_json, RunExport, RunOptions, RunOutcome};
use anyhow::Result;
use log::info;

pub fn run(options: &RunOptions) -> Result<RunOutcome> {
    info!(
        "Received backtest command for template_id={} using {}",
        options.template_id,
        options.data_file.display()
    );
    let outcome = execute_run(options)?;

    print!("{}", format_report(&outcome));

    if let Some(path) = options.output.as_deref() {
        write_json(path, &RunExport::new(&outcome, None))?;
    }

    info!(
        "Completed backtest of {}: {} trade(s), final equity {:.2}",
        outcome.run.strategy, outcome.report.total_trades, outcome.report.final_equity
    );
    Ok(outcome)
}
