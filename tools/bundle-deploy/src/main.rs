//! `deploy` entry point.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use bundle_deploy::cli::Cli;
use bundle_deploy::orchestrator::EXIT_USAGE;
use bundle_deploy::{Orchestrator, ProcessInvoker, Targets};
use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .compact()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::parse();
    let target = match Targets::load(&cli.targets_file).and_then(|t| t.select(cli.target)) {
        Ok(target) => target,
        Err(e) => {
            error!(error = %e, "invalid deployment configuration");
            return Ok(ExitCode::from(EXIT_USAGE));
        }
    };

    let action = cli.action(|| prompt_confirmation(&cli))?;
    let orchestrator = Orchestrator::new(ProcessInvoker)
        .with_cli(cli.cli.clone())
        .with_setup_job(cli.setup_job.clone());

    info!(target = %target.name(), host = %target.host(), "starting");
    let report = orchestrator.run(&target, &action);
    for warning in report.warnings() {
        warn!("{warning}");
    }
    match report.error() {
        Some(e) => error!(error = %e, state = %report.final_state(), "deployment halted"),
        None => info!(state = %report.final_state(), "done"),
    }
    Ok(ExitCode::from(report.exit_code()))
}

fn prompt_confirmation(cli: &Cli) -> Result<String> {
    let mut stderr = io::stderr().lock();
    write!(
        stderr,
        "This destroys every resource of target `{}`. Type 'yes' to continue: ",
        cli.target
    )
    .and_then(|()| stderr.flush())
    .wrap_err("failed to write confirmation prompt")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .wrap_err("failed to read confirmation")?;
    Ok(answer.trim_end_matches(['\r', '\n']).to_owned())
}
