// src/bin/ionic.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use ionic::{
    cli::{Cli, dispatcher},
    core::{
        environment::{self, ProcessContext},
        serve::ServeError,
    },
    system::{executor::ExecutionError, logger::Logger},
};

/// Parses arguments, builds the command environment, dispatches, and maps
/// errors to exit codes: 130 for an interruption, 1 for anything else.
#[tokio::main]
async fn main() {
    if let Err(e) = run_cli(Cli::parse()).await {
        if is_interruption(&e) {
            std::process::exit(130);
        }

        eprintln!("\n{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_cli(mut cli: Cli) -> Result<()> {
    let args = cli.global.absorb(std::mem::take(&mut cli.args));
    let invocation = cli.global.invocation();

    let logger = Logger::for_flags(invocation.quiet, invocation.verbose).install();
    log::debug!("CLI args parsed: {:?}", cli);

    let ctx = ProcessContext::from_process()?;
    let env = environment::generate_environment(ctx, &invocation, logger)?;

    dispatcher::dispatch(cli.command.as_deref(), args, &env).await
}

fn is_interruption(e: &anyhow::Error) -> bool {
    if let Some(ExecutionError::Interrupted(_)) = e.downcast_ref::<ExecutionError>() {
        return true;
    }
    matches!(
        e.downcast_ref::<ServeError>(),
        Some(ServeError::Interrupted) | Some(ServeError::Execution(ExecutionError::Interrupted(_)))
    )
}
