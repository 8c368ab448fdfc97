// src/cli/handlers/logout.rs

use crate::{
    cli::{args::LogoutArgs, dispatcher::HandlerFuture},
    core::environment::CommandEnvironment,
};
use anyhow::Result;
use clap::Parser;
use colored::*;

pub fn handle(args: Vec<String>, env: &CommandEnvironment) -> HandlerFuture<'_> {
    Box::pin(async move { run(args, env) })
}

fn run(args: Vec<String>, env: &CommandEnvironment) -> Result<()> {
    LogoutArgs::try_parse_from(&args)?;

    if !env.session().is_logged_in() {
        log::info!("You are already logged out.");
        return Ok(());
    }
    env.session().logout()?;
    println!("{} You are logged out.", "[OK]".green());
    Ok(())
}
