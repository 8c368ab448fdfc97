// src/cli/handlers/serve.rs

use crate::{
    cli::{args::ServeArgs, dispatcher::HandlerFuture},
    core::{environment::CommandEnvironment, serve::ServeOrchestrator},
    system::{browser::SystemBrowser, dev_server::ProcessDevServer},
};
use anyhow::Result;
use clap::Parser;

pub fn handle(args: Vec<String>, env: &CommandEnvironment) -> HandlerFuture<'_> {
    Box::pin(run(args, env))
}

async fn run(args: Vec<String>, env: &CommandEnvironment) -> Result<()> {
    let serve_args = ServeArgs::try_parse_from(&args)?;
    let options = serve_args.to_options();

    let (_, kind) = env.project().require()?;
    let npm_client = env.config().document().npm_client().to_string();
    let mut dev_server = ProcessDevServer::new(env.shell().clone(), kind, npm_client);

    let details = ServeOrchestrator::new(env)
        .run(&options, &mut dev_server, &SystemBrowser)
        .await?;
    log::debug!("Dev server at {} stopped.", details.local_url());
    Ok(())
}
