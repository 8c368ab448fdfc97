use anyhow::{Result, bail};
use std::future::Future;
use std::pin::Pin;

use crate::{
    cli::handlers, core::environment::CommandEnvironment, system::executor::ExecutionError,
};

pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + 'a>>;

/// A command, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    summary: &'static str,
    /// The handler watches the cancellation token itself and shuts down on
    /// its own terms. Every other handler is dropped when Ctrl+C arrives.
    handles_interrupt: bool,
    handler: for<'a> fn(Vec<String>, &'a CommandEnvironment) -> HandlerFuture<'a>,
}

static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "serve",
        aliases: &[],
        summary: "Start a local dev server for app dev/testing",
        handles_interrupt: true,
        handler: handlers::serve::handle,
    },
    CommandDefinition {
        name: "info",
        aliases: &[],
        summary: "Print project, system, and environment information",
        handles_interrupt: false,
        handler: handlers::info::handle,
    },
    CommandDefinition {
        name: "config",
        aliases: &[],
        summary: "Manage CLI configuration values",
        handles_interrupt: false,
        handler: handlers::config::handle,
    },
    CommandDefinition {
        name: "login",
        aliases: &[],
        summary: "Log in to Ionic",
        handles_interrupt: false,
        handler: handlers::login::handle,
    },
    CommandDefinition {
        name: "logout",
        aliases: &[],
        summary: "Log out of Ionic",
        handles_interrupt: false,
        handler: handlers::logout::handle,
    },
];

fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

/// Lists the available commands.
pub fn command_summaries() -> Vec<(&'static str, &'static str)> {
    COMMAND_REGISTRY.iter().map(|cmd| (cmd.name, cmd.summary)).collect()
}

/// Runs `command` with its remaining arguments.
pub async fn dispatch(
    command: Option<&str>,
    args: Vec<String>,
    env: &CommandEnvironment,
) -> Result<()> {
    log::debug!("Dispatching {:?} with args: {:?}", command, args);

    let Some(name) = command else {
        println!("Usage: ionic <command> [options]\n\nCommands:");
        for (name, summary) in command_summaries() {
            println!("  {:<10} {}", name, summary);
        }
        return Ok(());
    };

    let Some(definition) = find_command(name) else {
        bail!("Unknown command: '{}'. Run `ionic --help` for usage.", name);
    };

    let handler = (definition.handler)(args, env);
    if definition.handles_interrupt {
        return handler.await;
    }

    tokio::select! {
        result = handler => result,
        _ = env.cancellation().cancelled() => {
            log::debug!("'{}' interrupted.", definition.name);
            env.tasks().fail();
            Err(ExecutionError::Interrupted(definition.name.to_string()).into())
        }
    }
}
