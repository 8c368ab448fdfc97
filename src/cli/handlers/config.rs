// src/cli/handlers/config.rs

use crate::{
    cli::{
        args::{ConfigAction, ConfigArgs},
        dispatcher::HandlerFuture,
    },
    core::environment::CommandEnvironment,
};
use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use serde_json::Value;

pub fn handle(args: Vec<String>, env: &CommandEnvironment) -> HandlerFuture<'_> {
    Box::pin(async move { run(args, env) })
}

fn run(args: Vec<String>, env: &CommandEnvironment) -> Result<()> {
    let config_args = ConfigArgs::try_parse_from(&args)?;
    let store = env.config();

    match config_args.action {
        ConfigAction::Get { key, json } => {
            let value = match key.as_deref() {
                Some(key) => store.get_value(key)?,
                None => Some(serde_json::to_value(store.document())?),
            };
            match value {
                Some(value) => println!("{}", format_value(&value, json)?),
                None => log::warn!(
                    "Key '{}' is not set in {}.",
                    key.unwrap_or_default(),
                    store.path().display()
                ),
            }
        }
        ConfigAction::Set { key, value, json } => {
            let parsed = parse_value(&value, json)?;
            store.set_value(&key, parsed)?;
            store.save()?;
            println!("{} {} set.", "[OK]".green(), key.bold());
        }
        ConfigAction::Unset { key } => {
            if store.unset_value(&key)? {
                store.save()?;
                println!("{} {} unset.", "[OK]".green(), key.bold());
            } else {
                log::warn!("Key '{}' was not set.", key);
            }
        }
    }
    Ok(())
}

/// With `--json` the value must be valid JSON; otherwise JSON is tried first
/// and anything else is stored as a string.
fn parse_value(raw: &str, json: bool) -> Result<Value> {
    if json {
        return serde_json::from_str(raw)
            .with_context(|| format!("'{}' is not valid JSON (--json was given).", raw));
    }
    Ok(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
}

fn format_value(value: &Value, json: bool) -> Result<String> {
    match value {
        Value::String(s) if !json => Ok(s.clone()),
        _ => Ok(serde_json::to_string_pretty(value)?),
    }
}
