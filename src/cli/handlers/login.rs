// src/cli/handlers/login.rs

use crate::{
    cli::{args::LoginArgs, dispatcher::HandlerFuture},
    core::{environment::CommandEnvironment, session::Credentials},
};
use anyhow::{Result, bail};
use clap::Parser;
use colored::*;

pub fn handle(args: Vec<String>, env: &CommandEnvironment) -> HandlerFuture<'_> {
    Box::pin(run(args, env))
}

async fn run(args: Vec<String>, env: &CommandEnvironment) -> Result<()> {
    let login_args = LoginArgs::try_parse_from(&args)?;
    let session = env.session();
    let prompt = env.prompt();

    if session.is_logged_in() {
        log::info!("You are already logged in.");
        if !prompt.confirm("Continue and log in again?", false)? {
            return Ok(());
        }
    }

    let email = match login_args.email {
        Some(email) => email,
        None => prompt.input("Email:", None)?,
    };
    let password = match login_args.password {
        Some(password) => password,
        None => prompt.password("Password:")?,
    };
    if email.trim().is_empty() || password.is_empty() {
        bail!("Email and password are required.");
    }

    env.tasks().next("Logging in");
    let credentials = Credentials {
        email: email.trim().to_string(),
        password,
    };
    match session.login(&credentials).await {
        Ok(current) => {
            env.tasks().end();
            println!(
                "{} You are logged in as {}.",
                "[OK]".green(),
                current.email.unwrap_or(credentials.email).bold()
            );
            Ok(())
        }
        Err(e) => {
            env.tasks().fail();
            Err(e.into())
        }
    }
}
