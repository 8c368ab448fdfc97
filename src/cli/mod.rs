use crate::core::environment::InvocationArgs;
use clap::{Args, Parser};

pub mod args;
pub mod dispatcher;
pub mod handlers;

/// ionic: the command-line runtime for Ionic apps.
///
/// Usage: `ionic [global flags] <command> [command args...]`
///
/// Commands: `serve`, `info`, `config`, `login`, `logout`.
#[derive(Parser, Debug)]
#[command(name = "ionic", author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
#[command(
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The command to run.
    pub command: Option<String>,

    /// Arguments for the command. Global flags found here are lifted out
    /// before the command sees them.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug, Default, Clone, PartialEq, Eq)]
pub struct GlobalArgs {
    /// Only print warnings and errors.
    #[arg(long)]
    pub quiet: bool,

    /// Print debug output.
    #[arg(long)]
    pub verbose: bool,

    /// Never prompt; use defaults instead.
    #[arg(long = "no-interactive")]
    pub no_interactive: bool,

    /// Answer yes to every confirmation prompt.
    #[arg(long)]
    pub confirm: bool,

    #[arg(long, hide = true)]
    pub yarn: bool,

    #[arg(long = "no-yarn", hide = true)]
    pub no_yarn: bool,
}

impl GlobalArgs {
    /// Moves global flags out of `args` into `self` and returns the rest.
    /// Everything after a literal `--` is left alone.
    pub fn absorb(&mut self, args: Vec<String>) -> Vec<String> {
        let mut rest = Vec::with_capacity(args.len());
        let mut passthrough = false;

        for arg in args {
            if passthrough {
                rest.push(arg);
                continue;
            }
            match arg.as_str() {
                "--" => {
                    passthrough = true;
                    rest.push(arg);
                }
                "--quiet" => self.quiet = true,
                "--verbose" => self.verbose = true,
                "--no-interactive" => self.no_interactive = true,
                "--confirm" => self.confirm = true,
                "--yarn" => self.yarn = true,
                "--no-yarn" => self.no_yarn = true,
                _ => rest.push(arg),
            }
        }
        rest
    }

    pub fn invocation(&self) -> InvocationArgs {
        let yarn = if self.yarn {
            Some(true)
        } else if self.no_yarn {
            Some(false)
        } else {
            None
        };

        InvocationArgs {
            no_interactive: self.no_interactive,
            confirm: self.confirm,
            quiet: self.quiet,
            verbose: self.verbose,
            yarn,
        }
    }
}
