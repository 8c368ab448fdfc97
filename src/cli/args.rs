// src/cli/args.rs
use crate::constants::{
    BIND_ALL_ADDRESS, BROWSERS, DEFAULT_DEV_LOGGER_PORT, DEFAULT_LIVERELOAD_PORT,
    DEFAULT_SERVER_PORT,
};
use crate::core::serve::ServeOptions;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    no_binary_name = true,
    about = "Start a local dev server for app dev/testing."
)]
pub struct ServeArgs {
    /// Print app console logs to the terminal.
    #[arg(long, short = 'c')]
    pub consolelogs: bool,

    /// Print dev server logs to the terminal.
    #[arg(long, short = 's', hide = true)]
    pub serverlogs: bool,

    /// Use specific address for the dev server.
    #[arg(long, default_value = BIND_ALL_ADDRESS)]
    pub address: String,

    /// Use specific port for HTTP.
    #[arg(long, short = 'p', default_value_t = DEFAULT_SERVER_PORT)]
    pub port: u16,

    /// Use specific port for live-reload.
    #[arg(long = "livereload-port", short = 'r', default_value_t = DEFAULT_LIVERELOAD_PORT)]
    pub livereload_port: u16,

    /// Use specific port for the dev logger.
    #[arg(long = "dev-logger-port", default_value_t = DEFAULT_DEV_LOGGER_PORT)]
    pub dev_logger_port: u16,

    /// Do not open a browser window.
    #[arg(long, short = 'b')]
    pub nobrowser: bool,

    /// Do not add proxies.
    #[arg(long, short = 'x')]
    pub noproxy: bool,

    #[arg(long, short = 'w', help = browser_help())]
    pub browser: Option<String>,

    /// Specifies a path to open to (e.g. `/#/tab/dash`).
    #[arg(long, short = 'o')]
    pub browseroption: Option<String>,

    /// Test your apps on multiple platform types in the browser.
    #[arg(long, short = 'l')]
    pub lab: bool,

    /// Start serve with a specific platform (`ios`, `android`).
    #[arg(long, short = 't')]
    pub platform: Option<String>,

    /// Protect the dev server with basic auth.
    #[arg(long, hide = true)]
    pub auth: Option<String>,

    /// Broadcast the dev server for discovery by devices on the local network.
    #[arg(long)]
    pub broadcast: bool,
}

impl ServeArgs {
    pub fn to_options(&self) -> ServeOptions {
        ServeOptions {
            address: self.address.clone(),
            port: self.port,
            livereload_port: self.livereload_port,
            dev_logger_port: self.dev_logger_port,
            consolelogs: self.consolelogs,
            serverlogs: self.serverlogs,
            open_browser: !self.nobrowser,
            proxy: !self.noproxy,
            browser: self.browser.clone(),
            browser_option: self.browseroption.clone(),
            lab: self.lab,
            platform: self.platform.clone(),
            auth: self.auth.clone(),
            broadcast: self.broadcast,
        }
    }
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Print project, system, and environment information.")]
pub struct InfoArgs {
    /// Print the information as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Manage CLI configuration values.")]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigAction {
    /// Print a config value, or the whole document without a key.
    Get {
        key: Option<String>,
        /// Print the value as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Set a config value.
    Set {
        key: String,
        value: String,
        /// Always parse the value as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Remove a config value.
    Unset { key: String },
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Log in to Ionic.")]
pub struct LoginArgs {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Parser, Debug, Default)]
#[command(no_binary_name = true, about = "Log out of Ionic.")]
pub struct LogoutArgs {}

fn browser_help() -> String {
    format!("Specifies the browser to use ({})", BROWSERS.join(", "))
}
