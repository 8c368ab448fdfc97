//! # Command Environment
//!
//! The per-invocation aggregate every command receives. Bootstrap runs in a
//! fixed order:
//!
//! 1. load the global config and gather flags;
//! 2. apply the interactivity downgrade (config, terminal, CI) exactly once;
//! 3. build the prompt service and task chain from that single value;
//! 4. find the project directory and classify it;
//! 5. build the shell, session and API client, prepare the config directory;
//! 6. assemble the environment and `open()` it;
//! 7. print start-up warnings.
//!
//! No network calls happen here. Diagnostics are gathered only when a command
//! asks for them through [`CommandEnvironment::get_info`].

use crate::CancellationToken;
use crate::constants::{
    CONFIG_FILE, ERROR_VERSION_TOO_OLD, LOCAL_ERROR_ENV, PROJECT_FILE, PROXY_ENVIRONMENT_VARIABLES,
};
use crate::core::config_store::{ConfigError, ConfigStore};
use crate::core::paths::{self, PathError};
use crate::core::project::{self, Project};
use crate::core::session::{ApiClient, HttpApiClient, SessionManager};
use crate::core::tasks::TaskChain;
use crate::models::{ConfigDocument, Flags, InfoGroup, InfoItem};
use crate::system::executor::ShellExecutor;
use crate::system::logger::Logger;
use crate::system::prompt::PromptService;
use crate::system::terminal::TerminalInfo;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvironmentError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Could not determine the current directory: {0}")]
    CurrentDir(#[source] std::io::Error),
}

/// Process-wide facts, captured once and passed by value instead of being
/// read from ambient globals by each component.
#[derive(Debug, Clone)]
pub struct ProcessContext {
    /// The directory the CLI was invoked from.
    pub exec_path: PathBuf,
    pub version: String,
    /// Path of the running executable.
    pub lib_path: PathBuf,
    pub env: HashMap<String, String>,
    pub terminal: TerminalInfo,
}

impl ProcessContext {
    pub fn from_process() -> Result<Self, EnvironmentError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        let exec_path = std::env::current_dir().map_err(EnvironmentError::CurrentDir)?;
        let lib_path = std::env::current_exe().unwrap_or_else(|_| exec_path.clone());
        let terminal = TerminalInfo::detect(&env);

        Ok(Self {
            exec_path,
            version: env!("CARGO_PKG_VERSION").to_string(),
            lib_path,
            env,
            terminal,
        })
    }
}

/// Global switches as parsed from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvocationArgs {
    pub no_interactive: bool,
    pub confirm: bool,
    pub quiet: bool,
    pub verbose: bool,
    /// The removed `--yarn` / `--no-yarn` flag, if it was given.
    pub yarn: Option<bool>,
}

/// Derives the flags snapshot from the command line alone.
pub fn gather_flags(args: &InvocationArgs) -> Flags {
    Flags {
        interactive: !args.no_interactive,
        confirm: args.confirm,
        quiet: args.quiet,
        verbose: args.verbose,
    }
}

/// Interactivity survives only if it was requested, the config does not
/// disable it, output is a real terminal, and no CI environment is detected.
pub fn resolve_interactive(requested: bool, config: &ConfigDocument, terminal: TerminalInfo) -> bool {
    requested && config.is_interactive() && terminal.tty && !terminal.ci
}

/// The warning for the removed `--yarn` / `--no-yarn` flag.
pub fn deprecated_flag_warning(yarn: Option<bool>) -> Option<String> {
    yarn.map(|use_yarn| {
        let client = if use_yarn { "yarn" } else { "npm" };
        format!(
            "--yarn / --no-yarn was removed in CLI 4.0. Use `ionic config set npmClient {}`.",
            client
        )
    })
}

/// The warning for a bypassed, too-old local CLI install.
pub fn local_install_warning(env: &HashMap<String, String>) -> Option<&'static str> {
    match env.get(LOCAL_ERROR_ENV) {
        Some(value) if value == ERROR_VERSION_TOO_OLD => {
            Some("Detected locally installed Ionic CLI, but it's too old--using global CLI.")
        }
        _ => None,
    }
}

#[derive(Debug)]
pub struct CommandEnvironment {
    ctx: ProcessContext,
    flags: Flags,
    log: Logger,
    config: Arc<ConfigStore>,
    shell: Arc<ShellExecutor>,
    project: Arc<Project>,
    session: SessionManager,
    tasks: TaskChain,
    prompt: PromptService,
    cancellation: CancellationToken,
    proxy_vars: Vec<(String, String)>,
    warnings: Vec<String>,
}

/// Builds the environment with the HTTP API client.
pub fn generate_environment(
    ctx: ProcessContext,
    args: &InvocationArgs,
    log: Logger,
) -> Result<CommandEnvironment, EnvironmentError> {
    assemble(ctx, args, log, Box::new(HttpApiClient::new()))
}

/// Builds the environment with an explicit API client.
pub fn assemble(
    ctx: ProcessContext,
    args: &InvocationArgs,
    log: Logger,
    client: Box<dyn ApiClient>,
) -> Result<CommandEnvironment, EnvironmentError> {
    let config_dir = paths::resolve_config_dir(&ctx.env)?;
    let config = Arc::new(ConfigStore::new(config_dir, CONFIG_FILE));
    let config_data = config.load()?;
    log::debug!("Terminal info: {:?}", ctx.terminal);

    let mut flags = gather_flags(args);
    flags.interactive = resolve_interactive(flags.interactive, &config_data, ctx.terminal);

    let prompt = PromptService::new(flags.interactive, flags.confirm);
    let tasks = TaskChain::new(flags.interactive, &prompt);

    let project_dir = paths::find_base_directory(&ctx.exec_path, PROJECT_FILE);
    let proxy_vars: Vec<(String, String)> = PROXY_ENVIRONMENT_VARIABLES
        .iter()
        .filter_map(|var| {
            ctx.env
                .get(*var)
                .filter(|value| !value.is_empty())
                .map(|value| ((*var).to_string(), value.clone()))
        })
        .collect();

    let cancellation = CancellationToken::new();
    let shell = Arc::new(ShellExecutor::new(project_dir.clone(), cancellation.clone()));
    let project = Arc::new(project::get_project(project_dir.as_deref()));
    let session = SessionManager::new(config.clone(), client, project.clone());

    config.prepare()?;

    let mut warnings: Vec<String> = Vec::new();
    if let Some(warning) = local_install_warning(&ctx.env) {
        warnings.push(warning.to_string());
    }
    if let Some(warning) = deprecated_flag_warning(args.yarn) {
        warnings.push(warning);
    }

    let env = CommandEnvironment {
        ctx,
        flags,
        log,
        config,
        shell,
        project,
        session,
        tasks,
        prompt,
        cancellation,
        proxy_vars,
        warnings,
    };
    env.open();

    for warning in &env.warnings {
        log::warn!("{}", warning);
    }
    log::debug!("CLI flags: {:?}", env.flags);

    Ok(env)
}

impl CommandEnvironment {
    /// Registers process-lifecycle hooks: Ctrl+C cancels the environment's
    /// token so long-running commands can shut down cleanly. Needs a Tokio
    /// runtime; without one, no handler is installed.
    pub fn open(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::debug!("No async runtime; skipping signal handler registration.");
            return;
        };

        let token = self.cancellation.clone();
        runtime.spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    log::debug!("Received interrupt, shutting down.");
                    token.cancel();
                }
                Err(e) => log::debug!("Could not listen for interrupt: {}", e),
            }
        });
    }

    pub fn ctx(&self) -> &ProcessContext {
        &self.ctx
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn logger(&self) -> Logger {
        self.log
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    pub fn shell(&self) -> &Arc<ShellExecutor> {
        &self.shell
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn tasks(&self) -> &TaskChain {
        &self.tasks
    }

    pub fn prompt(&self) -> &PromptService {
        &self.prompt
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Warnings emitted while bootstrapping (deprecated flags and the like).
    pub fn startup_warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Collects the diagnostics snapshot. Recomputed on every call.
    pub async fn get_info(&self) -> Vec<InfoItem> {
        let lib_dir = self
            .ctx
            .lib_path
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let mut info = vec![
            InfoItem::new(InfoGroup::Ionic, "ionic", &self.ctx.version)
                .with_flair("Ionic CLI")
                .with_path(lib_dir),
        ];

        let node = self.tool_version("node", &["-v"]).await;
        let node_path = match node {
            Some(_) => self.tool_version("node", &["-p", "process.execPath"]).await,
            None => None,
        };
        info.push(tool_item("NodeJS", node, node_path));
        let npm = self.tool_version("npm", &["-v"]).await;
        info.push(tool_item("npm", npm, None));
        info.push(InfoItem::new(InfoGroup::System, "OS", os_name(&self.shell).await));

        info.extend(
            self.proxy_vars
                .iter()
                .map(|(key, value)| InfoItem::new(InfoGroup::Environment, key, value)),
        );
        info.extend(self.project.get_info());
        if !self.project.is_outside() {
            if let Some(app_id) = self.session.linked_app_id() {
                info.push(InfoItem::new(InfoGroup::Project, "linked app", app_id));
            }
        }
        info
    }

    async fn tool_version(&self, program: &str, args: &[&str]) -> Option<String> {
        match self.shell.cmdinfo(program, args).await {
            Ok(Some(output)) if !output.is_empty() => Some(output),
            Ok(_) => None,
            Err(e) => {
                log::debug!("Could not query {} {:?}: {}", program, args, e);
                None
            }
        }
    }
}

/// A system tool entry; a missing tool is reported as "not installed".
fn tool_item(key: &str, version: Option<String>, path: Option<String>) -> InfoItem {
    let item = InfoItem::new(
        InfoGroup::System,
        key,
        version.unwrap_or_else(|| "not installed".to_string()),
    );
    match path {
        Some(path) => item.with_path(path),
        None => item,
    }
}

async fn os_name(shell: &ShellExecutor) -> String {
    if cfg!(unix) {
        if let Ok(Some(name)) = shell.cmdinfo("uname", &["-sr"]).await {
            if !name.is_empty() {
                return name;
            }
        }
    }
    std::env::consts::OS.to_string()
}
