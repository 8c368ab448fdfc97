//! # Serve
//!
//! Orchestrates `ionic serve`: port checks, the dev server itself, the
//! browser and the optional UDP broadcast. The dev server is pluggable
//! through [`DevServer`]; everything else is driven from here so task
//! reporting stays on a single flow.

use crate::constants::{
    BIND_ALL_ADDRESS, DEFAULT_DEV_LOGGER_PORT, DEFAULT_LIVERELOAD_PORT, DEFAULT_SERVER_PORT,
};
use crate::core::environment::CommandEnvironment;
use crate::core::project::ProjectError;
use crate::models::ServeDetails;
use crate::system::broadcast::{
    BroadcastConfig, BroadcastError, BroadcastHandle, BroadcastPayload, Broadcaster,
};
use crate::system::browser::BrowserOpener;
use crate::system::executor::ExecutionError;
use std::fmt;
use std::io;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServeError {
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error("Port {port} ({role}) is not available: {source}")]
    PortBind {
        port: u16,
        role: PortRole,
        #[source]
        source: io::Error,
    },
    #[error("Could not start dev server: {0}")]
    Execution(#[from] ExecutionError),
    #[error("Dev server exited unexpectedly (exit code {code:?}).")]
    DevServerExited { code: Option<i32> },
    #[error("Dev server did not start listening on port {port} within {}s.", .timeout.as_secs())]
    ReadyTimeout { port: u16, timeout: Duration },
    #[error("Serve was interrupted.")]
    Interrupted,
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    Http,
    LiveReload,
    DevLogger,
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Http => "dev server",
            Self::LiveReload => "livereload",
            Self::DevLogger => "dev logger",
        })
    }
}

/// Everything `ionic serve` was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeOptions {
    pub address: String,
    pub port: u16,
    pub livereload_port: u16,
    pub dev_logger_port: u16,
    pub consolelogs: bool,
    pub serverlogs: bool,
    pub open_browser: bool,
    pub proxy: bool,
    pub browser: Option<String>,
    pub browser_option: Option<String>,
    pub lab: bool,
    pub platform: Option<String>,
    pub auth: Option<String>,
    pub broadcast: bool,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            address: BIND_ALL_ADDRESS.to_string(),
            port: DEFAULT_SERVER_PORT,
            livereload_port: DEFAULT_LIVERELOAD_PORT,
            dev_logger_port: DEFAULT_DEV_LOGGER_PORT,
            consolelogs: false,
            serverlogs: false,
            open_browser: true,
            proxy: true,
            browser: None,
            browser_option: None,
            lab: false,
            platform: None,
            auth: None,
            broadcast: false,
        }
    }
}

impl ServeOptions {
    /// Ports in the order they are checked.
    pub fn ports(&self) -> [(PortRole, u16); 3] {
        [
            (PortRole::Http, self.port),
            (PortRole::LiveReload, self.livereload_port),
            (PortRole::DevLogger, self.dev_logger_port),
        ]
    }
}

/// A framework dev server.
#[allow(async_fn_in_trait)]
pub trait DevServer {
    /// Starts the server and resolves once it accepts connections.
    async fn start(&mut self, options: &ServeOptions) -> Result<ServeDetails, ServeError>;

    /// Resolves when the server stops on its own, with its exit code.
    async fn wait(&mut self) -> Option<i32>;

    /// Stops the server. Safe to call more than once.
    async fn stop(&mut self);
}

/// Checks each port can be bound, HTTP first, stopping at the first failure.
pub fn probe_ports<F>(options: &ServeOptions, mut bind: F) -> Result<(), ServeError>
where
    F: FnMut(&str, u16) -> io::Result<()>,
{
    for (role, port) in options.ports() {
        bind(&options.address, port).map_err(|source| ServeError::PortBind { port, role, source })?;
        log::debug!("Port {} ({}) is available.", port, role);
    }
    Ok(())
}

/// Binds and immediately releases a TCP listener.
pub fn tcp_bind_probe(address: &str, port: u16) -> io::Result<()> {
    std::net::TcpListener::bind((address, port)).map(drop)
}

/// The URL opened in the browser.
pub fn browser_url(details: &ServeDetails, options: &ServeOptions) -> String {
    let mut url = format!("{}://localhost:{}", details.protocol, details.port);
    if options.lab {
        url.push_str("/ionic-lab");
    }
    if let Some(path) = options.browser_option.as_deref() {
        url.push_str(path);
    }
    if !options.lab {
        if let Some(platform) = options.platform.as_deref() {
            url.push_str(&format!("?ionicplatform={}", platform));
        }
    }
    url
}

/// A started serve run.
#[derive(Debug)]
pub struct ServeSession {
    pub details: ServeDetails,
    broadcast: Option<BroadcastHandle>,
}

impl ServeSession {
    pub fn is_broadcasting(&self) -> bool {
        self.broadcast.as_ref().is_some_and(BroadcastHandle::is_running)
    }
}

#[derive(Debug)]
pub struct ServeOrchestrator<'a> {
    env: &'a CommandEnvironment,
    broadcast: BroadcastConfig,
    probe: fn(&str, u16) -> io::Result<()>,
}

impl<'a> ServeOrchestrator<'a> {
    pub fn new(env: &'a CommandEnvironment) -> Self {
        Self {
            env,
            broadcast: BroadcastConfig::default(),
            probe: tcp_bind_probe,
        }
    }

    pub fn with_broadcast_config(mut self, config: BroadcastConfig) -> Self {
        self.broadcast = config;
        self
    }

    pub fn with_port_probe(mut self, probe: fn(&str, u16) -> io::Result<()>) -> Self {
        self.probe = probe;
        self
    }

    /// Starts the dev server and its satellites. Browser and broadcast
    /// failures are warnings; port and dev server failures are errors.
    pub async fn start<D, B>(
        &self,
        options: &ServeOptions,
        dev_server: &mut D,
        browser: &B,
    ) -> Result<ServeSession, ServeError>
    where
        D: DevServer,
        B: BrowserOpener,
    {
        let (_, kind) = self.env.project().require()?;
        let tasks = self.env.tasks();

        tasks.next(format!("Starting {} dev server", kind.display_name()));
        if let Err(e) = probe_ports(options, self.probe) {
            tasks.fail();
            return Err(e);
        }
        let details = match dev_server.start(options).await {
            Ok(details) => details,
            Err(e) => {
                tasks.fail();
                return Err(e);
            }
        };

        if options.open_browser {
            tasks.next("Opening browser");
            let url = browser_url(&details, options);
            if let Err(e) = browser.open(&url, options.browser.as_deref()) {
                log::warn!("Could not open browser at {}: {}", url, e);
            }
        }

        let mut broadcast = None;
        if options.broadcast {
            tasks.next("Broadcasting server information");
            match self.start_broadcast(&details).await {
                Ok(handle) => broadcast = Some(handle),
                Err(e) => {
                    tasks.fail();
                    log::warn!("Could not broadcast server information: {}", e);
                }
            }
        }
        tasks.end();

        log::info!(
            "Development server running!\n  Local: {}\n  External: {}",
            details.local_url(),
            details.external_url()
        );
        Ok(ServeSession { details, broadcast })
    }

    async fn start_broadcast(&self, details: &ServeDetails) -> Result<BroadcastHandle, ServeError> {
        let app = self.env.project().load()?;
        let payload = BroadcastPayload::new(details, &app);
        let broadcaster = Broadcaster::bind(&payload, self.broadcast).await?;
        Ok(broadcaster.start(self.env.cancellation().clone()))
    }

    /// Stops the broadcast, then the dev server.
    pub async fn shutdown<D: DevServer>(&self, session: ServeSession, dev_server: &mut D) {
        if let Some(handle) = session.broadcast {
            handle.stop().await;
        }
        dev_server.stop().await;
    }

    /// Starts everything and blocks until interrupted or the dev server dies.
    pub async fn run<D, B>(
        &self,
        options: &ServeOptions,
        dev_server: &mut D,
        browser: &B,
    ) -> Result<ServeDetails, ServeError>
    where
        D: DevServer,
        B: BrowserOpener,
    {
        let session = self.start(options, dev_server, browser).await?;
        let details = session.details.clone();
        log::info!("Use Ctrl+C to quit this process");

        let exited = tokio::select! {
            _ = self.env.cancellation().cancelled() => None,
            code = dev_server.wait() => Some(code),
        };

        self.shutdown(session, dev_server).await;
        match exited {
            None => Ok(details),
            Some(code) => Err(ServeError::DevServerExited { code }),
        }
    }
}
