//! # Dev Server Process
//!
//! Runs a framework's own dev server as a child process and waits until it
//! accepts HTTP connections.

use crate::constants::{BIND_ALL_ADDRESS, DEV_SERVER_READY_TIMEOUT};
use crate::core::project::ProjectKind;
use crate::core::serve::{DevServer, ServeError, ServeOptions};
use crate::models::ServeDetails;
use crate::system::executor::{ShellExecutor, collect_lines};
use log::Level;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::task::JoinHandle;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);
const AUTH_ENV: &str = "IONIC_SERVE_AUTH";

/// The program and arguments that serve a project of `kind`.
pub fn serve_command(kind: ProjectKind, npm_client: &str, options: &ServeOptions) -> (String, Vec<String>) {
    let address = options.address.clone();
    let port = options.port.to_string();

    match kind {
        ProjectKind::Angular => (
            "npx".to_string(),
            vec!["ng".into(), "serve".into(), "--host".into(), address, "--port".into(), port],
        ),
        ProjectKind::IonicAngular | ProjectKind::Ionic1 => {
            let tool = if kind == ProjectKind::Ionic1 {
                "ionic-v1"
            } else {
                "ionic-app-scripts"
            };
            let mut args = vec![
                tool.to_string(),
                "serve".into(),
                "--address".into(),
                address,
                "--port".into(),
                port,
                "--livereload-port".into(),
                options.livereload_port.to_string(),
                "--dev-logger-port".into(),
                options.dev_logger_port.to_string(),
                "--nobrowser".into(),
            ];
            if options.consolelogs {
                args.push("--consolelogs".into());
            }
            if options.serverlogs {
                args.push("--serverlogs".into());
            }
            if !options.proxy {
                args.push("--noproxy".into());
            }
            if options.lab {
                args.push("--lab".into());
            }
            if let Some(platform) = &options.platform {
                args.push("--platform".into());
                args.push(platform.clone());
            }
            ("npx".to_string(), args)
        }
        ProjectKind::Custom => {
            let mut args = vec!["run".to_string(), "ionic:serve".into()];
            // npm needs `--` to forward flags to the script; yarn does not.
            if npm_client != "yarn" {
                args.push("--".into());
            }
            args.extend(["--host".into(), address, "--port".into(), port]);
            (npm_client.to_string(), args)
        }
    }
}

/// The address other devices can reach the server on.
pub fn external_address(bind_address: &str) -> String {
    if bind_address != BIND_ALL_ADDRESS {
        return bind_address.to_string();
    }
    primary_lan_ipv4()
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "localhost".to_string())
}

/// The IPv4 address the OS routes outbound traffic through. Connecting a UDP
/// socket sends nothing; it only selects a route.
fn primary_lan_ipv4() -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
    socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1)).ok()?;
    match socket.local_addr().ok()?.ip() {
        IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => Some(ip),
        _ => None,
    }
}

fn connect_host(bind_address: &str) -> &str {
    if bind_address == BIND_ALL_ADDRESS {
        "127.0.0.1"
    } else {
        bind_address
    }
}

#[derive(Debug)]
pub struct ProcessDevServer {
    shell: Arc<ShellExecutor>,
    kind: ProjectKind,
    npm_client: String,
    ready_timeout: Duration,
    child: Option<Child>,
    output: Vec<JoinHandle<String>>,
}

impl ProcessDevServer {
    pub fn new(shell: Arc<ShellExecutor>, kind: ProjectKind, npm_client: impl Into<String>) -> Self {
        Self {
            shell,
            kind,
            npm_client: npm_client.into(),
            ready_timeout: DEV_SERVER_READY_TIMEOUT,
            child: None,
            output: Vec::new(),
        }
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    async fn wait_until_ready(&mut self, options: &ServeOptions) -> Result<(), ServeError> {
        let host = connect_host(&options.address).to_string();
        let deadline = tokio::time::Instant::now() + self.ready_timeout;
        let cancellation = self.shell.cancellation().clone();

        loop {
            if tokio::net::TcpStream::connect((host.as_str(), options.port)).await.is_ok() {
                return Ok(());
            }
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(ServeError::DevServerExited { code: status.code() });
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ServeError::ReadyTimeout {
                    port: options.port,
                    timeout: self.ready_timeout,
                });
            }

            tokio::select! {
                _ = cancellation.cancelled() => return Err(ServeError::Interrupted),
                _ = tokio::time::sleep(READY_POLL_INTERVAL) => {}
            }
        }
    }
}

impl DevServer for ProcessDevServer {
    async fn start(&mut self, options: &ServeOptions) -> Result<ServeDetails, ServeError> {
        let (program, args) = serve_command(self.kind, &self.npm_client, options);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let envs: Vec<(&str, &str)> = options
            .auth
            .as_deref()
            .map(|secret| vec![(AUTH_ENV, secret)])
            .unwrap_or_default();

        let mut child = self.shell.spawn(&program, &args, &envs)?;
        let level = if options.serverlogs {
            Level::Info
        } else {
            Level::Debug
        };
        if let Some(out) = child.stdout.take() {
            let name = program.clone();
            self.output
                .push(tokio::spawn(async move { collect_lines(out, &name, level).await }));
        }
        if let Some(err) = child.stderr.take() {
            let name = program.clone();
            self.output
                .push(tokio::spawn(async move { collect_lines(err, &name, level).await }));
        }
        self.child = Some(child);

        if let Err(e) = self.wait_until_ready(options).await {
            self.stop().await;
            return Err(e);
        }

        Ok(ServeDetails {
            protocol: "http".to_string(),
            local_address: "localhost".to_string(),
            external_address: external_address(&options.address),
            port: options.port,
        })
    }

    async fn wait(&mut self) -> Option<i32> {
        match self.child.as_mut() {
            Some(child) => child.wait().await.ok().and_then(|status| status.code()),
            None => std::future::pending().await,
        }
    }

    async fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            log::debug!("Stopping dev server (PID: {:?})", child.id());
            if let Err(e) = child.kill().await {
                log::debug!("Dev server already gone: {}", e);
            }
        }
        for task in self.output.drain(..) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ServeOptions {
        ServeOptions {
            address: "0.0.0.0".to_string(),
            port: 8100,
            ..Default::default()
        }
    }

    #[test]
    fn test_ionic_angular_command() {
        let opts = ServeOptions {
            consolelogs: true,
            proxy: false,
            platform: Some("ios".to_string()),
            ..options()
        };
        let (program, args) = serve_command(ProjectKind::IonicAngular, "npm", &opts);
        assert_eq!(program, "npx");
        assert_eq!(args[0], "ionic-app-scripts");
        assert!(args.windows(2).any(|w| w == ["--livereload-port", "35729"]));
        assert!(args.windows(2).any(|w| w == ["--dev-logger-port", "53703"]));
        assert!(args.contains(&"--consolelogs".to_string()));
        assert!(args.contains(&"--noproxy".to_string()));
        assert!(args.windows(2).any(|w| w == ["--platform", "ios"]));
    }

    #[test]
    fn test_angular_and_ionic1_commands() {
        let (_, ng) = serve_command(ProjectKind::Angular, "npm", &options());
        assert_eq!(ng[..2], ["ng".to_string(), "serve".to_string()]);
        assert!(ng.windows(2).any(|w| w == ["--port", "8100"]));

        let (_, v1) = serve_command(ProjectKind::Ionic1, "npm", &options());
        assert_eq!(v1[0], "ionic-v1");
    }

    #[test]
    fn test_custom_command_respects_npm_client() {
        let (program, args) = serve_command(ProjectKind::Custom, "npm", &options());
        assert_eq!(program, "npm");
        assert_eq!(args[..3], ["run".to_string(), "ionic:serve".to_string(), "--".to_string()]);

        let (program, args) = serve_command(ProjectKind::Custom, "yarn", &options());
        assert_eq!(program, "yarn");
        assert!(!args.contains(&"--".to_string()));
    }

    #[test]
    fn test_external_address() {
        assert_eq!(external_address("192.168.0.5"), "192.168.0.5");
        let detected = external_address("0.0.0.0");
        assert!(detected == "localhost" || detected.parse::<Ipv4Addr>().is_ok());
        assert_ne!(detected, "0.0.0.0");
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::CancellationToken;
        use std::fs;
        use tempfile::tempdir;

        fn shell_in(dir: &std::path::Path, token: CancellationToken) -> Arc<ShellExecutor> {
            Arc::new(ShellExecutor::new(Some(dir.to_path_buf()), token))
        }

        /// A custom project whose "npm client" is a script that ignores its
        /// arguments and behaves as `body` says.
        fn fake_client(dir: &std::path::Path, body: &str) -> String {
            use std::os::unix::fs::PermissionsExt;
            let path = dir.join("fake-client.sh");
            fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path.display().to_string()
        }

        fn local_options(port: u16) -> ServeOptions {
            ServeOptions {
                address: "127.0.0.1".to_string(),
                port,
                ..Default::default()
            }
        }

        #[tokio::test]
        async fn test_ready_when_port_accepts() {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            let dir = tempdir().unwrap();
            let client = fake_client(dir.path(), "sleep 30");

            let mut server = ProcessDevServer::new(
                shell_in(dir.path(), CancellationToken::new()),
                ProjectKind::Custom,
                client,
            );
            let details = server.start(&local_options(port)).await.unwrap();
            assert_eq!(details.external_address, "127.0.0.1");
            assert_eq!(details.port, port);

            server.stop().await;
            server.stop().await;
        }

        #[tokio::test]
        async fn test_exited_process_is_reported() {
            let dir = tempdir().unwrap();
            let client = fake_client(dir.path(), "exit 2");
            let port = std::net::TcpListener::bind("127.0.0.1:0")
                .unwrap()
                .local_addr()
                .unwrap()
                .port();

            let mut server = ProcessDevServer::new(
                shell_in(dir.path(), CancellationToken::new()),
                ProjectKind::Custom,
                client,
            );
            let err = server.start(&local_options(port)).await.unwrap_err();
            assert!(matches!(err, ServeError::DevServerExited { code: Some(2) }));
        }

        #[tokio::test]
        async fn test_readiness_times_out() {
            let dir = tempdir().unwrap();
            let client = fake_client(dir.path(), "sleep 30");
            let port = std::net::TcpListener::bind("127.0.0.1:0")
                .unwrap()
                .local_addr()
                .unwrap()
                .port();

            let mut server = ProcessDevServer::new(
                shell_in(dir.path(), CancellationToken::new()),
                ProjectKind::Custom,
                client,
            )
            .with_ready_timeout(Duration::from_millis(300));
            let err = server.start(&local_options(port)).await.unwrap_err();
            assert!(matches!(err, ServeError::ReadyTimeout { .. }));
        }

        #[tokio::test]
        async fn test_readiness_wait_is_interruptible() {
            let dir = tempdir().unwrap();
            let client = fake_client(dir.path(), "sleep 30");
            let port = std::net::TcpListener::bind("127.0.0.1:0")
                .unwrap()
                .local_addr()
                .unwrap()
                .port();
            let token = CancellationToken::new();

            let mut server =
                ProcessDevServer::new(shell_in(dir.path(), token.clone()), ProjectKind::Custom, client);
            let canceller = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                token.cancel();
            });

            let err = tokio::time::timeout(Duration::from_secs(5), server.start(&local_options(port)))
                .await
                .expect("start should return after cancellation")
                .unwrap_err();
            assert!(matches!(err, ServeError::Interrupted));
            canceller.await.unwrap();
        }
    }
}
