//! # Broadcast
//!
//! Best-effort UDP announcement of the dev server address so devices on the
//! local network can discover it. Start-up is two-phase: [`Broadcaster::bind`]
//! opens the socket in broadcast mode, and only a bound broadcaster can
//! [`start`](Broadcaster::start) the periodic sender.

use crate::CancellationToken;
use crate::constants::{BROADCAST_ADDRESS, BROADCAST_INTERVAL, BROADCAST_PORT};
use crate::models::{ProjectMetadata, ServeDetails};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("Could not open broadcast socket: {0}")]
    Bind(#[source] std::io::Error),
    #[error("Could not enable broadcast on socket: {0}")]
    EnableBroadcast(#[source] std::io::Error),
    #[error("Could not encode broadcast payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The announcement sent on every tick.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPayload {
    pub app_name: String,
    pub app_id: String,
    pub local_address: String,
}

impl BroadcastPayload {
    pub fn new(details: &ServeDetails, app: &ProjectMetadata) -> Self {
        let protocol = if details.protocol.is_empty() {
            "http"
        } else {
            details.protocol.as_str()
        };
        Self {
            app_name: app.name.clone(),
            app_id: app.app_id.clone().unwrap_or_default(),
            local_address: format!("{}://{}:{}", protocol, details.external_address, details.port),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastConfig {
    pub target: SocketAddr,
    pub interval: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        let address = BROADCAST_ADDRESS
            .parse::<Ipv4Addr>()
            .unwrap_or(Ipv4Addr::BROADCAST);
        Self {
            target: SocketAddr::new(IpAddr::V4(address), BROADCAST_PORT),
            interval: BROADCAST_INTERVAL,
        }
    }
}

/// A socket that is bound and ready to broadcast.
#[derive(Debug)]
pub struct Broadcaster {
    socket: UdpSocket,
    message: Vec<u8>,
    config: BroadcastConfig,
}

impl Broadcaster {
    /// Binds an ephemeral UDP port with broadcast enabled.
    pub async fn bind(
        payload: &BroadcastPayload,
        config: BroadcastConfig,
    ) -> Result<Self, BroadcastError> {
        let message = payload.to_json()?.into_bytes();
        let socket = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
            .await
            .map_err(BroadcastError::Bind)?;
        socket
            .set_broadcast(true)
            .map_err(BroadcastError::EnableBroadcast)?;

        if let Ok(addr) = socket.local_addr() {
            log::debug!("Broadcast socket listening on {}", addr);
        }
        Ok(Self {
            socket,
            message,
            config,
        })
    }

    /// Spawns the sender loop. The loop sends once per interval until the
    /// handle is stopped or `shutdown` is cancelled; the socket is closed when
    /// the loop exits.
    pub fn start(self, shutdown: CancellationToken) -> BroadcastHandle {
        let stop = shutdown.child_token();
        let sent = Arc::new(AtomicU64::new(0));
        let failed = Arc::new(AtomicU64::new(0));

        let task = tokio::spawn(run_loop(self, stop.clone(), sent.clone(), failed.clone()));

        BroadcastHandle {
            stop,
            task,
            sent,
            failed,
        }
    }
}

async fn run_loop(
    broadcaster: Broadcaster,
    stop: CancellationToken,
    sent: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
) {
    let Broadcaster {
        socket,
        message,
        config,
    } = broadcaster;

    // The first tick of a tokio interval fires immediately; start one period out.
    let start = tokio::time::Instant::now() + config.interval;
    let mut ticker = tokio::time::interval_at(start, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                match socket.send_to(&message, config.target).await {
                    Ok(_) => {
                        sent.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::SeqCst);
                        log::debug!("Broadcast to {} failed: {}", config.target, e);
                    }
                }
            }
        }
    }

    drop(socket);
    log::debug!("Broadcast stopped.");
}

/// Controls a running broadcast loop.
#[derive(Debug)]
pub struct BroadcastHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
    sent: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
}

impl BroadcastHandle {
    /// Packets handed to the OS so far.
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    /// Sends that failed so far.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the loop and waits until the socket is closed.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            log::debug!("Broadcast task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details() -> ServeDetails {
        ServeDetails {
            protocol: "http".to_string(),
            local_address: "localhost".to_string(),
            external_address: "192.168.1.10".to_string(),
            port: 8100,
        }
    }

    fn app() -> ProjectMetadata {
        ProjectMetadata {
            name: "MyApp".to_string(),
            app_id: Some("com.example.myapp".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_payload_wire_format() {
        let payload = BroadcastPayload::new(&details(), &app());
        assert_eq!(
            payload.to_json().unwrap(),
            r#"{"app_name":"MyApp","app_id":"com.example.myapp","local_address":"http://192.168.1.10:8100"}"#
        );
    }

    #[test]
    fn test_payload_defaults_protocol_to_http() {
        let mut details = details();
        details.protocol = String::new();
        let payload = BroadcastPayload::new(&details, &app());
        assert_eq!(payload.local_address, "http://192.168.1.10:8100");
    }

    #[test]
    fn test_default_config_targets_broadcast_address() {
        let config = BroadcastConfig::default();
        assert_eq!(config.target.to_string(), "255.255.255.255:41234");
        assert_eq!(config.interval, Duration::from_secs(3));
    }

    async fn local_receiver() -> (UdpSocket, BroadcastConfig) {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = BroadcastConfig {
            target: receiver.local_addr().unwrap(),
            interval: Duration::from_millis(40),
        };
        (receiver, config)
    }

    #[tokio::test]
    async fn test_broadcast_sends_payload_on_interval() {
        let (receiver, config) = local_receiver().await;
        let payload = BroadcastPayload::new(&details(), &app());
        let handle = Broadcaster::bind(&payload, config)
            .await
            .unwrap()
            .start(CancellationToken::new());

        let mut buf = [0u8; 1024];
        for _ in 0..2 {
            let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
                .await
                .expect("a packet should arrive")
                .unwrap();
            let body: serde_json::Value = serde_json::from_slice(&buf[..len]).unwrap();
            assert_eq!(body["app_name"], "MyApp");
            assert_eq!(body["local_address"], "http://192.168.1.10:8100");
        }

        assert!(handle.sent() >= 2);
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_no_sends_after_shutdown() {
        let (receiver, config) = local_receiver().await;
        let shutdown = CancellationToken::new();
        let payload = BroadcastPayload::new(&details(), &app());
        let handle = Broadcaster::bind(&payload, config)
            .await
            .unwrap()
            .start(shutdown.clone());

        let mut buf = [0u8; 1024];
        tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .expect("a packet should arrive")
            .unwrap();

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), async {
            while handle.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loop should exit on shutdown");

        let sent_at_stop = handle.sent();
        // Drain anything already in flight, then expect silence.
        while tokio::time::timeout(Duration::from_millis(20), receiver.recv_from(&mut buf))
            .await
            .is_ok()
        {}
        let quiet = tokio::time::timeout(Duration::from_millis(200), receiver.recv_from(&mut buf)).await;
        assert!(quiet.is_err(), "no packets expected after shutdown");
        assert_eq!(handle.sent(), sent_at_stop);

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_send_failures_do_not_stop_the_loop() {
        // The socket is bound to IPv4, so an IPv6 destination fails every send.
        let config = BroadcastConfig {
            target: "[::1]:41234".parse().unwrap(),
            interval: Duration::from_millis(20),
        };
        let payload = BroadcastPayload::new(&details(), &app());
        let handle = Broadcaster::bind(&payload, config)
            .await
            .unwrap()
            .start(CancellationToken::new());

        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.failed() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("loop should keep ticking");
        assert!(handle.failed() >= 1);
        assert_eq!(handle.sent(), 0);
        assert!(handle.is_running());

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stopping_the_handle_leaves_shutdown_untouched() {
        let (_receiver, config) = local_receiver().await;
        let shutdown = CancellationToken::new();
        let payload = BroadcastPayload::new(&details(), &app());
        let handle = Broadcaster::bind(&payload, config)
            .await
            .unwrap()
            .start(shutdown.clone());

        handle.stop().await;
        assert!(!shutdown.is_cancelled());
    }
}
