//! `ChatServer` builder and server loop.
//!
//! The entry point for running a Murmur chat server. One task owns
//! everything: the socket, the registry, and the sweep ticker, tied
//! together in a single `select!` loop.

use std::net::SocketAddr;
use std::time::Duration;

use murmur_protocol::Segment;
use murmur_registry::{Outbound, Registry, RegistryConfig, RegistryError};
use murmur_timer::Ticker;
use murmur_transport::DatagramSocket;

use crate::MurmurError;

/// How often the registry is swept for silent peers.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Builder for configuring and starting a chat server.
///
/// # Example
///
/// ```rust,ignore
/// let server = ChatServer::builder()
///     .bind("0.0.0.0:34112")
///     .afk_timeout(Duration::from_secs(30))
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ChatServerBuilder {
    bind_addr: String,
    sweep_interval: Duration,
    registry_config: RegistryConfig,
}

impl ChatServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:34112".to_string(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            registry_config: RegistryConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets how long a peer may stay silent before eviction.
    pub fn afk_timeout(mut self, timeout: Duration) -> Self {
        self.registry_config.afk_timeout = timeout;
        self
    }

    /// Sets the `!kill` password.
    pub fn kill_password(mut self, password: &str) -> Self {
        self.registry_config.kill_password = password.to_string();
        self
    }

    /// Sets how often the liveness sweep runs.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Binds the socket and builds the server.
    pub async fn build(self) -> Result<ChatServer, MurmurError> {
        let socket = DatagramSocket::bind(&self.bind_addr).await?;
        let registry =
            Registry::new(socket.local_addr().port(), self.registry_config);
        Ok(ChatServer {
            socket,
            registry,
            sweep_interval: self.sweep_interval,
        })
    }
}

impl Default for ChatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Murmur chat server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct ChatServer {
    socket: DatagramSocket,
    registry: Registry,
    sweep_interval: Duration,
}

impl ChatServer {
    /// Creates a new builder.
    pub fn builder() -> ChatServerBuilder {
        ChatServerBuilder::new()
    }

    /// The address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Runs the server loop.
    ///
    /// Receives segments, routes them through the registry, transmits
    /// whatever comes back, and sweeps for silent peers on a fixed
    /// interval. Returns `Ok(())` when an authorized `!kill` asks the
    /// server to stop.
    pub async fn run(mut self) -> Result<(), MurmurError> {
        tracing::info!(addr = %self.socket.local_addr(), "Murmur server running");
        let mut sweeper = Ticker::every(self.sweep_interval);

        loop {
            tokio::select! {
                received = self.socket.recv_segment() => {
                    let (seg, from) = received?;
                    if self.dispatch(from, &seg).await? {
                        tracing::info!("shutdown requested, stopping server");
                        return Ok(());
                    }
                }
                _ = sweeper.tick() => {
                    let output = self.registry.sweep();
                    self.transmit(&output.outbound).await?;
                }
            }
        }
    }

    /// Routes one segment through the registry. Returns `true` when the
    /// server should shut down.
    async fn dispatch(
        &mut self,
        from: SocketAddr,
        seg: &Segment,
    ) -> Result<bool, MurmurError> {
        match self.registry.handle_segment(from, seg) {
            Ok(output) => {
                self.transmit(&output.outbound).await?;
                Ok(output.shutdown)
            }
            Err(RegistryError::KillAuthFailure(addr)) => {
                // Rejected silently: the issuer learns nothing, the log
                // keeps the evidence.
                tracing::warn!(%addr, "kill rejected: bad password");
                Ok(false)
            }
            Err(e) => {
                // Wrong-state and unknown-peer segments are dropped, not
                // fatal: the loop keeps serving everyone else.
                tracing::debug!(%from, error = %e, "discarding segment");
                Ok(false)
            }
        }
    }

    async fn transmit(&self, outbound: &[Outbound]) -> Result<(), MurmurError> {
        for ob in outbound {
            self.socket.send_segment(&ob.segment, ob.to).await?;
        }
        Ok(())
    }
}
