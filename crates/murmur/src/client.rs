//! `ChatClient`: connect, chat, heartbeat, disconnect.
//!
//! The client owns one socket and one session. [`ChatClient::connect`]
//! runs the handshake and registers a display name; after that the
//! caller alternates between [`send_chat_line`](ChatClient::send_chat_line)
//! and [`next_event`](ChatClient::next_event). The heartbeat loop rides
//! inside `next_event`, so a client that is waiting for chat is also
//! keeping its session alive. The flip side: heartbeats only fire while
//! the caller is parked in `next_event`, so a client that stops pumping
//! events for longer than the server's AFK timeout will be evicted.

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use murmur_protocol::{Notice, Segment};
use murmur_session::{Session, SessionError, SessionEvent};
use murmur_timer::Ticker;
use murmur_transport::DatagramSocket;

use crate::MurmurError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Client-side timing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// UDP port to bind locally. `0` lets the OS pick an ephemeral one.
    pub local_port: u16,

    /// How often to send a keepalive while idle. `None` disables
    /// heartbeats (the server will evict the client once the AFK
    /// timeout passes).
    pub heartbeat_interval: Option<Duration>,

    /// How long to wait for the handshake (and for teardown acks).
    pub handshake_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            local_port: 0,
            heartbeat_interval: Some(Duration::from_secs(1)),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Something that happened on the chat channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A chat line from a named peer.
    Message {
        /// Display name of the sender.
        from: String,
        /// The line itself.
        text: String,
    },
    /// A peer registered a display name.
    Joined(String),
    /// A peer disconnected or was evicted.
    Left(String),
    /// A free-form server message.
    Notice(String),
    /// The server is removing this client.
    Kicked,
    /// A line was cut short by lost segments; this much arrived.
    Truncated(String),
    /// The session is gone — the server closed it or shut down.
    Disconnected,
}

// ---------------------------------------------------------------------------
// ChatClient
// ---------------------------------------------------------------------------

/// A connected chat client.
pub struct ChatClient {
    socket: DatagramSocket,
    session: Session,
    server_addr: SocketAddr,
    heartbeat: Ticker,
    config: ClientConfig,
}

impl ChatClient {
    /// Connects to a server and registers `name`.
    ///
    /// Runs the three-way handshake, then sends the `!hello` line.
    ///
    /// # Errors
    /// Returns [`SessionError::HandshakeTimeout`] (wrapped) if the
    /// server does not answer in time.
    pub async fn connect(
        server_addr: SocketAddr,
        name: &str,
        config: ClientConfig,
    ) -> Result<Self, MurmurError> {
        let socket =
            DatagramSocket::bind(&format!("0.0.0.0:{}", config.local_port)).await?;
        let (mut session, syn) =
            Session::initiate(socket.local_addr().port(), server_addr.port());
        socket.send_segment(&syn, server_addr).await?;

        let handshake = async {
            loop {
                let (seg, from) = socket.recv_segment().await?;
                if from != server_addr {
                    continue;
                }
                match session.handle(&seg) {
                    Ok(out) => {
                        for reply in &out.replies {
                            socket.send_segment(reply, server_addr).await?;
                        }
                        if out.event == Some(SessionEvent::Established) {
                            return Ok::<(), MurmurError>(());
                        }
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "discarding segment during handshake");
                    }
                }
            }
        };
        tokio::time::timeout(config.handshake_timeout, handshake)
            .await
            .map_err(|_| {
                SessionError::HandshakeTimeout(config.handshake_timeout)
            })??;

        tracing::info!(%server_addr, name, "connected");

        let heartbeat = match config.heartbeat_interval {
            Some(interval) => Ticker::every(interval),
            None => Ticker::disabled(),
        };

        let mut client = Self {
            socket,
            session,
            server_addr,
            heartbeat,
            config,
        };
        client.send_chat_line(&format!("!hello {name}")).await?;
        Ok(client)
    }

    /// The local address the client's socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// Sends one chat line (or `!` command) to the server.
    pub async fn send_chat_line(&mut self, text: &str) -> Result<(), MurmurError> {
        for seg in self.session.send_message(text)? {
            self.socket.send_segment(&seg, self.server_addr).await?;
        }
        Ok(())
    }

    /// Waits for the next chat event, heartbeating while idle.
    ///
    /// Acknowledgments and keepalives are handled internally; only
    /// events worth showing a user come back.
    pub async fn next_event(&mut self) -> Result<ChatEvent, MurmurError> {
        loop {
            tokio::select! {
                received = self.socket.recv_segment() => {
                    let (seg, from) = received?;
                    if from != self.server_addr {
                        tracing::debug!(%from, "ignoring segment from stranger");
                        continue;
                    }
                    if let Some(event) = self.handle_segment(&seg).await? {
                        return Ok(event);
                    }
                }
                _ = self.heartbeat.tick() => {
                    let hb = self.session.heartbeat();
                    self.socket.send_segment(&hb, self.server_addr).await?;
                }
            }
        }
    }

    /// Leaves the chat with an orderly `!disconnect`, waiting for the
    /// server's teardown to finish.
    pub async fn disconnect(mut self) -> Result<(), MurmurError> {
        self.send_chat_line("!disconnect").await?;

        let timeout = self.config.handshake_timeout;
        let teardown = async {
            loop {
                let (seg, from) = self.socket.recv_segment().await?;
                if from != self.server_addr {
                    continue;
                }
                if let Some(event) = self.handle_segment(&seg).await? {
                    if event == ChatEvent::Disconnected {
                        return Ok::<(), MurmurError>(());
                    }
                }
            }
        };
        match tokio::time::timeout(timeout, teardown).await {
            Ok(result) => result,
            Err(_) => {
                // The server never answered; the session is as gone as
                // it is going to get.
                tracing::debug!("teardown timed out");
                Ok(())
            }
        }
    }

    // -- Internals ---------------------------------------------------------

    /// Feeds one segment through the session, transmitting any replies.
    /// Returns an event if one should surface to the caller.
    async fn handle_segment(
        &mut self,
        seg: &Segment,
    ) -> Result<Option<ChatEvent>, MurmurError> {
        let out = match self.session.handle(seg) {
            Ok(out) => out,
            Err(e) => {
                tracing::debug!(error = %e, "discarding segment");
                return Ok(None);
            }
        };
        for reply in &out.replies {
            self.socket.send_segment(reply, self.server_addr).await?;
        }
        Ok(out.event.and_then(classify))
    }
}

/// Maps a session event to what a chat user should see.
fn classify(event: SessionEvent) -> Option<ChatEvent> {
    match event {
        SessionEvent::Established => None,
        SessionEvent::Message(line) => Some(match Notice::parse(&line) {
            Some(Notice::Chat { from, text }) => ChatEvent::Message { from, text },
            Some(Notice::Joined(name)) => ChatEvent::Joined(name),
            Some(Notice::Left(name)) => ChatEvent::Left(name),
            Some(Notice::Server(text)) => ChatEvent::Notice(text),
            Some(Notice::Kicked) => ChatEvent::Kicked,
            // The server only speaks notices, but surface anything else
            // rather than losing it.
            None => ChatEvent::Notice(line),
        }),
        SessionEvent::MessageTruncated(partial) => Some(ChatEvent::Truncated(partial)),
        SessionEvent::PeerClosed | SessionEvent::Closed => Some(ChatEvent::Disconnected),
    }
}
