//! The session registry: every connected peer, and what to tell them.
//!
//! The registry is the server's brain. It owns one [`Session`] per
//! remote address, routes decoded segments into them, turns completed
//! chat lines into commands or broadcasts, and evicts peers that have
//! gone silent.
//!
//! Like the sessions it owns, the registry does no I/O. Every operation
//! returns a [`RegistryOutput`] listing the segments to transmit; the
//! server loop owns the socket.
//!
//! # Concurrency note
//!
//! `Registry` is not thread-safe by itself. It is owned by the server's
//! single receive loop, which also runs the sweep ticker, so no locking
//! is needed here.

use std::collections::HashMap;
use std::net::SocketAddr;

use murmur_protocol::{Command, Flags, Notice, Segment};
use murmur_session::{Session, SessionEvent};

use crate::{RegistryConfig, RegistryError};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// One segment addressed to one peer.
#[derive(Debug)]
pub struct Outbound {
    /// Where to send it.
    pub to: SocketAddr,
    /// What to send.
    pub segment: Segment,
}

/// Result of a registry operation.
#[derive(Debug, Default)]
pub struct RegistryOutput {
    /// Segments to transmit, in order.
    pub outbound: Vec<Outbound>,
    /// `true` when an authorized `!kill` asked the server to stop.
    pub shutdown: bool,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// A connected peer: its session plus the display name it registered.
#[derive(Debug)]
struct Peer {
    session: Session,
    /// Set by `!hello`; unnamed peers cannot chat yet.
    name: Option<String>,
}

/// Tracks every peer session, keyed by remote address.
pub struct Registry {
    local_port: u16,
    peers: HashMap<SocketAddr, Peer>,
    config: RegistryConfig,
}

impl Registry {
    /// Creates an empty registry for a server on `local_port`.
    pub fn new(local_port: u16, config: RegistryConfig) -> Self {
        Self {
            local_port,
            peers: HashMap::new(),
            config,
        }
    }

    /// Routes one received segment.
    ///
    /// A SYN from an unknown (or fully closed) address starts a new
    /// session. Everything else goes to the existing session for that
    /// address.
    ///
    /// # Errors
    /// - [`RegistryError::SessionNotFound`] — non-SYN traffic from an
    ///   address with no session.
    /// - [`RegistryError::KillAuthFailure`] — `!kill` with the wrong
    ///   password.
    /// - [`RegistryError::Session`] — the session rejected the segment.
    ///
    /// On error nothing was sent; the caller logs and moves on.
    pub fn handle_segment(
        &mut self,
        from: SocketAddr,
        seg: &Segment,
    ) -> Result<RegistryOutput, RegistryError> {
        if seg.flags.contains(Flags::SYN) && !seg.flags.contains(Flags::ACK) {
            let fresh = self
                .peers
                .get(&from)
                .is_none_or(|peer| peer.session.is_closed());
            if fresh {
                let (session, syn_ack) = Session::accept(self.local_port, seg)?;
                self.peers.insert(from, Peer { session, name: None });
                tracing::info!(%from, "handshake started");
                return Ok(RegistryOutput {
                    outbound: vec![Outbound {
                        to: from,
                        segment: syn_ack,
                    }],
                    shutdown: false,
                });
            }
            // A live session decides what a repeated SYN means.
        }

        let session_output = {
            let peer = self
                .peers
                .get_mut(&from)
                .ok_or(RegistryError::SessionNotFound(from))?;
            peer.session.handle(seg)?
        };

        let mut result = RegistryOutput::default();
        result.outbound.extend(
            session_output
                .replies
                .into_iter()
                .map(|segment| Outbound { to: from, segment }),
        );

        match session_output.event {
            None => {}
            Some(SessionEvent::Established) => {
                tracing::info!(%from, "session established, awaiting hello");
            }
            Some(SessionEvent::Message(line)) => {
                self.handle_line(from, &line, &mut result)?;
            }
            Some(SessionEvent::MessageTruncated(partial)) => {
                tracing::warn!(
                    %from,
                    bytes = partial.len(),
                    "dropping line truncated by a sequence gap"
                );
            }
            Some(SessionEvent::PeerClosed) => {
                let name = self.peers.remove(&from).and_then(|p| p.name);
                tracing::info!(%from, "peer closed its session");
                if let Some(name) = name {
                    self.broadcast(&Notice::Left(name), None, &mut result.outbound);
                }
            }
            Some(SessionEvent::Closed) => {
                // Our FIN was acked; the departure was announced when
                // the teardown started.
                self.peers.remove(&from);
                tracing::info!(%from, "teardown complete, peer removed");
            }
        }

        Ok(result)
    }

    /// Evicts every established peer that has been silent longer than
    /// the AFK timeout. Each one gets a `!kicked` notice and a FIN, and
    /// the remaining peers hear who left. Sessions still mid-handshake
    /// are left alone.
    pub fn sweep(&mut self) -> RegistryOutput {
        let mut result = RegistryOutput::default();

        let stale: Vec<SocketAddr> = self
            .peers
            .iter()
            .filter(|(_, peer)| {
                peer.session.is_established()
                    && peer.session.is_stale(self.config.afk_timeout)
            })
            .map(|(addr, _)| *addr)
            .collect();

        let mut evicted = Vec::new();
        for addr in stale {
            self.notify_into(addr, &Notice::Kicked, &mut result.outbound);
            let Some(mut peer) = self.peers.remove(&addr) else {
                continue;
            };
            if let Ok(fin) = peer.session.close() {
                result.outbound.push(Outbound {
                    to: addr,
                    segment: fin,
                });
            }
            tracing::warn!(
                %addr,
                name = peer.name.as_deref().unwrap_or("<unnamed>"),
                "evicting silent peer"
            );
            if let Some(name) = peer.name {
                evicted.push(name);
            }
        }

        for name in evicted {
            self.broadcast(&Notice::Left(name), None, &mut result.outbound);
        }
        result
    }

    // -- Chat lines --------------------------------------------------------

    fn handle_line(
        &mut self,
        from: SocketAddr,
        line: &str,
        result: &mut RegistryOutput,
    ) -> Result<(), RegistryError> {
        match Command::parse(line) {
            Command::Chat(text) => {
                let name = self.peers.get(&from).and_then(|p| p.name.clone());
                match name {
                    Some(name) => {
                        tracing::debug!(%from, name, "chat line");
                        self.broadcast(
                            &Notice::Chat { from: name, text },
                            Some(from),
                            &mut result.outbound,
                        );
                    }
                    None => self.notify_into(
                        from,
                        &Notice::Server(
                            "introduce yourself with !hello <name>".to_string(),
                        ),
                        &mut result.outbound,
                    ),
                }
            }
            Command::Hello(name) => {
                if let Some(peer) = self.peers.get_mut(&from) {
                    peer.name = Some(name.clone());
                }
                tracing::info!(%from, name, "peer registered");
                self.broadcast(
                    &Notice::Joined(name),
                    Some(from),
                    &mut result.outbound,
                );
                let online = self.online();
                self.notify_into(
                    from,
                    &Notice::Server(format!("{online} users online")),
                    &mut result.outbound,
                );
            }
            Command::Change(new) => {
                let old = match self.peers.get_mut(&from) {
                    Some(peer) if peer.name.is_some() => {
                        peer.name.replace(new.clone())
                    }
                    _ => None,
                };
                match old {
                    Some(old) => {
                        tracing::info!(%from, old, new, "name changed");
                        self.broadcast(
                            &Notice::Server(format!(
                                "{old} is now known as {new}"
                            )),
                            None,
                            &mut result.outbound,
                        );
                    }
                    None => self.notify_into(
                        from,
                        &Notice::Server(
                            "register a name first with !hello <name>".to_string(),
                        ),
                        &mut result.outbound,
                    ),
                }
            }
            Command::Disconnect => {
                let name = self.peers.get(&from).and_then(|p| p.name.clone());
                if let Some(name) = name {
                    self.broadcast(
                        &Notice::Left(name),
                        Some(from),
                        &mut result.outbound,
                    );
                }
                if let Some(peer) = self.peers.get_mut(&from) {
                    let fin = peer.session.close()?;
                    result.outbound.push(Outbound {
                        to: from,
                        segment: fin,
                    });
                }
            }
            Command::Kill(password) => {
                if password != self.config.kill_password {
                    return Err(RegistryError::KillAuthFailure(from));
                }
                tracing::warn!(%from, "kill authorized, shutting down");
                result.shutdown = true;

                let addrs: Vec<SocketAddr> = self.peers.keys().copied().collect();
                for addr in addrs {
                    self.notify_into(addr, &Notice::Kicked, &mut result.outbound);
                    if let Some(peer) = self.peers.get_mut(&addr) {
                        if peer.session.is_established() {
                            if let Ok(fin) = peer.session.close() {
                                result.outbound.push(Outbound {
                                    to: addr,
                                    segment: fin,
                                });
                            }
                        }
                    }
                }
            }
            Command::Unknown(line) => {
                tracing::debug!(%from, line, "unknown command");
                self.notify_into(
                    from,
                    &Notice::Server(format!("unknown command: {line}")),
                    &mut result.outbound,
                );
            }
        }
        Ok(())
    }

    // -- Helpers -----------------------------------------------------------

    fn broadcast(
        &mut self,
        notice: &Notice,
        except: Option<SocketAddr>,
        out: &mut Vec<Outbound>,
    ) {
        let line = notice.to_string();
        for (addr, peer) in self.peers.iter_mut() {
            if Some(*addr) == except || !peer.session.is_established() {
                continue;
            }
            match peer.session.send_message(&line) {
                Ok(segments) => out.extend(
                    segments
                        .into_iter()
                        .map(|segment| Outbound { to: *addr, segment }),
                ),
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "skipping peer in broadcast");
                }
            }
        }
    }

    fn notify_into(
        &mut self,
        to: SocketAddr,
        notice: &Notice,
        out: &mut Vec<Outbound>,
    ) {
        let Some(peer) = self.peers.get_mut(&to) else {
            return;
        };
        match peer.session.send_message(&notice.to_string()) {
            Ok(segments) => out.extend(
                segments
                    .into_iter()
                    .map(|segment| Outbound { to, segment }),
            ),
            Err(e) => tracing::debug!(%to, error = %e, "could not notify peer"),
        }
    }

    // -- Accessors ---------------------------------------------------------

    /// Number of tracked sessions, named or not.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Whether no sessions are tracked.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Number of peers that have registered a display name.
    pub fn online(&self) -> usize {
        self.peers.values().filter(|p| p.name.is_some()).count()
    }

    /// The display name registered for `addr`, if any.
    pub fn name_of(&self, addr: SocketAddr) -> Option<&str> {
        self.peers.get(&addr)?.name.as_deref()
    }
}

// =========================================================================
// Tests
// =========================================================================
