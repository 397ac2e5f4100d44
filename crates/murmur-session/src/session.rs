//! The session: one peer's reliable channel over datagrams.
//!
//! A [`Session`] is a pure state machine. It never touches a socket:
//! callers feed it decoded segments and it hands back segments to send
//! plus events to act on. That keeps every transition unit-testable
//! without any I/O.
//!
//! # Lifecycle
//!
//! ```text
//!          initiate()                accept()
//!   Closed ───SYN──→ SynSent   Closed ──SYN──→ SynReceived
//!                       │                           │
//!                 SYN|ACK recv                  ACK recv
//!                       │                           │
//!                       ▼                           ▼
//!                  Established ◄──── chat ────► Established
//!                       │
//!            close() ───┤─── FIN received
//!                       ▼            ▼
//!                    Closing ──→  Closed
//! ```
//!
//! Sequence numbers advance one per data block, and the SYN and FIN
//! each consume one of their own. A FIN arriving mid-handshake aborts
//! the attempt: the session acks it and goes straight to `Closed`.

use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;

use murmur_protocol::seq::seq_next;
use murmur_protocol::{Flags, Segment};

use crate::flow::{segment_message, Reassembler, Reassembly};
use crate::SessionError;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No connection. Initial state, and terminal after teardown.
    Closed,
    /// Initiator sent SYN, waiting for SYN|ACK.
    SynSent,
    /// Responder answered a SYN with SYN|ACK, waiting for the final ACK.
    SynReceived,
    /// Handshake complete; chat flows.
    Established,
    /// We sent FIN, waiting for its ACK.
    Closing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Closed => "closed",
            SessionState::SynSent => "syn-sent",
            SessionState::SynReceived => "syn-received",
            SessionState::Established => "established",
            SessionState::Closing => "closing",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// SessionEvent / SessionOutput
// ---------------------------------------------------------------------------

/// Something the caller should react to after feeding a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The handshake just completed.
    Established,
    /// A complete chat line was reassembled.
    Message(String),
    /// A sequence gap cut a line short; this much of it had arrived.
    MessageTruncated(String),
    /// The peer sent FIN. The session is closed and the FIN was acked.
    PeerClosed,
    /// Our own FIN was acknowledged. The session is closed.
    Closed,
}

/// Result of [`Session::handle`]: segments to transmit and an optional
/// event for the caller.
#[derive(Debug, Default)]
pub struct SessionOutput {
    /// Segments to send to the peer, in order.
    pub replies: Vec<Segment>,
    /// Event to act on, if any.
    pub event: Option<SessionEvent>,
}

impl SessionOutput {
    fn none() -> Self {
        Self::default()
    }

    fn reply(segment: Segment) -> Self {
        Self {
            replies: vec![segment],
            event: None,
        }
    }

    fn event(event: SessionEvent) -> Self {
        Self {
            replies: Vec::new(),
            event: Some(event),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One end of a connection: handshake, ordered delivery, liveness.
#[derive(Debug)]
pub struct Session {
    local_port: u16,
    peer_port: u16,
    state: SessionState,
    /// Our initial sequence number, kept to validate the handshake ack.
    isn: u32,
    /// Next sequence number we will consume.
    send_seq: u32,
    /// Sequence our FIN consumed, if we sent one.
    fin_seq: Option<u32>,
    reassembler: Reassembler,
    /// Last time any traffic arrived from the peer.
    last_heard: Instant,
}

impl Session {
    /// Starts a connection as the initiator. Returns the session in
    /// `SynSent` and the SYN to transmit.
    pub fn initiate(local_port: u16, peer_port: u16) -> (Self, Segment) {
        let isn: u32 = rand::rng().random();
        let session = Self {
            local_port,
            peer_port,
            state: SessionState::SynSent,
            isn,
            send_seq: seq_next(isn),
            fin_seq: None,
            reassembler: Reassembler::new(),
            last_heard: Instant::now(),
        };
        tracing::debug!(isn, "initiating handshake");
        (session, Segment::syn(local_port, peer_port, isn))
    }

    /// Starts a connection as the responder, from a received SYN.
    /// Returns the session in `SynReceived` and the SYN|ACK to transmit.
    ///
    /// # Errors
    /// Returns [`SessionError::UnexpectedSegment`] if `syn` is not a
    /// pure SYN.
    pub fn accept(local_port: u16, syn: &Segment) -> Result<(Self, Segment), SessionError> {
        if !syn.flags.contains(Flags::SYN) || syn.flags.contains(Flags::ACK) {
            return Err(SessionError::UnexpectedSegment {
                state: SessionState::Closed,
                flags: syn.flags,
            });
        }

        let isn: u32 = rand::rng().random();
        let session = Self {
            local_port,
            peer_port: syn.src_port,
            state: SessionState::SynReceived,
            isn,
            send_seq: seq_next(isn),
            fin_seq: None,
            // The peer's first data block follows its SYN.
            reassembler: Reassembler::synced_to(seq_next(syn.seq)),
            last_heard: Instant::now(),
        };
        tracing::debug!(isn, peer_isn = syn.seq, "accepting handshake");
        let reply =
            Segment::syn_ack(local_port, syn.src_port, isn, seq_next(syn.seq));
        Ok((session, reply))
    }

    // -- Segment intake ----------------------------------------------------

    /// Feeds one received segment through the state machine.
    ///
    /// # Errors
    /// Returns [`SessionError::UnexpectedSegment`] for segments the
    /// current state has no transition for. The session is unchanged;
    /// the caller discards the segment.
    pub fn handle(&mut self, seg: &Segment) -> Result<SessionOutput, SessionError> {
        // Any traffic proves the peer is alive.
        self.last_heard = Instant::now();

        // Heartbeats carry no state transition in any state.
        if seg.flags.contains(Flags::HEARTBEAT) {
            tracing::trace!(state = %self.state, "heartbeat received");
            return Ok(SessionOutput::none());
        }

        match self.state {
            SessionState::SynSent => self.handle_syn_sent(seg),
            SessionState::SynReceived => self.handle_syn_received(seg),
            SessionState::Established => self.handle_established(seg),
            SessionState::Closing => self.handle_closing(seg),
            SessionState::Closed => Err(self.unexpected(seg)),
        }
    }

    fn handle_syn_sent(&mut self, seg: &Segment) -> Result<SessionOutput, SessionError> {
        if seg.flags.contains(Flags::FIN) {
            return Ok(self.close_on_fin(seg));
        }

        let is_syn_ack = seg.flags.contains(Flags::SYN | Flags::ACK);
        if !is_syn_ack || seg.ack != seq_next(self.isn) {
            return Err(self.unexpected(seg));
        }

        self.state = SessionState::Established;
        self.reassembler = Reassembler::synced_to(seq_next(seg.seq));
        tracing::info!(peer_port = self.peer_port, "session established (initiator)");

        let ack = Segment::ack(
            self.local_port,
            self.peer_port,
            self.send_seq,
            seq_next(seg.seq),
        );
        Ok(SessionOutput {
            replies: vec![ack],
            event: Some(SessionEvent::Established),
        })
    }

    fn handle_syn_received(&mut self, seg: &Segment) -> Result<SessionOutput, SessionError> {
        if seg.flags.contains(Flags::FIN) {
            return Ok(self.close_on_fin(seg));
        }

        let is_pure_ack = seg.flags == Flags::ACK;
        if !is_pure_ack || seg.ack != seq_next(self.isn) {
            return Err(self.unexpected(seg));
        }

        self.state = SessionState::Established;
        tracing::info!(peer_port = self.peer_port, "session established (responder)");
        Ok(SessionOutput::event(SessionEvent::Established))
    }

    fn handle_established(&mut self, seg: &Segment) -> Result<SessionOutput, SessionError> {
        if seg.is_data() {
            return Ok(self.handle_data(seg));
        }

        if seg.flags.contains(Flags::FIN) {
            return Ok(self.close_on_fin(seg));
        }

        if seg.flags == Flags::ACK {
            // Ack for a block we sent. Nothing is retransmitted, so
            // there is nothing to update.
            return Ok(SessionOutput::none());
        }

        Err(self.unexpected(seg))
    }

    fn handle_data(&mut self, seg: &Segment) -> SessionOutput {
        match self.reassembler.accept(seg.seq, &seg.payload) {
            Reassembly::Accepted => SessionOutput::reply(self.block_ack(seg.seq)),
            Reassembly::Complete(line) => SessionOutput {
                replies: vec![self.block_ack(seg.seq)],
                event: Some(SessionEvent::Message(line)),
            },
            Reassembly::Gap { truncated } => {
                // Dropped block: no ack, nothing for the peer to resend.
                SessionOutput {
                    replies: Vec::new(),
                    event: truncated.map(SessionEvent::MessageTruncated),
                }
            }
        }
    }

    fn handle_closing(&mut self, seg: &Segment) -> Result<SessionOutput, SessionError> {
        if seg.flags == Flags::ACK {
            let Some(fin_seq) = self.fin_seq else {
                return Err(self.unexpected(seg));
            };
            if seg.ack != seq_next(fin_seq) {
                return Err(self.unexpected(seg));
            }
            self.state = SessionState::Closed;
            tracing::info!(peer_port = self.peer_port, "session closed");
            return Ok(SessionOutput::event(SessionEvent::Closed));
        }

        if seg.flags.contains(Flags::FIN) {
            // Simultaneous close: both sides sent FIN.
            self.state = SessionState::Closed;
            let ack = Segment::ack(
                self.local_port,
                self.peer_port,
                self.send_seq,
                seq_next(seg.seq),
            );
            return Ok(SessionOutput {
                replies: vec![ack],
                event: Some(SessionEvent::PeerClosed),
            });
        }

        Err(self.unexpected(seg))
    }

    // -- Outbound ----------------------------------------------------------

    /// Splits a chat line into data segments, each consuming one
    /// sequence number.
    ///
    /// # Errors
    /// Returns [`SessionError::NotEstablished`] unless the session is
    /// established.
    pub fn send_message(&mut self, text: &str) -> Result<Vec<Segment>, SessionError> {
        if self.state != SessionState::Established {
            return Err(SessionError::NotEstablished(self.state));
        }

        let segments = segment_message(text)
            .into_iter()
            .map(|block| {
                let seq = self.send_seq;
                self.send_seq = seq_next(seq);
                Segment::data(self.local_port, self.peer_port, seq, block)
            })
            .collect();
        Ok(segments)
    }

    /// Begins an orderly teardown. Returns the FIN to transmit; the
    /// session moves to `Closing` until the FIN is acknowledged.
    ///
    /// # Errors
    /// Returns [`SessionError::NotEstablished`] unless the session is
    /// established.
    pub fn close(&mut self) -> Result<Segment, SessionError> {
        if self.state != SessionState::Established {
            return Err(SessionError::NotEstablished(self.state));
        }

        let seq = self.send_seq;
        self.send_seq = seq_next(seq);
        self.fin_seq = Some(seq);
        self.state = SessionState::Closing;
        tracing::debug!(peer_port = self.peer_port, "closing session");
        Ok(Segment::fin(self.local_port, self.peer_port, seq))
    }

    /// A keepalive segment for this session. Consumes no sequence number.
    pub fn heartbeat(&self) -> Segment {
        Segment::heartbeat(self.local_port, self.peer_port, self.send_seq)
    }

    // -- Liveness ----------------------------------------------------------

    /// When traffic from the peer was last seen.
    pub fn last_heard(&self) -> Instant {
        self.last_heard
    }

    /// Whether the peer has been silent longer than `timeout`.
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.last_heard.elapsed() > timeout
    }

    // -- Accessors ---------------------------------------------------------

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether chat can flow.
    pub fn is_established(&self) -> bool {
        self.state == SessionState::Established
    }

    /// Whether the session is fully torn down.
    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// The peer's protocol port.
    pub fn peer_port(&self) -> u16 {
        self.peer_port
    }

    /// Peer sent FIN: ack it and close, whatever state we were in.
    /// Mid-handshake this aborts the connection attempt.
    fn close_on_fin(&mut self, seg: &Segment) -> SessionOutput {
        self.state = SessionState::Closed;
        tracing::info!(peer_port = self.peer_port, "peer closed session");
        let ack = Segment::ack(
            self.local_port,
            self.peer_port,
            self.send_seq,
            seq_next(seg.seq),
        );
        SessionOutput {
            replies: vec![ack],
            event: Some(SessionEvent::PeerClosed),
        }
    }

    fn block_ack(&self, seq: u32) -> Segment {
        Segment::ack(
            self.local_port,
            self.peer_port,
            self.send_seq,
            seq_next(seq),
        )
    }

    fn unexpected(&self, seg: &Segment) -> SessionError {
        SessionError::UnexpectedSegment {
            state: self.state,
            flags: seg.flags,
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
