use murmur_protocol::Flags;

use crate::SessionState;

/// Errors that can occur in the session layer.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A segment arrived that the current state has no transition for.
    /// The caller logs it and discards the segment; the session is
    /// unchanged.
    #[error("unexpected {flags} segment in state {state}")]
    UnexpectedSegment {
        /// State the session was in when the segment arrived.
        state: SessionState,
        /// Flags of the offending segment.
        flags: Flags,
    },

    /// An operation that requires an established session was attempted
    /// before (or after) the session was established.
    #[error("session not established (state {0})")]
    NotEstablished(SessionState),

    /// The three-way handshake did not complete within the deadline.
    #[error("handshake timed out after {0:?}")]
    HandshakeTimeout(std::time::Duration),
}
