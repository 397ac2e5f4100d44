use std::net::SocketAddr;

use murmur_session::SessionError;

/// Errors that can occur in the registry layer.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A non-SYN segment arrived from an address with no session.
    #[error("no session for peer {0}")]
    SessionNotFound(SocketAddr),

    /// A `!kill` command carried the wrong password.
    #[error("kill rejected: bad password from {0}")]
    KillAuthFailure(SocketAddr),

    /// A session rejected the segment (wrong state, bad handshake ack).
    #[error(transparent)]
    Session(#[from] SessionError),
}
