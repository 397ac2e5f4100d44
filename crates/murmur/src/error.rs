//! Unified error type for Murmur.

use murmur_protocol::ProtocolError;
use murmur_registry::RegistryError;
use murmur_session::SessionError;
use murmur_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// Users of the `murmur` meta-crate deal with this single type instead
/// of importing errors from each sub-crate. The `#[from]` attributes
/// let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MurmurError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (malformed segment).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (handshake, flow control, teardown).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A registry-level error (unknown peer, kill auth).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
