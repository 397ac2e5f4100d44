//! Error types for the protocol layer.
//!
//! Every variant here is a *malformed segment*: bytes that cannot be a
//! valid segment at all. The policy for these is always the same — the
//! receiver drops the datagram, logs at debug level, and keeps its
//! receive loop running. Segments that decode fine but arrive in the
//! wrong state or with the wrong sequence number are not protocol
//! errors; those are handled (and silently discarded) by the session
//! layer.

use crate::segment::MAX_PAYLOAD_SIZE;

/// Errors that can occur while decoding or encoding a segment.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The datagram is shorter than the fixed header.
    #[error("malformed segment: truncated header ({0} bytes)")]
    TruncatedHeader(usize),

    /// The header's declared payload length does not equal the number of
    /// bytes that actually followed the header. One segment per datagram
    /// means these must match exactly.
    #[error("malformed segment: header declares {declared} payload bytes, got {actual}")]
    LengthMismatch {
        /// Payload length from the header.
        declared: usize,
        /// Bytes actually present after the header.
        actual: usize,
    },

    /// The payload exceeds [`MAX_PAYLOAD_SIZE`](crate::MAX_PAYLOAD_SIZE).
    /// Raised on decode (declared length too large) and on encode (caller
    /// handed us an oversized payload).
    #[error("malformed segment: payload of {0} bytes exceeds maximum of {MAX_PAYLOAD_SIZE}")]
    OversizedPayload(usize),
}
