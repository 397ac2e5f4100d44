//! Session layer for Murmur.
//!
//! Builds the reliable, ordered chat channel on top of raw segments:
//!
//! - **Handshake** ([`Session`], [`SessionState`]) — three-way SYN /
//!   SYN|ACK / ACK establishment and FIN teardown.
//! - **Flow control** ([`flow`]) — chat lines split into fixed-size
//!   blocks, reassembled strictly in order, gaps truncating the line
//!   in flight.
//! - **Liveness** — every received segment refreshes the peer's
//!   last-heard instant; [`Session::is_stale`] answers eviction checks.
//!
//! Sessions are pure state machines with no I/O. The server's registry
//! and the client both drive them by feeding decoded segments and
//! transmitting whatever comes back.

pub mod flow;

mod error;
mod session;

pub use error::SessionError;
pub use session::{Session, SessionEvent, SessionOutput, SessionState};
