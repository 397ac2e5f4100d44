//! Wire protocol for Murmur.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Segment** ([`Segment`], [`Flags`]) — the one protocol unit carried
//!   in a single UDP datagram: a fixed 15-byte header plus up to
//!   [`MAX_PAYLOAD_SIZE`] payload bytes.
//! - **Codec** ([`Segment::encode`] / [`Segment::decode`]) — conversion
//!   between segments and network-byte-order bytes.
//! - **Sequence arithmetic** ([`seq`]) — wraparound-safe comparison of
//!   32-bit sequence numbers.
//! - **Chat-line vocabulary** ([`Command`], [`Notice`]) — the in-band
//!   control lines multiplexed onto the chat channel, decoded into tagged
//!   variants so no other layer does string matching.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw datagrams) and session
//! (per-peer state). It knows nothing about sockets, timers, or the
//! registry — only how bytes are shaped.
//!
//! ```text
//! Transport (datagrams) → Protocol (Segment) → Session (peer state)
//! ```

mod command;
mod error;
mod segment;
pub mod seq;

pub use command::{Command, Notice};
pub use error::ProtocolError;
pub use segment::{Flags, Segment, HEADER_SIZE, MAX_PAYLOAD_SIZE, MAX_SEGMENT_SIZE};
