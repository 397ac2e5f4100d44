//! Flow control: splitting chat lines into blocks and reassembling them.
//!
//! A chat line longer than one payload travels as consecutive data
//! blocks, one sequence number each. The last block of a line is always
//! shorter than [`BLOCK_SIZE`]; a line whose length is an exact multiple
//! of the block size gets a trailing zero-payload block so the boundary
//! stays unambiguous.
//!
//! The receiver accepts blocks strictly in order. There is no
//! retransmission: a block that skips ahead means earlier blocks are
//! gone for good, so the partial line is flushed as truncated and the
//! reassembler waits for the start of a later line to resynchronize.

use murmur_protocol::seq::seq_next;
use murmur_protocol::MAX_PAYLOAD_SIZE;

/// Payload bytes per data block.
pub const BLOCK_SIZE: usize = MAX_PAYLOAD_SIZE;

// ---------------------------------------------------------------------------
// Sender side
// ---------------------------------------------------------------------------

/// Splits one chat line into payload blocks, terminator included.
///
/// Always returns at least one block; an empty line becomes a single
/// zero-payload block.
pub fn segment_message(text: &str) -> Vec<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut blocks: Vec<Vec<u8>> =
        bytes.chunks(BLOCK_SIZE).map(|c| c.to_vec()).collect();
    // Exact multiples of the block size (and the empty line) need an
    // explicit zero-payload terminator.
    if bytes.len() % BLOCK_SIZE == 0 {
        blocks.push(Vec::new());
    }
    blocks
}

// ---------------------------------------------------------------------------
// Receiver side
// ---------------------------------------------------------------------------

/// Outcome of feeding one data block to the [`Reassembler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reassembly {
    /// Block accepted in order; the line is not complete yet.
    /// Acknowledge the block.
    Accepted,
    /// Block accepted and it terminated the line. Acknowledge the block
    /// and deliver the text.
    Complete(String),
    /// Block does not match the expected sequence number. The block is
    /// discarded and not acknowledged. If a line was in progress, its
    /// partial text is flushed here, marked truncated.
    Gap {
        /// Partial line abandoned by the gap, if any bytes had arrived.
        truncated: Option<String>,
    },
}

/// Reassembles in-order data blocks into chat lines.
///
/// Tracks the next expected sequence number. `None` means unsynced: the
/// reassembler adopts the sequence number of whatever block arrives
/// next as the start of a new run. It is unsynced before the first
/// block of a session and again after every gap.
#[derive(Debug, Default)]
pub struct Reassembler {
    expected: Option<u32>,
    buf: Vec<u8>,
}

impl Reassembler {
    /// A reassembler that will adopt the first sequence number it sees.
    pub fn new() -> Self {
        Self::default()
    }

    /// A reassembler synced to expect `seq` next. Used right after the
    /// handshake, when the peer's initial sequence number is known.
    pub fn synced_to(seq: u32) -> Self {
        Self {
            expected: Some(seq),
            buf: Vec::new(),
        }
    }

    /// The next sequence number this reassembler will accept, if synced.
    pub fn expected(&self) -> Option<u32> {
        self.expected
    }

    /// Whether a line is partially assembled.
    pub fn in_progress(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Feeds one data block.
    pub fn accept(&mut self, seq: u32, payload: &[u8]) -> Reassembly {
        match self.expected {
            Some(expected) if expected != seq => {
                let truncated = if self.buf.is_empty() {
                    None
                } else {
                    let partial = std::mem::take(&mut self.buf);
                    Some(String::from_utf8_lossy(&partial).into_owned())
                };
                tracing::debug!(
                    expected,
                    got = seq,
                    flushed = truncated.is_some(),
                    "sequence gap, dropping block"
                );
                self.expected = None;
                Reassembly::Gap { truncated }
            }
            _ => {
                // In order, or unsynced and adopting this run.
                self.expected = Some(seq_next(seq));
                self.buf.extend_from_slice(payload);
                if payload.len() < BLOCK_SIZE {
                    let line = std::mem::take(&mut self.buf);
                    Reassembly::Complete(
                        String::from_utf8_lossy(&line).into_owned(),
                    )
                } else {
                    Reassembly::Accepted
                }
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
