//! The segment: one protocol unit, one UDP datagram.
//!
//! Wire layout (network byte order):
//!
//! ```text
//! ┌───────────────┬───────────────┬─────────┬─────────┬───────┬─────────┬─────────┐
//! │ source port   │ dest port     │ seq     │ ack     │ flags │ length  │ payload │
//! │ 2B            │ 2B            │ 4B      │ 4B      │ 1B    │ 2B      │ 0..64B  │
//! └───────────────┴───────────────┴─────────┴─────────┴───────┴─────────┴─────────┘
//! ```
//!
//! The header is exactly [`HEADER_SIZE`] bytes. A segment is immutable
//! once decoded; all mutation happens by building a new segment.

use std::fmt;
use std::ops::BitOr;

use crate::ProtocolError;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 15;

/// Maximum payload carried by a single segment.
pub const MAX_PAYLOAD_SIZE: usize = 64;

/// Largest possible datagram: header plus full payload. Receive buffers
/// are sized to this.
pub const MAX_SEGMENT_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD_SIZE;

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

/// The flag bits of a segment header.
///
/// Bit assignments are part of the wire format: bit 0 SYN, bit 1 ACK,
/// bit 2 FIN, bit 3 HEARTBEAT. The remaining bits are reserved and
/// ignored on receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Flags(u8);

impl Flags {
    /// No flags set — a plain data segment.
    pub const NONE: Flags = Flags(0);
    /// Connection request (handshake step 1).
    pub const SYN: Flags = Flags(0b0001);
    /// Acknowledgment; the ack-number field is meaningful.
    pub const ACK: Flags = Flags(0b0010);
    /// Teardown request.
    pub const FIN: Flags = Flags(0b0100);
    /// Keepalive; zero payload, does not consume a sequence number.
    pub const HEARTBEAT: Flags = Flags(0b1000);

    /// Builds flags from a raw header byte. Reserved bits are kept so a
    /// decoded segment re-encodes to the same bytes.
    pub fn from_bits(bits: u8) -> Self {
        Flags(bits)
    }

    /// The raw header byte.
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flags are set (a data segment).
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Flags {
    type Output = Flags;

    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = Vec::new();
        if self.contains(Flags::SYN) {
            names.push("SYN");
        }
        if self.contains(Flags::ACK) {
            names.push("ACK");
        }
        if self.contains(Flags::FIN) {
            names.push("FIN");
        }
        if self.contains(Flags::HEARTBEAT) {
            names.push("HEARTBEAT");
        }
        if names.is_empty() {
            write!(f, "DATA")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One protocol unit: fixed header plus optional payload, carried in a
/// single datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Originating endpoint port.
    pub src_port: u16,
    /// Target endpoint port.
    pub dst_port: u16,
    /// Per-session send counter (advances by one per data block).
    pub seq: u32,
    /// Highest contiguously accepted sequence + 1, valid when ACK is set.
    pub ack: u32,
    /// Flag bits.
    pub flags: Flags,
    /// Raw payload bytes; empty for control-only segments.
    pub payload: Vec<u8>,
}

impl Segment {
    /// A data block carrying part of a chat line.
    pub fn data(src_port: u16, dst_port: u16, seq: u32, payload: Vec<u8>) -> Self {
        Self {
            src_port,
            dst_port,
            seq,
            ack: 0,
            flags: Flags::NONE,
            payload,
        }
    }

    /// Handshake step 1: client announces its initial sequence number.
    pub fn syn(src_port: u16, dst_port: u16, isn: u32) -> Self {
        Self {
            src_port,
            dst_port,
            seq: isn,
            ack: 0,
            flags: Flags::SYN,
            payload: Vec::new(),
        }
    }

    /// Handshake step 2: server announces its own initial sequence number
    /// and acknowledges the client's.
    pub fn syn_ack(src_port: u16, dst_port: u16, isn: u32, ack: u32) -> Self {
        Self {
            src_port,
            dst_port,
            seq: isn,
            ack,
            flags: Flags::SYN | Flags::ACK,
            payload: Vec::new(),
        }
    }

    /// A pure acknowledgment (handshake step 3, block acks, FIN acks).
    pub fn ack(src_port: u16, dst_port: u16, seq: u32, ack: u32) -> Self {
        Self {
            src_port,
            dst_port,
            seq,
            ack,
            flags: Flags::ACK,
            payload: Vec::new(),
        }
    }

    /// Teardown request.
    pub fn fin(src_port: u16, dst_port: u16, seq: u32) -> Self {
        Self {
            src_port,
            dst_port,
            seq,
            ack: 0,
            flags: Flags::FIN,
            payload: Vec::new(),
        }
    }

    /// Zero-payload keepalive. Carries the session's current sequence
    /// number for logging, but does not consume it.
    pub fn heartbeat(src_port: u16, dst_port: u16, seq: u32) -> Self {
        Self {
            src_port,
            dst_port,
            seq,
            ack: 0,
            flags: Flags::HEARTBEAT,
            payload: Vec::new(),
        }
    }

    /// Encodes the segment into wire bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::OversizedPayload`] if the payload exceeds
    /// [`MAX_PAYLOAD_SIZE`].
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedPayload(self.payload.len()));
        }

        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.src_port.to_be_bytes());
        buf.extend_from_slice(&self.dst_port.to_be_bytes());
        buf.extend_from_slice(&self.seq.to_be_bytes());
        buf.extend_from_slice(&self.ack.to_be_bytes());
        buf.push(self.flags.bits());
        buf.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes wire bytes into a segment.
    ///
    /// # Errors
    /// - [`ProtocolError::TruncatedHeader`] — fewer than [`HEADER_SIZE`] bytes.
    /// - [`ProtocolError::OversizedPayload`] — declared length over the maximum.
    /// - [`ProtocolError::LengthMismatch`] — declared length differs from the
    ///   bytes actually received after the header.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtocolError::TruncatedHeader(buf.len()));
        }

        // Fixed offsets; the slice bounds are guaranteed by the check above.
        let src_port = u16::from_be_bytes([buf[0], buf[1]]);
        let dst_port = u16::from_be_bytes([buf[2], buf[3]]);
        let seq = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ack = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let flags = Flags::from_bits(buf[12]);
        let declared = u16::from_be_bytes([buf[13], buf[14]]) as usize;

        if declared > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::OversizedPayload(declared));
        }

        let actual = buf.len() - HEADER_SIZE;
        if declared != actual {
            return Err(ProtocolError::LengthMismatch { declared, actual });
        }

        Ok(Self {
            src_port,
            dst_port,
            seq,
            ack,
            flags,
            payload: buf[HEADER_SIZE..].to_vec(),
        })
    }

    /// Returns `true` for a plain data block (no flags set).
    pub fn is_data(&self) -> bool {
        self.flags.is_empty()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} seq={} ack={} len={}",
            self.flags,
            self.seq,
            self.ack,
            self.payload.len()
        )
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // Flags
    // =====================================================================

    #[test]
    fn test_flags_bit_assignments_match_wire_format() {
        // The bit positions are wire format, not an implementation detail.
        assert_eq!(Flags::SYN.bits(), 0b0001);
        assert_eq!(Flags::ACK.bits(), 0b0010);
        assert_eq!(Flags::FIN.bits(), 0b0100);
        assert_eq!(Flags::HEARTBEAT.bits(), 0b1000);
    }

    #[test]
    fn test_flags_bitor_combines() {
        let syn_ack = Flags::SYN | Flags::ACK;
        assert!(syn_ack.contains(Flags::SYN));
        assert!(syn_ack.contains(Flags::ACK));
        assert!(!syn_ack.contains(Flags::FIN));
    }

    #[test]
    fn test_flags_empty_is_data() {
        assert!(Flags::NONE.is_empty());
        assert!(!Flags::SYN.is_empty());
    }

    #[test]
    fn test_flags_display() {
        assert_eq!(Flags::NONE.to_string(), "DATA");
        assert_eq!((Flags::SYN | Flags::ACK).to_string(), "SYN|ACK");
        assert_eq!(Flags::HEARTBEAT.to_string(), "HEARTBEAT");
    }

    // =====================================================================
    // Encode
    // =====================================================================

    #[test]
    fn test_encode_layout_is_network_byte_order() {
        let seg = Segment {
            src_port: 0x1234,
            dst_port: 0xABCD,
            seq: 0x01020304,
            ack: 0x05060708,
            flags: Flags::SYN | Flags::ACK,
            payload: vec![0xAA, 0xBB],
        };
        let bytes = seg.encode().unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE + 2);
        assert_eq!(&bytes[0..2], &[0x12, 0x34]); // src port
        assert_eq!(&bytes[2..4], &[0xAB, 0xCD]); // dst port
        assert_eq!(&bytes[4..8], &[0x01, 0x02, 0x03, 0x04]); // seq
        assert_eq!(&bytes[8..12], &[0x05, 0x06, 0x07, 0x08]); // ack
        assert_eq!(bytes[12], 0b0011); // flags
        assert_eq!(&bytes[13..15], &[0x00, 0x02]); // payload length
        assert_eq!(&bytes[15..], &[0xAA, 0xBB]); // payload
    }

    #[test]
    fn test_encode_control_segment_is_header_only() {
        let seg = Segment::fin(1, 2, 99);
        let bytes = seg.encode().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[13..15], &[0, 0]);
    }

    #[test]
    fn test_encode_oversized_payload_errors() {
        let seg = Segment::data(1, 2, 0, vec![0u8; MAX_PAYLOAD_SIZE + 1]);
        let result = seg.encode();
        assert!(matches!(
            result,
            Err(ProtocolError::OversizedPayload(n)) if n == MAX_PAYLOAD_SIZE + 1
        ));
    }

    #[test]
    fn test_encode_max_payload_succeeds() {
        let seg = Segment::data(1, 2, 0, vec![0x42; MAX_PAYLOAD_SIZE]);
        let bytes = seg.encode().unwrap();
        assert_eq!(bytes.len(), MAX_SEGMENT_SIZE);
    }

    // =====================================================================
    // Decode
    // =====================================================================

    #[test]
    fn test_decode_round_trips_all_fields() {
        let original = Segment {
            src_port: 50000,
            dst_port: 34112,
            seq: u32::MAX,
            ack: 0,
            flags: Flags::HEARTBEAT,
            payload: Vec::new(),
        };
        let decoded = Segment::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_round_trips_payload_sizes() {
        for len in [0usize, 1, 11, 63, 64] {
            let original = Segment::data(7, 8, 3, vec![0x5A; len]);
            let decoded =
                Segment::decode(&original.encode().unwrap()).unwrap();
            assert_eq!(decoded, original, "payload length {len}");
        }
    }

    #[test]
    fn test_decode_truncated_header_errors() {
        for len in [0usize, 1, HEADER_SIZE - 1] {
            let result = Segment::decode(&vec![0u8; len]);
            assert!(
                matches!(result, Err(ProtocolError::TruncatedHeader(n)) if n == len),
                "length {len} should be a truncated header"
            );
        }
    }

    #[test]
    fn test_decode_declared_longer_than_received_errors() {
        let mut bytes = Segment::data(1, 2, 0, vec![1, 2, 3]).encode().unwrap();
        // Claim 5 payload bytes but only send 3.
        bytes[14] = 5;
        let result = Segment::decode(&bytes);
        assert!(matches!(
            result,
            Err(ProtocolError::LengthMismatch {
                declared: 5,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_decode_declared_shorter_than_received_errors() {
        let mut bytes = Segment::data(1, 2, 0, vec![1, 2, 3]).encode().unwrap();
        bytes[14] = 1;
        let result = Segment::decode(&bytes);
        assert!(matches!(
            result,
            Err(ProtocolError::LengthMismatch {
                declared: 1,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_decode_oversized_declared_length_errors() {
        let mut bytes = vec![0u8; HEADER_SIZE + MAX_PAYLOAD_SIZE + 10];
        let declared = (MAX_PAYLOAD_SIZE + 10) as u16;
        bytes[13..15].copy_from_slice(&declared.to_be_bytes());
        let result = Segment::decode(&bytes);
        assert!(matches!(result, Err(ProtocolError::OversizedPayload(_))));
    }

    #[test]
    fn test_decode_preserves_reserved_flag_bits() {
        // Unknown high bits are carried through so re-encode is lossless.
        let mut bytes = Segment::heartbeat(1, 2, 0).encode().unwrap();
        bytes[12] |= 0b1000_0000;
        let decoded = Segment::decode(&bytes).unwrap();
        assert_eq!(decoded.flags.bits(), 0b1000_1000);
        assert!(decoded.flags.contains(Flags::HEARTBEAT));
    }

    // =====================================================================
    // Constructors
    // =====================================================================

    #[test]
    fn test_syn_ack_sets_both_flags() {
        let seg = Segment::syn_ack(1, 2, 100, 201);
        assert!(seg.flags.contains(Flags::SYN | Flags::ACK));
        assert_eq!(seg.seq, 100);
        assert_eq!(seg.ack, 201);
        assert!(seg.payload.is_empty());
    }

    #[test]
    fn test_heartbeat_is_zero_payload() {
        let seg = Segment::heartbeat(1, 2, 42);
        assert!(seg.flags.contains(Flags::HEARTBEAT));
        assert!(seg.payload.is_empty());
        assert!(!seg.is_data());
    }

    #[test]
    fn test_data_segment_has_no_flags() {
        let seg = Segment::data(1, 2, 0, b"hi".to_vec());
        assert!(seg.is_data());
    }
}
