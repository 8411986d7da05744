use thiserror::Error;

/// Reasons a framing header byte is rejected before any body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedDatagram {
    #[error("empty datagram")]
    Empty,
    #[error("header 0x{0:02x} is missing the valid bit")]
    MissingValidBit(u8),
    #[error("header 0x{0:02x} sets both ACK and NAK")]
    AckNakConflict(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof { needed: usize, remaining: usize },
    #[error("offline message magic mismatch")]
    InvalidMagic,
    #[error("unknown reliability mode {0}")]
    InvalidReliability(u8),
    #[error("unsupported address version {0}")]
    InvalidAddressVersion(u8),
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("frame carries no payload")]
    EmptyPayload,
    #[error("expected {expected} datagram, found header 0x{found:02x}")]
    WrongDatagramKind { expected: &'static str, found: u8 },
    #[error("malformed datagram: {0}")]
    Malformed(#[from] MalformedDatagram),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("payload of {len} bytes exceeds the {max} byte frame limit")]
    PayloadTooLarge { len: usize, max: usize },
}
