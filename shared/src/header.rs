//! The one-byte framing header that starts every connected datagram.

use bitflags::bitflags;

use crate::error::MalformedDatagram;

/// Message ids at or below this value are offline/system messages; anything
/// above is a framing header.
pub const MAX_SYSTEM_ID: u8 = 0x7f;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct DatagramFlags: u8 {
        const VALID           = 0b1000_0000;
        const ACK             = 0b0100_0000;
        const NAK             = 0b0010_0000;
        const PACKET_PAIR     = 0b0001_0000;
        const CONTINUOUS_SEND = 0b0000_1000;
        const NEEDS_B_AND_AS  = 0b0000_0100;
    }
}

/// Header byte the server puts on outbound data datagrams.
pub const DATA_HEADER: u8 = DatagramFlags::VALID.bits() | DatagramFlags::NEEDS_B_AND_AS.bits();
pub const ACK_HEADER: u8 = DatagramFlags::VALID.bits() | DatagramFlags::ACK.bits();
pub const NAK_HEADER: u8 = DatagramFlags::VALID.bits() | DatagramFlags::NAK.bits();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramKind {
    Ack,
    Nak,
    Data,
}

impl DatagramKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatagramKind::Ack => "ACK",
            DatagramKind::Nak => "NAK",
            DatagramKind::Data => "data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    pub is_ack: bool,
    pub is_nak: bool,
    pub is_valid: bool,
}

impl DatagramHeader {
    pub fn parse(byte: u8) -> Self {
        let flags = DatagramFlags::from_bits_retain(byte);
        Self {
            is_ack: flags.contains(DatagramFlags::ACK),
            is_nak: flags.contains(DatagramFlags::NAK),
            is_valid: flags.contains(DatagramFlags::VALID),
        }
    }

    /// Classifies a header byte, rejecting bit patterns no peer should send.
    pub fn classify(byte: u8) -> Result<DatagramKind, MalformedDatagram> {
        let header = Self::parse(byte);
        match (header.is_valid, header.is_ack, header.is_nak) {
            (false, _, _) => Err(MalformedDatagram::MissingValidBit(byte)),
            (true, true, true) => Err(MalformedDatagram::AckNakConflict(byte)),
            (true, true, false) => Ok(DatagramKind::Ack),
            (true, false, true) => Ok(DatagramKind::Nak),
            (true, false, false) => Ok(DatagramKind::Data),
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut flags = DatagramFlags::empty();
        flags.set(DatagramFlags::VALID, self.is_valid);
        flags.set(DatagramFlags::ACK, self.is_ack);
        flags.set(DatagramFlags::NAK, self.is_nak);
        flags.bits()
    }
}

/// Returns true when the first byte of a datagram is an offline message id.
#[inline]
pub fn is_offline_id(byte: u8) -> bool {
    byte <= MAX_SYSTEM_ID
}
