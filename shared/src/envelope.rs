//! The connected-package envelope carried inside data datagrams.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{read_u16, read_u24_le, read_u32, read_u8, write_u24_le};
use crate::error::{DecodeError, EncodeError};
use crate::header::{DatagramHeader, DatagramKind, DATA_HEADER};
use crate::message::Message;
use crate::reliability::Reliability;

const SPLIT_FLAG: u8 = 0x10;
const RELIABILITY_SHIFT: u8 = 5;

/// Largest payload whose length in bits fits the u16 length field.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize / 8;

/// Fragment header of a frame that was split across datagrams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitInfo {
    pub count: u32,
    pub id: u16,
    pub index: u32,
}

/// One data datagram holding a single frame.
///
/// Optional fields are present on the wire only when `reliability` calls for
/// them; `encode` writes whatever is set and `decode` fills exactly the ones
/// the mode implies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedPackage {
    pub sequence_number: u32,
    pub reliability: Reliability,
    pub reliable_message_number: Option<u32>,
    pub sequencing_index: Option<u32>,
    pub ordering_index: Option<u32>,
    pub order_channel: u8,
    pub split: Option<SplitInfo>,
    pub payload: Bytes,
}

impl ConnectedPackage {
    /// Builds an unsplit package around an encoded message.
    pub fn new(sequence_number: u32, reliability: Reliability, payload: Bytes) -> Self {
        Self {
            sequence_number,
            reliability,
            reliable_message_number: None,
            sequencing_index: None,
            ordering_index: None,
            order_channel: 0,
            split: None,
            payload,
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let mut src = raw;
        let header = read_u8(&mut src)?;
        match DatagramHeader::classify(header)? {
            DatagramKind::Data => {}
            _ => {
                return Err(DecodeError::WrongDatagramKind {
                    expected: DatagramKind::Data.as_str(),
                    found: header,
                })
            }
        }

        let sequence_number = read_u24_le(&mut src)?;
        let flags = read_u8(&mut src)?;
        let reliability = Reliability::from_bits(flags >> RELIABILITY_SHIFT)?;
        let bit_length = read_u16(&mut src)?;
        let byte_length = (bit_length as usize + 7) / 8;

        let reliable_message_number = if reliability.is_reliable() {
            Some(read_u24_le(&mut src)?)
        } else {
            None
        };
        let sequencing_index = if reliability.is_sequenced() {
            Some(read_u24_le(&mut src)?)
        } else {
            None
        };
        let (ordering_index, order_channel) = if reliability.is_ordered() {
            (Some(read_u24_le(&mut src)?), read_u8(&mut src)?)
        } else {
            (None, 0)
        };
        let split = if flags & SPLIT_FLAG != 0 {
            Some(SplitInfo {
                count: read_u32(&mut src)?,
                id: read_u16(&mut src)?,
                index: read_u32(&mut src)?,
            })
        } else {
            None
        };

        if byte_length == 0 {
            return Err(DecodeError::EmptyPayload);
        }
        if src.remaining() < byte_length {
            return Err(DecodeError::UnexpectedEof {
                needed: byte_length,
                remaining: src.remaining(),
            });
        }
        let payload = Bytes::copy_from_slice(&src[..byte_length]);

        Ok(Self {
            sequence_number,
            reliability,
            reliable_message_number,
            sequencing_index,
            ordering_index,
            order_channel,
            split,
            payload,
        })
    }

    /// Frames the package. Payloads over [`MAX_PAYLOAD_LEN`] cannot be
    /// described by the length field and are rejected.
    pub fn encode(&self) -> Result<Bytes, EncodeError> {
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(EncodeError::PayloadTooLarge {
                len: self.payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut dst = BytesMut::with_capacity(self.payload.len() + 24);
        dst.put_u8(DATA_HEADER);
        write_u24_le(&mut dst, self.sequence_number);

        let mut flags = self.reliability.bits() << RELIABILITY_SHIFT;
        if self.split.is_some() {
            flags |= SPLIT_FLAG;
        }
        dst.put_u8(flags);
        dst.put_u16((self.payload.len() * 8) as u16);

        if self.reliability.is_reliable() {
            write_u24_le(&mut dst, self.reliable_message_number.unwrap_or(0));
        }
        if self.reliability.is_sequenced() {
            write_u24_le(&mut dst, self.sequencing_index.unwrap_or(0));
        }
        if self.reliability.is_ordered() {
            write_u24_le(&mut dst, self.ordering_index.unwrap_or(0));
            dst.put_u8(self.order_channel);
        }
        if let Some(split) = self.split {
            dst.put_u32(split.count);
            dst.put_u16(split.id);
            dst.put_u32(split.index);
        }

        dst.put_slice(&self.payload);
        Ok(dst.freeze())
    }

    pub fn is_split(&self) -> bool {
        self.split.is_some()
    }

    /// Decodes the embedded message. Unregistered ids come back as `Unknown`.
    pub fn message(&self) -> Result<Message, DecodeError> {
        Message::decode(&self.payload)
    }
}
