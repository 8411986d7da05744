//! ACK and NAK datagrams.

use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::codec::{read_bool, read_u16, read_u24_le, read_u8, write_u24_le};
use crate::error::DecodeError;
use crate::header::{DatagramHeader, DatagramKind, ACK_HEADER, NAK_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Ack,
    Nak,
}

impl AckKind {
    fn header(self) -> u8 {
        match self {
            AckKind::Ack => ACK_HEADER,
            AckKind::Nak => NAK_HEADER,
        }
    }
}

/// One acknowledged sequence number or an inclusive range of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckRecord {
    Single(u32),
    Range { start: u32, end: u32 },
}

impl AckRecord {
    /// Number of sequence numbers covered, accounting for 24-bit wrap.
    pub fn count(&self) -> u32 {
        match *self {
            AckRecord::Single(_) => 1,
            AckRecord::Range { start, end } => (end.wrapping_sub(start) & crate::codec::U24_MAX) + 1,
        }
    }

    pub fn start(&self) -> u32 {
        match *self {
            AckRecord::Single(seq) => seq,
            AckRecord::Range { start, .. } => start,
        }
    }
}

impl fmt::Display for AckRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckRecord::Single(seq) => write!(f, "{}", seq),
            AckRecord::Range { start, end } => write!(f, "{}..={}", start, end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub kind: AckKind,
    pub records: Vec<AckRecord>,
}

impl Ack {
    /// Acknowledges exactly one received sequence number.
    pub fn ack_single(sequence_number: u32) -> Self {
        Self {
            kind: AckKind::Ack,
            records: vec![AckRecord::Single(sequence_number)],
        }
    }

    /// Total sequence numbers covered by all records.
    pub fn count(&self) -> u64 {
        self.records.iter().map(|r| u64::from(r.count())).sum()
    }

    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(3 + self.records.len() * 7);
        dst.put_u8(self.kind.header());
        dst.put_u16(self.records.len().min(u16::MAX as usize) as u16);

        for record in self.records.iter().take(u16::MAX as usize) {
            match *record {
                AckRecord::Single(seq) => {
                    dst.put_u8(1);
                    write_u24_le(&mut dst, seq);
                }
                AckRecord::Range { start, end } => {
                    dst.put_u8(0);
                    write_u24_le(&mut dst, start);
                    write_u24_le(&mut dst, end);
                }
            }
        }

        dst.freeze()
    }

    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let mut src = raw;
        let header = read_u8(&mut src)?;
        let kind = match DatagramHeader::classify(header)? {
            DatagramKind::Ack => AckKind::Ack,
            DatagramKind::Nak => AckKind::Nak,
            DatagramKind::Data => {
                return Err(DecodeError::WrongDatagramKind {
                    expected: "ACK or NAK",
                    found: header,
                })
            }
        };

        let record_count = read_u16(&mut src)?;
        let mut records = Vec::with_capacity(record_count.min(256) as usize);
        for _ in 0..record_count {
            let single = read_bool(&mut src)?;
            let start = read_u24_le(&mut src)?;
            if single {
                records.push(AckRecord::Single(start));
            } else {
                let end = read_u24_le(&mut src)?;
                records.push(AckRecord::Range { start, end });
            }
        }

        Ok(Self { kind, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_ack_bytes() {
        let encoded = Ack::ack_single(0x000102).encode();
        assert_eq!(&encoded[..], &[0xc0, 0x00, 0x01, 0x01, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_captured_nak_with_range() {
        let raw = [0xa0, 0x00, 0x01, 0x00, 0x05, 0x00, 0x00, 0x09, 0x00, 0x00];
        let nak = Ack::decode(&raw).unwrap();

        assert_eq!(nak.kind, AckKind::Nak);
        assert_eq!(nak.records, vec![AckRecord::Range { start: 5, end: 9 }]);
        assert_eq!(nak.count(), 5);
        assert_eq!(&nak.encode()[..], &raw);
    }

    #[test]
    fn test_mixed_records() {
        let ack = Ack {
            kind: AckKind::Ack,
            records: vec![
                AckRecord::Single(1),
                AckRecord::Range { start: 3, end: 4 },
            ],
        };
        assert_eq!(ack.count(), 3);
        assert_eq!(Ack::decode(&ack.encode()).unwrap(), ack);
    }

    #[test]
    fn test_wrapping_range_count() {
        let record = AckRecord::Range {
            start: 0xffffff,
            end: 1,
        };
        assert_eq!(record.count(), 3);
        assert_eq!(record.to_string(), "16777215..=1");
    }

    #[test]
    fn test_data_header_is_rejected() {
        assert!(matches!(
            Ack::decode(&[0x84, 0x00, 0x00]),
            Err(DecodeError::WrongDatagramKind { found: 0x84, .. })
        ));
    }

    #[test]
    fn test_truncated_record() {
        assert!(Ack::decode(&[0xc0, 0x00, 0x02, 0x01, 0x00, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_count_of_many_full_ranges() {
        let nak = Ack {
            kind: AckKind::Nak,
            records: vec![
                AckRecord::Range {
                    start: 0,
                    end: 0xffffff,
                };
                257
            ],
        };
        assert_eq!(nak.count(), 257 * (1u64 << 24));
        assert_eq!(Ack::decode(&nak.encode()).unwrap().count(), nak.count());
    }
}
