//! Primitive readers and writers for the RakNet wire format.
//!
//! Multi-byte integers are big-endian, except the 24-bit counters carried in
//! connected datagrams which are little-endian.

use bytes::{Buf, BufMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};

use crate::error::DecodeError;

/// Identifies offline (unconnected) RakNet messages.
pub const OFFLINE_MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

pub const U24_MAX: u32 = 0x00ff_ffff;

const AF_INET6: u16 = 23;

fn ensure(src: &impl Buf, needed: usize) -> Result<(), DecodeError> {
    let remaining = src.remaining();
    if remaining < needed {
        return Err(DecodeError::UnexpectedEof { needed, remaining });
    }
    Ok(())
}

pub fn read_u8(src: &mut impl Buf) -> Result<u8, DecodeError> {
    ensure(src, 1)?;
    Ok(src.get_u8())
}

pub fn read_bool(src: &mut impl Buf) -> Result<bool, DecodeError> {
    Ok(read_u8(src)? != 0)
}

pub fn read_u16(src: &mut impl Buf) -> Result<u16, DecodeError> {
    ensure(src, 2)?;
    Ok(src.get_u16())
}

pub fn read_u32(src: &mut impl Buf) -> Result<u32, DecodeError> {
    ensure(src, 4)?;
    Ok(src.get_u32())
}

pub fn read_u64(src: &mut impl Buf) -> Result<u64, DecodeError> {
    ensure(src, 8)?;
    Ok(src.get_u64())
}

pub fn read_u24_le(src: &mut impl Buf) -> Result<u32, DecodeError> {
    ensure(src, 3)?;
    Ok(src.get_uint_le(3) as u32)
}

pub fn write_u24_le(dst: &mut impl BufMut, value: u32) {
    dst.put_uint_le(u64::from(value & U24_MAX), 3);
}

pub fn read_magic(src: &mut impl Buf) -> Result<(), DecodeError> {
    ensure(src, OFFLINE_MAGIC.len())?;
    let mut magic = [0u8; 16];
    src.copy_to_slice(&mut magic);
    if magic != OFFLINE_MAGIC {
        return Err(DecodeError::InvalidMagic);
    }
    Ok(())
}

pub fn write_magic(dst: &mut impl BufMut) {
    dst.put_slice(&OFFLINE_MAGIC);
}

pub fn read_string(src: &mut impl Buf) -> Result<String, DecodeError> {
    let len = read_u16(src)? as usize;
    ensure(src, len)?;
    let mut raw = vec![0u8; len];
    src.copy_to_slice(&mut raw);
    String::from_utf8(raw).map_err(|_| DecodeError::InvalidUtf8)
}

/// Writes a u16-prefixed string. Anything past `u16::MAX` bytes is cut off.
pub fn write_string(dst: &mut impl BufMut, value: &str) {
    let raw = value.as_bytes();
    let len = raw.len().min(u16::MAX as usize);
    dst.put_u16(len as u16);
    dst.put_slice(&raw[..len]);
}

pub fn read_address(src: &mut impl Buf) -> Result<SocketAddr, DecodeError> {
    match read_u8(src)? {
        4 => {
            ensure(src, 6)?;
            let mut octets = [0u8; 4];
            src.copy_to_slice(&mut octets);
            let ip = Ipv4Addr::new(!octets[0], !octets[1], !octets[2], !octets[3]);
            let port = src.get_u16();
            Ok(SocketAddr::new(IpAddr::V4(ip), port))
        }
        6 => {
            ensure(src, 2 + 2 + 4 + 16 + 4)?;
            let _family = src.get_u16_le();
            let port = src.get_u16();
            let flowinfo = src.get_u32();
            let mut octets = [0u8; 16];
            src.copy_to_slice(&mut octets);
            let scope_id = src.get_u32();
            Ok(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(octets),
                port,
                flowinfo,
                scope_id,
            )))
        }
        other => Err(DecodeError::InvalidAddressVersion(other)),
    }
}

pub fn write_address(dst: &mut impl BufMut, addr: &SocketAddr) {
    match addr {
        SocketAddr::V4(v4) => {
            dst.put_u8(4);
            for octet in v4.ip().octets() {
                dst.put_u8(!octet);
            }
            dst.put_u16(v4.port());
        }
        SocketAddr::V6(v6) => {
            dst.put_u8(6);
            dst.put_u16_le(AF_INET6);
            dst.put_u16(v6.port());
            dst.put_u32(v6.flowinfo());
            dst.put_slice(&v6.ip().octets());
            dst.put_u32(v6.scope_id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn test_u24_is_little_endian() {
        let mut buf = BytesMut::new();
        write_u24_le(&mut buf, 0x010203);
        assert_eq!(&buf[..], &[0x03, 0x02, 0x01]);

        let mut src = &buf[..];
        assert_eq!(read_u24_le(&mut src).unwrap(), 0x010203);
    }

    #[test]
    fn test_u24_truncates_to_24_bits() {
        let mut buf = BytesMut::new();
        write_u24_le(&mut buf, 0x0100_0001);
        assert_eq!(&buf[..], &[0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_ipv4_address_octets_are_inverted() {
        let addr: SocketAddr = "127.0.0.1:19132".parse().unwrap();
        let mut buf = BytesMut::new();
        write_address(&mut buf, &addr);

        assert_eq!(&buf[..], &[4, 0x80, 0xff, 0xff, 0xfe, 0x4a, 0xbc]);
        let mut src = &buf[..];
        assert_eq!(read_address(&mut src).unwrap(), addr);
    }

    #[test]
    fn test_ipv6_address() {
        let addr: SocketAddr = "[::1]:19133".parse().unwrap();
        let mut buf = BytesMut::new();
        write_address(&mut buf, &addr);
        assert_eq!(buf.len(), 29);

        let mut src = &buf[..];
        assert_eq!(read_address(&mut src).unwrap(), addr);
    }

    #[test]
    fn test_unknown_address_version() {
        let mut src: &[u8] = &[5, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            read_address(&mut src),
            Err(DecodeError::InvalidAddressVersion(5))
        );
    }

    #[test]
    fn test_bad_magic() {
        let mut raw = OFFLINE_MAGIC;
        raw[15] = 0x00;
        let mut src = &raw[..];
        assert_eq!(read_magic(&mut src), Err(DecodeError::InvalidMagic));
    }

    #[test]
    fn test_truncated_string() {
        let mut src: &[u8] = &[0x00, 0x05, b'a', b'b'];
        assert_eq!(
            read_string(&mut src),
            Err(DecodeError::UnexpectedEof {
                needed: 5,
                remaining: 2
            })
        );
    }
}
