//! Big-endian primitive readers and writers shared by the codec modules.

use bytes::{Buf, BufMut, Bytes};

use crate::error::{Result, WireError};

pub fn ensure(buf: &Bytes, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(WireError::Truncated {
            needed: needed - buf.remaining(),
            remaining: buf.remaining(),
        });
    }
    Ok(())
}

pub fn read_u8(buf: &mut Bytes) -> Result<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn read_u16(buf: &mut Bytes) -> Result<u16> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub fn read_u32(buf: &mut Bytes) -> Result<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

pub fn read_u64(buf: &mut Bytes) -> Result<u64> {
    ensure(buf, 8)?;
    Ok(buf.get_u64())
}

pub fn take(buf: &mut Bytes, len: usize) -> Result<Bytes> {
    ensure(buf, len)?;
    Ok(buf.split_to(len))
}

/// Read a byte string with a u8 length prefix.
pub fn read_u8_bytes(buf: &mut Bytes) -> Result<Bytes> {
    let len = read_u8(buf)? as usize;
    take(buf, len)
}

/// Read a byte string with a u16 length prefix.
pub fn read_u16_bytes(buf: &mut Bytes) -> Result<Bytes> {
    let len = read_u16(buf)? as usize;
    take(buf, len)
}

pub fn read_u8_string(buf: &mut Bytes) -> Result<String> {
    let raw = read_u8_bytes(buf)?;
    String::from_utf8(raw.to_vec()).map_err(|_| WireError::BadString)
}

pub fn read_u16_string(buf: &mut Bytes) -> Result<String> {
    let raw = read_u16_bytes(buf)?;
    String::from_utf8(raw.to_vec()).map_err(|_| WireError::BadString)
}

pub fn put_u8_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.put_u8(data.len() as u8);
    buf.put_slice(data);
}

pub fn put_u16_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.put_u16(data.len() as u16);
    buf.put_slice(data);
}

pub fn put_u8_string(buf: &mut Vec<u8>, s: &str) {
    put_u8_bytes(buf, s.as_bytes());
}

pub fn put_u16_string(buf: &mut Vec<u8>, s: &str) {
    put_u16_bytes(buf, s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_string_round_trip() {
        let mut buf = Vec::new();
        put_u8_string(&mut buf, "ChattingChuck");
        put_u16_string(&mut buf, "a longer profile body");

        let mut bytes = Bytes::from(buf);
        assert_eq!(read_u8_string(&mut bytes).unwrap(), "ChattingChuck");
        assert_eq!(read_u16_string(&mut bytes).unwrap(), "a longer profile body");
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_truncation_detected() {
        let mut bytes = Bytes::from_static(&[0x05, b'a', b'b']);
        let err = read_u8_string(&mut bytes).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }
}
