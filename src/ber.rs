//! BER/TLV primitives shared by every PDU codec.
//!
//! Encoding is two-pass: callers compute the exact encoded length bottom-up
//! with the `*_octets` helpers, allocate once, then write top-down through
//! [`BerWriter`]. Decoding goes through [`BerReader`], which bounds every
//! element by its declared length and reports the byte offset of any
//! violation.

use crate::error::{DecodeError, EncodeError};

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_ENUMERATED: u8 = 0x0A;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

/// Maximum accepted length-of-length. Four octets already covers 4 GiB,
/// far beyond any sane PDU.
pub const MAX_LENGTH_OCTETS: usize = 4;

/// How many octets the length field itself occupies for a value of `len`
/// bytes.
pub fn length_octets(len: usize) -> usize {
    if len <= 0x7F {
        1
    } else {
        // one prefix octet plus the minimal big-endian representation
        let mut n = 0;
        let mut rest = len;
        while rest > 0 {
            n += 1;
            rest >>= 8;
        }
        1 + n
    }
}

/// Total size of a TLV whose value part is `len` bytes.
pub fn tlv_octets(len: usize) -> usize {
    1 + length_octets(len) + len
}

/// Minimal two's-complement width of an integer, per X.690: the leading
/// octet may not be an all-zero or all-one extension of the sign bit.
pub fn integer_octets(value: i32) -> usize {
    let bytes = value.to_be_bytes();
    let mut n = 4;

    while n > 1 {
        let first = bytes[4 - n];
        let next = bytes[4 - n + 1];
        let redundant =
            (first == 0x00 && next & 0x80 == 0) || (first == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        n -= 1;
    }

    n
}

/// Width of a non-negative enumerated value. Zero still takes one octet.
pub fn enumerated_octets(value: u32) -> usize {
    let value = value as u64;
    let mut n = 1;
    while (value >> (8 * n)) != 0 {
        n += 1;
    }
    // a set high bit would flip the sign, force a leading zero octet
    if value >> (8 * n - 1) & 1 == 1 {
        n += 1;
    }
    n
}

/// Sequential writer over a pre-sized buffer. Every write checks capacity
/// so a miscomputed length surfaces as [`EncodeError::BufferTooSmall`]
/// instead of a panic.
pub struct BerWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> BerWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        BerWriter { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        let available = self.buf.len() - self.pos;
        if bytes.len() > available {
            return Err(EncodeError::BufferTooSmall {
                needed: bytes.len(),
                available,
            });
        }
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
        Ok(())
    }

    pub fn write_tag(&mut self, tag: u8) -> Result<(), EncodeError> {
        self.put(&[tag])
    }

    pub fn write_length(&mut self, len: usize) -> Result<(), EncodeError> {
        if len <= 0x7F {
            return self.put(&[len as u8]);
        }

        let octets = length_octets(len) - 1;
        self.put(&[0x80 | octets as u8])?;
        for i in (0..octets).rev() {
            self.put(&[(len >> (8 * i)) as u8])?;
        }
        Ok(())
    }

    pub fn write_header(&mut self, tag: u8, len: usize) -> Result<(), EncodeError> {
        self.write_tag(tag)?;
        self.write_length(len)
    }

    pub fn write_integer(&mut self, value: i32) -> Result<(), EncodeError> {
        self.write_tagged_integer(TAG_INTEGER, value)
    }

    pub fn write_tagged_integer(&mut self, tag: u8, value: i32) -> Result<(), EncodeError> {
        let n = integer_octets(value);
        self.write_header(tag, n)?;
        self.put(&value.to_be_bytes()[4 - n..])
    }

    pub fn write_enumerated(&mut self, value: u32) -> Result<(), EncodeError> {
        let n = enumerated_octets(value);
        self.write_header(TAG_ENUMERATED, n)?;
        let bytes = (value as u64).to_be_bytes();
        self.put(&bytes[8 - n..])
    }

    pub fn write_boolean(&mut self, value: bool) -> Result<(), EncodeError> {
        self.write_header(TAG_BOOLEAN, 1)?;
        self.put(&[if value { 0xFF } else { 0x00 }])
    }

    pub fn write_octet_string(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.write_tagged_octet_string(TAG_OCTET_STRING, bytes)
    }

    pub fn write_tagged_octet_string(&mut self, tag: u8, bytes: &[u8]) -> Result<(), EncodeError> {
        self.write_header(tag, bytes.len())?;
        self.put(bytes)
    }

    pub fn write_string(&mut self, s: &str) -> Result<(), EncodeError> {
        self.write_octet_string(s.as_bytes())
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.put(bytes)
    }
}

/// Sequential reader over a received buffer. Constructed elements never
/// read past their declared length: callers bound nested content with the
/// end offset returned by the sequence readers.
pub struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
    max_length_octets: usize,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BerReader {
            data,
            pos: 0,
            max_length_octets: MAX_LENGTH_OCTETS,
        }
    }

    /// Reader with a tightened length-of-length limit, for deployments that
    /// cap PDU sizes well below the default.
    pub fn with_max_length_octets(data: &'a [u8], max_length_octets: usize) -> Self {
        BerReader {
            data,
            pos: 0,
            max_length_octets: max_length_octets.min(MAX_LENGTH_OCTETS),
        }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len,
                remaining: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Look at the next tag without consuming it.
    pub fn peek_tag(&self) -> Result<u8, DecodeError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(DecodeError::Truncated {
                offset: self.pos,
                needed: 1,
                remaining: 0,
            })
    }

    pub fn read_tag(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn expect_tag(&mut self, expected: u8) -> Result<(), DecodeError> {
        let offset = self.pos;
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(DecodeError::UnexpectedTag {
                offset,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Decode a definite length and verify the value fits in the buffer.
    pub fn read_length(&mut self) -> Result<usize, DecodeError> {
        let offset = self.pos;
        let first = self.take(1)?[0];

        if first & 0x80 == 0 {
            let len = first as usize;
            self.check_fits(len)?;
            return Ok(len);
        }

        let octets = (first & 0x7F) as usize;
        if octets == 0 {
            return Err(DecodeError::IndefiniteLength { offset });
        }
        if octets > self.max_length_octets {
            return Err(DecodeError::LengthTooLong {
                offset,
                octets,
                max: self.max_length_octets,
            });
        }

        let mut len = 0usize;
        for &b in self.take(octets)? {
            len = (len << 8) | b as usize;
        }
        self.check_fits(len)?;
        Ok(len)
    }

    fn check_fits(&self, len: usize) -> Result<(), DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len,
                remaining: self.remaining(),
            });
        }
        Ok(())
    }

    /// Read tag and length. Returns the end offset of the element's value.
    pub fn read_element(&mut self, expected_tag: u8) -> Result<usize, DecodeError> {
        self.expect_tag(expected_tag)?;
        let len = self.read_length()?;
        Ok(self.pos + len)
    }

    /// SEQUENCE header; the returned end offset bounds the nested content.
    pub fn read_sequence(&mut self) -> Result<usize, DecodeError> {
        self.read_element(TAG_SEQUENCE)
    }

    pub fn read_set(&mut self) -> Result<usize, DecodeError> {
        self.read_element(TAG_SET)
    }

    pub fn read_integer(&mut self) -> Result<i32, DecodeError> {
        self.read_tagged_integer(TAG_INTEGER)
    }

    pub fn read_tagged_integer(&mut self, tag: u8) -> Result<i32, DecodeError> {
        self.expect_tag(tag)?;
        let offset = self.pos;
        let len = self.read_length()?;

        if len == 0 || len > 4 {
            return Err(DecodeError::IntegerTooLong { offset, len });
        }

        let bytes = self.take(len)?;
        let mut value = if bytes[0] & 0x80 != 0 { -1i32 } else { 0 };
        for &b in bytes {
            value = (value << 8) | b as i32;
        }
        Ok(value)
    }

    pub fn read_enumerated(&mut self) -> Result<u32, DecodeError> {
        self.expect_tag(TAG_ENUMERATED)?;
        let offset = self.pos;
        let len = self.read_length()?;

        if len == 0 || len > 5 {
            return Err(DecodeError::IntegerTooLong { offset, len });
        }

        let mut value = 0u64;
        for &b in self.take(len)? {
            value = (value << 8) | b as u64;
        }
        if value > u32::MAX as u64 {
            return Err(DecodeError::IntegerTooLong { offset, len });
        }
        Ok(value as u32)
    }

    pub fn read_boolean(&mut self) -> Result<bool, DecodeError> {
        self.expect_tag(TAG_BOOLEAN)?;
        let offset = self.pos;
        let len = self.read_length()?;
        if len != 1 {
            return Err(DecodeError::Invalid {
                offset,
                reason: format!("boolean length {len}, expected 1"),
            });
        }
        Ok(self.take(1)?[0] != 0)
    }

    pub fn read_octet_string(&mut self) -> Result<&'a [u8], DecodeError> {
        self.read_tagged_octet_string(TAG_OCTET_STRING)
    }

    pub fn read_tagged_octet_string(&mut self, tag: u8) -> Result<&'a [u8], DecodeError> {
        self.expect_tag(tag)?;
        let len = self.read_length()?;
        self.take(len)
    }

    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        self.read_tagged_string(TAG_OCTET_STRING)
    }

    pub fn read_tagged_string(&mut self, tag: u8) -> Result<String, DecodeError> {
        self.expect_tag(tag)?;
        let len = self.read_length()?;
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }

    /// Consume one complete TLV, whatever its tag, and return its raw bytes
    /// including tag and length. Used where content is carried opaquely,
    /// e.g. search filters.
    pub fn read_raw_tlv(&mut self) -> Result<&'a [u8], DecodeError> {
        let start = self.pos;
        self.read_tag()?;
        let len = self.read_length()?;
        self.take(len)?;
        Ok(&self.data[start..self.pos])
    }

    /// Consume `len` bytes without interpreting them.
    pub fn read_raw(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        self.take(len)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), DecodeError> {
        self.take(len).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_length_to_vec(len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; 8];
        let mut writer = BerWriter::new(&mut buf);
        writer.write_length(len).unwrap();
        let n = writer.position();
        buf.truncate(n);
        buf
    }

    #[test]
    fn test_length_short_form() {
        assert_eq!(write_length_to_vec(0), vec![0x00]);
        assert_eq!(write_length_to_vec(127), vec![0x7F]);
        assert_eq!(length_octets(127), 1);
    }

    #[test]
    fn test_length_long_form_boundaries() {
        assert_eq!(write_length_to_vec(128), vec![0x81, 0x80]);
        assert_eq!(write_length_to_vec(255), vec![0x81, 0xFF]);
        assert_eq!(write_length_to_vec(256), vec![0x82, 0x01, 0x00]);
        assert_eq!(write_length_to_vec(65535), vec![0x82, 0xFF, 0xFF]);
        assert_eq!(write_length_to_vec(65536), vec![0x83, 0x01, 0x00, 0x00]);

        assert_eq!(length_octets(128), 2);
        assert_eq!(length_octets(256), 3);
        assert_eq!(length_octets(65536), 4);
    }

    #[test]
    fn test_length_round_trip() {
        for len in [0usize, 1, 127, 128, 255, 256, 65535, 65536, 1 << 20] {
            let mut encoded = write_length_to_vec(len);
            // give the reader a buffer big enough to hold the claimed value
            encoded.resize(encoded.len() + len, 0);
            let mut reader = BerReader::new(&encoded);
            assert_eq!(reader.read_length().unwrap(), len);
        }
    }

    #[test]
    fn test_indefinite_length_rejected() {
        let mut reader = BerReader::new(&[0x80]);
        assert_eq!(
            reader.read_length().unwrap_err(),
            DecodeError::IndefiniteLength { offset: 0 }
        );
    }

    #[test]
    fn test_oversized_length_of_length_rejected() {
        let mut reader = BerReader::new(&[0x85, 0x01, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(
            reader.read_length().unwrap_err(),
            DecodeError::LengthTooLong {
                offset: 0,
                octets: 5,
                max: MAX_LENGTH_OCTETS
            }
        );
    }

    #[test]
    fn test_length_exceeding_buffer_is_truncation() {
        // claims 10 bytes, only 2 follow
        let mut reader = BerReader::new(&[0x0A, 0x01, 0x02]);
        assert!(matches!(
            reader.read_length().unwrap_err(),
            DecodeError::Truncated { .. }
        ));
    }

    #[test]
    fn test_integer_minimal_widths() {
        assert_eq!(integer_octets(0), 1);
        assert_eq!(integer_octets(127), 1);
        assert_eq!(integer_octets(128), 2);
        assert_eq!(integer_octets(255), 2);
        assert_eq!(integer_octets(256), 2);
        assert_eq!(integer_octets(32767), 2);
        assert_eq!(integer_octets(32768), 3);
        assert_eq!(integer_octets(-1), 1);
        assert_eq!(integer_octets(-128), 1);
        assert_eq!(integer_octets(-129), 2);
        assert_eq!(integer_octets(i32::MAX), 4);
        assert_eq!(integer_octets(i32::MIN), 4);
    }

    #[test]
    fn test_integer_round_trip() {
        for value in [0, 1, 127, 128, 255, 256, -1, -128, -129, i32::MAX, i32::MIN] {
            let mut buf = vec![0u8; 8];
            let mut writer = BerWriter::new(&mut buf);
            writer.write_integer(value).unwrap();
            let n = writer.position();

            let mut reader = BerReader::new(&buf[..n]);
            assert_eq!(reader.read_integer().unwrap(), value);
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn test_integer_known_encodings() {
        let mut buf = vec![0u8; 8];
        let mut writer = BerWriter::new(&mut buf);
        writer.write_integer(128).unwrap();
        let n = writer.position();
        assert_eq!(&buf[..n], &[0x02, 0x02, 0x00, 0x80]);

        let mut buf = vec![0u8; 8];
        let mut writer = BerWriter::new(&mut buf);
        writer.write_integer(-1).unwrap();
        let n = writer.position();
        assert_eq!(&buf[..n], &[0x02, 0x01, 0xFF]);
    }

    #[test]
    fn test_enumerated_round_trip() {
        for value in [0u32, 1, 49, 127, 128, 255, 65535, u32::MAX] {
            let mut buf = vec![0u8; 8];
            let mut writer = BerWriter::new(&mut buf);
            writer.write_enumerated(value).unwrap();
            let n = writer.position();

            let mut reader = BerReader::new(&buf[..n]);
            assert_eq!(reader.read_enumerated().unwrap(), value);
        }
    }

    #[test]
    fn test_boolean() {
        let mut buf = vec![0u8; 6];
        let mut writer = BerWriter::new(&mut buf);
        writer.write_boolean(true).unwrap();
        writer.write_boolean(false).unwrap();
        let n = writer.position();
        assert_eq!(&buf[..n], &[0x01, 0x01, 0xFF, 0x01, 0x01, 0x00]);

        let mut reader = BerReader::new(&buf[..n]);
        assert!(reader.read_boolean().unwrap());
        assert!(!reader.read_boolean().unwrap());
    }

    #[test]
    fn test_octet_string_and_utf8() {
        let mut buf = vec![0u8; 16];
        let mut writer = BerWriter::new(&mut buf);
        writer.write_string("cn=test").unwrap();
        let n = writer.position();

        let mut reader = BerReader::new(&buf[..n]);
        assert_eq!(reader.read_string().unwrap(), "cn=test");

        let bad = [0x04, 0x02, 0xFF, 0xFE];
        let mut reader = BerReader::new(&bad);
        assert_eq!(
            reader.read_string().unwrap_err(),
            DecodeError::InvalidUtf8 { offset: 2 }
        );
    }

    #[test]
    fn test_unexpected_tag_reports_offset() {
        let data = [0x02, 0x01, 0x07, 0x04, 0x01, 0x41];
        let mut reader = BerReader::new(&data);
        reader.read_integer().unwrap();
        assert_eq!(
            reader.read_integer().unwrap_err(),
            DecodeError::UnexpectedTag {
                offset: 3,
                expected: TAG_INTEGER,
                actual: TAG_OCTET_STRING
            }
        );
    }

    #[test]
    fn test_read_raw_tlv() {
        // a nested sequence holding an integer
        let data = [0x30, 0x03, 0x02, 0x01, 0x05, 0x04, 0x00];
        let mut reader = BerReader::new(&data);
        let tlv = reader.read_raw_tlv().unwrap();
        assert_eq!(tlv, &[0x30, 0x03, 0x02, 0x01, 0x05]);
        assert_eq!(reader.offset(), 5);
        assert_eq!(reader.read_octet_string().unwrap(), b"");
    }

    #[test]
    fn test_writer_rejects_overflow() {
        let mut buf = vec![0u8; 2];
        let mut writer = BerWriter::new(&mut buf);
        assert_eq!(
            writer.write_string("too long").unwrap_err(),
            EncodeError::BufferTooSmall {
                needed: 8,
                available: 0
            }
        );
    }

    #[test]
    fn test_peek_does_not_consume() {
        let data = [0x02, 0x01, 0x2A];
        let mut reader = BerReader::new(&data);
        assert_eq!(reader.peek_tag().unwrap(), 0x02);
        assert_eq!(reader.read_integer().unwrap(), 42);
    }
}
