//! Compact binary serialization for entries and their parts.
//!
//! The layout is self-describing and versionless: a Dn, then a signed
//! attribute count, then each attribute as its user-provided id followed by
//! its values. Normalized forms travel with their value so a reader gets
//! back exactly the comparable state the writer had; validity verdicts are
//! re-derivable and are deliberately not persisted.

use bytes::{BufMut, BytesMut};

use crate::attribute::Attribute;
use crate::dn::Dn;
use crate::entry::Entry;
use crate::error::{DecodeError, LdapError};
use crate::schema::SchemaContext;
use crate::value::{Value, ValueBuf};

const KIND_NULL: u8 = 0;
const KIND_TEXT: u8 = 1;
const KIND_BINARY: u8 = 2;

/// Bounds-checked cursor over a serialized buffer. Every read failure
/// reports the offset it happened at.
struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> SliceReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        SliceReader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
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

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }
}

fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

pub fn write_dn(dn: &Dn, buf: &mut BytesMut) {
    put_string(buf, dn.name());

    if dn.is_normalized() {
        buf.put_u8(1);
        put_string(buf, dn.normalized_name());
    } else {
        buf.put_u8(0);
    }
}

fn read_dn_inner(reader: &mut SliceReader<'_>) -> Result<Dn, DecodeError> {
    let up_name = reader.read_string()?;
    let dn = Dn::new(up_name);

    if reader.read_u8()? == 0 {
        return Ok(dn);
    }

    // discard the stored form and re-derive, so a tampered norm name can
    // never diverge from the up name
    let _stored = reader.read_string()?;
    Ok(dn.normalize())
}

pub fn read_dn(data: &[u8]) -> Result<Dn, DecodeError> {
    read_dn_inner(&mut SliceReader::new(data))
}

fn put_buf(buf: &mut BytesMut, value: Option<&ValueBuf>) {
    match value {
        None => buf.put_u8(KIND_NULL),
        Some(ValueBuf::Text(s)) => {
            buf.put_u8(KIND_TEXT);
            put_string(buf, s);
        }
        Some(ValueBuf::Binary(b)) => {
            buf.put_u8(KIND_BINARY);
            buf.put_u32(b.len() as u32);
            buf.put_slice(b);
        }
    }
}

fn read_buf(reader: &mut SliceReader<'_>) -> Result<Option<ValueBuf>, DecodeError> {
    let kind_offset = reader.pos;

    match reader.read_u8()? {
        KIND_NULL => Ok(None),
        KIND_TEXT => Ok(Some(ValueBuf::Text(reader.read_string()?))),
        KIND_BINARY => {
            let len = reader.read_u32()? as usize;
            Ok(Some(ValueBuf::Binary(reader.take(len)?.to_vec())))
        }
        kind => Err(DecodeError::Invalid {
            offset: kind_offset,
            reason: format!("unknown value kind {kind}"),
        }),
    }
}

pub fn write_value(value: &Value, buf: &mut BytesMut) {
    put_buf(buf, value.get());

    let (normalized, is_normalized) = value.normalized_parts();
    if is_normalized {
        buf.put_u8(1);
        put_buf(buf, normalized);
    } else {
        buf.put_u8(0);
    }
}

fn read_value_inner(reader: &mut SliceReader<'_>) -> Result<Value, DecodeError> {
    let raw = read_buf(reader)?;

    if reader.read_u8()? == 0 {
        return Ok(Value::from_buf(raw));
    }

    let normalized = read_buf(reader)?;
    Ok(Value::restore(raw, normalized, true))
}

pub fn read_value(data: &[u8]) -> Result<Value, DecodeError> {
    read_value_inner(&mut SliceReader::new(data))
}

pub fn write_attribute(attribute: &Attribute, buf: &mut BytesMut) {
    put_string(buf, attribute.up_id());
    buf.put_u32(attribute.len() as u32);

    for value in attribute {
        write_value(value, buf);
    }
}

fn read_attribute_inner(
    reader: &mut SliceReader<'_>,
    schema: Option<&SchemaContext>,
) -> Result<Attribute, LdapError> {
    let up_id = reader.read_string()?;
    let count = reader.read_u32()?;

    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        values.push(read_value_inner(reader)?);
    }

    let mut attribute = Attribute::with_values(&up_id, values)?;

    // schema-aware reads re-resolve the type; a stale id fails the whole
    // read instead of quietly producing an agnostic attribute
    if let Some(ctx) = schema {
        attribute.set_attribute_type(ctx.lookup_attribute_type(&up_id)?);
    }

    Ok(attribute)
}

pub fn read_attribute(data: &[u8], schema: Option<&SchemaContext>) -> Result<Attribute, LdapError> {
    read_attribute_inner(&mut SliceReader::new(data), schema)
}

pub fn write_entry(entry: &Entry, buf: &mut BytesMut) {
    write_dn(entry.dn(), buf);
    buf.put_i32(entry.len() as i32);

    for attribute in entry.iter() {
        write_attribute(attribute, buf);
    }
}

pub fn read_entry(data: &[u8], schema: Option<SchemaContext>) -> Result<Entry, LdapError> {
    let mut reader = SliceReader::new(data);

    let dn = read_dn_inner(&mut reader)?;

    let count_offset = reader.pos;
    let count = reader.read_i32()?;
    if count < 0 {
        return Err(DecodeError::Invalid {
            offset: count_offset,
            reason: format!("negative attribute count {count}"),
        }
        .into());
    }

    let mut entry = match &schema {
        Some(ctx) => Entry::schema_aware_with_dn(ctx.clone(), dn),
        None => Entry::with_dn(dn),
    };

    for _ in 0..count {
        let attribute = read_attribute_inner(&mut reader, schema.as_ref())?;
        entry.insert_keyed(attribute.key().to_string(), attribute);
    }

    Ok(entry)
}
