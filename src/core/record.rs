//! # Record Codec
//!
//! Generic ordered container of typed fields used to serialize command
//! payloads.
//!
//! A record on the wire is a 4-byte big-endian length **N** (counting only
//! the bytes after it) followed by N bytes of concatenated fields, each
//! field a one-byte type tag plus its payload:
//!
//! | type    | tag | payload                                                    |
//! |---------|-----|------------------------------------------------------------|
//! | boolean | 0   | 1 byte: 0x00 / 0x01                                        |
//! | byte    | 1   | 1 raw byte                                                 |
//! | int32   | 2   | 4 bytes, big-endian                                        |
//! | int64   | 3   | 8 bytes, big-endian                                        |
//! | string  | 4   | i32 byte length (-1 = null, 0 = empty), then UTF-8 bytes   |
//!
//! Writing and reading are two distinct types: [`RecordBuilder`] appends
//! fields and is consumed by serialization; [`RecordReader`] parses a wire
//! record once and hands fields back through a strictly sequential typed
//! cursor. Requesting a field of the wrong type is a
//! [`ProtocolError::TypeMismatch`]; reading past the last field is
//! [`ProtocolError::Exhausted`].

use crate::error::{ProtocolError, Result};
use bytes::{Buf, BufMut, BytesMut};

mod field_tag {
    pub const BOOLEAN: u8 = 0;
    pub const BYTE: u8 = 1;
    pub const INT32: u8 = 2;
    pub const INT64: u8 = 3;
    pub const STRING: u8 = 4;
}

/// One decoded field. The string payload keeps the null/empty distinction.
#[derive(Clone, Debug, PartialEq)]
enum Field {
    Boolean(bool),
    Byte(u8),
    Int32(i32),
    Int64(i64),
    Str(Option<String>),
}

impl Field {
    fn type_name(&self) -> &'static str {
        match self {
            Field::Boolean(_) => "boolean",
            Field::Byte(_) => "byte",
            Field::Int32(_) => "int32",
            Field::Int64(_) => "int64",
            Field::Str(_) => "string",
        }
    }
}

/// Append-only builder for an outbound record.
///
/// Fields are encoded as they are appended; [`write_to`](Self::write_to)
/// consumes the builder, so a serialized record cannot be touched again.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    body: BytesMut,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self {
            body: BytesMut::new(),
        }
    }

    pub fn add_bool(&mut self, value: bool) -> &mut Self {
        self.body.put_u8(field_tag::BOOLEAN);
        self.body.put_u8(u8::from(value));
        self
    }

    pub fn add_byte(&mut self, value: u8) -> &mut Self {
        self.body.put_u8(field_tag::BYTE);
        self.body.put_u8(value);
        self
    }

    pub fn add_i32(&mut self, value: i32) -> &mut Self {
        self.body.put_u8(field_tag::INT32);
        self.body.put_i32(value);
        self
    }

    pub fn add_i64(&mut self, value: i64) -> &mut Self {
        self.body.put_u8(field_tag::INT64);
        self.body.put_i64(value);
        self
    }

    /// Append a string field. `None` is encoded with the -1 length sentinel,
    /// distinct from an empty string's length 0.
    pub fn add_string(&mut self, value: Option<&str>) -> &mut Self {
        self.body.put_u8(field_tag::STRING);
        match value {
            None => {
                self.body.put_i32(-1);
            }
            Some(s) => {
                self.body.put_i32(s.len() as i32);
                self.body.put_slice(s.as_bytes());
            }
        }
        self
    }

    /// Serialize as length field + body into `out`, consuming the builder.
    pub fn write_to(self, out: &mut BytesMut) {
        out.put_u32(self.body.len() as u32);
        out.put_slice(&self.body);
    }

    /// Byte count of the body written so far (excludes the length field).
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Immutable parsed record with a sequential read cursor.
#[derive(Debug)]
pub struct RecordReader {
    fields: Vec<Field>,
    cursor: usize,
}

impl RecordReader {
    /// Read a record (length field + body) from the front of `buf`.
    ///
    /// `buf` must already hold the complete record; the frame layer
    /// guarantees this. The body is parsed eagerly so malformed input fails
    /// here rather than on a later typed read.
    pub fn read_from(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < 4 {
            return Err(ProtocolError::MalformedRecord(String::from(
                "missing record length field",
            )));
        }
        let length = buf.get_u32() as usize;
        if buf.remaining() < length {
            return Err(ProtocolError::MalformedRecord(format!(
                "record length {} exceeds available {} bytes",
                length,
                buf.remaining()
            )));
        }

        let mut fields = Vec::new();
        let mut read = 0usize;
        while read < length {
            let tag = buf.get_u8();
            read += 1;
            match tag {
                field_tag::BOOLEAN => {
                    Self::ensure(length - read, 1)?;
                    read += 1;
                    match buf.get_u8() {
                        0 => fields.push(Field::Boolean(false)),
                        1 => fields.push(Field::Boolean(true)),
                        other => {
                            return Err(ProtocolError::MalformedRecord(format!(
                                "bad boolean value: {other}"
                            )))
                        }
                    }
                }
                field_tag::BYTE => {
                    Self::ensure(length - read, 1)?;
                    read += 1;
                    fields.push(Field::Byte(buf.get_u8()));
                }
                field_tag::INT32 => {
                    Self::ensure(length - read, 4)?;
                    read += 4;
                    fields.push(Field::Int32(buf.get_i32()));
                }
                field_tag::INT64 => {
                    Self::ensure(length - read, 8)?;
                    read += 8;
                    fields.push(Field::Int64(buf.get_i64()));
                }
                field_tag::STRING => {
                    Self::ensure(length - read, 4)?;
                    let str_len = buf.get_i32();
                    read += 4;
                    if str_len == -1 {
                        fields.push(Field::Str(None));
                    } else {
                        let str_len = str_len as usize;
                        Self::ensure(length - read, str_len)?;
                        read += str_len;
                        let raw = buf.copy_to_bytes(str_len);
                        let text = String::from_utf8(raw.to_vec()).map_err(|e| {
                            ProtocolError::MalformedRecord(format!("invalid UTF-8: {e}"))
                        })?;
                        fields.push(Field::Str(Some(text)));
                    }
                }
                other => return Err(ProtocolError::UnknownFieldTag(other)),
            }
        }

        Ok(Self { fields, cursor: 0 })
    }

    fn ensure(available: usize, needed: usize) -> Result<()> {
        if available < needed {
            return Err(ProtocolError::MalformedRecord(String::from(
                crate::error::constants::ERR_RECORD_TRUNCATED,
            )));
        }
        Ok(())
    }

    fn next(&mut self, expected: &'static str) -> Result<&Field> {
        let field = self.fields.get(self.cursor).ok_or(ProtocolError::Exhausted)?;
        if field.type_name() != expected {
            return Err(ProtocolError::TypeMismatch {
                expected,
                found: field.type_name(),
            });
        }
        self.cursor += 1;
        Ok(field)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.next("boolean")? {
            Field::Boolean(v) => Ok(*v),
            _ => unreachable!(),
        }
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        match self.next("byte")? {
            Field::Byte(v) => Ok(*v),
            _ => unreachable!(),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        match self.next("int32")? {
            Field::Int32(v) => Ok(*v),
            _ => unreachable!(),
        }
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        match self.next("int64")? {
            Field::Int64(v) => Ok(*v),
            _ => unreachable!(),
        }
    }

    /// Read a string field; `None` means the -1 null sentinel was on the wire.
    pub fn read_string(&mut self) -> Result<Option<String>> {
        match self.next("string")? {
            Field::Str(v) => Ok(v.clone()),
            _ => unreachable!(),
        }
    }

    /// Number of fields not yet consumed.
    pub fn remaining(&self) -> usize {
        self.fields.len() - self.cursor
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn roundtrip(builder: RecordBuilder) -> RecordReader {
        let mut wire = BytesMut::new();
        builder.write_to(&mut wire);
        RecordReader::read_from(&mut wire).unwrap()
    }

    #[test]
    fn test_all_field_types_roundtrip() {
        let mut builder = RecordBuilder::new();
        builder
            .add_bool(true)
            .add_byte(7)
            .add_i32(-42)
            .add_i64(1 << 40)
            .add_string(None)
            .add_string(Some("Hello!"));

        let mut reader = roundtrip(builder);
        assert!(reader.read_bool().unwrap());
        assert_eq!(reader.read_byte().unwrap(), 7);
        assert_eq!(reader.read_i32().unwrap(), -42);
        assert_eq!(reader.read_i64().unwrap(), 1 << 40);
        assert_eq!(reader.read_string().unwrap(), None);
        assert_eq!(reader.read_string().unwrap(), Some(String::from("Hello!")));
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_null_string_is_minus_one_length() {
        let mut builder = RecordBuilder::new();
        builder.add_string(None);
        let mut wire = BytesMut::new();
        builder.write_to(&mut wire);

        // 4-byte record length, tag, then the -1 sentinel with no payload
        assert_eq!(&wire[..], &[0, 0, 0, 5, 4, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_empty_string_is_zero_length() {
        let mut builder = RecordBuilder::new();
        builder.add_string(Some(""));
        let mut wire = BytesMut::new();
        builder.write_to(&mut wire);

        assert_eq!(&wire[..], &[0, 0, 0, 5, 4, 0, 0, 0, 0]);

        let mut reader = RecordReader::read_from(&mut wire).unwrap();
        assert_eq!(reader.read_string().unwrap(), Some(String::new()));
    }

    #[test]
    fn test_type_mismatch_is_not_coerced() {
        let mut builder = RecordBuilder::new();
        builder.add_i32(1);
        let mut reader = roundtrip(builder);
        let err = reader.read_string().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::TypeMismatch {
                expected: "string",
                found: "int32"
            }
        ));
    }

    #[test]
    fn test_reading_past_last_field_is_exhausted() {
        let mut builder = RecordBuilder::new();
        builder.add_i32(1);
        let mut reader = roundtrip(builder);
        reader.read_i32().unwrap();
        assert!(matches!(
            reader.read_i32().unwrap_err(),
            ProtocolError::Exhausted
        ));
    }

    #[test]
    fn test_truncated_record_rejected() {
        // record claims 6 body bytes but an int32 field needs 5 total, and
        // the declared body ends mid-payload
        let mut wire = BytesMut::new();
        wire.put_u32(3);
        wire.put_u8(field_tag::INT32);
        wire.put_u8(0);
        wire.put_u8(0);
        assert!(RecordReader::read_from(&mut wire).is_err());
    }

    #[test]
    fn test_unknown_field_tag_rejected() {
        let mut wire = BytesMut::new();
        wire.put_u32(2);
        wire.put_u8(9);
        wire.put_u8(0);
        assert!(matches!(
            RecordReader::read_from(&mut wire).unwrap_err(),
            ProtocolError::UnknownFieldTag(9)
        ));
    }

    #[test]
    fn test_bad_boolean_value_rejected() {
        let mut wire = BytesMut::new();
        wire.put_u32(2);
        wire.put_u8(field_tag::BOOLEAN);
        wire.put_u8(2);
        assert!(RecordReader::read_from(&mut wire).is_err());
    }
}
