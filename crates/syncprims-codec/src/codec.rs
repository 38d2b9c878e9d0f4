use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{CodecError, Result};
use crate::schema::{ByteOrder, FieldDescriptor, Length, Schema, WireType};
use crate::value::{Record, Value};

/// Encode `record` following `schema`.
///
/// Length fields are recomputed from their targets; the output size is fully
/// determined by the record's current values.
pub fn encode(schema: &Schema, record: &Record) -> Result<Bytes> {
    let mut dst = BytesMut::new();
    encode_into(schema, record, &mut dst)?;
    Ok(dst.freeze())
}

/// Encode `record` following `schema`, appending to `dst`.
pub fn encode_into(schema: &Schema, record: &Record, dst: &mut BytesMut) -> Result<()> {
    for field in schema.fields() {
        if field.length_of.is_some() {
            let len = schema.derived_len(record, field.name)?;
            put_length(field, len, dst)?;
            continue;
        }
        let value = record
            .get(field.name)
            .ok_or(CodecError::MissingField(field.name))?;
        encode_value(field.name, &field.ty, value, dst)?;
    }
    Ok(())
}

/// Decode one record from the start of `src`.
///
/// Bytes left over after the last field are ignored.
pub fn decode(schema: &Schema, src: &[u8]) -> Result<Record> {
    let mut cursor = src;
    let record = decode_prefix(schema, &mut cursor)?;
    if !cursor.is_empty() {
        trace!(
            schema = schema.name(),
            trailing = cursor.len(),
            "ignoring trailing bytes"
        );
    }
    Ok(record)
}

/// Decode one record from the front of `src`, advancing it past the record.
pub fn decode_prefix(schema: &Schema, src: &mut &[u8]) -> Result<Record> {
    let mut lengths: Vec<(&'static str, usize)> = Vec::new();
    let mut record = Record::new();

    for field in schema.fields() {
        if let Some(target) = field.length_of {
            let len = read_length(field, src)?;
            lengths.push((target, len));
            continue;
        }
        let derived = lengths
            .iter()
            .find(|(target, _)| *target == field.name)
            .map(|(_, len)| *len);
        let value = decode_value(field.name, &field.ty, derived, src)?;
        record.push(field.name, value);
    }
    Ok(record)
}

/// Encode a single value of wire type `ty`.
pub fn encode_value(
    field: &'static str,
    ty: &WireType,
    value: &Value,
    dst: &mut BytesMut,
) -> Result<()> {
    match (ty, value) {
        (WireType::U8, Value::U8(v)) => dst.put_u8(*v),
        (WireType::I8, Value::I8(v)) => dst.put_i8(*v),
        (WireType::U16(ByteOrder::Big), Value::U16(v)) => dst.put_u16(*v),
        (WireType::U16(ByteOrder::Little), Value::U16(v)) => dst.put_u16_le(*v),
        (WireType::I16(ByteOrder::Big), Value::I16(v)) => dst.put_i16(*v),
        (WireType::I16(ByteOrder::Little), Value::I16(v)) => dst.put_i16_le(*v),
        (WireType::U32(ByteOrder::Big), Value::U32(v)) => dst.put_u32(*v),
        (WireType::U32(ByteOrder::Little), Value::U32(v)) => dst.put_u32_le(*v),
        (WireType::I32(ByteOrder::Big), Value::I32(v)) => dst.put_i32(*v),
        (WireType::I32(ByteOrder::Little), Value::I32(v)) => dst.put_i32_le(*v),
        (WireType::FixedString(len), Value::Str(s)) => {
            let encoded = latin1_encode(field, s)?;
            if encoded.len() > *len {
                return Err(CodecError::LengthOverflow {
                    field,
                    len: encoded.len(),
                    max: *len,
                });
            }
            dst.put_slice(&encoded);
            dst.put_bytes(0, len - encoded.len());
        }
        (WireType::CString, Value::Str(s)) => {
            let encoded = latin1_encode(field, s)?;
            dst.put_slice(&encoded);
            dst.put_u8(0);
        }
        (WireType::Bytes(len), Value::Bytes(bytes)) => {
            if let Length::Fixed(expected) = len {
                if bytes.len() != *expected {
                    return Err(CodecError::FixedLength {
                        field,
                        expected: *expected,
                        actual: bytes.len(),
                    });
                }
            }
            dst.put_slice(bytes);
        }
        (WireType::Record(schema), Value::Record(record)) => encode_into(schema, record, dst)?,
        (WireType::Array(element, len), Value::Array(items)) => {
            if let Length::Fixed(expected) = len {
                if items.len() != *expected {
                    return Err(CodecError::FixedLength {
                        field,
                        expected: *expected,
                        actual: items.len(),
                    });
                }
            }
            for item in items {
                encode_value(field, element, item, dst)?;
            }
        }
        (ty, value) => {
            return Err(CodecError::TypeMismatch {
                field,
                expected: ty.name(),
                found: value.kind(),
            })
        }
    }
    Ok(())
}

/// Decode a single value of wire type `ty` from the front of `src`.
///
/// `derived` is the size read from this field's length field, if it has one.
pub fn decode_value(
    field: &'static str,
    ty: &WireType,
    derived: Option<usize>,
    src: &mut &[u8],
) -> Result<Value> {
    let value = match ty {
        WireType::U8 => {
            need(field, src, 1)?;
            Value::U8(src.get_u8())
        }
        WireType::I8 => {
            need(field, src, 1)?;
            Value::I8(src.get_i8())
        }
        WireType::U16(order) => {
            need(field, src, 2)?;
            Value::U16(match order {
                ByteOrder::Big => src.get_u16(),
                ByteOrder::Little => src.get_u16_le(),
            })
        }
        WireType::I16(order) => {
            need(field, src, 2)?;
            Value::I16(match order {
                ByteOrder::Big => src.get_i16(),
                ByteOrder::Little => src.get_i16_le(),
            })
        }
        WireType::U32(order) => {
            need(field, src, 4)?;
            Value::U32(match order {
                ByteOrder::Big => src.get_u32(),
                ByteOrder::Little => src.get_u32_le(),
            })
        }
        WireType::I32(order) => {
            need(field, src, 4)?;
            Value::I32(match order {
                ByteOrder::Big => src.get_i32(),
                ByteOrder::Little => src.get_i32_le(),
            })
        }
        WireType::FixedString(len) => {
            need(field, src, *len)?;
            let raw = &src[..*len];
            let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
            let text = latin1_decode(&raw[..end]);
            src.advance(*len);
            Value::Str(text)
        }
        WireType::CString => {
            let end = src
                .iter()
                .position(|b| *b == 0)
                .ok_or(CodecError::MalformedData {
                    field,
                    needed: src.len() + 1,
                    remaining: src.len(),
                })?;
            let text = latin1_decode(&src[..end]);
            src.advance(end + 1);
            Value::Str(text)
        }
        WireType::Bytes(len) => {
            let len = resolve_len(field, *len, derived, src.len())?;
            need(field, src, len)?;
            Value::Bytes(src.copy_to_bytes(len))
        }
        WireType::Record(schema) => Value::Record(decode_prefix(schema, src)?),
        WireType::Array(element, Length::Remaining) => {
            let mut items = Vec::new();
            while !src.is_empty() {
                let before = src.len();
                items.push(decode_value(field, element, None, src)?);
                if src.len() == before {
                    break;
                }
            }
            Value::Array(items)
        }
        WireType::Array(element, len) => {
            let count = resolve_len(field, *len, derived, src.len())?;
            if let Some(size) = element.fixed_size() {
                need(field, src, size.saturating_mul(count))?;
            }
            let mut items = Vec::with_capacity(count.min(src.len()));
            for _ in 0..count {
                items.push(decode_value(field, element, None, src)?);
            }
            Value::Array(items)
        }
    };
    Ok(value)
}

fn resolve_len(
    field: &'static str,
    len: Length,
    derived: Option<usize>,
    remaining: usize,
) -> Result<usize> {
    match len {
        Length::Fixed(n) => Ok(n),
        Length::Remaining => Ok(remaining),
        Length::Derived => derived.ok_or_else(|| CodecError::InvalidSchema {
            schema: field,
            reason: format!("no length field precedes derived field '{field}'"),
        }),
    }
}

fn put_length(field: &FieldDescriptor, len: usize, dst: &mut BytesMut) -> Result<()> {
    let max = field.ty.max_length().ok_or_else(|| CodecError::InvalidSchema {
        schema: field.name,
        reason: format!("length field '{}' is not an integer", field.name),
    })?;
    if len > max {
        return Err(CodecError::LengthOverflow {
            field: field.name,
            len,
            max,
        });
    }
    let value = match field.ty {
        WireType::U8 => Value::U8(len as u8),
        WireType::I8 => Value::I8(len as i8),
        WireType::U16(_) => Value::U16(len as u16),
        WireType::I16(_) => Value::I16(len as i16),
        WireType::U32(_) => Value::U32(len as u32),
        _ => Value::I32(len as i32),
    };
    encode_value(field.name, &field.ty, &value, dst)
}

fn read_length(field: &FieldDescriptor, src: &mut &[u8]) -> Result<usize> {
    let len = match decode_value(field.name, &field.ty, None, src)? {
        Value::U8(v) => v as usize,
        Value::U16(v) => v as usize,
        Value::U32(v) => v as usize,
        Value::I8(v) => usize::try_from(v).map_err(|_| negative(field.name))?,
        Value::I16(v) => usize::try_from(v).map_err(|_| negative(field.name))?,
        Value::I32(v) => usize::try_from(v).map_err(|_| negative(field.name))?,
        other => {
            return Err(CodecError::TypeMismatch {
                field: field.name,
                expected: "integer",
                found: other.kind(),
            })
        }
    };
    Ok(len)
}

fn negative(field: &'static str) -> CodecError {
    CodecError::NegativeLength(field)
}

fn need(field: &'static str, src: &[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(CodecError::MalformedData {
            field,
            needed,
            remaining: src.len(),
        });
    }
    Ok(())
}

/// Device charset encoding. NUL and characters above U+00FF are rejected.
pub fn latin1_encode(field: &'static str, text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| match u32::from(c) {
            0 => Err(CodecError::InvalidString {
                field,
                reason: "embedded NUL",
            }),
            code @ 1..=0xFF => Ok(code as u8),
            _ => Err(CodecError::InvalidString {
                field,
                reason: "character outside Latin-1",
            }),
        })
        .collect()
}

pub fn latin1_decode(raw: &[u8]) -> String {
    raw.iter().map(|b| char::from(*b)).collect()
}
