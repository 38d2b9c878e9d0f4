use bytes::{Bytes, BytesMut};

use crate::codec;
use crate::error::{CodecError, Result};
use crate::schema::{ByteOrder, Length, Schema, WireType};
use crate::value::{Record, Value};

/// A Rust struct with a fixed wire layout.
pub trait WireRecord: Sized {
    /// The layout every value of this type is encoded with.
    const SCHEMA: &'static Schema;

    /// Fails when a field cannot be represented on the wire.
    fn to_record(&self) -> Result<Record>;

    fn from_record(record: &Record) -> Result<Self>;

    fn encode(&self) -> Result<Bytes> {
        codec::encode(Self::SCHEMA, &self.to_record()?)
    }

    fn encode_into(&self, dst: &mut BytesMut) -> Result<()> {
        codec::encode_into(Self::SCHEMA, &self.to_record()?, dst)
    }

    fn decode(src: &[u8]) -> Result<Self> {
        Self::from_record(&codec::decode(Self::SCHEMA, src)?)
    }
}

/// A Rust type that maps onto exactly one [`WireType`].
///
/// Used for typed argument handles: the handle's wire type comes from
/// `WIRE_TYPE`, and values cross the codec as [`Value`]s.
pub trait WireValue: Sized {
    const WIRE_TYPE: WireType;

    fn to_value(&self) -> Result<Value>;

    fn from_value(field: &'static str, value: Value) -> Result<Self>;
}

macro_rules! scalar_wire_value {
    ($($ty:ty => $variant:ident, $wire:expr;)*) => {
        $(
            impl WireValue for $ty {
                const WIRE_TYPE: WireType = $wire;

                fn to_value(&self) -> Result<Value> {
                    Ok(Value::$variant(*self))
                }

                fn from_value(field: &'static str, value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(CodecError::TypeMismatch {
                            field,
                            expected: Self::WIRE_TYPE.name(),
                            found: other.kind(),
                        }),
                    }
                }
            }
        )*
    };
}

scalar_wire_value! {
    u8 => U8, WireType::U8;
    i8 => I8, WireType::I8;
    u16 => U16, WireType::U16(ByteOrder::Big);
    i16 => I16, WireType::I16(ByteOrder::Big);
    u32 => U32, WireType::U32(ByteOrder::Big);
    i32 => I32, WireType::I32(ByteOrder::Big);
}

impl WireValue for String {
    const WIRE_TYPE: WireType = WireType::CString;

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Str(self.clone()))
    }

    fn from_value(field: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Str(v) => Ok(v),
            other => Err(CodecError::TypeMismatch {
                field,
                expected: "string",
                found: other.kind(),
            }),
        }
    }
}

/// Raw bytes consume whatever is left of the payload.
impl WireValue for Bytes {
    const WIRE_TYPE: WireType = WireType::Bytes(Length::Remaining);

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Bytes(self.clone()))
    }

    fn from_value(field: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => Err(CodecError::TypeMismatch {
                field,
                expected: "bytes",
                found: other.kind(),
            }),
        }
    }
}

impl<T: WireRecord> WireValue for T {
    const WIRE_TYPE: WireType = WireType::Record(T::SCHEMA);

    fn to_value(&self) -> Result<Value> {
        self.to_record().map(Value::Record)
    }

    fn from_value(field: &'static str, value: Value) -> Result<Self> {
        match value {
            Value::Record(record) => T::from_record(&record),
            other => Err(CodecError::TypeMismatch {
                field,
                expected: "record",
                found: other.kind(),
            }),
        }
    }
}
