use bytes::Bytes;

use crate::error::{CodecError, Result};

/// A decoded (or to-be-encoded) field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    Str(String),
    Bytes(Bytes),
    Record(Record),
    Array(Vec<Value>),
}

impl Value {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::U8(_) => "u8",
            Value::I8(_) => "i8",
            Value::U16(_) => "u16",
            Value::I16(_) => "i16",
            Value::U32(_) => "u32",
            Value::I32(_) => "i32",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Record(_) => "record",
            Value::Array(_) => "array",
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    String => Str,
    Bytes => Bytes,
    Record => Record,
    Vec<Value> => Array,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(value))
    }
}

impl From<&'static [u8]> for Value {
    fn from(value: &'static [u8]) -> Self {
        Value::Bytes(Bytes::from_static(value))
    }
}

/// Field values keyed by schema field name.
///
/// Length and count fields are never stored here; see
/// [`Schema::derived_len`](crate::Schema::derived_len). Equality ignores
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct Record {
    fields: Vec<(&'static str, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: &'static str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Insert or replace a field value.
    pub fn set(&mut self, name: &'static str, value: impl Into<Value>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Remove a field and return its value.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(key, _)| *key == name)?;
        Some(self.fields.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> {
        self.fields.iter().map(|(key, value)| (*key, value))
    }

    pub(crate) fn push(&mut self, name: &'static str, value: Value) {
        self.fields.push((name, value));
    }

    fn require(&self, name: &'static str) -> Result<&Value> {
        self.get(name).ok_or(CodecError::MissingField(name))
    }

    pub fn u8(&self, name: &'static str) -> Result<u8> {
        match self.require(name)? {
            Value::U8(v) => Ok(*v),
            other => Err(mismatch(name, "u8", other)),
        }
    }

    pub fn i8(&self, name: &'static str) -> Result<i8> {
        match self.require(name)? {
            Value::I8(v) => Ok(*v),
            other => Err(mismatch(name, "i8", other)),
        }
    }

    pub fn u16(&self, name: &'static str) -> Result<u16> {
        match self.require(name)? {
            Value::U16(v) => Ok(*v),
            other => Err(mismatch(name, "u16", other)),
        }
    }

    pub fn i16(&self, name: &'static str) -> Result<i16> {
        match self.require(name)? {
            Value::I16(v) => Ok(*v),
            other => Err(mismatch(name, "i16", other)),
        }
    }

    pub fn u32(&self, name: &'static str) -> Result<u32> {
        match self.require(name)? {
            Value::U32(v) => Ok(*v),
            other => Err(mismatch(name, "u32", other)),
        }
    }

    pub fn i32(&self, name: &'static str) -> Result<i32> {
        match self.require(name)? {
            Value::I32(v) => Ok(*v),
            other => Err(mismatch(name, "i32", other)),
        }
    }

    pub fn str(&self, name: &'static str) -> Result<&str> {
        match self.require(name)? {
            Value::Str(v) => Ok(v),
            other => Err(mismatch(name, "string", other)),
        }
    }

    pub fn bytes(&self, name: &'static str) -> Result<&Bytes> {
        match self.require(name)? {
            Value::Bytes(v) => Ok(v),
            other => Err(mismatch(name, "bytes", other)),
        }
    }

    pub fn record(&self, name: &'static str) -> Result<&Record> {
        match self.require(name)? {
            Value::Record(v) => Ok(v),
            other => Err(mismatch(name, "record", other)),
        }
    }

    pub fn array(&self, name: &'static str) -> Result<&[Value]> {
        match self.require(name)? {
            Value::Array(v) => Ok(v),
            other => Err(mismatch(name, "array", other)),
        }
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl Eq for Record {}

fn mismatch(field: &'static str, expected: &'static str, found: &Value) -> CodecError {
    CodecError::TypeMismatch {
        field,
        expected,
        found: found.kind(),
    }
}
