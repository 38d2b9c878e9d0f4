use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use syncprims_codec::{Value, WireType, WireValue};

use crate::error::{DlpError, Result};

/// Identity of an argument definition.
///
/// Ids below `0x100` are taken by the standard command catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArgId(pub u16);

impl fmt::Display for ArgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Untyped view of an argument definition, as listed in a [`DlpCommand`](crate::DlpCommand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSpec {
    pub id: ArgId,
    pub name: &'static str,
    pub wire: WireType,
}

/// Typed argument handle.
///
/// Declared once as a `const` and used both in command definitions (through
/// [`DlpArg::spec`]) and as the key for [`ArgumentMap`] access.
pub struct DlpArg<T> {
    pub spec: ArgSpec,
    _type: PhantomData<fn() -> T>,
}

impl<T: WireValue> DlpArg<T> {
    pub const fn new(id: u16, name: &'static str) -> Self {
        Self {
            spec: ArgSpec {
                id: ArgId(id),
                name,
                wire: T::WIRE_TYPE,
            },
            _type: PhantomData,
        }
    }
}

impl<T> DlpArg<T> {
    pub const fn id(&self) -> ArgId {
        self.spec.id
    }

    pub const fn name(&self) -> &'static str {
        self.spec.name
    }
}

impl<T> Clone for DlpArg<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for DlpArg<T> {}

impl<T> fmt::Debug for DlpArg<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DlpArg")
            .field("id", &self.spec.id)
            .field("name", &self.spec.name)
            .finish()
    }
}

/// Argument values for one transaction, keyed by argument identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentMap {
    values: HashMap<ArgId, Value>,
}

impl ArgumentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<T: WireValue>(mut self, arg: &DlpArg<T>, value: T) -> Result<Self> {
        self.insert(arg, value)?;
        Ok(self)
    }

    /// Fails when the value cannot be represented on the wire.
    pub fn insert<T: WireValue>(&mut self, arg: &DlpArg<T>, value: T) -> Result<()> {
        self.values.insert(arg.id(), value.to_value()?);
        Ok(())
    }

    /// Typed copy of an argument's value.
    pub fn get<T: WireValue>(&self, arg: &DlpArg<T>) -> Result<T> {
        let value = self
            .values
            .get(&arg.id())
            .cloned()
            .ok_or(DlpError::NoSuchArgument(arg.name()))?;
        Ok(T::from_value(arg.name(), value)?)
    }

    /// Remove an argument and return its typed value.
    pub fn take<T: WireValue>(&mut self, arg: &DlpArg<T>) -> Result<T> {
        let value = self
            .values
            .remove(&arg.id())
            .ok_or(DlpError::NoSuchArgument(arg.name()))?;
        Ok(T::from_value(arg.name(), value)?)
    }

    pub fn contains<T>(&self, arg: &DlpArg<T>) -> bool {
        self.values.contains_key(&arg.id())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn value(&self, id: ArgId) -> Option<&Value> {
        self.values.get(&id)
    }

    pub(crate) fn insert_value(&mut self, id: ArgId, value: Value) {
        self.values.insert(id, value);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use syncprims_codec::{ByteOrder, Length};

    use super::*;

    const COUNT: DlpArg<u16> = DlpArg::new(0x100, "count");
    const LABEL: DlpArg<String> = DlpArg::new(0x101, "label");
    const BLOB: DlpArg<Bytes> = DlpArg::new(0x102, "blob");

    #[test]
    fn spec_carries_wire_type() {
        assert_eq!(COUNT.spec.wire, WireType::U16(ByteOrder::Big));
        assert_eq!(LABEL.spec.wire, WireType::CString);
        assert_eq!(BLOB.spec.wire, WireType::Bytes(Length::Remaining));
        assert_eq!(COUNT.id(), ArgId(0x100));
    }

    #[test]
    fn typed_insert_get_take() {
        let mut map = ArgumentMap::new()
            .with(&COUNT, 42)
            .unwrap()
            .with(&LABEL, "hello".to_string())
            .unwrap();
        assert_eq!(map.get(&COUNT).unwrap(), 42);
        assert_eq!(map.take(&LABEL).unwrap(), "hello");
        assert!(!map.contains(&LABEL));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn missing_argument_is_reported_by_name() {
        let map = ArgumentMap::new();
        assert!(matches!(
            map.get(&BLOB),
            Err(DlpError::NoSuchArgument("blob"))
        ));
    }

    #[test]
    fn wrong_value_type_is_codec_error() {
        let mut map = ArgumentMap::new();
        map.insert_value(COUNT.id(), Value::U8(1));
        assert!(matches!(map.get(&COUNT), Err(DlpError::Codec(_))));
    }
}
