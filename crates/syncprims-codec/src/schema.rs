use crate::error::{CodecError, Result};
use crate::value::{Record, Value};

/// Byte order of a multi-byte integer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Device native order. The default for every constructor.
    Big,
    Little,
}

/// How many bytes (or elements) a variable field occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// Always exactly this many bytes (or elements).
    Fixed(usize),
    /// Sized by the sibling field that declares `length_of` this field.
    Derived,
    /// Consumes everything left in the buffer. Only valid as the last field.
    Remaining,
}

/// Wire representation of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireType {
    U8,
    I8,
    U16(ByteOrder),
    I16(ByteOrder),
    U32(ByteOrder),
    I32(ByteOrder),
    /// NUL-padded string occupying exactly this many bytes.
    FixedString(usize),
    /// NUL-terminated string.
    CString,
    /// Raw bytes.
    Bytes(Length),
    /// Nested record.
    Record(&'static Schema),
    /// Repeated element; `Length` counts elements, not bytes.
    Array(&'static WireType, Length),
}

impl WireType {
    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            WireType::U8 => "u8",
            WireType::I8 => "i8",
            WireType::U16(_) => "u16",
            WireType::I16(_) => "i16",
            WireType::U32(_) => "u32",
            WireType::I32(_) => "i32",
            WireType::FixedString(_) => "fixed string",
            WireType::CString => "cstring",
            WireType::Bytes(_) => "bytes",
            WireType::Record(_) => "record",
            WireType::Array(_, _) => "array",
        }
    }

    /// True for the fixed-width integer types.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            WireType::U8
                | WireType::I8
                | WireType::U16(_)
                | WireType::I16(_)
                | WireType::U32(_)
                | WireType::I32(_)
        )
    }

    /// Largest value an integer type can carry as a length.
    pub(crate) fn max_length(&self) -> Option<usize> {
        match self {
            WireType::U8 => Some(u8::MAX as usize),
            WireType::I8 => Some(i8::MAX as usize),
            WireType::U16(_) => Some(u16::MAX as usize),
            WireType::I16(_) => Some(i16::MAX as usize),
            WireType::U32(_) => Some(u32::MAX as usize),
            WireType::I32(_) => Some(i32::MAX as usize),
            _ => None,
        }
    }

    /// Encoded size, if it does not depend on the value.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            WireType::U8 | WireType::I8 => Some(1),
            WireType::U16(_) | WireType::I16(_) => Some(2),
            WireType::U32(_) | WireType::I32(_) => Some(4),
            WireType::FixedString(len) => Some(*len),
            WireType::CString => None,
            WireType::Bytes(Length::Fixed(len)) => Some(*len),
            WireType::Bytes(_) => None,
            WireType::Record(schema) => schema.fixed_size(),
            WireType::Array(element, Length::Fixed(count)) => {
                element.fixed_size().map(|size| size * count)
            }
            WireType::Array(_, _) => None,
        }
    }

    fn length(&self) -> Option<Length> {
        match self {
            WireType::Bytes(len) | WireType::Array(_, len) => Some(*len),
            _ => None,
        }
    }
}

/// One named field of a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: WireType,
    /// When set, this integer field carries the size of the named sibling and
    /// is computed on encode instead of being read from the record.
    pub length_of: Option<&'static str>,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, ty: WireType) -> Self {
        Self {
            name,
            ty,
            length_of: None,
        }
    }

    pub const fn u8(name: &'static str) -> Self {
        Self::new(name, WireType::U8)
    }

    pub const fn i8(name: &'static str) -> Self {
        Self::new(name, WireType::I8)
    }

    pub const fn u16(name: &'static str) -> Self {
        Self::new(name, WireType::U16(ByteOrder::Big))
    }

    pub const fn i16(name: &'static str) -> Self {
        Self::new(name, WireType::I16(ByteOrder::Big))
    }

    pub const fn u32(name: &'static str) -> Self {
        Self::new(name, WireType::U32(ByteOrder::Big))
    }

    pub const fn i32(name: &'static str) -> Self {
        Self::new(name, WireType::I32(ByteOrder::Big))
    }

    pub const fn fixed_string(name: &'static str, len: usize) -> Self {
        Self::new(name, WireType::FixedString(len))
    }

    pub const fn cstring(name: &'static str) -> Self {
        Self::new(name, WireType::CString)
    }

    pub const fn bytes(name: &'static str, len: Length) -> Self {
        Self::new(name, WireType::Bytes(len))
    }

    pub const fn record(name: &'static str, schema: &'static Schema) -> Self {
        Self::new(name, WireType::Record(schema))
    }

    pub const fn array(name: &'static str, element: &'static WireType, len: Length) -> Self {
        Self::new(name, WireType::Array(element, len))
    }

    /// Override the byte order of an integer field.
    pub const fn little_endian(mut self) -> Self {
        self.ty = match self.ty {
            WireType::U16(_) => WireType::U16(ByteOrder::Little),
            WireType::I16(_) => WireType::I16(ByteOrder::Little),
            WireType::U32(_) => WireType::U32(ByteOrder::Little),
            WireType::I32(_) => WireType::I32(ByteOrder::Little),
            other => other,
        };
        self
    }

    /// Declare this integer field as the byte length (for `Bytes`) or element
    /// count (for `Array`) of `target`.
    pub const fn length_of(mut self, target: &'static str) -> Self {
        self.length_of = Some(target);
        self
    }
}

/// An ordered field layout.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    name: &'static str,
    fields: &'static [FieldDescriptor],
}

impl Schema {
    pub const fn new(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self { name, fields }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Encoded size of every record of this schema, if constant.
    pub fn fixed_size(&self) -> Option<usize> {
        self.fields.iter().map(|field| field.ty.fixed_size()).sum()
    }

    /// The field that carries the size of `target`, if any.
    pub fn length_source(&self, target: &str) -> Option<&'static FieldDescriptor> {
        self.fields
            .iter()
            .find(|field| field.length_of == Some(target))
    }

    /// Computed value of a derived length field for `record`.
    ///
    /// This is the only way to observe a length/count field: records never
    /// store one, so it can never disagree with the data it describes.
    pub fn derived_len(&self, record: &Record, length_field: &str) -> Result<usize> {
        let field = self
            .field(length_field)
            .ok_or_else(|| self.invalid(format!("no field named '{length_field}'")))?;
        let target = field.length_of.ok_or_else(|| {
            self.invalid(format!("field '{length_field}' is not a length field"))
        })?;
        let value = record
            .get(target)
            .ok_or(CodecError::MissingField(target))?;

        match value {
            Value::Bytes(bytes) => Ok(bytes.len()),
            Value::Array(items) => Ok(items.len()),
            other => Err(CodecError::TypeMismatch {
                field: field.name,
                expected: "bytes or array",
                found: other.kind(),
            }),
        }
    }

    /// Check the layout for inconsistencies, recursing into nested records.
    pub fn validate(&self) -> Result<()> {
        for (index, field) in self.fields.iter().enumerate() {
            if self.fields[..index].iter().any(|f| f.name == field.name) {
                return Err(self.invalid(format!("duplicate field '{}'", field.name)));
            }

            if let Some(target) = field.length_of {
                if !field.ty.is_integer() {
                    return Err(self.invalid(format!(
                        "length field '{}' must be an integer, is {}",
                        field.name,
                        field.ty.name()
                    )));
                }
                let position = self.fields.iter().position(|f| f.name == target);
                match position {
                    Some(pos) if pos > index => {
                        if self.fields[pos].ty.length() != Some(Length::Derived) {
                            return Err(self.invalid(format!(
                                "'{target}' is sized by '{}' but is not declared Length::Derived",
                                field.name
                            )));
                        }
                    }
                    Some(_) => {
                        return Err(self.invalid(format!(
                            "length field '{}' must precede '{target}'",
                            field.name
                        )));
                    }
                    None => {
                        return Err(self.invalid(format!(
                            "length field '{}' names unknown field '{target}'",
                            field.name
                        )));
                    }
                }
            }

            match field.ty.length() {
                Some(Length::Derived) => {
                    let sources = self
                        .fields
                        .iter()
                        .filter(|f| f.length_of == Some(field.name))
                        .count();
                    if sources != 1 {
                        return Err(self.invalid(format!(
                            "'{}' needs exactly one length field, found {sources}",
                            field.name
                        )));
                    }
                }
                Some(Length::Remaining) if index + 1 != self.fields.len() => {
                    return Err(self.invalid(format!(
                        "'{}' consumes the remaining bytes but is not the last field",
                        field.name
                    )));
                }
                _ => {}
            }

            match field.ty {
                WireType::Record(nested) => nested.validate()?,
                WireType::Array(WireType::Record(nested), _) => nested.validate()?,
                _ => {}
            }
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> CodecError {
        CodecError::InvalidSchema {
            schema: self.name,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    static POINT: Schema = Schema::new(
        "Point",
        &[FieldDescriptor::i16("x"), FieldDescriptor::i16("y")],
    );

    static BLOB: Schema = Schema::new(
        "Blob",
        &[
            FieldDescriptor::u16("size").length_of("data"),
            FieldDescriptor::u8("kind"),
            FieldDescriptor::bytes("data", Length::Derived),
        ],
    );

    #[test]
    fn constructors_default_to_big_endian() {
        assert_eq!(FieldDescriptor::u32("a").ty, WireType::U32(ByteOrder::Big));
        assert_eq!(
            FieldDescriptor::u32("a").little_endian().ty,
            WireType::U32(ByteOrder::Little)
        );
        assert_eq!(FieldDescriptor::u8("a").little_endian().ty, WireType::U8);
    }

    #[test]
    fn fixed_size_of_flat_and_variable_schemas() {
        assert_eq!(POINT.fixed_size(), Some(4));
        assert_eq!(BLOB.fixed_size(), None);
    }

    #[test]
    fn valid_schemas_pass() {
        POINT.validate().unwrap();
        BLOB.validate().unwrap();
    }

    #[test]
    fn derived_len_is_computed_from_target() {
        let record = Record::new()
            .with("kind", 7u8)
            .with("data", Bytes::from_static(b"abcde"));
        assert_eq!(BLOB.derived_len(&record, "size").unwrap(), 5);
    }

    #[test]
    fn rejects_length_field_after_target() {
        static BAD: Schema = Schema::new(
            "Bad",
            &[
                FieldDescriptor::bytes("data", Length::Derived),
                FieldDescriptor::u8("size").length_of("data"),
            ],
        );
        assert!(matches!(
            BAD.validate(),
            Err(CodecError::InvalidSchema { .. })
        ));
    }

    #[test]
    fn rejects_unsourced_derived_field() {
        static BAD: Schema = Schema::new(
            "Orphan",
            &[FieldDescriptor::bytes("data", Length::Derived)],
        );
        assert!(BAD.validate().is_err());
    }

    #[test]
    fn rejects_remaining_before_last_field() {
        static BAD: Schema = Schema::new(
            "Greedy",
            &[
                FieldDescriptor::bytes("rest", Length::Remaining),
                FieldDescriptor::u8("tail"),
            ],
        );
        assert!(BAD.validate().is_err());
    }

    #[test]
    fn rejects_non_integer_length_field() {
        static BAD: Schema = Schema::new(
            "Stringly",
            &[
                FieldDescriptor::cstring("size").length_of("data"),
                FieldDescriptor::bytes("data", Length::Derived),
            ],
        );
        assert!(BAD.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        static BAD: Schema = Schema::new(
            "Twice",
            &[FieldDescriptor::u8("a"), FieldDescriptor::u16("a")],
        );
        assert!(BAD.validate().is_err());
    }
}
