//! Wire types
//!
//! Closed set of primitive and composite encodings. Each knows how to write
//! a [`Value`] into a [`Buffer`], read one back, compute its encoded size and
//! validate a candidate value.
//!
//! ```text
//! int8/16/32/64   fixed-width two's complement, big-endian
//! uint32          4 unsigned bytes
//! boolean         1 byte, any non-zero reads as true
//! string          int16 length (-1 = null) + UTF-8 bytes
//! bytes           int32 length (-1 = null) + raw bytes
//! array           int32 count  (-1 = null) + items
//! ```

use crate::core::Buffer;
use crate::error::{ProtocolError, Result, ValidationError};

use super::schema::Schema;
use super::value::Value;

/// Longest string a 16-bit length prefix can describe.
pub const MAX_STRING_LENGTH: usize = i16::MAX as usize;

const NULL_LENGTH: i64 = -1;

/// A wire encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Int8,
    Int16,
    Int32,
    /// No range check: every `i64` is representable.
    Int64,
    UnsignedInt32,
    Boolean,
    String,
    NullableString,
    /// Value is a [`Buffer`]; its remaining bytes are encoded.
    Bytes,
    NullableBytes,
    Array(ArrayOf),
    /// Nested record.
    Struct(Schema),
}

/// Sequence of one item type, nullable per instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayOf {
    items: Box<Type>,
    nullable: bool,
}

impl ArrayOf {
    pub fn new(items: Type, nullable: bool) -> Self {
        Self {
            items: Box::new(items),
            nullable,
        }
    }

    pub fn items(&self) -> &Type {
        &self.items
    }
}

impl Type {
    pub fn array(items: Type) -> Self {
        Type::Array(ArrayOf::new(items, false))
    }

    pub fn nullable_array(items: Type) -> Self {
        Type::Array(ArrayOf::new(items, true))
    }

    /// Whether a missing or null value is acceptable.
    pub fn is_nullable(&self) -> bool {
        match self {
            Type::NullableString | Type::NullableBytes => true,
            Type::Array(array) => array.nullable,
            _ => false,
        }
    }

    /// Appends the encoding of `value` to `buffer`.
    pub fn write(&self, value: &Value, buffer: &mut Buffer) -> Result<()> {
        match self {
            Type::Int8 => buffer.write_byte(integer(value)?),
            Type::Int16 => buffer.write_short(integer(value)?),
            Type::Int32 => buffer.write_int(integer(value)?),
            Type::Int64 => buffer.write_long(integer(value)?),
            Type::UnsignedInt32 => buffer.write_unsigned_int(integer(value)?),
            Type::Boolean => buffer.write_byte(i64::from(matches!(value, Value::Bool(true)))),
            Type::String => write_string(string(value)?, buffer),
            Type::NullableString => match value {
                Value::Null => buffer.write_short(NULL_LENGTH),
                other => write_string(string(other)?, buffer),
            },
            Type::Bytes => write_bytes(bytes(value)?, buffer),
            Type::NullableBytes => match value {
                Value::Bytes(content) => write_bytes(content, buffer),
                _ => buffer.write_int(NULL_LENGTH),
            },
            Type::Array(array) => match value {
                Value::Null => buffer.write_int(NULL_LENGTH),
                other => {
                    let items = items(other)?;
                    buffer.write_int(items.len() as i64)?;
                    for item in items {
                        array.items.write(item, buffer)?;
                    }
                    Ok(())
                }
            },
            Type::Struct(schema) => schema.write(record(value)?, buffer),
        }
    }

    /// Reads one value of this type at the buffer cursor.
    pub fn read(&self, buffer: &mut Buffer) -> Result<Value> {
        let value = match self {
            Type::Int8 => Value::from(buffer.read_byte()?),
            Type::Int16 => Value::from(buffer.read_short()?),
            Type::Int32 => Value::from(buffer.read_int()?),
            Type::Int64 => Value::from(buffer.read_long()?),
            Type::UnsignedInt32 => Value::from(buffer.read_unsigned_int()?),
            Type::Boolean => Value::Bool(buffer.read_byte()? != 0),
            Type::String => {
                let length = i64::from(buffer.read_short()?);
                Value::String(read_string(buffer, non_negative(length)?)?)
            }
            Type::NullableString => match buffer.read_short()? {
                length if length < 0 => Value::Null,
                length => Value::String(read_string(buffer, length as usize)?),
            },
            Type::Bytes => {
                let length = i64::from(buffer.read_int()?);
                Value::Bytes(Buffer::from_content(buffer.read(non_negative(length)?)?))
            }
            Type::NullableBytes => match buffer.read_int()? {
                length if length < 0 => Value::Null,
                length => Value::Bytes(Buffer::from_content(buffer.read(length as usize)?)),
            },
            Type::Array(array) => match buffer.read_int()? {
                count if count < 0 => Value::Null,
                count => {
                    // Capacity bounded by what the buffer could possibly hold.
                    let mut items = Vec::with_capacity((count as usize).min(buffer.remaining()));
                    for _ in 0..count {
                        items.push(array.items.read(buffer)?);
                    }
                    Value::Array(items)
                }
            },
            Type::Struct(schema) => Value::Struct(schema.read(buffer)?),
        };
        Ok(value)
    }

    /// Number of bytes [`Type::write`] appends for `value`.
    pub fn size_of(&self, value: &Value) -> Result<usize> {
        let size = match self {
            Type::Int8 | Type::Boolean => 1,
            Type::Int16 => 2,
            Type::Int32 | Type::UnsignedInt32 => 4,
            Type::Int64 => 8,
            Type::String => 2 + string(value)?.len(),
            Type::NullableString => match value {
                Value::Null => 2,
                other => 2 + string(other)?.len(),
            },
            Type::Bytes => 4 + bytes(value)?.remaining(),
            Type::NullableBytes => match value {
                Value::Bytes(content) => 4 + content.remaining(),
                _ => 4,
            },
            Type::Array(array) => match value {
                Value::Null => 4,
                other => {
                    let mut size = 4;
                    for item in items(other)? {
                        size += array.items.size_of(item)?;
                    }
                    size
                }
            },
            Type::Struct(schema) => schema.size_of(record(value)?)?,
        };
        Ok(size)
    }

    /// Checks `value` against this type's rules without touching a buffer.
    pub fn validate(&self, value: &Value) -> std::result::Result<(), ValidationError> {
        match self {
            Type::Int8 => guard_range(value, i8::MIN as i64, i8::MAX as i64),
            Type::Int16 => guard_range(value, i16::MIN as i64, i16::MAX as i64),
            Type::Int32 => guard_range(value, i32::MIN as i64, i32::MAX as i64),
            Type::Int64 => integer(value).map(|_| ()),
            Type::UnsignedInt32 => guard_range(value, 0, u32::MAX as i64),
            Type::Boolean => match value {
                Value::Bool(_) => Ok(()),
                Value::Null => Err(ValidationError::NullValue {
                    expected: "boolean",
                }),
                other => Err(other.incorrect_type("boolean")),
            },
            Type::String => guard_length(string(value)?),
            Type::NullableString => match value {
                Value::Null => Ok(()),
                other => guard_length(string(other)?),
            },
            Type::Bytes => bytes(value).map(|_| ()),
            Type::NullableBytes => match value {
                Value::Null => Ok(()),
                other => bytes(other).map(|_| ()),
            },
            Type::Array(array) => match value {
                Value::Null if array.nullable => Ok(()),
                other => items(other)?
                    .iter()
                    .try_for_each(|item| array.items.validate(item)),
            },
            Type::Struct(schema) => schema.validate(value),
        }
    }
}

fn integer(value: &Value) -> std::result::Result<i64, ValidationError> {
    match value {
        Value::Int(value) => Ok(*value),
        Value::Null => Err(ValidationError::NullValue {
            expected: "integer",
        }),
        other => Err(other.incorrect_type("integer")),
    }
}

fn string(value: &Value) -> std::result::Result<&str, ValidationError> {
    match value {
        Value::String(value) => Ok(value),
        Value::Null => Err(ValidationError::NullValue { expected: "string" }),
        other => Err(other.incorrect_type("string")),
    }
}

fn bytes(value: &Value) -> std::result::Result<&Buffer, ValidationError> {
    match value {
        Value::Bytes(value) => Ok(value),
        Value::Null => Err(ValidationError::NullValue { expected: "bytes" }),
        other => Err(other.incorrect_type("bytes")),
    }
}

fn items(value: &Value) -> std::result::Result<&[Value], ValidationError> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Null => Err(ValidationError::NullValue { expected: "array" }),
        other => Err(other.incorrect_type("array")),
    }
}

fn record(value: &Value) -> std::result::Result<&super::value::Struct, ValidationError> {
    match value {
        Value::Struct(data) => Ok(data),
        Value::Null => Err(ValidationError::NullValue { expected: "struct" }),
        other => Err(other.incorrect_type("struct")),
    }
}

fn guard_range(value: &Value, lower: i64, upper: i64) -> std::result::Result<(), ValidationError> {
    let value = integer(value)?;
    if value < lower || value > upper {
        return Err(ValidationError::IncorrectRange {
            value,
            lower,
            upper,
        });
    }
    Ok(())
}

fn guard_length(value: &str) -> std::result::Result<(), ValidationError> {
    if value.len() > MAX_STRING_LENGTH {
        return Err(ValidationError::IncorrectLength {
            length: value.len(),
            max: MAX_STRING_LENGTH,
        });
    }
    Ok(())
}

fn non_negative(length: i64) -> Result<usize> {
    usize::try_from(length).map_err(|_| ProtocolError::NegativeLength { length })
}

fn write_string(value: &str, buffer: &mut Buffer) -> Result<()> {
    buffer.write_short(value.len() as i64)?;
    buffer.write(value.as_bytes())
}

fn read_string(buffer: &mut Buffer, length: usize) -> Result<String> {
    let raw = buffer.read(length)?.to_vec();
    String::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Copies the source's remaining bytes without moving its cursor.
fn write_bytes(content: &Buffer, buffer: &mut Buffer) -> Result<()> {
    buffer.write_int(content.remaining() as i64)?;
    buffer.write(content.get(content.position(), content.remaining())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(ty: &Type, value: &Value) -> Buffer {
        let mut buffer = Buffer::allocate(ty.size_of(value).unwrap());
        ty.write(value, &mut buffer).unwrap();
        assert_eq!(buffer.remaining(), 0);
        buffer.reset();
        buffer
    }

    #[test]
    fn test_boolean_reads_any_non_zero_as_true() {
        let mut buffer = Buffer::from_content(vec![0, 1, 7]);

        assert_eq!(Type::Boolean.read(&mut buffer).unwrap(), Value::Bool(false));
        assert_eq!(Type::Boolean.read(&mut buffer).unwrap(), Value::Bool(true));
        assert_eq!(Type::Boolean.read(&mut buffer).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_boolean_validation_is_strict() {
        assert!(Type::Boolean.validate(&Value::Bool(true)).is_ok());
        assert_eq!(
            Type::Boolean.validate(&Value::Int(1)),
            Err(ValidationError::IncorrectType {
                found: "integer(1)".to_owned(),
                expected: "boolean"
            })
        );
    }

    #[test]
    fn test_nullable_string_sentinel() {
        let buffer = encode(&Type::NullableString, &Value::Null);
        assert_eq!(buffer.bytes(), &[0xff, 0xff]);

        let mut buffer = buffer;
        assert_eq!(Type::NullableString.read(&mut buffer).unwrap(), Value::Null);
    }

    #[test]
    fn test_string_layout() {
        let buffer = encode(&Type::String, &Value::from("kafka"));
        assert_eq!(buffer.bytes(), b"\x00\x05kafka");
    }

    #[test]
    fn test_string_rejects_null_and_long_values() {
        assert_eq!(
            Type::String.validate(&Value::Null),
            Err(ValidationError::NullValue { expected: "string" })
        );

        let long = "a".repeat(MAX_STRING_LENGTH + 1);
        assert_eq!(
            Type::NullableString.validate(&Value::from(long)),
            Err(ValidationError::IncorrectLength {
                length: 32768,
                max: 32767
            })
        );
    }

    #[test]
    fn test_non_nullable_string_with_negative_length() {
        let mut buffer = Buffer::from_content(vec![0xff, 0xff]);

        assert_eq!(
            Type::String.read(&mut buffer),
            Err(ProtocolError::NegativeLength { length: -1 })
        );
    }

    #[test]
    fn test_bytes_write_does_not_move_source_cursor() {
        let mut source = Buffer::from_content(b"xyz".to_vec());
        source.read(1).unwrap();
        let value = Value::Bytes(source);

        let mut buffer = encode(&Type::Bytes, &value);
        assert_eq!(buffer.bytes(), b"\x00\x00\x00\x02yz");

        let Value::Bytes(source) = &value else {
            unreachable!()
        };
        assert_eq!(source.position(), 1);
        assert_eq!(
            Type::Bytes.read(&mut buffer).unwrap(),
            Value::Bytes(Buffer::from_content(b"yz".to_vec()))
        );
    }

    #[test]
    fn test_nullable_bytes_sentinel() {
        let mut buffer = encode(&Type::NullableBytes, &Value::Null);

        assert_eq!(buffer.bytes(), &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(Type::NullableBytes.read(&mut buffer).unwrap(), Value::Null);
    }

    #[test]
    fn test_array_null_and_empty_are_distinct() {
        let ty = Type::nullable_array(Type::Int32);

        let mut null = encode(&ty, &Value::Null);
        assert_eq!(ty.read(&mut null).unwrap(), Value::Null);

        let mut empty = encode(&ty, &Value::Array(vec![]));
        assert_eq!(empty.bytes(), &[0, 0, 0, 0]);
        assert_eq!(ty.read(&mut empty).unwrap(), Value::Array(vec![]));
    }

    #[test]
    fn test_array_nullability_is_per_instance() {
        assert!(Type::nullable_array(Type::Int8).is_nullable());
        assert!(!Type::array(Type::Int8).is_nullable());
        assert_eq!(
            Type::array(Type::Int8).validate(&Value::Null),
            Err(ValidationError::NullValue { expected: "array" })
        );
    }

    #[test]
    fn test_array_validates_every_item() {
        let ty = Type::array(Type::Int8);

        assert_eq!(
            ty.validate(&Value::from(vec![1, 2, 300])),
            Err(ValidationError::IncorrectRange {
                value: 300,
                lower: -128,
                upper: 127
            })
        );
    }

    #[test]
    fn test_int64_has_no_range() {
        assert!(Type::Int64.validate(&Value::Int(i64::MIN)).is_ok());
        assert!(Type::Int64.validate(&Value::Int(i64::MAX)).is_ok());
    }

    #[test]
    fn test_unsigned_int_range() {
        assert!(Type::UnsignedInt32.validate(&Value::Int(u32::MAX as i64)).is_ok());
        assert_eq!(
            Type::UnsignedInt32.validate(&Value::Int(-1)),
            Err(ValidationError::IncorrectRange {
                value: -1,
                lower: 0,
                upper: 4294967295
            })
        );
    }
}
