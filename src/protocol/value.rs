//! In-memory values moved through schemas.
//!
//! Schemas are declared per protocol version, so the data they encode is
//! dynamically shaped: a [`Struct`] maps field names to [`Value`]s and the
//! schema decides wire order.

use std::collections::BTreeMap;
use std::fmt;

use crate::core::Buffer;
use crate::error::ValidationError;

/// A single datum as the codec sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Every integer width; the wire type enforces the range.
    Int(i64),
    String(String),
    Bytes(Buffer),
    Array(Vec<Value>),
    Struct(Struct),
}

impl Value {
    #[inline(always)]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the value kind, used in validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Struct(_) => "struct",
        }
    }

    pub(crate) fn incorrect_type(&self, expected: &'static str) -> ValidationError {
        ValidationError::IncorrectType {
            found: self.to_string(),
            expected,
        }
    }

    pub fn into_int(self) -> Result<i64, ValidationError> {
        match self {
            Value::Int(value) => Ok(value),
            Value::Null => Err(ValidationError::NullValue {
                expected: "integer",
            }),
            other => Err(other.incorrect_type("integer")),
        }
    }

    pub fn into_i16(self) -> Result<i16, ValidationError> {
        narrow(self.into_int()?)
    }

    pub fn into_i32(self) -> Result<i32, ValidationError> {
        narrow(self.into_int()?)
    }

    pub fn into_bool(self) -> Result<bool, ValidationError> {
        match self {
            Value::Bool(value) => Ok(value),
            Value::Null => Err(ValidationError::NullValue {
                expected: "boolean",
            }),
            other => Err(other.incorrect_type("boolean")),
        }
    }

    pub fn into_string(self) -> Result<String, ValidationError> {
        match self {
            Value::String(value) => Ok(value),
            Value::Null => Err(ValidationError::NullValue { expected: "string" }),
            other => Err(other.incorrect_type("string")),
        }
    }

    pub fn into_nullable_string(self) -> Result<Option<String>, ValidationError> {
        match self {
            Value::Null => Ok(None),
            other => other.into_string().map(Some),
        }
    }

    pub fn into_array(self) -> Result<Vec<Value>, ValidationError> {
        match self {
            Value::Array(items) => Ok(items),
            Value::Null => Err(ValidationError::NullValue { expected: "array" }),
            other => Err(other.incorrect_type("array")),
        }
    }

    pub fn into_nullable_array(self) -> Result<Option<Vec<Value>>, ValidationError> {
        match self {
            Value::Null => Ok(None),
            other => other.into_array().map(Some),
        }
    }

    pub fn into_struct(self) -> Result<Struct, ValidationError> {
        match self {
            Value::Struct(data) => Ok(data),
            Value::Null => Err(ValidationError::NullValue { expected: "struct" }),
            other => Err(other.incorrect_type("struct")),
        }
    }
}

fn narrow<T>(value: i64) -> Result<T, ValidationError>
where
    T: TryFrom<i64> + Bounded,
{
    T::try_from(value).map_err(|_| ValidationError::IncorrectRange {
        value,
        lower: T::LOWER,
        upper: T::UPPER,
    })
}

trait Bounded {
    const LOWER: i64;
    const UPPER: i64;
}

impl Bounded for i16 {
    const LOWER: i64 = i16::MIN as i64;
    const UPPER: i64 = i16::MAX as i64;
}

impl Bounded for i32 {
    const LOWER: i64 = i32::MIN as i64;
    const UPPER: i64 = i32::MAX as i64;
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "boolean({value})"),
            Value::Int(value) => write!(f, "integer({value})"),
            Value::String(value) => write!(f, "string({value:?})"),
            Value::Bytes(value) => write!(f, "bytes({} byte(s))", value.remaining()),
            Value::Array(items) => write!(f, "array({} item(s))", items.len()),
            Value::Struct(data) => write!(f, "struct({} field(s))", data.len()),
        }
    }
}

macro_rules! int_conversions {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

int_conversions!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Buffer> for Value {
    fn from(value: Buffer) -> Self {
        Value::Bytes(value)
    }
}

impl From<Struct> for Value {
    fn from(value: Struct) -> Self {
        Value::Struct(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Field name to value map; one version of a message body in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Struct(BTreeMap<String, Value>);

impl Struct {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Removes a field that must be present.
    pub fn take(&mut self, name: &str) -> Result<Value, ValidationError> {
        self.0
            .remove(name)
            .ok_or_else(|| ValidationError::MissingField {
                name: name.to_owned(),
            })
    }

    /// Removes a field that only exists in some versions.
    pub fn take_optional(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Struct {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(3i16), Value::Int(3));
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::Array(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn test_narrowing() {
        assert_eq!(Value::Int(-3).into_i16(), Ok(-3));
        assert_eq!(
            Value::Int(40_000).into_i16(),
            Err(ValidationError::IncorrectRange {
                value: 40_000,
                lower: -32768,
                upper: 32767
            })
        );
        assert_eq!(
            Value::from("x").into_i32(),
            Err(ValidationError::IncorrectType {
                found: "string(\"x\")".to_owned(),
                expected: "integer"
            })
        );
    }

    #[test]
    fn test_struct_iterates_by_name() {
        let data: Struct = [("b", 2), ("a", 1)].into_iter().collect();

        assert!(data.contains("a"));
        assert!(!data.contains("c"));
        assert_eq!(
            data.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_take_missing_field() {
        let mut data = Struct::new().with("a", 1);

        assert_eq!(data.take("a"), Ok(Value::Int(1)));
        assert_eq!(
            data.take("a"),
            Err(ValidationError::MissingField {
                name: "a".to_owned()
            })
        );
    }
}
