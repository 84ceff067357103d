//! Fields and schemas
//!
//! A [`Schema`] is the ordered field layout of one version of a message
//! body. Field order is wire order; the order of keys in the [`Struct`]
//! being written is irrelevant.

use crate::core::Buffer;
use crate::error::{Result, ValidationError};

use super::types::Type;
use super::value::{Struct, Value};

static NULL: Value = Value::Null;

/// A named slot in a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// The field's value, falling back to null when the type allows it.
    ///
    /// A present-but-null entry counts as missing for non-nullable types.
    pub fn extract_value<'a>(
        &self,
        structure: &'a Struct,
    ) -> std::result::Result<&'a Value, ValidationError> {
        match structure.get(&self.name) {
            Some(value) if !value.is_null() => Ok(value),
            _ if self.ty.is_nullable() => Ok(&NULL),
            _ => Err(ValidationError::MissingField {
                name: self.name.clone(),
            }),
        }
    }

    pub fn write_to(&self, structure: &Struct, buffer: &mut Buffer) -> Result<()> {
        self.ty.write(self.extract_value(structure)?, buffer)
    }

    /// The wire always carries a value or its null sentinel, so reads never
    /// see a missing field.
    pub fn read_from(&self, buffer: &mut Buffer) -> Result<Value> {
        self.ty.read(buffer)
    }

    pub fn size_of(&self, structure: &Struct) -> Result<usize> {
        self.ty.size_of(self.extract_value(structure)?)
    }

    pub fn validate(&self, structure: &Struct) -> std::result::Result<(), ValidationError> {
        self.ty.validate(self.extract_value(structure)?)
    }
}

/// Ordered list of fields describing one wire version of a body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn write(&self, data: &Struct, buffer: &mut Buffer) -> Result<()> {
        for field in &self.fields {
            field.write_to(data, buffer)?;
        }
        Ok(())
    }

    pub fn read(&self, buffer: &mut Buffer) -> Result<Struct> {
        let mut data = Struct::new();
        for field in &self.fields {
            data.insert(field.name(), field.read_from(buffer)?);
        }
        Ok(data)
    }

    pub fn size_of(&self, data: &Struct) -> Result<usize> {
        let mut size = 0;
        for field in &self.fields {
            size += field.size_of(data)?;
        }
        Ok(size)
    }

    /// Validates a candidate value, which must be a struct.
    pub fn validate(&self, data: &Value) -> std::result::Result<(), ValidationError> {
        match data {
            Value::Struct(data) => self.validate_struct(data),
            Value::Null => Err(ValidationError::NullValue { expected: "struct" }),
            other => Err(other.incorrect_type("struct")),
        }
    }

    /// Validates every field, tagging failures with the field name.
    pub fn validate_struct(&self, data: &Struct) -> std::result::Result<(), ValidationError> {
        for field in &self.fields {
            field
                .validate(data)
                .map_err(|err| ValidationError::for_field(field.name(), err))?;
        }
        Ok(())
    }

    /// Validates, sizes and encodes `data` into an exactly-sized buffer,
    /// rewound so it can be read back.
    pub fn encode(&self, data: &Struct) -> Result<Buffer> {
        self.validate_struct(data)?;
        let mut buffer = Buffer::allocate(self.size_of(data)?);
        self.write(data, &mut buffer)?;
        buffer.reset();
        Ok(buffer)
    }
}
