//! Declarative schema definitions
//!
//! Request and response bodies are described once per protocol version as a
//! small tree of [`SchemaDefinition`]s. [`SchemaParser`] compiles a tree into
//! a [`Schema`]; [`VersionTable`] holds the compiled schema of every version
//! of one message so nothing is re-parsed per call.

use crate::error::{ProtocolError, Result};

use super::schema::{Field, Schema};
use super::types::Type;

/// Primitive type reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Int8,
    Int16,
    Int32,
    Int64,
    UnsignedInt32,
    Boolean,
    String,
    NullableString,
    Bytes,
    NullableBytes,
}

/// Definition of a single field's type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Primitive(Primitive),
    Array {
        items: Box<TypeDefinition>,
        nullable: bool,
    },
    Record(SchemaDefinition),
}

impl TypeDefinition {
    pub fn array(items: impl Into<TypeDefinition>) -> Self {
        TypeDefinition::Array {
            items: Box::new(items.into()),
            nullable: false,
        }
    }

    pub fn nullable_array(items: impl Into<TypeDefinition>) -> Self {
        TypeDefinition::Array {
            items: Box::new(items.into()),
            nullable: true,
        }
    }
}

impl From<Primitive> for TypeDefinition {
    fn from(primitive: Primitive) -> Self {
        TypeDefinition::Primitive(primitive)
    }
}

impl From<SchemaDefinition> for TypeDefinition {
    fn from(definition: SchemaDefinition) -> Self {
        TypeDefinition::Record(definition)
    }
}

/// Ordered name to type definitions for one version of a body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDefinition {
    fields: Vec<(String, TypeDefinition)>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, or replaces the type of one with the same name.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, definition: impl Into<TypeDefinition>) -> Self {
        let name = name.into();
        let definition = definition.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = definition,
            None => self.fields.push((name, definition)),
        }
        self
    }

    /// Superset composition: keeps every existing field and appends the
    /// fields of `other` whose names are new.
    #[must_use]
    pub fn extend(mut self, other: SchemaDefinition) -> Self {
        for (name, definition) in other.fields {
            if !self.fields.iter().any(|(existing, _)| *existing == name) {
                self.fields.push((name, definition));
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Compiles definitions into schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaParser;

impl SchemaParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, definition: &SchemaDefinition) -> Schema {
        Schema::new(
            definition
                .fields
                .iter()
                .map(|(name, field)| Field::new(name.clone(), self.parse_type(field)))
                .collect(),
        )
    }

    fn parse_type(&self, definition: &TypeDefinition) -> Type {
        match definition {
            TypeDefinition::Primitive(primitive) => match primitive {
                Primitive::Int8 => Type::Int8,
                Primitive::Int16 => Type::Int16,
                Primitive::Int32 => Type::Int32,
                Primitive::Int64 => Type::Int64,
                Primitive::UnsignedInt32 => Type::UnsignedInt32,
                Primitive::Boolean => Type::Boolean,
                Primitive::String => Type::String,
                Primitive::NullableString => Type::NullableString,
                Primitive::Bytes => Type::Bytes,
                Primitive::NullableBytes => Type::NullableBytes,
            },
            TypeDefinition::Array { items, nullable } if *nullable => {
                Type::nullable_array(self.parse_type(items))
            }
            TypeDefinition::Array { items, .. } => Type::array(self.parse_type(items)),
            TypeDefinition::Record(definition) => Type::Struct(self.parse(definition)),
        }
    }
}

/// Compiled schemas of one message, indexed by protocol version.
#[derive(Debug, Clone)]
pub struct VersionTable {
    api_key: i16,
    schemas: Vec<Schema>,
}

impl VersionTable {
    pub fn compile(
        parser: &SchemaParser,
        api_key: i16,
        definitions: impl IntoIterator<Item = SchemaDefinition>,
    ) -> Self {
        Self {
            api_key,
            schemas: definitions
                .into_iter()
                .map(|definition| parser.parse(&definition))
                .collect(),
        }
    }

    pub fn schema(&self, version: i16) -> Result<&Schema> {
        usize::try_from(version)
            .ok()
            .and_then(|index| self.schemas.get(index))
            .ok_or(ProtocolError::UnsupportedVersion {
                api_key: self.api_key,
                version,
            })
    }

    /// Highest version present; -1 for an empty table.
    pub fn highest_version(&self) -> i16 {
        self.schemas.len() as i16 - 1
    }
}
