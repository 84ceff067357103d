//! ApiVersions (key 18): which api versions a broker supports.

use std::sync::OnceLock;

use crate::core::Buffer;
use crate::error::{Result, ValidationError};
use crate::protocol::message::{ApiKey, Request, Response, ResponseParser};
use crate::protocol::parser::{
    Primitive, SchemaDefinition, SchemaParser, TypeDefinition, VersionTable,
};
use crate::protocol::value::{Struct, Value};

use super::{decode_items, ApiResponse};

/// Asks a broker which api versions it supports. Empty body in v0 to v2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiVersionsRequest;

impl Request for ApiVersionsRequest {
    fn api_key(&self) -> ApiKey {
        ApiKey::ApiVersions
    }

    fn schemas(&self) -> &'static VersionTable {
        static TABLE: OnceLock<VersionTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            VersionTable::compile(
                &SchemaParser,
                ApiKey::ApiVersions as i16,
                vec![SchemaDefinition::new(); 3],
            )
        })
    }

    fn as_struct(&self, _version: i16) -> Struct {
        Struct::new()
    }

    fn response_parser(&self) -> ResponseParser {
        parse_response
    }
}

fn parse_response(buffer: &mut Buffer, version: i16) -> Result<ApiResponse> {
    ApiVersionsResponse::parse(buffer, version).map(ApiResponse::ApiVersions)
}

/// Version range of one api key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiVersionsResponse {
    pub error_code: i16,
    pub api_versions: Vec<ApiVersion>,
    /// Zero before v1.
    pub throttle_time_ms: i32,
}

impl ApiVersionsResponse {
    /// Supported range for `api_key`, if the broker knows it.
    pub fn supported(&self, api_key: ApiKey) -> Option<&ApiVersion> {
        self.api_versions
            .iter()
            .find(|version| ApiKey::from_i16(version.api_key) == Some(api_key))
    }

    pub fn as_struct(&self) -> Struct {
        let api_versions: Vec<Value> = self
            .api_versions
            .iter()
            .map(|version| {
                Value::from(
                    Struct::new()
                        .with("api_key", version.api_key)
                        .with("min_version", version.min_version)
                        .with("max_version", version.max_version),
                )
            })
            .collect();

        Struct::new()
            .with("error_code", self.error_code)
            .with("api_versions", api_versions)
            .with("throttle_time_ms", self.throttle_time_ms)
    }
}

impl Response for ApiVersionsResponse {
    fn schemas() -> &'static VersionTable {
        static TABLE: OnceLock<VersionTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            let v0 = SchemaDefinition::new()
                .field("error_code", Primitive::Int16)
                .field(
                    "api_versions",
                    TypeDefinition::array(
                        SchemaDefinition::new()
                            .field("api_key", Primitive::Int16)
                            .field("min_version", Primitive::Int16)
                            .field("max_version", Primitive::Int16),
                    ),
                );
            let v1 = v0
                .clone()
                .extend(SchemaDefinition::new().field("throttle_time_ms", Primitive::Int32));

            VersionTable::compile(
                &SchemaParser,
                ApiKey::ApiVersions as i16,
                vec![v0, v1.clone(), v1],
            )
        })
    }

    fn from_struct(mut data: Struct, _version: i16) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            error_code: data.take("error_code")?.into_i16()?,
            api_versions: decode_items(data.take("api_versions")?, |item| {
                let mut item = item.into_struct()?;
                Ok(ApiVersion {
                    api_key: item.take("api_key")?.into_i16()?,
                    min_version: item.take("min_version")?.into_i16()?,
                    max_version: item.take("max_version")?.into_i16()?,
                })
            })?,
            throttle_time_ms: data
                .take_optional("throttle_time_ms")
                .map(Value::into_i32)
                .transpose()?
                .unwrap_or(0),
        })
    }
}
