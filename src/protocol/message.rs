//! Request/response contracts and the request header
//!
//! Layout of one request on the wire (all big-endian):
//! ┌──────────────────────────────────────────────────────────┐
//! │ int32 length of everything below                         │
//! ├──────────────────────────────────────────────────────────┤
//! │ int16 api_key │ int16 api_version │ int32 correlation_id │
//! │ nullable_string client_id                                │
//! ├──────────────────────────────────────────────────────────┤
//! │ body, laid out by the request's schema for api_version   │
//! └──────────────────────────────────────────────────────────┘
//!
//! A response frame is `int32 length`, `int32 correlation_id`, then the body.

use std::fmt;
use std::sync::OnceLock;

use crate::core::Buffer;
use crate::error::{ProtocolError, Result, ValidationError};

use super::api::ApiResponse;
use super::parser::{Primitive, SchemaDefinition, SchemaParser, VersionTable};
use super::schema::Schema;
use super::value::Struct;

/// Api keys this client speaks.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKey {
    Metadata = 3,
    ApiVersions = 18,
}

impl ApiKey {
    #[inline(always)]
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            3 => Some(Self::Metadata),
            18 => Some(Self::ApiVersions),
            _ => None,
        }
    }
}

/// Parses a response body for the version the request was sent with.
pub type ResponseParser = fn(&mut Buffer, i16) -> Result<ApiResponse>;

/// An outbound message body.
///
/// Object safe so heterogeneous requests can share one channel queue.
pub trait Request: fmt::Debug {
    fn api_key(&self) -> ApiKey;

    /// Compiled schema of every supported version.
    fn schemas(&self) -> &'static VersionTable;

    fn highest_supported_version(&self) -> i16 {
        self.schemas().highest_version()
    }

    /// Fields of this request as laid out for `version`.
    fn as_struct(&self, version: i16) -> Struct;

    /// Parser bound into the headers at send time.
    fn response_parser(&self) -> ResponseParser;

    /// Validates, sizes and encodes the body for `version`.
    fn to_buffer(&self, version: i16) -> Result<Buffer> {
        self.schemas().schema(version)?.encode(&self.as_struct(version))
    }
}

/// An inbound message body.
pub trait Response: Sized {
    fn schemas() -> &'static VersionTable;

    /// Builds the typed response from a parsed structure.
    fn from_struct(data: Struct, version: i16) -> std::result::Result<Self, ValidationError>;

    fn parse(buffer: &mut Buffer, version: i16) -> Result<Self> {
        let data = Self::schemas().schema(version)?.read(buffer)?;
        Ok(Self::from_struct(data, version)?)
    }
}

fn header_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        SchemaParser.parse(
            &SchemaDefinition::new()
                .field("api_key", Primitive::Int16)
                .field("api_version", Primitive::Int16)
                .field("correlation_id", Primitive::Int32)
                .field("client_id", Primitive::NullableString),
        )
    })
}

/// Header of one outbound request plus the parser for its reply.
#[derive(Clone)]
pub struct RequestHeaders {
    api_key: i16,
    api_version: i16,
    correlation_id: i32,
    client_id: Option<String>,
    response_parser: ResponseParser,
}

impl RequestHeaders {
    pub fn new(
        api_key: i16,
        api_version: i16,
        correlation_id: i32,
        client_id: Option<String>,
        response_parser: ResponseParser,
    ) -> Self {
        Self {
            api_key,
            api_version,
            correlation_id,
            client_id,
            response_parser,
        }
    }

    /// Headers for `request` at its highest supported version.
    pub fn for_request(
        request: &dyn Request,
        correlation_id: i32,
        client_id: Option<String>,
    ) -> Self {
        Self::new(
            request.api_key() as i16,
            request.highest_supported_version(),
            correlation_id,
            client_id,
            request.response_parser(),
        )
    }

    #[inline(always)]
    pub fn api_key(&self) -> i16 {
        self.api_key
    }

    #[inline(always)]
    pub fn api_version(&self) -> i16 {
        self.api_version
    }

    #[inline(always)]
    pub fn correlation_id(&self) -> i32 {
        self.correlation_id
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    pub fn as_struct(&self) -> Struct {
        Struct::new()
            .with("api_key", self.api_key)
            .with("api_version", self.api_version)
            .with("correlation_id", self.correlation_id)
            .with("client_id", self.client_id.clone())
    }

    pub fn to_buffer(&self) -> Result<Buffer> {
        header_schema().encode(&self.as_struct())
    }

    /// Checks the echoed correlation id, then parses the body with the
    /// version this request was sent with.
    pub fn parse_response(&self, buffer: &mut Buffer) -> Result<ApiResponse> {
        let correlation_id = buffer.read_int()?;
        if correlation_id != self.correlation_id {
            return Err(ProtocolError::CorrelationMismatch {
                expected: self.correlation_id,
                actual: correlation_id,
            });
        }

        (self.response_parser)(buffer, self.api_version)
    }
}

impl fmt::Debug for RequestHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHeaders")
            .field("api_key", &self.api_key)
            .field("api_version", &self.api_version)
            .field("correlation_id", &self.correlation_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
