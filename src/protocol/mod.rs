//! Protocol layer: schema-driven binary codec
//!
//! - Wire types know how to write, read, size and validate a value
//! - Schemas lay fields out in wire order, one schema per version
//! - Request/response framing wraps bodies with headers and a length prefix

pub mod api;
mod encoder;
mod message;
mod parser;
mod schema;
mod types;
mod value;

pub use api::ApiResponse;
pub use encoder::{encode_frame, encode_request, Decoder, LENGTH_PREFIX, MAX_FRAME_SIZE};
pub use message::{ApiKey, Request, RequestHeaders, Response, ResponseParser};
pub use parser::{Primitive, SchemaDefinition, SchemaParser, TypeDefinition, VersionTable};
pub use schema::{Field, Schema};
pub use types::{ArrayOf, Type, MAX_STRING_LENGTH};
pub use value::{Struct, Value};
