//! Request/response bodies this client speaks.
//!
//! Each message carries a version table compiled once on first use.

mod api_versions;
mod metadata;

pub use api_versions::{ApiVersion, ApiVersionsRequest, ApiVersionsResponse};
pub use metadata::{Broker, MetadataRequest, MetadataResponse, PartitionMetadata, TopicMetadata};

use crate::error::ValidationError;

use super::message::ApiKey;
use super::value::Value;

/// Any response a channel can hand back to a caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiResponse {
    ApiVersions(ApiVersionsResponse),
    Metadata(MetadataResponse),
}

impl ApiResponse {
    pub fn api_key(&self) -> ApiKey {
        match self {
            ApiResponse::ApiVersions(_) => ApiKey::ApiVersions,
            ApiResponse::Metadata(_) => ApiKey::Metadata,
        }
    }

    pub fn into_api_versions(self) -> Option<ApiVersionsResponse> {
        match self {
            ApiResponse::ApiVersions(response) => Some(response),
            _ => None,
        }
    }

    pub fn into_metadata(self) -> Option<MetadataResponse> {
        match self {
            ApiResponse::Metadata(response) => Some(response),
            _ => None,
        }
    }
}

/// Decodes every item of an array value with `f`.
fn decode_items<T>(
    value: Value,
    f: impl Fn(Value) -> Result<T, ValidationError>,
) -> Result<Vec<T>, ValidationError> {
    value.into_array()?.into_iter().map(f).collect()
}
