//! Metadata (key 3): brokers, topics and partition leaders.

use std::sync::OnceLock;

use crate::core::Buffer;
use crate::error::{Result, ValidationError};
use crate::protocol::message::{ApiKey, Request, Response, ResponseParser};
use crate::protocol::parser::{
    Primitive, SchemaDefinition, SchemaParser, TypeDefinition, VersionTable,
};
use crate::protocol::value::{Struct, Value};

use super::{decode_items, ApiResponse};

const HIGHEST_VERSION: i16 = 7;

/// Topic and broker metadata request.
///
/// `topics: None` asks for every topic. Version 0 has no null topic list, so
/// there it is sent as an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRequest {
    pub topics: Option<Vec<String>>,
    pub allow_auto_topic_creation: bool,
}

impl MetadataRequest {
    pub fn all_topics() -> Self {
        Self::default()
    }

    pub fn for_topics<I, T>(topics: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            topics: Some(topics.into_iter().map(Into::into).collect()),
            allow_auto_topic_creation: false,
        }
    }

    #[must_use]
    pub fn with_auto_topic_creation(mut self, allow: bool) -> Self {
        self.allow_auto_topic_creation = allow;
        self
    }
}

impl Request for MetadataRequest {
    fn api_key(&self) -> ApiKey {
        ApiKey::Metadata
    }

    fn schemas(&self) -> &'static VersionTable {
        static TABLE: OnceLock<VersionTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            let v0 = SchemaDefinition::new()
                .field("topics", TypeDefinition::array(Primitive::String));
            let v1 = SchemaDefinition::new()
                .field("topics", TypeDefinition::nullable_array(Primitive::String));
            let v4 = v1
                .clone()
                .extend(
                    SchemaDefinition::new().field("allow_auto_topic_creation", Primitive::Boolean),
                );

            let mut definitions = vec![v0];
            definitions.extend(std::iter::repeat(v1).take(3));
            definitions.extend(std::iter::repeat(v4).take(4));
            VersionTable::compile(&SchemaParser, ApiKey::Metadata as i16, definitions)
        })
    }

    fn as_struct(&self, version: i16) -> Struct {
        let topics = match (&self.topics, version) {
            (None, 0) => Some(Vec::new()),
            (topics, _) => topics.clone(),
        };

        Struct::new()
            .with("topics", topics)
            .with("allow_auto_topic_creation", self.allow_auto_topic_creation)
    }

    fn response_parser(&self) -> ResponseParser {
        parse_response
    }
}

fn parse_response(buffer: &mut Buffer, version: i16) -> Result<ApiResponse> {
    MetadataResponse::parse(buffer, version).map(ApiResponse::Metadata)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broker {
    pub node_id: i32,
    pub host: String,
    pub port: i32,
    pub rack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMetadata {
    pub error_code: i16,
    pub partition_index: i32,
    pub leader_id: i32,
    /// -1 before v7.
    pub leader_epoch: i32,
    pub replica_nodes: Vec<i32>,
    pub isr_nodes: Vec<i32>,
    /// Empty before v5.
    pub offline_replicas: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMetadata {
    pub error_code: i16,
    pub name: String,
    pub is_internal: bool,
    pub partitions: Vec<PartitionMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataResponse {
    /// Zero before v3.
    pub throttle_time_ms: i32,
    pub brokers: Vec<Broker>,
    pub cluster_id: Option<String>,
    /// -1 before v1.
    pub controller_id: i32,
    pub topics: Vec<TopicMetadata>,
}

fn broker_definition(version: i16) -> SchemaDefinition {
    let broker = SchemaDefinition::new()
        .field("node_id", Primitive::Int32)
        .field("host", Primitive::String)
        .field("port", Primitive::Int32);

    match version {
        0 => broker,
        _ => broker.field("rack", Primitive::NullableString),
    }
}

fn partition_definition(version: i16) -> SchemaDefinition {
    let mut partition = SchemaDefinition::new()
        .field("error_code", Primitive::Int16)
        .field("partition_index", Primitive::Int32)
        .field("leader_id", Primitive::Int32);
    if version >= 7 {
        partition = partition.field("leader_epoch", Primitive::Int32);
    }
    partition = partition
        .field("replica_nodes", TypeDefinition::array(Primitive::Int32))
        .field("isr_nodes", TypeDefinition::array(Primitive::Int32));
    if version >= 5 {
        partition = partition.field("offline_replicas", TypeDefinition::array(Primitive::Int32));
    }
    partition
}

fn topic_definition(version: i16) -> SchemaDefinition {
    let mut topic = SchemaDefinition::new()
        .field("error_code", Primitive::Int16)
        .field("name", Primitive::String);
    if version >= 1 {
        topic = topic.field("is_internal", Primitive::Boolean);
    }
    topic.field(
        "partitions",
        TypeDefinition::array(partition_definition(version)),
    )
}

fn response_definition(version: i16) -> SchemaDefinition {
    let mut response = SchemaDefinition::new();
    if version >= 3 {
        response = response.field("throttle_time_ms", Primitive::Int32);
    }
    response = response.field("brokers", TypeDefinition::array(broker_definition(version)));
    if version >= 2 {
        response = response.field("cluster_id", Primitive::NullableString);
    }
    if version >= 1 {
        response = response.field("controller_id", Primitive::Int32);
    }
    response.field("topics", TypeDefinition::array(topic_definition(version)))
}

fn optional_i32(
    data: &mut Struct,
    name: &str,
    default: i32,
) -> std::result::Result<i32, ValidationError> {
    Ok(data
        .take_optional(name)
        .map(Value::into_i32)
        .transpose()?
        .unwrap_or(default))
}

fn node_ids(value: Value) -> std::result::Result<Vec<i32>, ValidationError> {
    decode_items(value, Value::into_i32)
}

impl Broker {
    fn from_value(value: Value) -> std::result::Result<Self, ValidationError> {
        let mut data = value.into_struct()?;
        Ok(Self {
            node_id: data.take("node_id")?.into_i32()?,
            host: data.take("host")?.into_string()?,
            port: data.take("port")?.into_i32()?,
            rack: data
                .take_optional("rack")
                .map(Value::into_nullable_string)
                .transpose()?
                .flatten(),
        })
    }

    fn as_value(&self) -> Value {
        Struct::new()
            .with("node_id", self.node_id)
            .with("host", self.host.as_str())
            .with("port", self.port)
            .with("rack", self.rack.clone())
            .into()
    }
}

impl PartitionMetadata {
    fn from_value(value: Value) -> std::result::Result<Self, ValidationError> {
        let mut data = value.into_struct()?;
        Ok(Self {
            error_code: data.take("error_code")?.into_i16()?,
            partition_index: data.take("partition_index")?.into_i32()?,
            leader_id: data.take("leader_id")?.into_i32()?,
            leader_epoch: optional_i32(&mut data, "leader_epoch", -1)?,
            replica_nodes: node_ids(data.take("replica_nodes")?)?,
            isr_nodes: node_ids(data.take("isr_nodes")?)?,
            offline_replicas: match data.take_optional("offline_replicas") {
                Some(value) => node_ids(value)?,
                None => Vec::new(),
            },
        })
    }

    fn as_value(&self) -> Value {
        Struct::new()
            .with("error_code", self.error_code)
            .with("partition_index", self.partition_index)
            .with("leader_id", self.leader_id)
            .with("leader_epoch", self.leader_epoch)
            .with("replica_nodes", self.replica_nodes.clone())
            .with("isr_nodes", self.isr_nodes.clone())
            .with("offline_replicas", self.offline_replicas.clone())
            .into()
    }
}

impl TopicMetadata {
    fn from_value(value: Value) -> std::result::Result<Self, ValidationError> {
        let mut data = value.into_struct()?;
        Ok(Self {
            error_code: data.take("error_code")?.into_i16()?,
            name: data.take("name")?.into_string()?,
            is_internal: data
                .take_optional("is_internal")
                .map(Value::into_bool)
                .transpose()?
                .unwrap_or(false),
            partitions: decode_items(data.take("partitions")?, PartitionMetadata::from_value)?,
        })
    }

    fn as_value(&self) -> Value {
        let partitions: Vec<Value> = self
            .partitions
            .iter()
            .map(PartitionMetadata::as_value)
            .collect();

        Struct::new()
            .with("error_code", self.error_code)
            .with("name", self.name.as_str())
            .with("is_internal", self.is_internal)
            .with("partitions", partitions)
            .into()
    }
}

impl MetadataResponse {
    /// Every field of every version; a schema only picks what it lays out.
    pub fn as_struct(&self) -> Struct {
        let brokers: Vec<Value> = self.brokers.iter().map(Broker::as_value).collect();
        let topics: Vec<Value> = self.topics.iter().map(TopicMetadata::as_value).collect();

        Struct::new()
            .with("throttle_time_ms", self.throttle_time_ms)
            .with("brokers", brokers)
            .with("cluster_id", self.cluster_id.clone())
            .with("controller_id", self.controller_id)
            .with("topics", topics)
    }
}

impl Response for MetadataResponse {
    fn schemas() -> &'static VersionTable {
        static TABLE: OnceLock<VersionTable> = OnceLock::new();
        TABLE.get_or_init(|| {
            VersionTable::compile(
                &SchemaParser,
                ApiKey::Metadata as i16,
                (0..=HIGHEST_VERSION).map(response_definition),
            )
        })
    }

    fn from_struct(mut data: Struct, _version: i16) -> std::result::Result<Self, ValidationError> {
        Ok(Self {
            throttle_time_ms: optional_i32(&mut data, "throttle_time_ms", 0)?,
            brokers: decode_items(data.take("brokers")?, Broker::from_value)?,
            cluster_id: data
                .take_optional("cluster_id")
                .map(Value::into_nullable_string)
                .transpose()?
                .flatten(),
            controller_id: optional_i32(&mut data, "controller_id", -1)?,
            topics: decode_items(data.take("topics")?, TopicMetadata::from_value)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetadataResponse {
        MetadataResponse {
            throttle_time_ms: 5,
            brokers: vec![Broker {
                node_id: 1,
                host: "kafka-1".to_owned(),
                port: 9092,
                rack: Some("r1".to_owned()),
            }],
            cluster_id: Some("cluster".to_owned()),
            controller_id: 1,
            topics: vec![TopicMetadata {
                error_code: 0,
                name: "events".to_owned(),
                is_internal: false,
                partitions: vec![PartitionMetadata {
                    error_code: 0,
                    partition_index: 0,
                    leader_id: 1,
                    leader_epoch: 3,
                    replica_nodes: vec![1],
                    isr_nodes: vec![1],
                    offline_replicas: vec![],
                }],
            }],
        }
    }

    fn round_trip(response: &MetadataResponse, version: i16) -> MetadataResponse {
        let schema = MetadataResponse::schemas().schema(version).unwrap();
        let mut buffer = schema.encode(&response.as_struct()).unwrap();
        let parsed = MetadataResponse::parse(&mut buffer, version).unwrap();
        assert_eq!(buffer.remaining(), 0);
        parsed
    }

    #[test]
    fn test_v7_round_trip() {
        assert_eq!(round_trip(&sample(), 7), sample());
    }

    #[test]
    fn test_v0_drops_later_fields() {
        let parsed = round_trip(&sample(), 0);

        assert_eq!(parsed.throttle_time_ms, 0);
        assert_eq!(parsed.controller_id, -1);
        assert_eq!(parsed.cluster_id, None);
        assert_eq!(parsed.brokers[0].rack, None);
        assert_eq!(parsed.topics[0].partitions[0].leader_epoch, -1);
    }

    #[test]
    fn test_v3_starts_with_throttle_time() {
        let schema = MetadataResponse::schemas().schema(3).unwrap();
        let buffer = schema.encode(&sample().as_struct()).unwrap();

        assert_eq!(&buffer.bytes()[..4], &[0, 0, 0, 5]);
    }

    #[test]
    fn test_request_null_topics_per_version() {
        let request = MetadataRequest::all_topics();

        assert_eq!(request.highest_supported_version(), 7);
        assert_eq!(request.to_buffer(0).unwrap().bytes(), &[0, 0, 0, 0]);
        assert_eq!(request.to_buffer(1).unwrap().bytes(), &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(
            request
                .with_auto_topic_creation(true)
                .to_buffer(4)
                .unwrap()
                .bytes(),
            &[0xff, 0xff, 0xff, 0xff, 1]
        );
    }

    #[test]
    fn test_request_named_topics() {
        let request = MetadataRequest::for_topics(["a"]);

        assert_eq!(
            request.to_buffer(2).unwrap().bytes(),
            &[0, 0, 0, 1, 0, 1, b'a']
        );
    }
}
