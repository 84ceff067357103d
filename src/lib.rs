//! Kafka wire codec and pipelined per-broker channel.
//!
//! The codec turns [`protocol::Struct`] values into bytes through versioned
//! [`protocol::Schema`]s and back. A [`network::Channel`] writes requests to
//! one broker in send order and resolves each caller with its response.
//!
//! ```no_run
//! use kafka_channel::network::Reactor;
//! use kafka_channel::protocol::api::ApiVersionsRequest;
//! use kafka_channel::{ChannelConfig, Cluster};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cluster = Cluster::bootstrap("localhost:9092")?;
//! let mut reactor = Reactor::new()?;
//! let token = reactor.add_channel(cluster.brokers[0].clone(), ChannelConfig::default())?;
//!
//! let mut response = reactor
//!     .channel(token)
//!     .ok_or("unknown channel")?
//!     .send(ApiVersionsRequest, 1, "example");
//! let versions = reactor.block_on(&mut response)?;
//! println!("{versions:?}");
//! # Ok(())
//! # }
//! ```

pub mod cluster;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod protocol;

pub use cluster::{Cluster, Node};
pub use config::ChannelConfig;
pub use error::{Error, ProtocolError, Result, ValidationError};
