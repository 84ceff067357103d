//! Asks a bootstrap broker for its api versions and cluster metadata.
//!
//! # Usage
//!
//! ```text
//! RUST_LOG=debug cargo run --release --bin api_versions -- --bootstrap localhost:9092
//! ```
//!
//! # Options
//!
//! - `--bootstrap SERVERS` - `host:port[,host:port...]` (default: localhost:9092)
//! - `--client-id ID` - Client id sent in every request (default: api-versions)
//! - `--topic NAME` - Restrict metadata to a topic; repeatable (default: all topics)

use std::process;

use kafka_channel::network::Reactor;
use kafka_channel::protocol::api::{ApiVersionsRequest, MetadataRequest};
use kafka_channel::{ChannelConfig, Cluster, Error};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

struct Config {
    bootstrap: String,
    client_id: String,
    topics: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bootstrap: "localhost:9092".to_owned(),
            client_id: "api-versions".to_owned(),
            topics: Vec::new(),
        }
    }
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bootstrap" | "-b" => {
                if i + 1 < args.len() {
                    config.bootstrap = args[i + 1].clone();
                    i += 1;
                }
            }
            "--client-id" | "-c" => {
                if i + 1 < args.len() {
                    config.client_id = args[i + 1].clone();
                    i += 1;
                }
            }
            "--topic" | "-t" => {
                if i + 1 < args.len() {
                    config.topics.push(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Usage: api_versions [OPTIONS]\n");
                println!("Options:");
                println!("  -b, --bootstrap <SERVERS>  host:port list (default: localhost:9092)");
                println!("  -c, --client-id <ID>       Client id (default: api-versions)");
                println!("  -t, --topic <NAME>         Topic to describe, repeatable");
                println!("  -h, --help                 Show this help");
                process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn run(config: Config) -> Result<(), Error> {
    let cluster = Cluster::bootstrap(&config.bootstrap)?;
    let node = cluster
        .brokers
        .first()
        .cloned()
        .ok_or(Error::InvalidBootstrapServer {
            server: config.bootstrap.clone(),
        })?;

    let mut reactor = Reactor::new()?;
    let token = reactor.add_channel(node.clone(), ChannelConfig::default())?;

    let metadata_request = if config.topics.is_empty() {
        MetadataRequest::all_topics()
    } else {
        MetadataRequest::for_topics(config.topics)
    };

    let (mut versions, mut metadata) = match reactor.channel(token) {
        Some(channel) => (
            channel.send(ApiVersionsRequest, 1, &config.client_id),
            channel.send(metadata_request, 2, &config.client_id),
        ),
        None => return Err(Error::ConnectionClosed),
    };

    if let Some(versions) = reactor.block_on(&mut versions)?.into_api_versions() {
        info!(node = %node, error_code = versions.error_code, "Api versions received");
        for version in &versions.api_versions {
            info!(
                api_key = version.api_key,
                min = version.min_version,
                max = version.max_version,
                "Supported api"
            );
        }
    }

    if let Some(metadata) = reactor.block_on(&mut metadata)?.into_metadata() {
        let discovered = Cluster::from_metadata(&metadata)?;
        info!(
            cluster_id = ?discovered.id,
            controller_id = metadata.controller_id,
            brokers = discovered.brokers.len(),
            topics = metadata.topics.len(),
            "Metadata received"
        );
        for broker in &discovered.brokers {
            info!(broker = %broker, rack = ?broker.rack, "Broker");
        }
        for topic in &metadata.topics {
            info!(
                topic = %topic.name,
                error_code = topic.error_code,
                partitions = topic.partitions.len(),
                "Topic"
            );
        }
    }

    if let Some(channel) = reactor.channel(token) {
        channel.disconnect();
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = parse_args();

    if let Err(e) = run(config) {
        error!(error = %e, "api_versions failed");
        process::exit(1);
    }
}
