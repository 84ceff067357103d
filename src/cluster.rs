//! Brokers and the cluster they form.

use std::fmt;

use crate::error::{Error, ValidationError};
use crate::protocol::api::MetadataResponse;

/// Address of one broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    pub id: String,
    pub host: String,
    pub port: u16,
    pub rack: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: id.into(),
            host: host.into(),
            port,
            rack: None,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}:{}", self.id, self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub id: Option<String>,
    pub brokers: Vec<Node>,
}

impl Cluster {
    /// Parses `host:port[,host:port...]`. Bootstrap nodes are numbered
    /// "-1", "-2", ... since their real ids are not known yet.
    pub fn bootstrap(servers: &str) -> Result<Self, Error> {
        let brokers = servers
            .split(',')
            .enumerate()
            .map(|(index, server)| {
                let server = server.trim();
                let invalid = || Error::InvalidBootstrapServer {
                    server: server.to_owned(),
                };

                let (host, port) = server.rsplit_once(':').ok_or_else(invalid)?;
                if host.is_empty() {
                    return Err(invalid());
                }
                let port = port.parse::<u16>().map_err(|_| invalid())?;

                Ok(Node::new(format!("-{}", index + 1), host, port))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Self { id: None, brokers })
    }

    /// Topology as reported by a broker.
    pub fn from_metadata(metadata: &MetadataResponse) -> Result<Self, ValidationError> {
        let brokers = metadata
            .brokers
            .iter()
            .map(|broker| {
                let port = u16::try_from(broker.port).map_err(|_| ValidationError::IncorrectRange {
                    value: i64::from(broker.port),
                    lower: 0,
                    upper: i64::from(u16::MAX),
                })?;

                Ok(Node {
                    id: broker.node_id.to_string(),
                    host: broker.host.clone(),
                    port,
                    rack: broker.rack.clone(),
                })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        Ok(Self {
            id: metadata.cluster_id.clone(),
            brokers,
        })
    }

    pub fn broker(&self, id: &str) -> Option<&Node> {
        self.brokers.iter().find(|node| node.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::api::Broker;

    #[test]
    fn test_bootstrap() {
        let cluster = Cluster::bootstrap("kafka-1:9092, kafka-2:9093").unwrap();

        assert_eq!(cluster.id, None);
        assert_eq!(
            cluster.brokers,
            vec![Node::new("-1", "kafka-1", 9092), Node::new("-2", "kafka-2", 9093)]
        );
        assert_eq!(cluster.brokers[1].to_string(), "#-2 kafka-2:9093");
    }

    #[test]
    fn test_bootstrap_rejects_malformed_entries() {
        for servers in ["kafka-1", "kafka-1:port", ":9092", "kafka-1:70000", ""] {
            assert!(
                matches!(
                    Cluster::bootstrap(servers),
                    Err(Error::InvalidBootstrapServer { .. })
                ),
                "{servers}"
            );
        }
    }

    #[test]
    fn test_from_metadata() {
        let metadata = MetadataResponse {
            throttle_time_ms: 0,
            brokers: vec![Broker {
                node_id: 3,
                host: "kafka-3".to_owned(),
                port: 9092,
                rack: Some("eu-1a".to_owned()),
            }],
            cluster_id: Some("abc".to_owned()),
            controller_id: 3,
            topics: vec![],
        };

        let cluster = Cluster::from_metadata(&metadata).unwrap();
        assert_eq!(cluster.id.as_deref(), Some("abc"));
        assert_eq!(cluster.broker("3").and_then(|n| n.rack.as_deref()), Some("eu-1a"));
    }
}
