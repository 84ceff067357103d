//! Network layer: per-broker channels on a mio reactor
//!
//! - `transport`: socket and connector capabilities
//! - `connection`: buffered reads and partial-write handling
//! - `scheduler`: next-tick and timer queues
//! - `channel`: the pipelined request state machine
//! - `reactor`: the poll loop that drives them

mod channel;
mod connection;
mod reactor;
mod scheduler;
mod transport;

pub use channel::{Channel, ChannelState, Readiness, ResponseFuture};
pub use connection::Connection;
pub use reactor::Reactor;
pub use scheduler::{Scheduler, Task};
pub use transport::{Connector, MioConnector, Socket};

pub use mio::Token;
