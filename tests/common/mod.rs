//! In-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use kafka_channel::core::Buffer;
use kafka_channel::network::{Channel, Connector, Scheduler, Socket, Token};
use kafka_channel::protocol::api::{ApiVersion, ApiVersionsResponse};
use kafka_channel::protocol::{Decoder, Response};
use kafka_channel::{ChannelConfig, Node};

/// Both directions of one mock connection.
#[derive(Default)]
pub struct Wire {
    pub written: Vec<u8>,
    pub inbound: VecDeque<u8>,
    /// Peer closed: reads return 0 once `inbound` is drained.
    pub closed: bool,
    pub shutdown_requested: bool,
    /// Writes fail with `WouldBlock` while set.
    pub write_blocked: bool,
}

pub type SharedWire = Rc<RefCell<Wire>>;

pub struct MockSocket {
    wire: SharedWire,
    network: MockNetwork,
}

impl Read for MockSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        if wire.inbound.is_empty() {
            return if wire.closed {
                Ok(0)
            } else {
                Err(io::ErrorKind::WouldBlock.into())
            };
        }

        let n = buf.len().min(wire.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(wire.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut wire = self.wire.borrow_mut();
        if wire.write_blocked {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        wire.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Socket for MockSocket {
    fn poll_connect(&mut self) -> io::Result<bool> {
        Ok(!self.network.state.borrow().pending_connect)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        self.wire.borrow_mut().shutdown_requested = true;
        Ok(())
    }
}

#[derive(Default)]
struct NetworkState {
    failures_left: usize,
    attempts: usize,
    pending_connect: bool,
    wires: Vec<SharedWire>,
}

/// Handle on every connection the mock connector opened.
#[derive(Clone, Default)]
pub struct MockNetwork {
    state: Rc<RefCell<NetworkState>>,
}

impl MockNetwork {
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            network: self.clone(),
        }
    }

    /// The next `n` connect attempts are refused.
    pub fn refuse_next(&self, n: usize) {
        self.state.borrow_mut().failures_left = n;
    }

    /// Keeps new sockets in the connecting state until cleared.
    pub fn set_pending_connect(&self, pending: bool) {
        self.state.borrow_mut().pending_connect = pending;
    }

    pub fn attempts(&self) -> usize {
        self.state.borrow().attempts
    }

    pub fn connections(&self) -> usize {
        self.state.borrow().wires.len()
    }

    /// Most recently opened connection.
    pub fn wire(&self) -> SharedWire {
        match self.state.borrow().wires.last() {
            Some(wire) => Rc::clone(wire),
            None => panic!("no connection was opened"),
        }
    }
}

pub struct MockConnector {
    network: MockNetwork,
}

impl Connector for MockConnector {
    type Socket = MockSocket;

    fn connect(&mut self, _node: &Node, _token: Token) -> io::Result<MockSocket> {
        let mut state = self.network.state.borrow_mut();
        state.attempts += 1;
        if state.failures_left > 0 {
            state.failures_left -= 1;
            return Err(io::ErrorKind::ConnectionRefused.into());
        }

        let wire = SharedWire::default();
        state.wires.push(Rc::clone(&wire));
        Ok(MockSocket {
            wire,
            network: self.network.clone(),
        })
    }
}

pub fn node() -> Node {
    Node::new("-1", "localhost", 9092)
}

pub fn channel(
    network: &MockNetwork,
    scheduler: &Scheduler,
    config: ChannelConfig,
) -> Channel<MockConnector> {
    Channel::new(
        Token(7),
        node(),
        network.connector(),
        scheduler.clone(),
        config,
    )
}

/// Runs every task due now; returns how many ran.
pub fn run_due(channel: &mut Channel<MockConnector>, scheduler: &Scheduler) -> usize {
    run_due_at(channel, scheduler, Instant::now())
}

pub fn run_due_at(
    channel: &mut Channel<MockConnector>,
    scheduler: &Scheduler,
    now: Instant,
) -> usize {
    let due = scheduler.due(now);
    let count = due.len();
    for (token, task) in due {
        assert_eq!(token, channel.token());
        channel.run(task);
    }
    count
}

pub fn after_reconnect_delay() -> Instant {
    Instant::now() + Duration::from_millis(1100)
}

/// Header fields of one written request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub api_key: i16,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
    pub body: Vec<u8>,
}

/// Splits everything written on `wire` into requests.
pub fn sent_requests(wire: &SharedWire) -> Vec<SentRequest> {
    let written = wire.borrow().written.clone();
    let decoder = Decoder::default();
    let mut requests = Vec::new();
    let mut offset = 0;

    while let Some((frame, consumed)) = decoder.decode(&written[offset..]).unwrap() {
        let mut buffer = Buffer::from_content(frame);
        let api_key = buffer.read_short().unwrap();
        let api_version = buffer.read_short().unwrap();
        let correlation_id = buffer.read_int().unwrap();
        let client_id = match buffer.read_short().unwrap() {
            length if length < 0 => None,
            length => {
                let bytes = buffer.read(length as usize).unwrap().to_vec();
                Some(String::from_utf8(bytes).unwrap())
            }
        };

        requests.push(SentRequest {
            api_key,
            api_version,
            correlation_id,
            client_id,
            body: buffer.remaining_bytes().to_vec(),
        });
        offset += consumed;
    }

    assert_eq!(offset, written.len(), "trailing partial frame on the wire");
    requests
}

pub fn correlation_ids(wire: &SharedWire) -> Vec<i32> {
    sent_requests(wire)
        .into_iter()
        .map(|request| request.correlation_id)
        .collect()
}

/// ApiVersions v2 reply tagged with `throttle_time_ms` for identification.
pub fn api_versions_response(throttle_time_ms: i32) -> ApiVersionsResponse {
    ApiVersionsResponse {
        error_code: 0,
        api_versions: vec![ApiVersion {
            api_key: 18,
            min_version: 0,
            max_version: 2,
        }],
        throttle_time_ms,
    }
}

/// Complete response frame: length, correlation id, body.
pub fn response_frame(correlation_id: i32, body: &Buffer) -> Vec<u8> {
    let mut frame = Buffer::allocate(8 + body.length());
    frame.write_int(4 + body.length() as i64).unwrap();
    frame.write_int(i64::from(correlation_id)).unwrap();
    frame.write(body.bytes()).unwrap();
    frame.into_bytes()
}

/// ApiVersions v2 reply whose throttle time equals the correlation id.
pub fn api_versions_frame(correlation_id: i32) -> Vec<u8> {
    let schema = ApiVersionsResponse::schemas().schema(2).unwrap();
    let body = schema
        .encode(&api_versions_response(correlation_id).as_struct())
        .unwrap();
    response_frame(correlation_id, &body)
}

pub fn push_inbound(wire: &SharedWire, bytes: &[u8]) {
    wire.borrow_mut().inbound.extend(bytes.iter().copied());
}
