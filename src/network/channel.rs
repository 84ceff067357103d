//! Pipelined request channel to one broker
//!
//! State machine:
//! ```text
//!  Disconnected ──connect──▶ Connecting ──established──▶ Connected
//!       ▲                        │                           │
//!       └──── failure (retry after reconnect_delay) ─────────┘
//!       └──────────────── close / error / disconnect ────────┘
//! ```
//!
//! `send` never blocks: requests wait in an outbound queue and are written in
//! batches of at most `max_batch_size` per scheduler tick, in send order. A
//! batch waits until the previous one has left the write buffer.
//! Written requests move to the in-flight queue and each response frame
//! resolves the oldest one; brokers answer in request order on a single
//! connection.

use std::collections::VecDeque;
use std::mem;

use futures::channel::oneshot;
use mio::Token;
use tracing::{debug, error, info, warn};

use super::connection::Connection;
use super::scheduler::{Scheduler, Task};
use super::transport::{Connector, Socket};
use crate::cluster::Node;
use crate::config::ChannelConfig;
use crate::core::Buffer;
use crate::error::{Error, ProtocolError};
use crate::protocol::{encode_request, ApiResponse, Decoder, Request, RequestHeaders};

/// Completion handle returned by [`Channel::send`].
pub type ResponseFuture = oneshot::Receiver<Result<ApiResponse, Error>>;

type Completion = oneshot::Sender<Result<ApiResponse, Error>>;

struct Outbound {
    request: Box<dyn Request>,
    correlation_id: i32,
    client_id: Option<String>,
    completion: Completion,
}

struct InFlight {
    headers: RequestHeaders,
    completion: Completion,
}

enum State<S> {
    Disconnected,
    Connecting(S),
    Connected(Connection<S>),
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// Readiness reported for a channel's socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

impl Readiness {
    pub const READABLE: Readiness = Readiness {
        readable: true,
        writable: false,
    };
    pub const WRITABLE: Readiness = Readiness {
        readable: false,
        writable: true,
    };
}

impl From<&mio::event::Event> for Readiness {
    fn from(event: &mio::event::Event) -> Self {
        Self {
            readable: event.is_readable() || event.is_read_closed() || event.is_error(),
            writable: event.is_writable() || event.is_error(),
        }
    }
}

/// Multiplexes requests to one node over one socket.
pub struct Channel<C: Connector> {
    token: Token,
    node: Node,
    connector: C,
    scheduler: Scheduler,
    config: ChannelConfig,
    decoder: Decoder,
    state: State<C::Socket>,
    outbound: VecDeque<Outbound>,
    in_flight: VecDeque<InFlight>,
    connect_scheduled: bool,
    drain_scheduled: bool,
    /// An explicit disconnect is waiting for the socket to close.
    closing: bool,
}

impl<C: Connector> Channel<C> {
    pub fn new(
        token: Token,
        node: Node,
        connector: C,
        scheduler: Scheduler,
        config: ChannelConfig,
    ) -> Self {
        Self {
            token,
            node,
            connector,
            scheduler,
            decoder: Decoder::new(config.max_frame_size),
            config,
            state: State::Disconnected,
            outbound: VecDeque::new(),
            in_flight: VecDeque::new(),
            connect_scheduled: false,
            drain_scheduled: false,
            closing: false,
        }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn state(&self) -> ChannelState {
        match self.state {
            State::Disconnected => ChannelState::Disconnected,
            State::Connecting(_) => ChannelState::Connecting,
            State::Connected(_) => ChannelState::Connected,
        }
    }

    /// Requests waiting to be written.
    pub fn queued(&self) -> usize {
        self.outbound.len()
    }

    /// Requests written and waiting for their response.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Queues `request` and returns its completion handle.
    pub fn send(
        &mut self,
        request: impl Request + 'static,
        correlation_id: i32,
        client_id: &str,
    ) -> ResponseFuture {
        self.ensure_connected();
        // A send during an explicit close asks for a new connection.
        self.closing = false;

        let (completion, future) = oneshot::channel();
        self.outbound.push_back(Outbound {
            request: Box::new(request),
            correlation_id,
            client_id: Some(client_id.to_owned()),
            completion,
        });

        if matches!(self.state, State::Connected(_)) {
            self.schedule_drain();
        }
        future
    }

    /// Runs a task the scheduler handed back.
    pub fn run(&mut self, task: Task) {
        match task {
            Task::Connect => {
                self.connect_scheduled = false;
                if matches!(self.state, State::Disconnected) {
                    self.connect();
                }
            }
            Task::ProcessQueue => {
                self.drain_scheduled = false;
                self.process_queue();
            }
        }
    }

    /// Handles socket readiness.
    pub fn on_ready(&mut self, readiness: Readiness) {
        match self.state {
            State::Disconnected => {}
            State::Connecting(_) => {
                if readiness.readable || readiness.writable {
                    self.finish_connect();
                }
            }
            State::Connected(_) => {
                if readiness.readable {
                    self.on_readable();
                }
                if readiness.writable && self.flush() {
                    self.resume_drain();
                }
            }
        }
    }

    /// Starts an orderly close. In-flight requests are rejected once the
    /// socket is gone; queued ones wait for the next connection.
    pub fn disconnect(&mut self) {
        match &mut self.state {
            State::Disconnected => {}
            State::Connecting(_) => {
                self.closing = true;
                self.cleanup();
            }
            State::Connected(connection) => {
                self.closing = true;
                let result = connection
                    .flush_write_buffer()
                    .and_then(|()| connection.shutdown());
                if let Err(err) = result {
                    warn!(node = %self.node, error = %err, "Error while closing connection");
                    self.cleanup();
                }
            }
        }
    }

    fn ensure_connected(&mut self) {
        if matches!(self.state, State::Disconnected) && !self.connect_scheduled {
            self.connect();
        }
    }

    fn connect(&mut self) {
        info!(node = %self.node, "Opening connection to node");

        match self.connector.connect(&self.node, self.token) {
            Ok(socket) => {
                self.state = State::Connecting(socket);
                self.finish_connect();
            }
            Err(err) => self.connect_failed(err),
        }
    }

    fn finish_connect(&mut self) {
        let State::Connecting(socket) = &mut self.state else {
            return;
        };

        match socket.poll_connect() {
            Ok(true) => {
                if let State::Connecting(socket) =
                    mem::replace(&mut self.state, State::Disconnected)
                {
                    self.initialize_connection(socket);
                }
            }
            Ok(false) => {}
            Err(err) => {
                if let State::Connecting(mut socket) =
                    mem::replace(&mut self.state, State::Disconnected)
                {
                    let _ = self.connector.release(&mut socket);
                }
                self.connect_failed(err);
            }
        }
    }

    fn connect_failed(&mut self, err: std::io::Error) {
        error!(
            node = %self.node,
            error = %err,
            retry_in = ?self.config.reconnect_delay,
            "Error while connecting to node"
        );

        self.state = State::Disconnected;
        self.connect_scheduled = true;
        self.scheduler
            .after(self.config.reconnect_delay, self.token, Task::Connect);
    }

    fn initialize_connection(&mut self, socket: C::Socket) {
        info!(node = %self.node, "Connection to node established");

        self.state = State::Connected(Connection::new(socket, self.config.read_chunk_size));
        self.schedule_drain();
    }

    fn schedule_drain(&mut self) {
        if !self.drain_scheduled {
            self.drain_scheduled = true;
            self.scheduler.next_tick(self.token, Task::ProcessQueue);
        }
    }

    fn process_queue(&mut self) {
        if self.closing || self.outbound.is_empty() {
            return;
        }
        let State::Connected(connection) = &mut self.state else {
            return;
        };
        if connection.write_pending() > 0 {
            // Resumed from `on_ready` once the socket accepts the backlog.
            return;
        }

        debug!(node = %self.node, queued = self.outbound.len(), "Processing message queue of node");

        let batch = self.config.max_batch_size.max(1).min(self.outbound.len());
        for entry in self.outbound.drain(..batch) {
            let headers = RequestHeaders::for_request(
                entry.request.as_ref(),
                entry.correlation_id,
                entry.client_id,
            );

            match encode_request(&headers, entry.request.as_ref()) {
                Ok(frame) => {
                    connection.queue_write(&frame);
                    self.in_flight.push_back(InFlight {
                        headers,
                        completion: entry.completion,
                    });
                }
                Err(err) => {
                    warn!(
                        node = %self.node,
                        correlation_id = headers.correlation_id(),
                        error = %err,
                        "Request could not be encoded"
                    );
                    let _ = entry.completion.send(Err(err.into()));
                }
            }
        }

        if !self.flush() {
            return;
        }
        if !self.outbound.is_empty() {
            self.schedule_drain();
        }
    }

    /// Re-arms the drain after a write backlog cleared.
    fn resume_drain(&mut self) {
        let State::Connected(connection) = &self.state else {
            return;
        };
        if connection.write_pending() == 0 && !self.closing && !self.outbound.is_empty() {
            self.schedule_drain();
        }
    }

    /// Pushes pending bytes to the socket; false if the connection was lost.
    fn flush(&mut self) -> bool {
        let State::Connected(connection) = &mut self.state else {
            return false;
        };

        match connection.flush_write_buffer() {
            Ok(()) => true,
            Err(err) => {
                warn!(node = %self.node, error = %err, "Error while writing to node");
                self.cleanup();
                false
            }
        }
    }

    fn on_readable(&mut self) {
        let State::Connected(connection) = &mut self.state else {
            return;
        };

        if let Err(err) = connection.fill_read_buffer() {
            warn!(node = %self.node, error = %err, "Error while reading from node");
            self.cleanup();
            return;
        }

        let mut frames = Vec::new();
        let mut broken = false;
        loop {
            match self.decoder.decode(connection.readable()) {
                Ok(Some((payload, consumed))) => {
                    frames.push(payload.to_vec());
                    connection.consume(consumed);
                }
                Ok(None) => break,
                Err(err) => {
                    error!(node = %self.node, error = %err, "Invalid frame received from node");
                    broken = true;
                    break;
                }
            }
        }
        let peer_closed = connection.is_peer_closed();

        for frame in frames {
            if !self.on_frame(frame) {
                broken = true;
                break;
            }
        }

        if broken {
            self.shutdown();
        } else if peer_closed {
            self.cleanup();
        }
    }

    /// Resolves the oldest in-flight request; false if the stream can no
    /// longer be trusted.
    fn on_frame(&mut self, frame: Vec<u8>) -> bool {
        debug!(node = %self.node, size = frame.len(), "Message received");

        let Some(entry) = self.in_flight.pop_front() else {
            warn!(node = %self.node, "Response received with no request in flight");
            return true;
        };

        let mut buffer = Buffer::from_content(frame);
        match entry.headers.parse_response(&mut buffer) {
            Err(err @ ProtocolError::CorrelationMismatch { .. }) => {
                error!(node = %self.node, error = %err, "Response does not match oldest request");
                let _ = entry.completion.send(Err(err.into()));
                false
            }
            result => {
                let _ = entry.completion.send(result.map_err(Error::from));
                true
            }
        }
    }

    fn shutdown(&mut self) {
        if let State::Connected(connection) = &mut self.state {
            let _ = connection.shutdown();
        }
        self.cleanup();
    }

    fn cleanup(&mut self) {
        info!(node = %self.node, in_flight = self.in_flight.len(), "Closing connection to node");

        match mem::replace(&mut self.state, State::Disconnected) {
            State::Disconnected => {}
            State::Connecting(mut socket) => {
                let _ = self.connector.release(&mut socket);
            }
            State::Connected(connection) => {
                let _ = self.connector.release(&mut connection.into_socket());
            }
        }

        for entry in self.in_flight.drain(..) {
            let _ = entry.completion.send(Err(Error::ConnectionClosed));
        }

        // A peer that accepts and then drops us is retried like a failed connect.
        let reconnect = !mem::take(&mut self.closing) && !self.outbound.is_empty();
        if reconnect && !self.connect_scheduled {
            self.connect_scheduled = true;
            self.scheduler
                .after(self.config.reconnect_delay, self.token, Task::Connect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    struct Refusing;

    struct NeverSocket;

    impl io::Read for NeverSocket {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }
    }

    impl io::Write for NeverSocket {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::WouldBlock.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Socket for NeverSocket {
        fn poll_connect(&mut self) -> io::Result<bool> {
            Ok(false)
        }

        fn shutdown(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Connector for Refusing {
        type Socket = NeverSocket;

        fn connect(&mut self, _node: &Node, _token: Token) -> io::Result<NeverSocket> {
            Err(io::ErrorKind::ConnectionRefused.into())
        }
    }

    #[test]
    fn test_send_while_retrying_does_not_reconnect() {
        let scheduler = Scheduler::new();
        let mut channel = Channel::new(
            Token(1),
            Node::new("-1", "localhost", 9092),
            Refusing,
            scheduler.clone(),
            ChannelConfig::default(),
        );

        let _first = channel.send(crate::protocol::api::ApiVersionsRequest, 1, "test");
        let _second = channel.send(crate::protocol::api::ApiVersionsRequest, 2, "test");

        assert_eq!(scheduler.timer_count(), 1);
        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert_eq!(channel.queued(), 2);
    }
}
