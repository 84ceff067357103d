//! Transport capability: sockets and the connector that opens them.
//!
//! The channel only sees these traits, so it can be driven by an in-memory
//! socket in tests and by mio in production.

use std::io::{self, Read, Write};
use std::net::{Shutdown, ToSocketAddrs};

use mio::net::TcpStream;
use mio::{Interest, Registry, Token};

use crate::cluster::Node;

/// Non-blocking byte stream to one broker.
pub trait Socket: Read + Write {
    /// `Ok(true)` once the connection is established, `Ok(false)` while it
    /// is still pending.
    fn poll_connect(&mut self) -> io::Result<bool>;

    /// Orderly close: no more writes, reads continue until the peer closes.
    fn shutdown(&mut self) -> io::Result<()>;
}

/// Opens sockets to nodes.
pub trait Connector {
    type Socket: Socket;

    /// Starts a non-blocking connect. Readiness for the socket is reported
    /// under `token`.
    fn connect(&mut self, node: &Node, token: Token) -> io::Result<Self::Socket>;

    /// Called before a socket is dropped.
    fn release(&mut self, _socket: &mut Self::Socket) -> io::Result<()> {
        Ok(())
    }
}

impl Socket for TcpStream {
    fn poll_connect(&mut self) -> io::Result<bool> {
        if let Some(err) = self.take_error()? {
            return Err(err);
        }

        match self.peer_addr() {
            Ok(_) => {
                self.set_nodelay(true)?;
                Ok(true)
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::NotConnected
                    || e.kind() == io::ErrorKind::WouldBlock =>
            {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Write)
    }
}

/// Connector over mio TCP streams registered with one poll registry.
pub struct MioConnector {
    registry: Registry,
}

impl MioConnector {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }
}

impl Connector for MioConnector {
    type Socket = TcpStream;

    fn connect(&mut self, node: &Node, token: Token) -> io::Result<TcpStream> {
        let addr = (node.host.as_str(), node.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("No address found for {}:{}", node.host, node.port),
                )
            })?;

        let mut stream = TcpStream::connect(addr)?;
        self.registry
            .register(&mut stream, token, Interest::READABLE | Interest::WRITABLE)?;
        Ok(stream)
    }

    fn release(&mut self, socket: &mut TcpStream) -> io::Result<()> {
        self.registry.deregister(socket)
    }
}
