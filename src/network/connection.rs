//! Buffered connection over a non-blocking socket
//!
//! Reads are accumulated until whole frames are available; writes that hit
//! `WouldBlock` stay queued until the socket is writable again.

use std::io::{self, Read, Write};

use super::transport::Socket;

/// Socket plus its read and pending-write buffers.
pub struct Connection<S> {
    socket: S,
    read_buffer: Vec<u8>,
    read_pos: usize,
    read_len: usize,
    read_chunk: usize,
    write_buffer: Vec<u8>,
    peer_closed: bool,
}

impl<S: Socket> Connection<S> {
    pub fn new(socket: S, read_chunk: usize) -> Self {
        Self {
            socket,
            read_buffer: vec![0u8; read_chunk],
            read_pos: 0,
            read_len: 0,
            read_chunk: read_chunk.max(1),
            write_buffer: Vec::new(),
            peer_closed: false,
        }
    }

    /// Reads everything the socket has to offer right now.
    ///
    /// Returns the number of unconsumed bytes. A zero-length read marks the
    /// peer as closed instead of failing, so frames that arrived before the
    /// close are still handed out.
    pub fn fill_read_buffer(&mut self) -> io::Result<usize> {
        // Compact
        if self.read_pos > 0 {
            self.read_buffer.copy_within(self.read_pos..self.read_len, 0);
            self.read_len -= self.read_pos;
            self.read_pos = 0;
        }

        while !self.peer_closed {
            if self.read_buffer.len() - self.read_len < self.read_chunk {
                self.read_buffer.resize(self.read_len + self.read_chunk, 0);
            }

            match self.socket.read(&mut self.read_buffer[self.read_len..]) {
                Ok(0) => self.peer_closed = true,
                Ok(n) => self.read_len += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(self.read_len - self.read_pos)
    }

    /// Unconsumed bytes.
    #[inline(always)]
    pub fn readable(&self) -> &[u8] {
        &self.read_buffer[self.read_pos..self.read_len]
    }

    #[inline(always)]
    pub fn consume(&mut self, n: usize) {
        self.read_pos += n.min(self.read_len - self.read_pos);
    }

    /// Queues bytes behind anything still pending.
    #[inline]
    pub fn queue_write(&mut self, data: &[u8]) {
        self.write_buffer.extend_from_slice(data);
    }

    /// Writes as much of the pending data as the socket accepts.
    pub fn flush_write_buffer(&mut self) -> io::Result<()> {
        let mut written = 0;
        let result = loop {
            if written == self.write_buffer.len() {
                break Ok(());
            }

            match self.socket.write(&self.write_buffer[written..]) {
                Ok(0) => {
                    break Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "Failed to write to socket",
                    ));
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };

        self.write_buffer.drain(..written);
        result.and_then(|()| self.socket.flush())
    }

    #[inline(always)]
    pub fn write_pending(&self) -> usize {
        self.write_buffer.len()
    }

    #[inline(always)]
    pub fn is_peer_closed(&self) -> bool {
        self.peer_closed
    }

    pub fn shutdown(&mut self) -> io::Result<()> {
        self.socket.shutdown()
    }

    pub fn into_socket(self) -> S {
        self.socket
    }
}
