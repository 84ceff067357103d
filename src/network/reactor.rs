//! Event loop driving every channel.
//!
//! One `mio::Poll` reports socket readiness; the [`Scheduler`] holds next-tick
//! and timer work. Each turn dispatches readiness first, then due tasks.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use mio::{Events, Poll, Token};
use tracing::trace;

use super::channel::{Channel, ResponseFuture};
use super::scheduler::Scheduler;
use super::transport::MioConnector;
use crate::cluster::Node;
use crate::config::ChannelConfig;
use crate::error::Error;
use crate::protocol::ApiResponse;

const EVENTS_CAPACITY: usize = 1024;
const DEFAULT_WAIT: Duration = Duration::from_millis(100);

pub struct Reactor {
    poll: Poll,
    events: Events,
    scheduler: Scheduler,
    channels: HashMap<Token, Channel<MioConnector>>,
    next_token: usize,
}

impl Reactor {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(EVENTS_CAPACITY),
            scheduler: Scheduler::new(),
            channels: HashMap::new(),
            next_token: 0,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Adds a channel to `node`; nothing is connected until the first send.
    pub fn add_channel(&mut self, node: Node, config: ChannelConfig) -> io::Result<Token> {
        let token = Token(self.next_token);
        self.next_token += 1;

        let connector = MioConnector::new(self.poll.registry().try_clone()?);
        self.channels.insert(
            token,
            Channel::new(token, node, connector, self.scheduler.clone(), config),
        );
        Ok(token)
    }

    pub fn channel(&mut self, token: Token) -> Option<&mut Channel<MioConnector>> {
        self.channels.get_mut(&token)
    }

    /// One poll followed by every task due afterwards.
    ///
    /// Waits at most `max_wait`, less if a tick or timer is pending.
    pub fn turn(&mut self, max_wait: Duration) -> io::Result<()> {
        let timeout = if self.scheduler.has_ticks() {
            Duration::ZERO
        } else {
            self.scheduler
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .map_or(max_wait, |until| until.min(max_wait))
        };

        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }

        for event in self.events.iter() {
            if let Some(channel) = self.channels.get_mut(&event.token()) {
                channel.on_ready(event.into());
            }
        }

        for (token, task) in self.scheduler.due(Instant::now()) {
            trace!(token = token.0, ?task, "Running scheduled task");
            if let Some(channel) = self.channels.get_mut(&token) {
                channel.run(task);
            }
        }
        Ok(())
    }

    /// Turns the loop until `future` resolves.
    ///
    /// A dropped completion handle means its channel went away.
    pub fn block_on(&mut self, future: &mut ResponseFuture) -> Result<ApiResponse, Error> {
        loop {
            match future.try_recv() {
                Ok(Some(result)) => return result,
                Ok(None) => {}
                Err(_canceled) => return Err(Error::ConnectionClosed),
            }
            self.turn(DEFAULT_WAIT)?;
        }
    }
}
