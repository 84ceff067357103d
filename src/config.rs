//! Channel configuration.

use std::time::Duration;

use crate::protocol::MAX_FRAME_SIZE;

/// Tuning knobs for one broker channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Delay before retrying a failed connect. Retries are unbounded.
    pub reconnect_delay: Duration,
    /// Requests written per scheduler tick.
    pub max_batch_size: usize,
    /// Bytes requested from the socket per read call.
    pub read_chunk_size: usize,
    /// Largest response frame accepted.
    pub max_frame_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            max_batch_size: 15,
            read_chunk_size: 64 * 1024,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Zero is treated as one.
    #[must_use]
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }

    #[must_use]
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChannelConfig::default();

        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.max_batch_size, 15);
        assert_eq!(config.read_chunk_size, 65536);
        assert_eq!(config.max_frame_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_builder() {
        let config = ChannelConfig::new()
            .with_reconnect_delay(Duration::from_millis(50))
            .with_max_batch_size(0);

        assert_eq!(config.reconnect_delay, Duration::from_millis(50));
        assert_eq!(config.max_batch_size, 1);
    }
}
