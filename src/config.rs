use std::time::Duration;

/// Tuning knobs for a [`Dispatcher`](crate::dispatch::Dispatcher).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Largest inbound packet accepted.
    pub receive_buffer_size: usize,
    /// Largest outbound packet `send` and `send_batch` will encode.
    pub send_buffer_size: usize,
    /// Pause after a read that returned no data.
    pub poll_interval: Duration,
    /// How long `stop` waits for the receive thread before warning that it is slow to exit.
    pub stop_timeout: Duration,
    /// Send the whole send buffer, trailing zeros included, instead of just the encoded bytes.
    /// Some peers expect fixed-size packets.
    pub pad_to_buffer: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfig {
            receive_buffer_size: 1000,
            send_buffer_size: 1000,
            poll_interval: Duration::from_millis(500),
            stop_timeout: Duration::from_secs(1),
            pad_to_buffer: false,
        }
    }
}

impl DispatcherConfig {
    pub fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }

    pub fn with_send_buffer_size(mut self, size: usize) -> Self {
        self.send_buffer_size = size;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    pub fn with_pad_to_buffer(mut self, pad: bool) -> Self {
        self.pad_to_buffer = pad;
        self
    }
}
