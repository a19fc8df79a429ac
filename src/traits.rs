use crate::error::TransportError;

/// A packet-oriented link the dispatcher reads from and writes to.
///
/// Methods take `&self` so one handle can be shared between the receive thread and any number of
/// senders; implementations do their own synchronisation. Each `send_packet` call must go out as
/// one unit, never interleaved with another send.
pub trait PacketIO: Send + Sync {
    fn open(&self) -> Result<(), TransportError>;

    fn is_open(&self) -> bool;

    fn send_packet(&self, packet: &[u8]) -> Result<(), TransportError>;

    /// Reads one packet into `buf` and returns its length.
    ///
    /// `Ok(0)` means nothing arrived. Must return within a bounded time so the caller can notice
    /// it has been asked to stop. `Err(TransportError::Closed)` means nothing will ever arrive.
    fn receive_packet(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    fn close(&self);
}
