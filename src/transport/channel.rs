use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use crate::error::TransportError;
use crate::traits::PacketIO;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// One end of an in-process packet link.
///
/// Whatever one end sends, the other receives, in order. Dropping an end disconnects the link:
/// the other end then reports [`TransportError::Closed`].
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
    open: AtomicBool,
    read_timeout: Duration,
}

impl ChannelTransport {
    /// Two connected ends, both closed until opened.
    pub fn pair() -> (Self, Self) {
        Self::pair_with_timeout(DEFAULT_READ_TIMEOUT)
    }

    pub fn pair_with_timeout(read_timeout: Duration) -> (Self, Self) {
        let (a_tx, b_rx) = unbounded();
        let (b_tx, a_rx) = unbounded();
        let end = |tx, rx| ChannelTransport {
            tx,
            rx,
            open: AtomicBool::new(false),
            read_timeout,
        };
        (end(a_tx, a_rx), end(b_tx, b_rx))
    }
}

impl PacketIO for ChannelTransport {
    fn open(&self) -> Result<(), TransportError> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_packet(&self, packet: &[u8]) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        self.tx
            .send(packet.to_vec())
            .map_err(|_| TransportError::Closed)
    }

    fn receive_packet(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if !self.is_open() {
            return Err(TransportError::Closed);
        }
        match self.rx.recv_timeout(self.read_timeout) {
            Ok(packet) if packet.len() > buf.len() => Err(TransportError::Oversized {
                size: packet.len(),
                max: buf.len(),
            }),
            Ok(packet) => {
                buf[..packet.len()].copy_from_slice(&packet);
                Ok(packet.len())
            }
            Err(RecvTimeoutError::Timeout) => Ok(0),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_pair() -> (ChannelTransport, ChannelTransport) {
        let (a, b) = ChannelTransport::pair_with_timeout(Duration::from_millis(10));
        a.open().unwrap();
        b.open().unwrap();
        (a, b)
    }

    #[test]
    fn packets_cross_in_order() {
        let (a, b) = open_pair();
        a.send_packet(b"one").unwrap();
        a.send_packet(b"two").unwrap();

        let mut buf = [0u8; 8];
        let len = b.receive_packet(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"one");
        let len = b.receive_packet(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"two");
        assert_eq!(b.receive_packet(&mut buf).unwrap(), 0);
    }

    #[test]
    fn closed_end_refuses_io() {
        let (a, b) = open_pair();
        a.close();
        assert!(!a.is_open());
        assert!(matches!(a.send_packet(b"x"), Err(TransportError::NotOpen)));
        let mut buf = [0u8; 8];
        assert!(matches!(
            a.receive_packet(&mut buf),
            Err(TransportError::Closed)
        ));
        drop(b);
    }

    #[test]
    fn dropped_peer_is_closed() {
        let (a, b) = open_pair();
        drop(b);
        let mut buf = [0u8; 8];
        assert!(matches!(
            a.receive_packet(&mut buf),
            Err(TransportError::Closed)
        ));
        assert!(matches!(a.send_packet(b"x"), Err(TransportError::Closed)));
    }

    #[test]
    fn packet_larger_than_buffer() {
        let (a, b) = open_pair();
        a.send_packet(&[0u8; 32]).unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(
            b.receive_packet(&mut buf),
            Err(TransportError::Oversized { size: 32, max: 8 })
        ));
    }
}
