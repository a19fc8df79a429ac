use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use crate::error::TransportError;
use crate::shared::Shared;
use crate::traits::PacketIO;

/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM: usize = 65_507;

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(100);

/// UDP link: bound to a local address, sending every packet to one remote address.
///
/// Packets are accepted from any sender. A datagram that does not fit the caller's buffer is
/// reported as [`TransportError::Oversized`] rather than truncated.
pub struct UdpTransport {
    local: SocketAddr,
    remote: SocketAddr,
    read_timeout: Duration,
    socket: Shared<Option<Arc<UdpSocket>>>,
    // Datagrams land here first so their real size is known.
    scratch: Shared<Vec<u8>>,
}

impl UdpTransport {
    pub fn new(local: SocketAddr, remote: SocketAddr) -> Self {
        UdpTransport {
            local,
            remote,
            read_timeout: DEFAULT_READ_TIMEOUT,
            socket: Shared::new(None),
            scratch: Shared::new(vec![0u8; MAX_DATAGRAM]),
        }
    }

    /// Upper bound on how long a single `receive_packet` call blocks. Zero is raised to 1ms.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout.max(Duration::from_millis(1));
        self
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    /// Address the socket is actually bound to, once open. Useful after binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket().and_then(|socket| socket.local_addr().ok())
    }

    fn socket(&self) -> Option<Arc<UdpSocket>> {
        self.socket.with(|socket| socket.clone())
    }
}

impl PacketIO for UdpTransport {
    fn open(&self) -> Result<(), TransportError> {
        self.socket.with_mut(|slot| -> Result<(), TransportError> {
            if slot.is_some() {
                return Ok(());
            }
            let socket = UdpSocket::bind(self.local)?;
            socket.set_read_timeout(Some(self.read_timeout))?;
            info!(
                "UDP transport bound to {}, sending to {}",
                socket.local_addr()?,
                self.remote
            );
            *slot = Some(Arc::new(socket));
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        self.socket.with(Option::is_some)
    }

    fn send_packet(&self, packet: &[u8]) -> Result<(), TransportError> {
        if packet.len() > MAX_DATAGRAM {
            return Err(TransportError::Oversized {
                size: packet.len(),
                max: MAX_DATAGRAM,
            });
        }
        let socket = self.socket().ok_or(TransportError::NotOpen)?;
        socket.send_to(packet, self.remote)?;
        Ok(())
    }

    fn receive_packet(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let socket = self.socket().ok_or(TransportError::Closed)?;
        self.scratch.with_mut(|scratch| match socket.recv_from(scratch) {
            Ok((len, from)) if len > buf.len() => {
                debug!("dropping {} byte datagram from {}", len, from);
                Err(TransportError::Oversized {
                    size: len,
                    max: buf.len(),
                })
            }
            Ok((len, from)) => {
                debug!("received {} bytes from {}", len, from);
                buf[..len].copy_from_slice(&scratch[..len]);
                Ok(len)
            }
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Ok(0)
            }
            Err(err) => Err(err.into()),
        })
    }

    fn close(&self) {
        if self.socket.with_mut(Option::take).is_some() {
            info!("UDP transport on {} closed", self.local);
        }
    }
}
