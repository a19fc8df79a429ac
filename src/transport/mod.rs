//! Concrete [`PacketIO`](crate::traits::PacketIO) implementations.

mod channel;
mod udp;

pub use channel::ChannelTransport;
pub use udp::UdpTransport;
