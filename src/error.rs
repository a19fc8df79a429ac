//! Error types for the codec, the transports and the dispatcher.

use std::io;

/// Failure to lay a message or bundle out into a destination buffer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("invalid address {0:?}: must start with '/'")]
    InvalidAddress(String),

    #[error("string contains a NUL byte: {0:?}")]
    InteriorNul(String),
}

/// A packet that could not be decoded. The whole packet is discarded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty packet")]
    Empty,

    #[error("unknown packet kind: first byte {0:#04x}")]
    UnknownPacketKind(u8),

    #[error("packet starts with '#' but is not a bundle")]
    NotABundle,

    #[error("string at offset {offset} has no NUL terminator")]
    MissingTerminator { offset: usize },

    #[error("truncated packet: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("type tag string at offset {offset} does not start with ','")]
    MissingTypeTags { offset: usize },

    #[error("string at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("bundle element at offset {offset} claims {size} bytes, only {available} left")]
    ElementOverrun {
        offset: usize,
        size: usize,
        available: usize,
    },
}

/// Errors reported by a [`PacketIO`](crate::traits::PacketIO) implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("transport is not open")]
    NotOpen,

    /// The transport will never deliver again. Ends the receive loop.
    #[error("transport closed")]
    Closed,

    #[error("packet of {size} bytes exceeds the {max} byte limit")]
    Oversized { size: usize, max: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("a handler is already registered for {0}")]
    DuplicateHandlerAddress(String),

    #[error("dispatcher is already running")]
    AlreadyRunning,

    #[error("dispatcher has been stopped")]
    Stopped,

    #[error("failed to spawn receive thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Failure to read the text form of a message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no address in message text")]
    MissingAddress,

    #[error("invalid address {0:?}: must start with '/'")]
    InvalidAddress(String),

    #[error("quoted string starting at token {0} is never closed")]
    UnterminatedQuote(usize),
}
