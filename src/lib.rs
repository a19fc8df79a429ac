//! Open Sound Control over packet transports.
//!
//! [`osc`] holds the wire codec and the text form of messages, [`dispatch`] the background
//! receive loop and handler routing, [`transport`] the UDP and in-process links.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod osc;
pub mod shared;
pub mod traits;
pub mod transport;

pub use config::DispatcherConfig;
pub use dispatch::{DispatchStats, Dispatcher, Handler, HandlerRegistry, State};
pub use error::{DecodeError, DispatchError, EncodeError, ParseError, TransportError};
pub use osc::{Argument, Bundle, Color, Message, TimeTag};
pub use traits::PacketIO;
