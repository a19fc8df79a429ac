//! OSC data model and wire codec.
//!
//! Everything in here is pure: messages and bundles go in, bytes come out, and the other way
//! around. Nothing touches a socket or spawns a thread.

use derive_more::From;

pub mod decoder;
pub mod encoder;
mod text;

pub use decoder::{decode_bundle, decode_packet};
pub use encoder::{
    encode_bundle, encode_bundle_to_vec, encode_message, encode_message_to_vec, encoded_len,
};
pub use text::parse_message;

/// Literal that opens every bundle, NUL included.
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// 4 raw bytes carried by the `r` type tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }
}

/// A single typed OSC argument.
///
/// `Unknown` stands in for anything the codec has no payload layout for. It is written as the
/// `?` tag with no payload bytes, and any unrecognised tag on the wire decodes back to it.
#[derive(Clone, Debug, PartialEq, From)]
pub enum Argument {
    Int(i32),
    Float(f32),
    String(String),
    Bool(bool),
    Color(Color),
    #[from(skip)]
    Unknown,
}

impl From<&str> for Argument {
    fn from(value: &str) -> Self {
        Argument::String(value.to_string())
    }
}

impl Argument {
    /// Type tag character written for this argument.
    pub fn tag(&self) -> u8 {
        match self {
            Argument::Int(_) => b'i',
            Argument::Float(_) => b'f',
            Argument::String(_) => b's',
            Argument::Bool(true) => b'T',
            Argument::Bool(false) => b'F',
            Argument::Color(_) => b'r',
            Argument::Unknown => b'?',
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Argument::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Argument::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Argument::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Argument::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Argument::Color(v) => Some(*v),
            _ => None,
        }
    }
}

/// An OSC message: an address starting with `/` and an ordered list of arguments.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    pub address: String,
    pub args: Vec<Argument>,
}

impl Message {
    pub fn new(address: impl Into<String>) -> Self {
        Message {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(address: impl Into<String>, args: Vec<Argument>) -> Self {
        Message {
            address: address.into(),
            args,
        }
    }

    /// Appends an argument, builder style.
    pub fn arg(mut self, value: impl Into<Argument>) -> Self {
        self.args.push(value.into());
        self
    }
}

/// Opaque 8-byte bundle time tag. Its value is carried through but never interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeTag(pub [u8; 8]);

impl TimeTag {
    /// The OSC "immediately" tag: seconds 0, fraction 1.
    pub const IMMEDIATELY: TimeTag = TimeTag([0, 0, 0, 0, 0, 0, 0, 1]);
}

impl Default for TimeTag {
    fn default() -> Self {
        TimeTag::IMMEDIATELY
    }
}

/// A group of messages framed into a single packet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bundle {
    pub timetag: TimeTag,
    pub messages: Vec<Message>,
}

impl Bundle {
    pub fn new(messages: Vec<Message>) -> Self {
        Bundle {
            timetag: TimeTag::IMMEDIATELY,
            messages,
        }
    }
}

/// Rounds `len` up to the next multiple of 4.
pub(crate) fn pad4(len: usize) -> usize {
    (len + 3) & !3
}

/// On-wire size of a string: its bytes, a NUL, then zero padding to a multiple of 4.
pub(crate) fn padded_str_len(s: &str) -> usize {
    pad4(s.len() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padded_lengths() {
        assert_eq!(padded_str_len(""), 4);
        assert_eq!(padded_str_len("abc"), 4);
        assert_eq!(padded_str_len("abcd"), 8);
        assert_eq!(padded_str_len("/servo/1"), 12);
    }

    #[test]
    fn arguments_convert_from_plain_values() {
        let msg = Message::new("/mix")
            .arg(3)
            .arg(0.5f32)
            .arg("name")
            .arg(true)
            .arg(Color::new(1, 2, 3, 4));
        assert_eq!(
            msg.args,
            vec![
                Argument::Int(3),
                Argument::Float(0.5),
                Argument::String("name".to_string()),
                Argument::Bool(true),
                Argument::Color(Color::new(1, 2, 3, 4)),
            ]
        );
    }

    #[test]
    fn tags_follow_argument_kind() {
        let tags: Vec<u8> = [
            Argument::Int(0),
            Argument::Float(0.0),
            Argument::from("x"),
            Argument::Bool(true),
            Argument::Bool(false),
            Argument::Color(Color::default()),
            Argument::Unknown,
        ]
        .iter()
        .map(Argument::tag)
        .collect();
        assert_eq!(tags, b"ifsTFr?".to_vec());
    }
}
