//! Message and bundle encoding.
//!
//! The exact output size is computed before anything is written, so a destination buffer that
//! is too small is rejected up front and never ends up holding a partial packet.

use crate::error::EncodeError;
use crate::osc::{Argument, BUNDLE_TAG, Bundle, Message, TimeTag, pad4, padded_str_len};

/// `#bundle\0` plus the 8-byte time tag.
const BUNDLE_HEADER_LEN: usize = 16;

fn payload_len(arg: &Argument) -> usize {
    match arg {
        Argument::Int(_) | Argument::Float(_) | Argument::Color(_) => 4,
        Argument::String(s) => padded_str_len(s),
        Argument::Bool(_) | Argument::Unknown => 0,
    }
}

/// Number of bytes `msg` occupies on the wire.
pub fn encoded_len(msg: &Message) -> usize {
    // ',' + one tag per argument + NUL
    let tags = pad4(msg.args.len() + 2);
    padded_str_len(&msg.address) + tags + msg.args.iter().map(payload_len).sum::<usize>()
}

fn validate(msg: &Message) -> Result<(), EncodeError> {
    if !msg.address.starts_with('/') {
        return Err(EncodeError::InvalidAddress(msg.address.clone()));
    }
    if msg.address.contains('\0') {
        return Err(EncodeError::InteriorNul(msg.address.clone()));
    }
    for arg in &msg.args {
        if let Argument::String(s) = arg {
            if s.contains('\0') {
                return Err(EncodeError::InteriorNul(s.clone()));
            }
        }
    }
    Ok(())
}

fn check_capacity(needed: usize, buf: &[u8]) -> Result<(), EncodeError> {
    if buf.len() < needed {
        return Err(EncodeError::BufferTooSmall {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

fn write_bytes(out: &mut [u8], at: usize, bytes: &[u8]) -> usize {
    out[at..at + bytes.len()].copy_from_slice(bytes);
    at + bytes.len()
}

fn write_str(out: &mut [u8], at: usize, s: &str) -> usize {
    let end = at + padded_str_len(s);
    let text_end = write_bytes(out, at, s.as_bytes());
    out[text_end..end].fill(0);
    end
}

/// Writes a validated message whose size has already been checked against `out`.
fn write_message(msg: &Message, out: &mut [u8]) -> usize {
    let tags_at = write_str(out, 0, &msg.address);
    let tags_len = pad4(msg.args.len() + 2);

    let mut index = tags_at + tags_len;
    for arg in &msg.args {
        index = match arg {
            Argument::Int(v) => write_bytes(out, index, &v.to_be_bytes()),
            Argument::Float(v) => write_bytes(out, index, &v.to_be_bytes()),
            Argument::String(s) => write_str(out, index, s),
            Argument::Color(c) => write_bytes(out, index, &[c.r, c.g, c.b, c.a]),
            Argument::Bool(_) | Argument::Unknown => index,
        };
    }

    // Tags go into the slot reserved above, now that the payloads are laid out.
    out[tags_at] = b',';
    for (i, arg) in msg.args.iter().enumerate() {
        out[tags_at + 1 + i] = arg.tag();
    }
    out[tags_at + 1 + msg.args.len()..tags_at + tags_len].fill(0);

    index
}

/// Encodes `msg` into `buf`, returning the number of bytes written.
pub fn encode_message(msg: &Message, buf: &mut [u8]) -> Result<usize, EncodeError> {
    validate(msg)?;
    let needed = encoded_len(msg);
    check_capacity(needed, buf)?;
    Ok(write_message(msg, &mut buf[..needed]))
}

pub fn encode_message_to_vec(msg: &Message) -> Result<Vec<u8>, EncodeError> {
    let mut buf = vec![0; encoded_len(msg)];
    encode_message(msg, &mut buf)?;
    Ok(buf)
}

fn bundle_len(messages: &[Message]) -> usize {
    BUNDLE_HEADER_LEN + messages.iter().map(|m| 4 + encoded_len(m)).sum::<usize>()
}

fn write_bundle(
    timetag: TimeTag,
    messages: &[Message],
    buf: &mut [u8],
) -> Result<usize, EncodeError> {
    for msg in messages {
        validate(msg)?;
    }
    let needed = bundle_len(messages);
    check_capacity(needed, buf)?;

    let mut index = write_bytes(buf, 0, BUNDLE_TAG);
    index = write_bytes(buf, index, &timetag.0);
    for msg in messages {
        let len = encoded_len(msg);
        index = write_bytes(buf, index, &(len as u32).to_be_bytes());
        index += write_message(msg, &mut buf[index..index + len]);
    }
    Ok(index)
}

/// Encodes several messages as one packet.
///
/// A single message is written bare, byte-identical to [`encode_message`]. Anything else gets
/// bundle framing with the [`TimeTag::IMMEDIATELY`] time tag.
pub fn encode_bundle(messages: &[Message], buf: &mut [u8]) -> Result<usize, EncodeError> {
    match messages {
        [single] => encode_message(single, buf),
        _ => write_bundle(TimeTag::IMMEDIATELY, messages, buf),
    }
}

pub fn encode_bundle_to_vec(messages: &[Message]) -> Result<Vec<u8>, EncodeError> {
    let len = match messages {
        [single] => encoded_len(single),
        _ => bundle_len(messages),
    };
    let mut buf = vec![0; len];
    encode_bundle(messages, &mut buf)?;
    Ok(buf)
}

impl Bundle {
    /// Size of the bundle on the wire, framing included.
    pub fn encoded_len(&self) -> usize {
        bundle_len(&self.messages)
    }

    /// Encodes with bundle framing and this bundle's time tag, even for a single message.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, EncodeError> {
        write_bundle(self.timetag, &self.messages, buf)
    }

    pub fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = vec![0; self.encoded_len()];
        self.encode(&mut buf)?;
        Ok(buf)
    }
}
