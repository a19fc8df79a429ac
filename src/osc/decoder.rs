//! Packet decoding.
//!
//! Reads never go past the end of the slice handed in. Every byte count here matches the one the
//! encoder produces, so bundle walking by length prefix and by consumed bytes always agree for
//! packets this crate wrote.

use crate::error::DecodeError;
use crate::osc::{Argument, BUNDLE_TAG, Bundle, Color, Message, TimeTag, pad4};

/// Cursor over a packet slice.
struct Reader<'a> {
    buf: &'a [u8],
    index: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, index: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.index
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.index,
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.buf[self.index..self.index + n];
        self.index += n;
        Ok(bytes)
    }

    fn take_4(&mut self) -> Result<[u8; 4], DecodeError> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Reads a NUL-terminated string and skips its padding.
    fn string(&mut self) -> Result<&'a str, DecodeError> {
        let offset = self.index;
        let rest = &self.buf[offset..];
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(DecodeError::MissingTerminator { offset })?;
        let bytes = self.take(pad4(nul + 1))?;
        std::str::from_utf8(&bytes[..nul]).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }
}

fn decode_message(buf: &[u8]) -> Result<Message, DecodeError> {
    let mut reader = Reader::new(buf);
    let address = reader.string()?.to_string();

    let tags_offset = reader.index;
    let tags = reader.string()?;
    let tags = tags
        .strip_prefix(',')
        .ok_or(DecodeError::MissingTypeTags {
            offset: tags_offset,
        })?;

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.bytes() {
        let arg = match tag {
            b'i' => Argument::Int(i32::from_be_bytes(reader.take_4()?)),
            b'f' => Argument::Float(f32::from_be_bytes(reader.take_4()?)),
            b's' => Argument::String(reader.string()?.to_string()),
            b'T' => Argument::Bool(true),
            b'F' => Argument::Bool(false),
            b'r' => {
                let [r, g, b, a] = reader.take_4()?;
                Argument::Color(Color { r, g, b, a })
            }
            _ => Argument::Unknown,
        };
        args.push(arg);
    }

    Ok(Message { address, args })
}

/// Walks the elements of a bundle, appending every message found to `out`.
fn decode_bundle_into(buf: &[u8], out: &mut Vec<Message>) -> Result<TimeTag, DecodeError> {
    let mut reader = Reader::new(buf);
    if reader.take(BUNDLE_TAG.len()).ok() != Some(&BUNDLE_TAG[..]) {
        return Err(DecodeError::NotABundle);
    }
    let mut timetag = [0; 8];
    timetag.copy_from_slice(reader.take(8)?);

    while reader.remaining() > 0 {
        let size = u32::from_be_bytes(reader.take_4()?) as usize;
        let offset = reader.index;
        if size > reader.remaining() {
            return Err(DecodeError::ElementOverrun {
                offset,
                size,
                available: reader.remaining(),
            });
        }
        // Skip past by the length prefix, not by whatever the element decode consumed.
        let element = reader.take(size)?;
        if element.is_empty() {
            continue;
        }
        decode_into(element, out)?;
    }

    Ok(TimeTag(timetag))
}

fn decode_into(buf: &[u8], out: &mut Vec<Message>) -> Result<(), DecodeError> {
    match buf.first() {
        None => Err(DecodeError::Empty),
        Some(b'/') => {
            out.push(decode_message(buf)?);
            Ok(())
        }
        Some(b'#') => decode_bundle_into(buf, out).map(|_| ()),
        Some(other) => Err(DecodeError::UnknownPacketKind(*other)),
    }
}

/// Decodes a raw packet into the messages it carries, in packet order.
///
/// Nested bundles are flattened. Any malformed part rejects the whole packet.
pub fn decode_packet(buf: &[u8]) -> Result<Vec<Message>, DecodeError> {
    let mut messages = Vec::new();
    decode_into(buf, &mut messages)?;
    Ok(messages)
}

/// Decodes a packet that must be a bundle, keeping its time tag.
pub fn decode_bundle(buf: &[u8]) -> Result<Bundle, DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::Empty);
    }
    let mut messages = Vec::new();
    let timetag = decode_bundle_into(buf, &mut messages)?;
    Ok(Bundle { timetag, messages })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ints_floats_and_strings() {
        let bytes = [
            b'/', b'm', 0, 0, //
            b',', b'i', b'f', b's', 0, 0, 0, 0, //
            0, 0, 0x02, 0x00, // 512
            0x3f, 0xc0, 0x00, 0x00, // 1.5
            b'o', b'k', 0, 0,
        ];
        let messages = decode_packet(&bytes).unwrap();
        assert_eq!(
            messages,
            vec![Message::new("/m").arg(512).arg(1.5f32).arg("ok")]
        );
    }

    #[test]
    fn unknown_tag_consumes_nothing() {
        let bytes = b"/u\0\0,?i\0\0\0\0\x07";
        let messages = decode_packet(bytes).unwrap();
        assert_eq!(
            messages[0].args,
            vec![Argument::Unknown, Argument::Int(7)]
        );
    }

    #[test]
    fn trailing_zero_padding_is_ignored() {
        let mut bytes = b"/p\0\0,i\0\0\0\0\0\x01".to_vec();
        bytes.resize(64, 0);
        let messages = decode_packet(&bytes).unwrap();
        assert_eq!(messages, vec![Message::new("/p").arg(1)]);
    }

    #[test]
    fn empty_packet() {
        assert_eq!(decode_packet(&[]), Err(DecodeError::Empty));
    }

    #[test]
    fn unknown_first_byte() {
        assert_eq!(
            decode_packet(b"xyz\0"),
            Err(DecodeError::UnknownPacketKind(b'x'))
        );
    }

    #[test]
    fn hash_without_bundle_literal() {
        assert_eq!(
            decode_packet(b"#bungle\0\0\0\0\0\0\0\0\0"),
            Err(DecodeError::NotABundle)
        );
        assert_eq!(decode_packet(b"#bu"), Err(DecodeError::NotABundle));
    }

    #[test]
    fn address_without_terminator() {
        assert_eq!(
            decode_packet(b"/abc"),
            Err(DecodeError::MissingTerminator { offset: 0 })
        );
    }

    #[test]
    fn padding_past_end_is_truncation() {
        // NUL present but the padding word is cut short
        assert!(matches!(
            decode_packet(b"/abcd\0"),
            Err(DecodeError::Truncated { offset: 0, .. })
        ));
    }

    #[test]
    fn missing_comma_in_type_tags() {
        assert_eq!(
            decode_packet(b"/a\0\0i\0\0\0"),
            Err(DecodeError::MissingTypeTags { offset: 4 })
        );
    }

    #[test]
    fn short_int_payload() {
        assert!(matches!(
            decode_packet(b"/a\0\0,i\0\0\0\0"),
            Err(DecodeError::Truncated { offset: 8, needed: 4, .. })
        ));
    }

    #[test]
    fn bundle_element_overrunning_packet() {
        let mut bytes = BUNDLE_TAG.to_vec();
        bytes.extend_from_slice(&[0; 8]);
        bytes.extend_from_slice(&100u32.to_be_bytes());
        bytes.extend_from_slice(b"/a\0\0,\0\0\0");
        assert!(matches!(
            decode_packet(&bytes),
            Err(DecodeError::ElementOverrun { size: 100, .. })
        ));
    }

    #[test]
    fn bundle_keeps_timetag() {
        let mut bytes = BUNDLE_TAG.to_vec();
        bytes.extend_from_slice(&[9, 8, 7, 6, 5, 4, 3, 2]);
        bytes.extend_from_slice(&8u32.to_be_bytes());
        bytes.extend_from_slice(b"/a\0\0,\0\0\0");
        let bundle = decode_bundle(&bytes).unwrap();
        assert_eq!(bundle.timetag, TimeTag([9, 8, 7, 6, 5, 4, 3, 2]));
        assert_eq!(bundle.messages, vec![Message::new("/a")]);
    }

    #[test]
    fn nested_bundles_are_flattened() {
        let mut inner = BUNDLE_TAG.to_vec();
        inner.extend_from_slice(&[0; 8]);
        inner.extend_from_slice(&8u32.to_be_bytes());
        inner.extend_from_slice(b"/in\0,\0\0\0");

        let mut outer = BUNDLE_TAG.to_vec();
        outer.extend_from_slice(&[0; 8]);
        outer.extend_from_slice(&8u32.to_be_bytes());
        outer.extend_from_slice(b"/a\0\0,\0\0\0");
        outer.extend_from_slice(&(inner.len() as u32).to_be_bytes());
        outer.extend_from_slice(&inner);

        let messages = decode_packet(&outer).unwrap();
        assert_eq!(messages, vec![Message::new("/a"), Message::new("/in")]);
    }

    #[test]
    fn zero_length_elements_are_skipped() {
        let mut bytes = BUNDLE_TAG.to_vec();
        bytes.extend_from_slice(&[0; 8]);
        bytes.extend_from_slice(&8u32.to_be_bytes());
        bytes.extend_from_slice(b"/a\0\0,\0\0\0");
        bytes.extend_from_slice(&[0; 12]);
        assert_eq!(decode_packet(&bytes).unwrap(), vec![Message::new("/a")]);
    }
}
