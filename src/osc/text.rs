//! Human-readable form of a message, e.g. `/servo/1/position 512 "slow move"`.
//!
//! This has nothing to do with the wire format; it is for consoles, logs and the CLI.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::osc::{Argument, Message};

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Int(v) => write!(f, "{}", v),
            Argument::Float(v) => write!(f, "{}", v),
            Argument::String(s) => write!(f, "{}", s),
            Argument::Bool(b) => write!(f, "{}", b),
            Argument::Color(c) => write!(f, "rgba({},{},{},{})", c.r, c.g, c.b, c.a),
            Argument::Unknown => write!(f, "?"),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Integer first, then float, then plain string.
///
/// A float needs at least one digit so words like `inf` or `NaN` stay strings.
fn classify(token: &str) -> Argument {
    if let Ok(v) = token.parse::<i32>() {
        return Argument::Int(v);
    }
    if token.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(v) = token.parse::<f32>() {
            return Argument::Float(v);
        }
    }
    Argument::String(token.to_string())
}

/// Parses the space-separated text form into a message.
///
/// A token starting with `"` opens a quoted string that runs until a token ending with `"`; the
/// tokens in between are rejoined with single spaces. A bare `"` keeps the space after it, so
/// `/foo " x"` gives the string ` x`.
pub fn parse_message(text: &str) -> Result<Message, ParseError> {
    let mut tokens = text.split(' ').filter(|t| !t.is_empty()).enumerate();

    let (_, address) = tokens.next().ok_or(ParseError::MissingAddress)?;
    if !address.starts_with('/') {
        return Err(ParseError::InvalidAddress(address.to_string()));
    }

    let mut msg = Message::new(address);
    while let Some((position, token)) = tokens.next() {
        let Some(opened) = token.strip_prefix('"') else {
            msg.args.push(classify(token));
            continue;
        };

        if let Some(whole) = opened.strip_suffix('"') {
            msg.args.push(Argument::String(whole.to_string()));
            continue;
        }

        // A bare `"` contributes an empty first part, so the join restores its trailing space.
        let mut parts = vec![opened];
        loop {
            let (_, next) = tokens.next().ok_or(ParseError::UnterminatedQuote(position))?;
            if let Some(last) = next.strip_suffix('"') {
                parts.push(last);
                break;
            }
            parts.push(next);
        }
        msg.args.push(Argument::String(parts.join(" ")));
    }

    Ok(msg)
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_message(s)
    }
}
