//! Text form of reader messages: `"<key>,<payload>"` or the `"done"` sentinel.
//!
//! Only the first comma is significant; the payload may contain commas.

use std::fmt;

/// Sentinel line marking the end of a reader run
pub const DONE_SENTINEL: &str = "done";

/// A decoded line
#[derive(Debug, PartialEq, Eq)]
pub enum WireMessage<'a> {
    Reading { key: &'a str, payload: &'a str },
    Done,
}

/// A message that is neither the sentinel nor a keyed reading
#[derive(Debug, PartialEq, Eq)]
pub struct MalformedMessage(pub String);

impl fmt::Display for MalformedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "badly formatted message, expected <key>,<payload>: {:?}", self.0)
    }
}

impl std::error::Error for MalformedMessage {}

pub fn encode(key: &str, payload: &str) -> String {
    format!("{key},{payload}")
}

pub fn decode(line: &str) -> Result<WireMessage<'_>, MalformedMessage> {
    if line == DONE_SENTINEL {
        return Ok(WireMessage::Done);
    }
    match line.split_once(',') {
        Some((key, payload)) if !key.is_empty() => Ok(WireMessage::Reading { key, payload }),
        _ => Err(MalformedMessage(line.to_string())),
    }
}
