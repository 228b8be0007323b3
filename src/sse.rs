//! Server-sent event wire primitives shared by the relay and the
//! client.
//!
//! Events on the wire are a single `data: <payload>` line followed by
//! a blank line. The payload `[DONE]` marks the end of a completion.

use bytes::Bytes;

pub const DATA_PREFIX: &str = "data: ";
pub const DONE: &str = "[DONE]";

/// Encode a payload as one SSE event.
pub fn encode_event(payload: &str) -> Bytes {
    Bytes::from(format!("{}{}\n\n", DATA_PREFIX, payload))
}

#[derive(Debug, PartialEq)]
pub enum SseLine<'a> {
    Blank,
    Data(&'a str),
    /// Anything without the `data: ` prefix (comments, `event:` fields...)
    Other(&'a str),
}

pub fn classify(line: &str) -> SseLine<'_> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        SseLine::Blank
    } else if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
        SseLine::Data(payload)
    } else {
        SseLine::Other(line)
    }
}

/// Streaming UTF-8 decoder.
///
/// A code point split across two reads is held back until the rest of
/// it arrives. Invalid bytes are dropped one at a time, with decoding
/// retried from the following byte.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    // The prefix up to `valid_up_to` is known to be valid
                    out.push_str(
                        std::str::from_utf8(&self.pending[..valid_up_to]).unwrap_or_default(),
                    );
                    match e.error_len() {
                        // Incomplete sequence at the end, wait for more bytes
                        None => {
                            self.pending.drain(..valid_up_to);
                            break;
                        }
                        Some(_) => {
                            tracing::warn!(
                                "Dropping undecodable byte 0x{:02x}",
                                self.pending[valid_up_to]
                            );
                            self.pending.drain(..=valid_up_to);
                        }
                    }
                }
            }
        }

        out
    }

    /// Bytes of an unfinished code point still waiting for the rest
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

/// Splits decoded text into complete lines, carrying an unterminated
/// tail over to the next read.
#[derive(Debug, Default)]
pub struct LineBuffer {
    decoder: Utf8Decoder,
    carry: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.push_str(&self.decoder.decode(chunk));

        let Some(last_newline) = self.carry.rfind('\n') else {
            return Vec::new();
        };
        let tail = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, tail);

        complete
            .strip_suffix('\n')
            .unwrap_or(&complete)
            .split('\n')
            .map(str::to_string)
            .collect()
    }

    /// Discard whatever is left without a terminating newline and
    /// return it.
    pub fn finish(&mut self) -> String {
        std::mem::take(&mut self.carry)
    }

    pub fn has_partial_line(&self) -> bool {
        !self.carry.is_empty() || self.decoder.pending() > 0
    }
}
