//! Newline framing of a connection's byte stream
//!
//! Bytes arrive in arbitrary chunks. The framer accumulates them and yields one
//! message per `\n`-terminated line, trimmed, skipping blank lines. A line that
//! grows past the size limit is discarded up to its terminating newline.

use tracing::warn;

use super::LISTENER_TARGET;

/// Accumulates raw bytes and splits them into text messages
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_line: usize,
    discarding: bool,
}

impl LineFramer {
    /// Create a framer that drops lines longer than `max_line` bytes
    pub fn new(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
            discarding: false,
        }
    }

    /// Feed a chunk; returns every message completed by it, in order
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut messages = Vec::new();
        let mut rest = bytes;

        while let Some(pos) = rest.iter().position(|byte| *byte == b'\n') {
            let head = &rest[..pos];
            rest = &rest[pos + 1..];

            if self.discarding {
                self.discarding = false;
                self.buffer.clear();
                continue;
            }
            if self.buffer.len() + head.len() > self.max_line {
                warn!(
                    target: LISTENER_TARGET,
                    bytes = self.buffer.len() + head.len(),
                    max = self.max_line,
                    "dropping oversized message"
                );
                self.buffer.clear();
                continue;
            }

            self.buffer.extend_from_slice(head);
            let line = std::mem::take(&mut self.buffer);
            if let Some(message) = decode_line(line) {
                messages.push(message);
            }
        }

        if !rest.is_empty() && !self.discarding {
            if self.buffer.len() + rest.len() > self.max_line {
                warn!(
                    target: LISTENER_TARGET,
                    max = self.max_line,
                    "message exceeds size limit, discarding until next newline"
                );
                self.buffer.clear();
                self.discarding = true;
            } else {
                self.buffer.extend_from_slice(rest);
            }
        }

        messages
    }

    /// Flush an unterminated final line at end of stream
    pub fn finish(&mut self) -> Option<String> {
        if std::mem::take(&mut self.discarding) {
            self.buffer.clear();
            return None;
        }
        decode_line(std::mem::take(&mut self.buffer))
    }

    /// Bytes buffered for the current incomplete line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(line: Vec<u8>) -> Option<String> {
    match String::from_utf8(line) {
        Ok(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else if trimmed.len() == text.len() {
                Some(text)
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(e) => {
            warn!(target: LISTENER_TARGET, error = %e, "dropping message that is not valid UTF-8");
            None
        }
    }
}
