//! Line-based codec for the serial stream.
//!
//! Commands are terminated with a carriage return (`\r`), replies with
//! `\r\n`. The decoder treats either byte as a terminator so it works in both
//! directions and with terminals that send `\n` or `\r\n`.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use bytes::{Buf, BufMut, BytesMut};

/// Maximum length of a single line. Longer lines are truncated.
pub const MAX_LINE_LENGTH: usize = 64;

/// Terminator appended to commands.
pub const COMMAND_TERMINATOR: u8 = b'\r';

/// Terminator appended to replies.
pub const REPLY_TERMINATOR: &[u8] = b"\r\n";

fn is_terminator(byte: u8) -> bool {
    byte == b'\r' || byte == b'\n'
}

/// A codec for reading and writing protocol lines.
///
/// Bytes are accumulated until a terminator is seen. A line that grows past
/// the maximum length is cut at that length and the rest of it is dropped up
/// to its terminator, so a flood of garbage cannot grow the buffer without
/// bound.
#[derive(Debug)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    /// Maximum accepted line length.
    max_line_length: usize,
    /// Bytes of the line currently being received.
    line_len: usize,
    /// Dropping the tail of an overlong line.
    discarding: bool,
    /// Number of lines that were truncated.
    truncated_lines: u64,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Create a new line codec with the default maximum line length.
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    /// Create a line codec accepting lines of up to `max_line_length` bytes.
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(max_line_length * 2),
            max_line_length: max_line_length.max(1),
            line_len: 0,
            discarding: false,
            truncated_lines: 0,
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        for &byte in data {
            if self.discarding {
                if is_terminator(byte) {
                    self.discarding = false;
                    self.line_len = 0;
                    self.buffer.put_u8(byte);
                }
                continue;
            }

            self.buffer.put_u8(byte);

            if is_terminator(byte) {
                self.line_len = 0;
                continue;
            }

            self.line_len += 1;
            if self.line_len == self.max_line_length {
                // Close the line here; the remainder is dropped.
                self.buffer.put_u8(b'\n');
                self.discarding = true;
                self.truncated_lines += 1;
                log::debug!("truncated line at {} bytes", self.max_line_length);
            }
        }
    }

    /// Try to decode any complete, non-empty line from the buffer.
    ///
    /// Returns `None` if more data is needed.
    pub fn decode_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|&b| is_terminator(b))?;

            let line_data = self.buffer.split_to(end);

            while !self.buffer.is_empty() && is_terminator(self.buffer[0]) {
                self.buffer.advance(1);
            }

            if !line_data.is_empty() {
                return Some(String::from_utf8_lossy(&line_data).to_string());
            }
        }
    }

    /// Take whatever has been received since the last terminator.
    ///
    /// Used when the sender has gone quiet without ending its line. Drain
    /// complete lines with [`LineCodec::decode_line`] first; any terminators
    /// still buffered are dropped.
    pub fn take_partial(&mut self) -> Option<String> {
        let data = self.buffer.split();
        self.line_len = 0;
        self.discarding = false;

        let text: Vec<u8> = data.iter().copied().filter(|&b| !is_terminator(b)).collect();
        if text.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&text).to_string())
        }
    }

    /// Encode a command for transmission.
    ///
    /// Appends the carriage return terminator.
    pub fn encode_command(cmd: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(cmd.len() + 1);
        buf.extend_from_slice(cmd.as_bytes());
        buf.push(COMMAND_TERMINATOR);
        buf
    }

    /// Encode a reply for transmission.
    ///
    /// Appends `\r\n`.
    pub fn encode_reply(text: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(text.len() + REPLY_TERMINATOR.len());
        buf.extend_from_slice(text.as_bytes());
        buf.extend_from_slice(REPLY_TERMINATOR);
        buf
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of lines truncated since creation.
    pub fn truncated_lines(&self) -> u64 {
        self.truncated_lines
    }

    /// Clear the buffer and any partial line.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.line_len = 0;
        self.discarding = false;
    }
}
