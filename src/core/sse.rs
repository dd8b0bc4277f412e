//! Server-sent events framing.
//!
//! The decoder is fed raw body chunks as they arrive and hands back every
//! event completed by that chunk. Chunk boundaries may fall anywhere,
//! including between the `\r` and `\n` of a line ending or inside a
//! multi-byte UTF-8 sequence.

use bytes::{Buf, BytesMut};

use crate::domain::model::SseEvent;
use crate::utils::error::{Result, StreamError};

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Longest unterminated line accepted before the stream is treated as broken.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024 * 1024;

#[derive(Debug)]
pub struct SseDecoder {
    max_line_len: usize,
    buf: BytesMut,
    data: String,
    has_data: bool,
    event: Option<String>,
    last_event_id: Option<String>,
    bom_checked: bool,
    skip_lf: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self {
            max_line_len: DEFAULT_MAX_LINE_LEN,
            buf: BytesMut::new(),
            data: String::new(),
            has_data: false,
            event: None,
            last_event_id: None,
            bom_checked: false,
            skip_lf: false,
        }
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line_len(mut self, max_line_len: usize) -> Self {
        self.max_line_len = max_line_len;
        self
    }

    /// Feed one body chunk, returning the events it completed in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = Vec::new();

        loop {
            if self.skip_lf {
                if self.buf.is_empty() {
                    break;
                }
                if self.buf[0] == b'\n' {
                    self.buf.advance(1);
                }
                self.skip_lf = false;
            }

            if !self.bom_checked {
                if self.buf.len() < BOM.len() && BOM.starts_with(&self.buf) {
                    break;
                }
                if self.buf.starts_with(BOM) {
                    self.buf.advance(BOM.len());
                }
                self.bom_checked = true;
            }

            let Some(pos) = self.buf.iter().position(|&b| b == b'\n' || b == b'\r') else {
                break;
            };
            let line = self.buf.split_to(pos);
            if self.buf[0] == b'\r' {
                self.skip_lf = true;
            }
            self.buf.advance(1);

            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Bytes received that do not yet form a complete line.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Fails once the unterminated tail exceeds the line length limit.
    pub fn check_pending(&self) -> Result<()> {
        if self.buf.len() > self.max_line_len {
            return Err(StreamError::ProtocolError {
                message: format!(
                    "event stream line exceeds {} bytes without a terminator",
                    self.max_line_len
                ),
            });
        }
        Ok(())
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            tracing::trace!("SSE comment: {}", &line[1..]);
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
                self.has_data = true;
            }
            // An empty type is the default `message` type.
            "event" => self.event = (!value.is_empty()).then(|| value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            // The listener never reconnects, so the reconnection delay is unused.
            "retry" => {}
            other => tracing::trace!("Ignoring unknown SSE field '{}'", other),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        let mut data = std::mem::take(&mut self.data);
        data.pop();

        Some(SseEvent {
            event,
            data,
            id: self.last_event_id.clone(),
        })
    }
}

/// Frame a payload as a default-type message event.
pub fn encode_data(payload: &str) -> String {
    let mut out = String::with_capacity(payload.len() + 8);
    for line in payload.split('\n') {
        out.push_str("data: ");
        out.push_str(line.strip_suffix('\r').unwrap_or(line));
        out.push('\n');
    }
    out.push('\n');
    out
}

/// Frame a comment line, used as a keep-alive.
pub fn encode_comment(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 3);
    for line in text.split('\n') {
        out.push(':');
        out.push_str(line);
        out.push('\n');
    }
    out.push('\n');
    out
}
