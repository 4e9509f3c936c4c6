//! Incremental line decoder for the event stream.
//!
//! Framing rules:
//! - `event: <kind>` starts a new event; if one is already open it is emitted first
//! - `data: <payload>` appends a line to the open event (opening an implicit
//!   `message` event if none is open); multiple lines are joined with `\n`
//! - a blank line closes and emits the open event
//! - comments (`:` prefix) and any other field (`id:`, `retry:`, ...) are ignored
//!
//! Chunk boundaries are irrelevant: bytes are buffered until a full line is seen,
//! so a multi-byte character or a marker split across reads decodes the same.
//!
//! A line, or the payload assembled for one event, larger than the decoder's size
//! limit is a protocol error; the decoder refuses further input after it.

use mcplink_protocol::{Error, Result};

use crate::event::{EventKind, StreamEvent};

/// Default limit for one line or one assembled event payload (1 MiB)
pub const DEFAULT_MAX_EVENT_SIZE: usize = 1024 * 1024;

/// Event being assembled from consecutive lines
#[derive(Debug)]
struct PendingEvent {
    kind: EventKind,
    data: Vec<String>,
    size: usize,
}

impl PendingEvent {
    fn into_event(self) -> StreamEvent {
        StreamEvent::new(self.kind, self.data.join("\n"))
    }
}

/// Stateful decoder turning raw chunks into [`StreamEvent`]s
#[derive(Debug)]
pub struct EventDecoder {
    buffer: Vec<u8>,
    pending: Option<PendingEvent>,
    max_event_size: usize,
    overflowed: bool,
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            pending: None,
            max_event_size: DEFAULT_MAX_EVENT_SIZE,
            overflowed: false,
        }
    }
}

impl EventDecoder {
    /// Create an empty decoder with [`DEFAULT_MAX_EVENT_SIZE`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style size limit for one line or one assembled event payload
    #[must_use]
    pub fn with_max_event_size(mut self, max_event_size: usize) -> Self {
        self.max_event_size = max_event_size;
        self
    }

    /// Feed a chunk, returning every event it completed (in stream order)
    ///
    /// # Errors
    ///
    /// [`Error::Protocol`] once a line or an event payload exceeds the size limit,
    /// and for every later call.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>> {
        if self.overflowed {
            return Err(self.overflow_error());
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if end - start > self.max_event_size {
                return Err(self.overflow());
            }
            let line = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
            start = end + 1;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
            if self.pending.as_ref().is_some_and(|p| p.size > self.max_event_size) {
                return Err(self.overflow());
            }
        }
        self.buffer.drain(..start);

        // Unterminated remainder
        if self.buffer.len() > self.max_event_size {
            return Err(self.overflow());
        }
        Ok(events)
    }

    /// Flush at end of input: an unterminated last line and any open event
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let mut emitted = None;
        if !self.buffer.is_empty() {
            let line = String::from_utf8_lossy(&self.buffer).into_owned();
            self.buffer.clear();
            emitted = self.process_line(&line);
        }
        // A trailing line can close one event and open another; the first one wins
        // only if nothing else is open.
        match (emitted, self.pending.take()) {
            (Some(event), None) => Some(event),
            (None, Some(pending)) => Some(pending.into_event()),
            (Some(event), Some(pending)) => {
                self.pending = Some(pending);
                Some(event)
            }
            (None, None) => None,
        }
    }

    /// Whether any input is buffered or an event is open
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty() || self.pending.is_some()
    }

    fn overflow(&mut self) -> Error {
        self.overflowed = true;
        self.buffer = Vec::new();
        self.pending = None;
        self.overflow_error()
    }

    fn overflow_error(&self) -> Error {
        Error::protocol(format!(
            "event stream line or event exceeds {} bytes",
            self.max_event_size
        ))
    }

    fn process_line(&mut self, raw: &str) -> Option<StreamEvent> {
        let line = raw.strip_suffix('\r').unwrap_or(raw);

        if line.is_empty() {
            return self.pending.take().map(PendingEvent::into_event);
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => {
                let closed = self.pending.take().map(PendingEvent::into_event);
                self.pending = Some(PendingEvent {
                    kind: EventKind::from_marker(value),
                    data: Vec::new(),
                    size: 0,
                });
                closed
            }
            "data" => {
                let pending = self.pending.get_or_insert_with(|| PendingEvent {
                    kind: EventKind::Data,
                    data: Vec::new(),
                    size: 0,
                });
                // Joining newline included
                pending.size += value.len() + 1;
                pending.data.push(value.to_string());
                None
            }
            _ => None,
        }
    }
}

/// Decode a complete buffer in one go.
///
/// Convenience for bodies that were read whole (e.g. an event-stream reply to a POST).
///
/// # Errors
///
/// [`Error::Protocol`] if a line or event exceeds [`DEFAULT_MAX_EVENT_SIZE`].
pub fn decode_all(body: &[u8]) -> Result<Vec<StreamEvent>> {
    let mut decoder = EventDecoder::new();
    let mut events = decoder.push(body)?;
    while let Some(event) = decoder.finish() {
        events.push(event);
    }
    Ok(events)
}
