//! Lazy, in-order reader over the raw event stream.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use mcplink_protocol::{Error, Result};
use tracing::{debug, trace};

use crate::decoder::EventDecoder;
use crate::event::StreamEvent;

/// Raw byte chunks of the event stream as delivered by a transport
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Pulls chunks from a [`ByteStream`] and yields decoded [`StreamEvent`]s.
///
/// The reader is non-restartable: once the underlying stream ends or fails, every
/// later call to [`next_event`](Self::next_event) returns `Ok(None)`.
pub struct EventReader {
    inner: ByteStream,
    decoder: EventDecoder,
    ready: VecDeque<StreamEvent>,
    emitted: u64,
    read_timeout: Option<Duration>,
    finished: bool,
}

impl fmt::Debug for EventReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventReader")
            .field("queued", &self.ready.len())
            .field("emitted", &self.emitted)
            .field("read_timeout", &self.read_timeout)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl EventReader {
    /// Wrap a byte stream; reads never time out until [`set_read_timeout`](Self::set_read_timeout)
    pub fn new(inner: ByteStream) -> Self {
        Self::with_decoder(inner, EventDecoder::new())
    }

    /// Wrap a byte stream with a preconfigured decoder (e.g. a custom size limit)
    pub fn with_decoder(inner: ByteStream, decoder: EventDecoder) -> Self {
        Self {
            inner,
            decoder,
            ready: VecDeque::new(),
            emitted: 0,
            read_timeout: None,
            finished: false,
        }
    }

    /// Builder-style read timeout
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Change how long a single chunk read may stall (`None` waits forever)
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
    }

    /// Number of events handed out so far
    pub fn events_emitted(&self) -> u64 {
        self.emitted
    }

    /// Whether the underlying stream has ended or failed
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Next decoded event, or `Ok(None)` once the stream has ended.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportClosed`] if the stream ends before a single event was emitted
    /// - [`Error::TransportTimeout`] if a chunk read stalls past the read timeout
    /// - [`Error::Protocol`] if a line or event exceeds the decoder's size limit
    /// - whatever error the transport yielded for a failed chunk
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                self.emitted += 1;
                trace!(kind = %event.kind, bytes = event.payload.len(), "Stream event decoded");
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            let next = match self.read_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, self.inner.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.finished = true;
                        debug!(?timeout, "Event stream read stalled");
                        return Err(Error::TransportTimeout { timeout });
                    }
                },
                None => self.inner.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    trace!(bytes = chunk.len(), "Event stream chunk received");
                    match self.decoder.push(&chunk) {
                        Ok(events) => self.ready.extend(events),
                        Err(e) => {
                            self.finished = true;
                            debug!(error = %e, "Event stream rejected");
                            return Err(e);
                        }
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    debug!(error = %e, "Event stream failed");
                    return Err(e);
                }
                None => {
                    self.finished = true;
                    while let Some(event) = self.decoder.finish() {
                        self.ready.push_back(event);
                    }
                    if self.ready.is_empty() && self.emitted == 0 {
                        return Err(Error::transport_closed(
                            "event stream ended before any event was received",
                        ));
                    }
                    debug!(emitted = self.emitted, "Event stream ended");
                }
            }
        }
    }

    /// Turn the reader into a lazy [`Stream`] of events.
    ///
    /// The stream yields at most one error and then ends.
    pub fn into_stream(self) -> impl Stream<Item = Result<StreamEvent>> + Send + 'static {
        futures::stream::unfold(self, |mut reader| async move {
            match reader.next_event().await {
                Ok(Some(event)) => Some((Ok(event), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        })
    }
}
