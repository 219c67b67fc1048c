//! Stream adapter for parsing SSE (Server-Sent Events) from byte chunks.

use crate::{Error, SseEvent, SseParser};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::{debug, warn};

/// Default cap on a single unterminated line.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1_000_000;

/// Configuration for [`SseStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Largest unterminated line the stream buffers before failing it.
    /// `None` disables the check.
    pub max_pending_bytes: Option<usize>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_pending_bytes: Some(DEFAULT_MAX_PENDING_BYTES),
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pending_bytes(mut self, limit: usize) -> Self {
        self.max_pending_bytes = Some(limit);
        self
    }

    /// Buffer lines of any length.
    pub fn unbounded(mut self) -> Self {
        self.max_pending_bytes = None;
        self
    }
}

/// A stream adapter that parses SSE events from a byte stream.
///
/// The underlying stream is only read when no parsed event is waiting.
/// When it ends, any unterminated line or undispatched block is dropped.
///
/// A line longer than [`StreamConfig::max_pending_bytes`] is dropped as a
/// whole and reported as [`Error::LineTooLong`] after the events that
/// preceded it.
pub struct SseStream<S> {
    /// The underlying byte stream
    inner: S,
    /// Parser queueing events until they are polled
    parser: SseParser<VecDeque<SseEvent>>,
    config: StreamConfig,
    /// Part of the last chunk not yet fed to the parser
    backlog: Bytes,
    /// Overflow error waiting behind already-parsed events
    overflow: Option<Error>,
    finished: bool,
}

impl<S> SseStream<S> {
    /// Create a new SSE stream from a byte stream.
    pub fn new(stream: S) -> Self {
        Self::with_config(stream, StreamConfig::default())
    }

    pub fn with_config(stream: S, config: StreamConfig) -> Self {
        Self {
            inner: stream,
            parser: SseParser::queued(),
            config,
            backlog: Bytes::new(),
            overflow: None,
            finished: false,
        }
    }

    /// The last event id seen on this stream, for a `Last-Event-ID` header
    /// when reconnecting.
    pub fn last_event_id(&self) -> Option<&str> {
        self.parser.last_event_id()
    }

    /// The server-suggested reconnection time in milliseconds.
    pub fn reconnection_time(&self) -> Option<u64> {
        self.parser.reconnection_time()
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Feed the backlog to the parser, stopping at the first line that
    /// outgrows the limit.
    ///
    /// Slices are sized so the parser never buffers more than one byte past
    /// the limit before the check runs.
    fn feed_backlog(&mut self) -> Result<(), Error> {
        let Some(limit) = self.config.max_pending_bytes else {
            let chunk = std::mem::take(&mut self.backlog);
            self.parser.feed(&chunk);
            return Ok(());
        };

        while !self.backlog.is_empty() {
            let room = limit
                .saturating_add(1)
                .saturating_sub(self.parser.pending_len())
                .clamp(1, self.backlog.len());
            let slice = self.backlog.split_to(room);
            self.parser.feed(&slice);

            if self.parser.pending_len() > limit {
                warn!(
                    pending = self.parser.pending_len(),
                    limit, "SSE line exceeded buffer limit, discarding"
                );
                self.parser.discard_partial_line();
                return Err(Error::line_too_long(limit));
            }
        }
        Ok(())
    }
}

impl<S, E> Stream for SseStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    type Item = Result<SseEvent, Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            // First, yield any already-parsed events (FIFO order)
            if let Some(event) = self.parser.try_pop() {
                return Poll::Ready(Some(Ok(event)));
            }
            if let Some(e) = self.overflow.take() {
                return Poll::Ready(Some(Err(e)));
            }
            if !self.backlog.is_empty() {
                if let Err(e) = self.feed_backlog() {
                    self.overflow = Some(e);
                }
                continue;
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => self.backlog = chunk,
                Some(Err(e)) => {
                    return Poll::Ready(Some(Err(Error::upstream(e))));
                }
                None => {
                    self.finished = true;
                    if self.parser.pending_len() > 0 {
                        debug!(
                            pending = self.parser.pending_len(),
                            "SSE stream ended mid-line, dropping partial line"
                        );
                    }
                }
            }
        }
    }
}

/// Extension trait to add SSE parsing to byte streams.
pub trait SseStreamExt: Stream {
    /// Parse this byte stream as SSE events.
    fn sse_events(self) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::new(self)
    }

    fn sse_events_with_config(self, config: StreamConfig) -> SseStream<Self>
    where
        Self: Sized,
    {
        SseStream::with_config(self, config)
    }
}

impl<S: Stream> SseStreamExt for S {}
