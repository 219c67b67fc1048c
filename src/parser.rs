//! Incremental parser for the `text/event-stream` format.
//!
//! Bytes may be fed in chunks of any size. Lines end with `\n`, `\r` or
//! `\r\n`, including a `\r\n` pair split across two chunks. A blank line
//! dispatches the accumulated block to an [`EventSink`].

use crate::decoder::Utf8Decoder;
use crate::event::{SseEvent, DEFAULT_EVENT_TYPE};
use memchr::memchr2;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Receives events as the parser dispatches them.
///
/// Implemented for any `FnMut(SseEvent)` closure, and for `Vec` and
/// `VecDeque` to collect events for later consumption.
pub trait EventSink {
    fn on_event(&mut self, event: SseEvent);
}

impl<F> EventSink for F
where
    F: FnMut(SseEvent),
{
    fn on_event(&mut self, event: SseEvent) {
        self(event)
    }
}

impl EventSink for Vec<SseEvent> {
    fn on_event(&mut self, event: SseEvent) {
        self.push(event);
    }
}

impl EventSink for VecDeque<SseEvent> {
    fn on_event(&mut self, event: SseEvent) {
        self.push_back(event);
    }
}

/// Field names with a meaning in an event block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Event,
    Data,
    Id,
    Retry,
    Ignored,
}

impl Field {
    fn from_name(name: &str) -> Self {
        match name {
            "event" => Field::Event,
            "data" => Field::Data,
            "id" => Field::Id,
            "retry" => Field::Retry,
            _ => Field::Ignored,
        }
    }
}

/// Scratch state for the block being read. Replaced on every dispatch.
#[derive(Debug, Default)]
struct BlockState {
    data: String,
    event_type: String,
    id: Option<String>,
}

impl BlockState {
    /// Drop a block that never received a `data` field. The block id is
    /// kept and will be attached to the next dispatched event.
    fn discard_payload(&mut self) {
        self.data.clear();
        self.event_type.clear();
    }

    fn into_event(self, retry: Option<u64>) -> SseEvent {
        let mut data = self.data;
        if data.ends_with('\n') {
            data.pop();
        }
        let event_type = if self.event_type.is_empty() {
            DEFAULT_EVENT_TYPE.to_string()
        } else {
            self.event_type
        };

        SseEvent {
            event_type,
            data,
            id: self.id,
            retry,
        }
    }
}

/// State that lives as long as the parser. Never touched by dispatch or
/// [`SseParser::reset`].
#[derive(Debug, Default)]
struct SessionState {
    last_event_id: Option<String>,
    reconnection_time: Option<u64>,
}

/// Streaming SSE parser that turns byte chunks into [`SseEvent`]s.
///
/// Events are handed to the sink synchronously from within [`feed`],
/// in stream order.
///
/// [`feed`]: SseParser::feed
#[derive(Debug)]
pub struct SseParser<S> {
    sink: S,
    decoder: Utf8Decoder,
    /// Decoded text of the current unterminated line.
    line: String,
    /// The previous chunk ended with CR, so a leading LF completes a CRLF.
    ended_on_cr: bool,
    /// Bytes up to the next line terminator belong to a discarded line.
    skipping_line: bool,
    block: BlockState,
    session: SessionState,
}

impl<S: EventSink> SseParser<S> {
    /// Create a parser delivering events to `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            decoder: Utf8Decoder::new(),
            line: String::new(),
            ended_on_cr: false,
            skipping_line: false,
            block: BlockState::default(),
            session: SessionState::default(),
        }
    }

    /// Feed a chunk of bytes, dispatching every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) {
        let Some(&last_byte) = chunk.last() else {
            return;
        };

        let mut pos = 0;
        if self.ended_on_cr && chunk[0] == LF {
            pos = 1;
        }
        self.ended_on_cr = false;

        if self.skipping_line {
            match memchr2(CR, LF, &chunk[pos..]) {
                Some(offset) => {
                    self.skipping_line = false;
                    pos = after_terminator(chunk, pos + offset);
                }
                None => return,
            }
        }

        while let Some(offset) = memchr2(CR, LF, &chunk[pos..]) {
            let end = pos + offset;

            let mut line = std::mem::take(&mut self.line);
            self.decoder.decode_final(&chunk[pos..end], &mut line);
            self.process_line(&line);
            line.clear();
            self.line = line;

            pos = after_terminator(chunk, end);
        }

        if pos < chunk.len() {
            self.decoder.decode(&chunk[pos..], &mut self.line);
        }
        self.ended_on_cr = last_byte == CR;
    }

    /// Clear the block being read (data, event type and id).
    ///
    /// The last event id and reconnection time are kept so a reconnecting
    /// caller can still send `Last-Event-ID`.
    pub fn reset(&mut self) {
        self.block = BlockState::default();
    }

    /// The id of the most recent valid `id:` field, across all blocks.
    pub fn last_event_id(&self) -> Option<&str> {
        self.session.last_event_id.as_deref()
    }

    /// The most recent valid `retry:` value, in milliseconds.
    pub fn reconnection_time(&self) -> Option<u64> {
        self.session.reconnection_time
    }

    pub fn reconnection_delay(&self) -> Option<Duration> {
        self.session.reconnection_time.map(Duration::from_millis)
    }

    /// Number of bytes buffered for the current unterminated line.
    pub fn pending_len(&self) -> usize {
        self.line.len() + self.decoder.pending_len()
    }

    /// Drop the current unterminated line without touching block state.
    ///
    /// Bytes fed later are skipped up to and including the next line
    /// terminator, so the rest of the dropped line is never parsed.
    pub fn discard_partial_line(&mut self) {
        if self.pending_len() > 0 {
            self.skipping_line = true;
        }
        self.line.clear();
        self.decoder.reset();
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn process_line(&mut self, line: &str) {
        if line.is_empty() {
            self.dispatch();
            return;
        }
        if line.starts_with(':') {
            trace!("skipping comment line");
            return;
        }

        let (name, value) = match line.split_once(':') {
            Some((name, value)) => (name, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        self.process_field(name, value);
    }

    fn process_field(&mut self, name: &str, value: &str) {
        match Field::from_name(name) {
            Field::Event => {
                self.block.event_type.clear();
                self.block.event_type.push_str(value);
            }
            Field::Data => {
                self.block.data.push_str(value);
                self.block.data.push('\n');
            }
            Field::Id => {
                if value.contains('\0') {
                    debug!("ignoring event id containing NUL");
                    self.block.id = None;
                } else {
                    self.block.id = Some(value.to_string());
                    self.session.last_event_id = Some(value.to_string());
                }
            }
            Field::Retry => match parse_retry(value) {
                Some(millis) => self.session.reconnection_time = Some(millis),
                None => debug!(value, "ignoring invalid retry field"),
            },
            Field::Ignored => trace!(field = name, "ignoring unknown field"),
        }
    }

    fn dispatch(&mut self) {
        if self.block.data.is_empty() {
            self.block.discard_payload();
            return;
        }

        let block = std::mem::take(&mut self.block);
        let event = block.into_event(self.session.reconnection_time);
        trace!(event_type = %event.event_type, id = ?event.id, "dispatching event");
        self.sink.on_event(event);
    }
}

impl SseParser<VecDeque<SseEvent>> {
    /// Create a parser that queues events for [`try_pop`](Self::try_pop).
    pub fn queued() -> Self {
        Self::new(VecDeque::new())
    }

    /// Take the oldest dispatched event, if any.
    pub fn try_pop(&mut self) -> Option<SseEvent> {
        self.sink.pop_front()
    }
}

/// Offset just past the terminator at `end`, which is CR or LF.
fn after_terminator(chunk: &[u8], end: usize) -> usize {
    if chunk[end] == CR && chunk.get(end + 1) == Some(&LF) {
        end + 2
    } else {
        end + 1
    }
}

/// Parse a `retry` value: ASCII digits only, base 10.
fn parse_retry(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}
