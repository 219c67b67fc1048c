//! An incremental parser for Server-Sent Events (`text/event-stream`).
//!
//! [`SseParser`] consumes bytes in chunks of any size and hands each
//! completed [`SseEvent`] to an [`EventSink`], usually a closure.
//! [`SseStream`] wraps a byte stream (e.g. an HTTP response body) and
//! yields events as a `Stream`.
//!
//! ```
//! use platformed_sse::{SseEvent, SseParser};
//!
//! let mut events = Vec::new();
//! let mut parser = SseParser::new(|event: SseEvent| events.push(event));
//! parser.feed(b"event: greeting\ndata: hel");
//! parser.feed(b"lo\n\n");
//! drop(parser);
//!
//! assert_eq!(events, vec![SseEvent::with_type("greeting", "hello")]);
//! ```

pub mod decoder;
pub mod error;
pub mod event;
pub mod parser;
pub mod sse_stream;

// Re-export core types for easy usage
pub use decoder::Utf8Decoder;
pub use error::Error;
pub use event::{SseEvent, DEFAULT_EVENT_TYPE};
pub use parser::{EventSink, SseParser};
pub use sse_stream::{SseStream, SseStreamExt, StreamConfig};
