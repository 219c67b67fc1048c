//! Parse a `text/event-stream` body from stdin and print each event as JSON.
//!
//! ```sh
//! printf 'event: greeting\ndata: hello\n\n' | cargo run --example parse_stdin
//! ```

use platformed_sse::{SseEvent, SseParser};
use std::io::{self, Read, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Small enough that events regularly span several reads.
const CHUNK_SIZE: usize = 64;

fn main() -> io::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut write_error = None;

    let mut parser = SseParser::new(|event: SseEvent| {
        if write_error.is_some() {
            return;
        }
        let line = serde_json::to_string(&event).map_err(io::Error::from);
        if let Err(e) = line.and_then(|line| writeln!(out, "{line}")) {
            write_error = Some(e);
        }
    });

    let mut stdin = io::stdin().lock();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = stdin.read(&mut buf)?;
        if n == 0 {
            break;
        }
        parser.feed(&buf[..n]);
    }

    let last_event_id = parser.last_event_id().map(str::to_string);
    let retry = parser.reconnection_time();
    drop(parser);

    if let Some(e) = write_error {
        return Err(e);
    }
    eprintln!("last event id: {last_event_id:?}, retry: {retry:?}");
    Ok(())
}
