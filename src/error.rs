use thiserror::Error;

/// Errors surfaced by [`SseStream`](crate::SseStream).
///
/// The parser itself never fails; these only come from the byte source or
/// from the stream's buffer limit.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Stream error: {0}")]
    Upstream(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("SSE line exceeded maximum buffered size of {limit} bytes")]
    LineTooLong { limit: usize },
}

impl Error {
    pub fn upstream(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Upstream(error.into())
    }

    pub fn line_too_long(limit: usize) -> Self {
        Error::LineTooLong { limit }
    }
}
