//! Crate-wide error types.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] crate::database::repositories::RepositoryError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("platform provider error: {0}")]
    Extractor(String),

    #[error("ffmpeg error: {0}")]
    Ffmpeg(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn extractor(msg: impl Into<String>) -> Self {
        Self::Extractor(msg.into())
    }
}

/// Error classes surfaced by playlist fetches and segment downloads (spec §7).
///
/// Distinct from [`Error`] because callers in the recording loop branch on
/// error *class*, not on a formatted message.
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP 404 on a media playlist: the broadcast has ended.
    #[error("upstream gone (404)")]
    UpstreamGone,

    /// HTTP 403 on a master playlist: the playback token expired.
    #[error("upstream expired (403)")]
    UpstreamExpired,

    /// HTTP 404 on a segment: the segment rolled out of the live window.
    #[error("segment missing (404)")]
    SegmentMissing,

    /// Any other non-2xx response.
    #[error("unexpected status {0}")]
    Status(u16),

    /// Transport-level failure (timeout, connection reset, DNS, ...).
    #[error("transient network error: {0}")]
    Transient(#[from] reqwest::Error),

    /// Retries exhausted.
    #[error("exhausted retries after {0} attempts")]
    RetriesExhausted(u32),

    /// The master playlist has no variant matching the requested quality.
    #[error("{0}")]
    QualityNotFound(String),
}

impl FetchError {
    /// Classify an HTTP status code returned by a playlist fetch.
    pub fn from_playlist_status(status: u16) -> Self {
        match status {
            404 => Self::UpstreamGone,
            403 => Self::UpstreamExpired,
            other => Self::Status(other),
        }
    }
}
