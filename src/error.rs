//! Error taxonomy for the core pipeline.
//!
//! Every error carries a distinct, stable wire code so API clients can
//! branch on `error.code` rather than parsing messages. Extraction
//! failures are per-file (reported in upload outcomes, not as request
//! errors); validation errors are rejected before any mutation; upstream
//! timeouts are retryable by the caller and never leave partial state.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Unknown session identifier.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Malformed input: non-positive top_k, empty message, empty query.
    #[error("{0}")]
    Validation(String),

    /// Mime type the boundary does not admit.
    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),

    /// Text extraction failed or produced unusable text. Per-file: the
    /// bill record is still created with nulled fields, not dropped.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Embedding/generation capability exceeded its deadline. Retryable
    /// by the caller; the core commits nothing for the failed operation.
    #[error("{0} request timed out")]
    UpstreamTimeout(&'static str),

    /// Embedding/generation capability returned a non-retryable failure.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Invariant violation. Logged and surfaced, never swallowed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code for the API error contract.
    pub fn code(&self) -> &'static str {
        match self {
            Error::SessionNotFound(_) => "not_found",
            Error::Validation(_) => "validation_error",
            Error::UnsupportedMedia(_) => "unsupported_media_type",
            Error::Extraction(_) => "extraction_failed",
            Error::UpstreamTimeout(_) => "upstream_timeout",
            Error::Upstream(_) => "upstream_error",
            Error::Internal(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
