//! Error taxonomy for the extraction pipeline.
//!
//! `TrackError` is the library-level error type (thiserror); `anyhow` is
//! reserved for the binary boundary. Variants mirror the failure modes the
//! fetch-and-parse chain distinguishes between.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackError {
    /// The input URL is unsupported, malformed, or not a product page.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A recoverable network-level failure; retrying may succeed.
    #[error("transient network error: {0}")]
    TransientNetwork(String),

    /// The page served an anti-bot challenge instead of product content.
    #[error("bot challenge: {0}")]
    BotChallenge(String),

    /// The fetched page is not the expected product page.
    #[error("wrong page: {0}")]
    WrongPage(String),

    /// The page was fetched but required fields could not be extracted.
    #[error("extraction incomplete: {0}")]
    ExtractionIncomplete(String),

    /// Every fetch strategy was attempted without success.
    #[error("exhausted strategies: {0}")]
    ExhaustedStrategies(String),

    /// An unrecoverable error; no retry or fallback applies.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<std::io::Error> for TrackError {
    fn from(e: std::io::Error) -> Self {
        TrackError::Fatal(e.to_string())
    }
}

impl From<serde_json::Error> for TrackError {
    fn from(e: serde_json::Error) -> Self {
        TrackError::Fatal(e.to_string())
    }
}
