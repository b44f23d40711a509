//! Error taxonomy for the chat-ingestion engine.
//!
//! Fate of each variant is documented in SPEC_FULL.md §7; callers that
//! need to distinguish "clean loop exit, partial buffer is still
//! useful" from "fatal, nothing was produced" should match on the
//! variant rather than stringify the error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to parse {what}: {detail}")]
    Parsing { what: String, detail: String },

    #[error("video is unavailable")]
    VideoUnavailable,

    #[error("video was not found")]
    VideoNotFound,

    #[error("no chat replay available: {0}")]
    NoChatReplay(String),

    #[error("continuation token missing from response")]
    NoContinuation,

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("twitch error: {0}")]
    TwitchError(String),

    #[error("cookie error: {0}")]
    CookieError(String),

    #[error("abort conditions satisfied: {0}")]
    AbortConditionsSatisfied(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True for variants whose fate is "the polling loop exits cleanly
    /// and the caller still gets the buffer accumulated so far" (§7).
    pub fn is_clean_loop_exit(&self) -> bool {
        matches!(
            self,
            Error::VideoUnavailable
                | Error::VideoNotFound
                | Error::NoContinuation
                | Error::AbortConditionsSatisfied(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
