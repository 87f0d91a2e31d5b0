use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Everything that can abort a scrape pass.
///
/// Nothing here is caught or retried inside the core: a failure at any
/// postal-code step surfaces to the caller and the partial cache is
/// discarded. The process that invoked the pass decides what to do next.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("browser session error: {0}")]
    Session(String),

    #[error("timed out after {}s waiting for {what}", waited.as_secs())]
    NavigationTimeout { what: &'static str, waited: Duration },

    #[error("challenge gate not cleared: {0}")]
    ChallengeUnsolved(String),

    #[error("evidence upload failed: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("artifact I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<chromiumoxide::error::CdpError> for ScrapeError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        ScrapeError::Session(err.to_string())
    }
}
