use thiserror::Error;

/// Failure of a single scraping task.
///
/// Every variant is contained at the task boundary: the pool logs it with the
/// offending URL and the task contributes nothing to its stage.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request to {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unexpected document structure at {url}: {reason}")]
    Extract { url: String, reason: String },

    #[error("task for {url} panicked")]
    Panicked { url: String },
}

impl ScrapeError {
    pub fn extract(url: &str, reason: impl Into<String>) -> Self {
        Self::Extract {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Fetch { url, .. }
            | Self::Status { url, .. }
            | Self::Extract { url, .. }
            | Self::Panicked { url } => url,
        }
    }
}

/// Record store failure. Never recovered locally.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
