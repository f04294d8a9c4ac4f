use thiserror::Error;

/// Failures that can occur while running a scrape job.
///
/// Only `Config`, `NoRenderers`, `Io`, `Csv` and `Task` ever abort a run. The other
/// variants are recovered at the item boundary where they occur.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Navigation or page-load timeout in the browser.
    #[error("failed to render {url}: {message}")]
    Render { url: String, message: String },

    /// A record could not be derived from a page's HTML.
    #[error("failed to extract record from {url}: {message}")]
    Extraction { url: String, message: String },

    /// The page count for a base URL could not be determined.
    #[error("failed to plan pages for {url}: {message}")]
    Planning { url: String, message: String },

    /// Forwarding the dataset to external storage failed.
    #[error("failed to store {key}: {message}")]
    Sink { key: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no browser instance could be launched: {0}")]
    NoRenderers(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ScrapeError {
    pub fn render(url: &str, err: anyhow::Error) -> Self {
        Self::Render {
            url: url.to_string(),
            message: format!("{:#}", err),
        }
    }

    pub fn planning(url: &str, message: impl Into<String>) -> Self {
        Self::Planning {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
