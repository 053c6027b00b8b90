//! furaffinity-dl: a gallery downloader for FurAffinity
//!
//! This crate crawls a user's gallery, scraps, favorites, a gallery folder,
//! or the logged-in submissions inbox, walks the per-category pagination,
//! extracts submission records from detail pages, and streams the media
//! files into a structured output tree guarded by an on-disk dedup index.

pub mod config;
pub mod crawler;
pub mod index;
pub mod output;

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for furaffinity-dl operations
#[derive(Debug, Error)]
pub enum FadlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] crawler::FetchError),

    #[error(transparent)]
    Extract(#[from] crawler::ExtractError),

    #[error(transparent)]
    Download(#[from] crawler::DownloadError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Failed to encode metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interrupted by operator")]
    Aborted,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Username contains invalid characters: '{0}'")]
    InvalidUsername(String),

    #[error("Unknown category '{0}', expected gallery, scraps or favorites")]
    InvalidCategory(String),

    #[error("Invalid {kind} cursor '{value}'")]
    InvalidCursor { kind: &'static str, value: String },

    #[error("Invalid title filter pattern: {0}")]
    InvalidPattern(String),

    #[error("Malformed cookie file line {line}: {reason}")]
    MalformedCookie { line: usize, reason: String },

    #[error("No usernames given")]
    MissingUsername,
}

/// Result type alias for furaffinity-dl operations
pub type Result<T> = std::result::Result<T, FadlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Category, Config, DescriptionFormat};
pub use crawler::{Coordinator, CrawlEnd, Cursor, SubmissionRecord};
pub use index::DownloadIndex;
