//! Crawler module for listing pagination, extraction and downloads
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry and backoff
//! - Per-category listing pagination
//! - Submission detail-page extraction
//! - Streaming media downloads with size verification
//! - Overall crawl coordination

mod coordinator;
mod downloader;
mod fetcher;
mod listing;
mod submission;

pub use coordinator::{Coordinator, CrawlEnd};
pub use downloader::{DownloadError, DownloadOutcome, Downloader};
pub use fetcher::{build_http_client, FetchError, Fetcher};
pub use listing::{
    listing_path, parse_listing, parse_view_id, Cursor, ListingItem, ListingPage, PageOutcome,
};
pub use submission::{
    extract, CommentRecord, Description, ExtractError, Rating, SubmissionRecord, TitleFilter,
    DEFAULT_FILTER_PATTERN,
};

/// Compiles a selector known at compile time.
pub(crate) fn selector(css: &str) -> scraper::Selector {
    scraper::Selector::parse(css).expect("static selector")
}
