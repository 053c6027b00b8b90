//! Configuration module for furaffinity-dl
//!
//! The downloader is driven by a single immutable [`Config`] built from the
//! command line and passed into each component. There is no ambient global
//! state: the HTTP session, output layout and crawl toggles all flow from
//! here.

mod cookies;
mod types;
mod validation;

// Re-export types
pub use types::{Category, Config, DescriptionFormat, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};

// Re-export helpers
pub use cookies::load_cookie_jar;
pub use validation::{normalize_username, parse_cursor, resolve_usernames, validate_username};
