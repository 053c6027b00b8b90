//! Output tree layout and metadata persistence
//!
//! Downloads land in
//! `{root}/{author}[/{category-or-folder}][/{rating}]/{title} ({id}) - {filename}`,
//! with the pre-rename `{title} - {filename}` form still checked when
//! deciding whether a file was already downloaded. Metadata records go to a
//! `metadata/` sibling directory as UTF-8 JSON.

mod metadata;
mod paths;

pub use metadata::write_metadata;
pub use paths::{sanitize_component, submission_paths, SubmissionPaths};
