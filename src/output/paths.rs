use std::path::PathBuf;

use crate::config::Config;
use crate::crawler::SubmissionRecord;

/// Everywhere a submission touches the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPaths {
    /// Directory the media file lands in
    pub dir: PathBuf,
    /// Media file path, `{title} ({id}) - {filename}`
    pub file: PathBuf,
    /// Pre-rename layout, `{title} - {filename}`, checked for files
    /// downloaded by older runs
    pub legacy: PathBuf,
    /// Metadata record path in the `metadata/` sibling directory
    pub metadata: PathBuf,
}

/// Makes a string safe as a single path component.
///
/// Separators, reserved punctuation and control characters become `_`;
/// trailing dots and spaces are trimmed for Windows compatibility.
pub fn sanitize_component(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    while out.ends_with(['.', ' ']) {
        out.pop();
    }
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// Computes the output paths for one submission under the configured
/// layout.
pub fn submission_paths(config: &Config, record: &SubmissionRecord) -> SubmissionPaths {
    let mut dir = config.output_root.join(sanitize_component(&record.author));

    if let Some(subdir) = config.category.dir_name() {
        for segment in subdir.split('/') {
            dir.push(sanitize_component(segment));
        }
    }
    if config.rating_folders {
        dir.push(record.rating.as_str());
    }

    let title = sanitize_component(&record.title);
    let filename = sanitize_component(&record.filename);

    let file = dir.join(format!("{} ({}) - {}", title, record.id, filename));
    let legacy = dir.join(format!("{} - {}", title, filename));
    let metadata = dir
        .join("metadata")
        .join(format!("{} - {}.json", title, filename));

    SubmissionPaths {
        dir,
        file,
        legacy,
        metadata,
    }
}
