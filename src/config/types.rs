use std::fmt;
use std::path::PathBuf;

/// Which listing of a user's content is being crawled.
///
/// The category decides the listing URL, the pagination scheme and the
/// optional subdirectory in the output layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    /// Main gallery, sequentially numbered pages
    Gallery,
    /// Scraps, sequentially numbered pages
    Scraps,
    /// Favorites, chained through `<id>/next` tokens
    Favorites,
    /// A gallery folder, given as `<folder-id>/<Folder-Name>`
    Folder(String),
    /// The logged-in user's submissions inbox, chained through
    /// `new~<id>@<page-size>` tokens
    Submissions,
}

impl Category {
    /// Parses the positional category argument.
    pub fn from_arg(value: &str) -> Option<Self> {
        match value {
            "gallery" => Some(Category::Gallery),
            "scraps" => Some(Category::Scraps),
            "favorites" => Some(Category::Favorites),
            _ => None,
        }
    }

    /// Subdirectory under the author directory, if the category gets one.
    ///
    /// The main gallery and the submissions inbox write directly into the
    /// author directory; folders use their full `<id>/<name>` path.
    pub fn dir_name(&self) -> Option<&str> {
        match self {
            Category::Gallery | Category::Submissions => None,
            Category::Scraps => Some("scraps"),
            Category::Favorites => Some("favorites"),
            Category::Folder(path) => Some(path),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Gallery => write!(f, "gallery"),
            Category::Scraps => write!(f, "scraps"),
            Category::Favorites => write!(f, "favorites"),
            Category::Folder(path) => write!(f, "folder {}", path),
            Category::Submissions => write!(f, "submissions"),
        }
    }
}

/// How the description field is recorded in metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionFormat {
    /// A single normalized text blob (CRLF collapsed to LF)
    Text,
    /// A list of trimmed paragraph strings
    Paragraphs,
    /// The raw HTML fragment of the description element
    Html,
}

/// Immutable crawl configuration shared by every component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Site root, overridable so tests can point at a mock server
    pub base_url: String,

    /// Usernames to crawl, in order
    pub usernames: Vec<String>,

    /// Content category to crawl for each username
    pub category: Category,

    /// Root of the output tree
    pub output_root: PathBuf,

    /// Netscape cookie file for session auth, if any
    pub cookie_file: Option<PathBuf>,

    /// User-agent header attached to every request
    pub user_agent: String,

    /// Raw start cursor from the command line, if any
    pub start: Option<String>,

    /// Raw stop cursor from the command line, if any
    pub stop: Option<String>,

    /// Delay between processed submissions, in seconds
    pub interval_secs: u64,

    /// Re-download files even when the index or disk says they exist
    pub redownload: bool,

    /// Separate downloads into General/Mature/Adult subfolders
    pub rating_folders: bool,

    /// Enable the title filter
    pub filter_enabled: bool,

    /// Title filter pattern (alternation of substrings, case-insensitive)
    pub filter_pattern: String,

    /// Write a JSON metadata record next to each download
    pub metadata: bool,

    /// Stop the crawl at the first already-downloaded submission
    pub check: bool,

    /// Description recording mode
    pub description_format: DescriptionFormat,

    /// Retries for page fetches before giving up
    pub fetch_retries: u32,

    /// Attempts for a media download before skipping the item
    pub download_retries: u32,
}

pub const DEFAULT_BASE_URL: &str = "https://www.furaffinity.net";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:101.0) Gecko/20100101 Firefox/101.0";

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            usernames: Vec::new(),
            category: Category::Gallery,
            output_root: PathBuf::from("Submissions"),
            cookie_file: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            start: None,
            stop: None,
            interval_secs: 0,
            redownload: false,
            rating_folders: true,
            filter_enabled: false,
            filter_pattern: crate::crawler::DEFAULT_FILTER_PATTERN.to_string(),
            metadata: false,
            check: false,
            description_format: DescriptionFormat::Text,
            fetch_retries: 3,
            download_retries: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_arg() {
        assert_eq!(Category::from_arg("gallery"), Some(Category::Gallery));
        assert_eq!(Category::from_arg("scraps"), Some(Category::Scraps));
        assert_eq!(Category::from_arg("favorites"), Some(Category::Favorites));
        assert_eq!(Category::from_arg("journal"), None);
    }

    #[test]
    fn test_gallery_has_no_subdirectory() {
        assert_eq!(Category::Gallery.dir_name(), None);
        assert_eq!(Category::Submissions.dir_name(), None);
    }

    #[test]
    fn test_folder_keeps_full_path() {
        let cat = Category::Folder("123456/Folder-Name".to_string());
        assert_eq!(cat.dir_name(), Some("123456/Folder-Name"));
    }
}
