use std::path::Path;

use crate::config::Category;
use crate::crawler::Cursor;
use crate::ConfigError;

/// Checks a username against the site's allowed character set.
///
/// Usernames may contain ASCII letters, digits, `-`, `~`, `.` and `_`.
/// Spaces are tolerated here because [`normalize_username`] strips them
/// before the name is used in a URL.
pub fn validate_username(username: &str) -> Result<(), ConfigError> {
    let ok = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '~' | '.' | '_' | ' '));

    if ok && !username.trim().is_empty() {
        Ok(())
    } else {
        Err(ConfigError::InvalidUsername(username.to_string()))
    }
}

/// Normalizes a username for use in listing URLs.
///
/// The site drops spaces and underscores from the URL form of a name.
pub fn normalize_username(username: &str) -> String {
    username
        .chars()
        .filter(|c| *c != ' ' && *c != '_')
        .collect()
}

/// Resolves the username argument into a validated list of names.
///
/// The argument is either a path to a newline-delimited username file or a
/// whitespace-separated list of names.
pub fn resolve_usernames(raw: &str) -> Result<Vec<String>, ConfigError> {
    let path = Path::new(raw);

    let names: Vec<String> = if path.is_file() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        contents
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    } else {
        raw.split_whitespace().map(|s| s.to_string()).collect()
    };

    if names.is_empty() {
        return Err(ConfigError::MissingUsername);
    }

    for name in &names {
        validate_username(name)?;
    }

    Ok(names)
}

/// Parses a start or stop cursor from its command-line form.
///
/// Sequential categories take a plain page number. Favorites take
/// `<digits>` or `<digits>/next`. The submissions inbox takes
/// `<digits>@<page-size>`, with or without the `new~` prefix the site
/// renders in hrefs.
pub fn parse_cursor(
    raw: &str,
    category: &Category,
    kind: &'static str,
) -> Result<Cursor, ConfigError> {
    let invalid = || ConfigError::InvalidCursor {
        kind,
        value: raw.to_string(),
    };

    match category {
        Category::Gallery | Category::Scraps | Category::Folder(_) => raw
            .parse::<u64>()
            .map(Cursor::Page)
            .map_err(|_| invalid()),
        Category::Favorites => {
            let digits = raw.strip_suffix("/next").unwrap_or(raw);
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                Ok(Cursor::Favorites(format!("{}/next", digits)))
            } else {
                Err(invalid())
            }
        }
        Category::Submissions => {
            let token = raw.strip_prefix("new~").unwrap_or(raw);
            let (id, size) = token.split_once('@').ok_or_else(invalid)?;
            let numeric =
                |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
            if numeric(id) && numeric(size) {
                Ok(Cursor::Inbox(token.to_string()))
            } else {
                Err(invalid())
            }
        }
    }
}
