//! Netscape cookie file loading
//!
//! Session auth is supplied as a Netscape/Mozilla cookie-jar text file, the
//! format browser exporters and curl produce: one cookie per line with
//! seven tab-separated fields (domain, include-subdomains flag, path,
//! secure flag, expiry, name, value). Lines starting with `#` are comments,
//! except for the `#HttpOnly_` domain prefix some exporters emit.

use std::path::Path;
use std::sync::Arc;

use reqwest::cookie::Jar;
use url::Url;

use crate::ConfigError;

/// Loads a Netscape cookie file into a cookie jar usable by the HTTP client.
///
/// Each cookie is registered against its own domain, so the jar is correct
/// even when the file mixes hosts.
pub fn load_cookie_jar(path: &Path) -> Result<Arc<Jar>, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let jar = Jar::default();

    for (number, raw_line) in contents.lines().enumerate() {
        let line = raw_line.trim_end_matches(['\r', '\n']);

        // `#HttpOnly_.example.com` lines are real cookies in disguise
        let line = if let Some(rest) = line.strip_prefix("#HttpOnly_") {
            rest
        } else if line.is_empty() || line.starts_with('#') {
            continue;
        } else {
            line
        };

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 7 {
            return Err(ConfigError::MalformedCookie {
                line: number + 1,
                reason: format!("expected 7 tab-separated fields, got {}", fields.len()),
            });
        }

        let domain = fields[0].trim_start_matches('.');
        let cookie_path = fields[2];
        let name = fields[5];
        let value = fields[6];

        if domain.is_empty() || name.is_empty() {
            return Err(ConfigError::MalformedCookie {
                line: number + 1,
                reason: "empty domain or cookie name".to_string(),
            });
        }

        let origin = Url::parse(&format!("https://{}/", domain)).map_err(|e| {
            ConfigError::MalformedCookie {
                line: number + 1,
                reason: format!("bad domain '{}': {}", domain, e),
            }
        })?;

        let cookie = format!(
            "{}={}; Domain={}; Path={}",
            name, value, fields[0], cookie_path
        );
        jar.add_cookie_str(&cookie, &origin);
    }

    Ok(Arc::new(jar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_cookie_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_typical_export() {
        let file = write_cookie_file(
            "# Netscape HTTP Cookie File\n\
             # This is a generated file!  Do not edit.\n\
             .furaffinity.net\tTRUE\t/\tTRUE\t1999999999\ta\tabcdef\n\
             .furaffinity.net\tTRUE\t/\tTRUE\t1999999999\tb\t123456\n",
        );
        assert!(load_cookie_jar(file.path()).is_ok());
    }

    #[test]
    fn test_httponly_prefix_is_a_cookie() {
        let file = write_cookie_file(
            "#HttpOnly_.furaffinity.net\tTRUE\t/\tTRUE\t1999999999\ta\tabcdef\n",
        );
        assert!(load_cookie_jar(file.path()).is_ok());
    }

    #[test]
    fn test_short_line_is_rejected() {
        let file = write_cookie_file(".furaffinity.net\tTRUE\t/\n");
        let err = load_cookie_jar(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedCookie { line: 1, .. }));
    }

    #[test]
    fn test_blank_lines_and_comments_skipped() {
        let file = write_cookie_file("\n# comment\n\n");
        assert!(load_cookie_jar(file.path()).is_ok());
    }
}
