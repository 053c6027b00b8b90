//! Submission detail-page extraction
//!
//! Turns a detail document into a typed [`SubmissionRecord`]. The record is
//! built once per fetch and never mutated; it is persisted as metadata only
//! when metadata saving is enabled, otherwise it is discarded after the
//! download decision.

use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::listing::{notice_message, parse_view_id};
use super::selector;
use crate::config::DescriptionFormat;

/// Site rating of a submission; decides the optional output subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Rating {
    General,
    Mature,
    Adult,
}

impl Rating {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("general") {
            Some(Rating::General)
        } else if text.eq_ignore_ascii_case("mature") {
            Some(Rating::Mature)
        } else if text.eq_ignore_ascii_case("adult") {
            Some(Rating::Adult)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::General => "General",
            Rating::Mature => "Mature",
            Rating::Adult => "Adult",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The description in whichever shape the configuration asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Description {
    /// A single text blob with CRLF normalized to LF
    Text(String),
    /// Trimmed paragraph strings
    Paragraphs(Vec<String>),
    /// The raw HTML fragment
    Html(String),
}

/// One comment under a submission.
///
/// Comments whose permalink anchor is absent (deleted or hidden) are
/// skipped entirely and never appear as stubs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub cid: u64,
    /// Absent on top-level comments
    pub parent_cid: Option<u64>,
    pub content: String,
    pub username: String,
    pub date: String,
}

/// The extracted, typed representation of one submission.
///
/// Field order is the metadata key order on disk.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionRecord {
    pub id: u64,
    pub filename: String,
    pub author: String,
    pub date: String,
    pub title: String,
    pub description: Description,
    pub url: String,
    pub tags: Vec<String>,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub species: String,
    pub gender: String,
    pub views: u64,
    pub favorites: u64,
    pub rating: Rating,
    pub comments: Vec<CommentRecord>,
    /// Media file URL; not part of the serialized metadata shape
    #[serde(skip)]
    pub media_url: String,
}

/// A detail page that could not be turned into a record.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The site rendered a notice instead of the submission
    #[error("System message: {0}")]
    Notice(String),

    /// A structurally required element is absent
    #[error("Missing {what} on {path}")]
    Missing { what: &'static str, path: String },

    /// The info panel does not match any known layout
    #[error("Unrecognized info panel layout on {0}")]
    InfoPanelLayout(String),

    /// The detail path carries no submission id
    #[error("No submission id in path '{0}'")]
    BadPath(String),
}

/// Extracts a [`SubmissionRecord`] from a detail document.
///
/// Structurally required fields (download link, title, author, rating) fail
/// the extraction; optional fields (tags, counters, date) degrade with a
/// warning.
pub fn extract(
    html: &str,
    path: &str,
    base_url: &str,
    format: DescriptionFormat,
) -> Result<SubmissionRecord, ExtractError> {
    let doc = Html::parse_document(html);

    if let Some(message) = notice_message(&doc) {
        return Err(ExtractError::Notice(message));
    }

    let id = parse_view_id(path).ok_or_else(|| ExtractError::BadPath(path.to_string()))?;
    let missing = |what: &'static str| ExtractError::Missing {
        what,
        path: path.to_string(),
    };

    let download_href = doc
        .select(&selector(".download a"))
        .next()
        .and_then(|a| a.value().attr("href"))
        .ok_or_else(|| missing("download link"))?;
    let filename = download_href
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| missing("media filename"))?
        .to_string();

    let title = first_text(&doc, ".submission-title p").ok_or_else(|| missing("title"))?;
    let author = first_text(&doc, ".submission-id-sub-container a strong")
        .ok_or_else(|| missing("author"))?;
    let rating = first_text(&doc, ".rating-box")
        .and_then(|badge| Rating::parse(&badge))
        .ok_or_else(|| missing("rating badge"))?;

    let date = doc
        .select(&selector(".popup_date"))
        .next()
        .map(|el| {
            el.value()
                .attr("title")
                .map(str::to_string)
                .unwrap_or_else(|| element_text(el))
        })
        .unwrap_or_else(|| {
            tracing::warn!("\"{}\" has no post date", title);
            String::new()
        });

    let (category, kind, species, gender) = info_panel(&doc, path)?;

    let tags: Vec<String> = doc
        .select(&selector(".tags-row .tags a"))
        .map(element_text)
        .filter(|tag| !tag.is_empty())
        .collect();
    if tags.is_empty() {
        tracing::warn!("\"{}\" has no tags", title);
    }

    Ok(SubmissionRecord {
        id,
        filename,
        author,
        date,
        title,
        description: description(&doc, format),
        url: format!("{}{}", base_url, path),
        tags,
        category,
        kind,
        species,
        gender,
        views: counter(&doc, ".views .font-large", "views"),
        favorites: counter(&doc, ".favorites .font-large", "favorites"),
        rating,
        comments: comments(&doc),
        media_url: media_url(download_href, base_url),
    })
}

/// Case-insensitive title filter for promotional/auction-style posts.
///
/// The pattern must span the whole title (punctuation at the edges is
/// tolerated); a substring hit alone does not filter.
pub struct TitleFilter {
    pattern: Regex,
}

/// Alternation of promotional title shapes (YCH/commission state changes,
/// ad-style posts). Overridable from the command line.
pub const DEFAULT_FILTER_PATTERN: &str = concat!(
    r#"YCH[a-z $-/:-?{-~!"^_`\[\]]*OPEN"#,
    r#"|OPEN[a-z $-/:-?{-~!"^_`\[\]]*YCH"#,
    r#"|YCH[a-z $-/:-?{-~!"^_`\[\]]*CLOSE"#,
    r#"|CLOSE[a-z $-/:-?{-~!"^_`\[\]]*YCH"#,
    r#"|YCH[a-z $-/:-?{-~!"^_`\[\]]*ABLE"#,
    r#"|AVAIL[a-z $-/:-?{-~!"^_`\[\]]*YCH"#,
    r#"|YCH[a-z $-/:-?{-~!"^_`\[\]]*CLONE"#,
    r#"|CLONE[a-z $-/:-?{-~!"^_`\[\]]*YCH"#,
    r#"|YCH[a-z $-/:-?{-~!"^_`\[\]]*LIM"#,
    r#"|LIM[a-z $-/:-?{-~!"^_`\[\]]*YCH"#,
    r#"|COM[a-z $-/:-?{-~!"^_`\[\]]*OPEN"#,
    r#"|OPEN[a-z $-/:-?{-~!"^_`\[\]]*COM"#,
    r#"|COM[a-z $-/:-?{-~!"^_`\[\]]*CLOSE[^r]"#,
    r#"|CLOSE[a-z $-/:-?{-~!"^_`\[\]]*COM"#,
    r#"|FIX[a-z $-/:-?{-~!"^_`\[\]]*ICE"#,
    r#"|TELEGRAM[a-z $-/:-?{-~!"^_`\[\]]*STICK"#,
    r#"|TG[a-z $-/:-?{-~!"^_`\[\]]*STICK"#,
    r#"|REM[insder]*\b"#,
    r#"|\bREF|\bSale|auction|multislot|stream|adopt"#,
);

impl TitleFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(r"(?i)^\W*(?:{})\W*$", pattern))?;
        Ok(TitleFilter { pattern })
    }

    pub fn matches(&self, title: &str) -> bool {
        self.pattern.is_match(title)
    }
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    doc.select(&selector(css))
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Protocol-relative media links become https; site-relative ones are
/// joined onto the base URL.
fn media_url(href: &str, base_url: &str) -> String {
    if let Some(rest) = href.strip_prefix("//") {
        format!("https://{}", rest)
    } else if href.starts_with('/') {
        format!("{}{}", base_url, href)
    } else {
        href.to_string()
    }
}

/// Info panel fields, keyed by label where the markup carries one.
///
/// The category/type pair has dedicated classes; species and gender are
/// looked up by their label text, falling back to the historical positional
/// layout (third and fourth panel rows). A panel that matches neither shape
/// is a structural error, not a silent misassignment.
fn info_panel(doc: &Html, path: &str) -> Result<(String, String, String, String), ExtractError> {
    let layout_error = || ExtractError::InfoPanelLayout(path.to_string());
    let info = doc
        .select(&selector(".info"))
        .next()
        .ok_or_else(layout_error)?;

    let category = info
        .select(&selector(".category-name"))
        .next()
        .map(element_text);
    let kind = info.select(&selector(".type-name")).next().map(element_text);

    let species = labeled_field(info, "Species").or_else(|| positional_field(info, 2));
    let gender = labeled_field(info, "Gender").or_else(|| positional_field(info, 3));

    match (category, kind, species, gender) {
        (Some(category), Some(kind), Some(species), Some(gender)) => {
            Ok((category, kind, species, gender))
        }
        _ => Err(layout_error()),
    }
}

fn labeled_field(info: ElementRef, label: &str) -> Option<String> {
    for row in info.select(&selector("div")) {
        let matches_label = row
            .select(&selector("strong"))
            .next()
            .map(|strong| element_text(strong).eq_ignore_ascii_case(label))
            .unwrap_or(false);
        if matches_label {
            return row.select(&selector("span")).next().map(element_text);
        }
    }
    None
}

fn positional_field(info: ElementRef, index: usize) -> Option<String> {
    let rows: Vec<ElementRef> = info.select(&selector("div")).collect();
    rows.get(index)
        .and_then(|row| row.select(&selector("span")).next())
        .map(element_text)
}

fn counter(doc: &Html, css: &str, what: &str) -> u64 {
    match first_text(doc, css).and_then(|text| text.parse().ok()) {
        Some(count) => count,
        None => {
            tracing::warn!("Missing {} counter, recording 0", what);
            0
        }
    }
}

fn description(doc: &Html, format: DescriptionFormat) -> Description {
    let Some(el) = doc.select(&selector(".submission-description")).next() else {
        tracing::warn!("Submission has no description");
        return match format {
            DescriptionFormat::Paragraphs => Description::Paragraphs(Vec::new()),
            DescriptionFormat::Html => Description::Html(String::new()),
            DescriptionFormat::Text => Description::Text(String::new()),
        };
    };

    match format {
        DescriptionFormat::Text => Description::Text(
            el.text()
                .collect::<String>()
                .trim()
                .replace("\r\n", "\n"),
        ),
        DescriptionFormat::Paragraphs => Description::Paragraphs(
            el.text()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        ),
        DescriptionFormat::Html => Description::Html(el.inner_html().trim().to_string()),
    }
}

/// Walks the comment containers in document order. The order is whatever
/// the site rendered and is deliberately not re-sorted.
fn comments(doc: &Html) -> Vec<CommentRecord> {
    let mut records = Vec::new();

    for container in doc.select(&selector(".comment_container")) {
        // No permalink anchor means the comment is deleted or hidden
        let Some(cid) = container
            .select(&selector(".comment-link"))
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(parse_cid)
        else {
            continue;
        };

        let parent_cid = container
            .select(&selector(".comment-parent"))
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(parse_cid);

        let content = container
            .select(&selector(".comment_text"))
            .next()
            .and_then(|el| el.text().map(str::trim).find(|text| !text.is_empty()))
            .unwrap_or_default()
            .to_string();

        let username = container
            .select(&selector(".comment_username"))
            .next()
            .map(element_text)
            .unwrap_or_default();

        let date = container
            .select(&selector(".popup_date"))
            .next()
            .and_then(|el| el.value().attr("title"))
            .unwrap_or_default()
            .to_string();

        records.push(CommentRecord {
            cid,
            parent_cid,
            content,
            username,
            date,
        });
    }

    records
}

/// Comment permalinks look like `#cid:167035021`.
fn parse_cid(href: &str) -> Option<u64> {
    href.rsplit(':').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://www.furaffinity.net";

    fn detail_html() -> String {
        r##"<html><body>
        <div class="submission-title"><h2><p>Morning Patrol</p></h2></div>
        <div class="submission-id-sub-container">
            <a href="/user/koul/"><strong>koul</strong></a>
            <span class="popup_date" title="Jul 2, 2022 01:23 PM">2 months ago</span>
        </div>
        <div class="download"><a href="//d.furaffinity.net/art/koul/1656789000/1656789000.koul_patrol.png">Download</a></div>
        <div class="rating-box inline normal"><span class="font-large">General</span></div>
        <div class="submission-description">
            A quiet morning.
            <br> Commissioned piece.
        </div>
        <section class="info text">
            <div><span class="category-name">Artwork (Digital)</span> / <span class="type-name">General Furry Art</span></div>
            <div><strong class="highlight">Size</strong> <span>1280 x 720</span></div>
            <div><strong class="highlight">Species</strong> <span>Wolf</span></div>
            <div><strong class="highlight">Gender</strong> <span>Male</span></div>
        </section>
        <div class="views"><span class="font-large">1234</span></div>
        <div class="favorites"><span class="font-large">56</span></div>
        <section class="tags-row">
            <span class="tags"><a href="/search/@keywords wolf">wolf</a></span>
            <span class="tags"><a href="/search/@keywords forest">forest</a></span>
        </section>
        <div class="comment_container">
            <a class="comment-link" href="#cid:167035021">#1</a>
            <div class="comment_username"><h3>radiquum</h3></div>
            <div class="comment_text">Lovely light!</div>
            <span class="popup_date" title="Jul 3, 2022 09:00 AM">a while ago</span>
        </div>
        <div class="comment_container">
            <a class="comment-link" href="#cid:167035099">#2</a>
            <a class="comment-parent" href="#cid:167035021">parent</a>
            <div class="comment_username"><h3>koul</h3></div>
            <div class="comment_text">Thank you!</div>
            <span class="popup_date" title="Jul 3, 2022 10:00 AM">a while ago</span>
        </div>
        <div class="comment_container">
            <div class="comment_text">[deleted]</div>
        </div>
        </body></html>"##
            .to_string()
    }

    #[test]
    fn test_extract_full_record() {
        let record = extract(
            &detail_html(),
            "/view/47526990/",
            BASE,
            DescriptionFormat::Text,
        )
        .unwrap();

        assert_eq!(record.id, 47526990);
        assert_eq!(record.filename, "1656789000.koul_patrol.png");
        assert_eq!(record.author, "koul");
        assert_eq!(record.title, "Morning Patrol");
        assert_eq!(record.date, "Jul 2, 2022 01:23 PM");
        assert_eq!(record.url, "https://www.furaffinity.net/view/47526990/");
        assert_eq!(record.rating, Rating::General);
        assert_eq!(record.category, "Artwork (Digital)");
        assert_eq!(record.kind, "General Furry Art");
        assert_eq!(record.species, "Wolf");
        assert_eq!(record.gender, "Male");
        assert_eq!(record.views, 1234);
        assert_eq!(record.favorites, 56);
        assert_eq!(record.tags, vec!["wolf", "forest"]);
        assert_eq!(
            record.media_url,
            "https://d.furaffinity.net/art/koul/1656789000/1656789000.koul_patrol.png"
        );
    }

    #[test]
    fn test_deleted_comment_is_skipped_entirely() {
        let record = extract(
            &detail_html(),
            "/view/47526990/",
            BASE,
            DescriptionFormat::Text,
        )
        .unwrap();

        assert_eq!(record.comments.len(), 2);
        assert_eq!(record.comments[0].cid, 167035021);
        assert_eq!(record.comments[0].parent_cid, None);
        assert_eq!(record.comments[0].username, "radiquum");
        assert_eq!(record.comments[0].content, "Lovely light!");
        assert_eq!(record.comments[1].cid, 167035099);
        assert_eq!(record.comments[1].parent_cid, Some(167035021));
    }

    #[test]
    fn test_notice_page_yields_notice_error() {
        let html = r#"<html><body>
            <section class="notice-message">
              <div><div class="link-override">You must be logged in to view this content.</div></div>
            </section>
        </body></html>"#;
        let err = extract(html, "/view/1/", BASE, DescriptionFormat::Text).unwrap_err();
        assert!(
            matches!(err, ExtractError::Notice(ref msg) if msg == "You must be logged in to view this content.")
        );
    }

    #[test]
    fn test_missing_download_link_is_structural() {
        let html = detail_html().replace("class=\"download\"", "class=\"no-download\"");
        let err = extract(&html, "/view/47526990/", BASE, DescriptionFormat::Text).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Missing {
                what: "download link",
                ..
            }
        ));
    }

    #[test]
    fn test_unrecognized_info_panel_is_an_error_not_misassignment() {
        let html = detail_html()
            .replace("Species", "Speshies")
            .replace(
                r#"<div><strong class="highlight">Size</strong> <span>1280 x 720</span></div>"#,
                "",
            )
            .replace("Gender", "Sex");
        let err = extract(&html, "/view/47526990/", BASE, DescriptionFormat::Text).unwrap_err();
        assert!(matches!(err, ExtractError::InfoPanelLayout(_)));
    }

    #[test]
    fn test_positional_fallback_without_labels() {
        let html = detail_html()
            .replace(r#"<strong class="highlight">Size</strong>"#, "Size")
            .replace(r#"<strong class="highlight">Species</strong>"#, "Species")
            .replace(r#"<strong class="highlight">Gender</strong>"#, "Gender");
        // labels gone; rows 2 and 3 still carry species and gender spans
        let record =
            extract(&html, "/view/47526990/", BASE, DescriptionFormat::Text).unwrap();
        assert_eq!(record.species, "Wolf");
        assert_eq!(record.gender, "Male");
    }

    #[test]
    fn test_missing_tags_degrade_to_empty() {
        let html = detail_html().replace("tags-row", "tags-gone");
        let record =
            extract(&html, "/view/47526990/", BASE, DescriptionFormat::Text).unwrap();
        assert!(record.tags.is_empty());
    }

    #[test]
    fn test_description_paragraphs_mode() {
        let record = extract(
            &detail_html(),
            "/view/47526990/",
            BASE,
            DescriptionFormat::Paragraphs,
        )
        .unwrap();
        let Description::Paragraphs(paragraphs) = record.description else {
            panic!("expected paragraph list");
        };
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs[1].contains("Commissioned piece."));
    }

    #[test]
    fn test_filter_requires_full_match() {
        let filter = TitleFilter::new(DEFAULT_FILTER_PATTERN).unwrap();
        assert!(filter.matches("YCH OPEN!!"));
        assert!(filter.matches("ych open"));
        assert!(filter.matches("auction"));
        assert!(filter.matches("Reminder"));
        assert!(!filter.matches("My YCH artwork commentary"));
        assert!(!filter.matches("Morning Patrol"));
    }

    #[test]
    fn test_metadata_shape_and_key_names() {
        let record = extract(
            &detail_html(),
            "/view/47526990/",
            BASE,
            DescriptionFormat::Text,
        )
        .unwrap();
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["type"], "General Furry Art");
        assert_eq!(json["rating"], "General");
        assert_eq!(json["comments"][1]["parent_cid"], 167035021);
        // the media URL rides along outside the serialized shape
        assert!(json.get("media_url").is_none());
    }
}
