//! Listing pages and per-category pagination
//!
//! A listing page is parsed into its submission entries plus the cursor for
//! the next page. Three pagination schemes coexist on the site:
//! - gallery/scraps/folder pages are sequentially numbered,
//! - the submissions inbox chains `new~<id>@<page-size>` tokens,
//! - favorites chain `<id>/next` tokens.
//!
//! A cursor is only ever produced by parsing the current page's next
//! control; it is never synthesized. A page without a next control is the
//! normal end of content.

use std::fmt;

use regex::Regex;
use scraper::{ElementRef, Html};

use super::selector;
use crate::config::Category;

/// Position within a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// The first page of a category that has no explicit start token
    Start,
    /// Sequential page number (gallery, scraps, folders)
    Page(u64),
    /// Favorites token, carried in the URL as `<id>/next`
    Favorites(String),
    /// Submissions inbox token `<id>@<page-size>`, rendered into URLs
    /// with the `new~` prefix the site uses
    Inbox(String),
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cursor::Start => write!(f, "start"),
            Cursor::Page(n) => write!(f, "{}", n),
            Cursor::Favorites(token) => write!(f, "{}", token),
            Cursor::Inbox(token) => write!(f, "new~{}", token),
        }
    }
}

/// One submission entry on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    /// Submission id
    pub id: u64,
    /// Detail page path, e.g. `/view/47526990/`
    pub path: String,
    /// Caption title as rendered on the listing
    pub title: String,
}

/// A successfully parsed listing page.
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// Entries in document order
    pub items: Vec<ListingItem>,
    /// Cursor for the following page, absent at the end of content
    pub next: Option<Cursor>,
}

/// What a listing fetch turned out to contain.
#[derive(Debug, Clone)]
pub enum PageOutcome {
    /// The site rendered a notice instead of the listing
    Notice(String),
    /// Explicit empty state or a page without entries
    Empty,
    /// A regular listing page
    Listing(ListingPage),
}

/// Builds the site path for a listing page of `category` at `cursor`.
pub fn listing_path(category: &Category, username: &str, cursor: &Cursor) -> String {
    let page = match cursor {
        Cursor::Page(n) => *n,
        _ => 1,
    };
    match category {
        Category::Gallery => format!("/gallery/{}/{}/", username, page),
        Category::Scraps => format!("/scraps/{}/{}/", username, page),
        Category::Folder(folder) => format!("/gallery/{}/folder/{}/{}/", username, folder, page),
        Category::Favorites => match cursor {
            Cursor::Favorites(token) => format!("/favorites/{}/{}/", username, token),
            _ => format!("/favorites/{}/", username),
        },
        Category::Submissions => match cursor {
            Cursor::Inbox(token) => format!("/msg/submissions/new~{}/", token),
            _ => "/msg/submissions/".to_string(),
        },
    }
}

/// Parses the submission id out of a detail path like `/view/47526990/`.
pub fn parse_view_id(path: &str) -> Option<u64> {
    path.trim_end_matches('/').rsplit('/').next()?.parse().ok()
}

/// Parses a listing document into its outcome for the crawl controller.
pub fn parse_listing(html: &str, category: &Category) -> PageOutcome {
    let doc = Html::parse_document(html);

    if let Some(message) = notice_message(&doc) {
        return PageOutcome::Notice(message);
    }

    if doc.select(&selector("#no-images")).next().is_some() {
        return PageOutcome::Empty;
    }

    let items = listing_items(&doc);
    if items.is_empty() {
        return PageOutcome::Empty;
    }

    let next = match category {
        Category::Gallery | Category::Scraps | Category::Folder(_) => next_sequential(&doc),
        Category::Submissions => next_inbox(&doc),
        Category::Favorites => next_favorites(&doc),
    };

    PageOutcome::Listing(ListingPage { items, next })
}

/// The logged-in account name, if the page carries a session avatar.
pub fn logged_in_user(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&selector(".loggedin_user_avatar"))
        .next()
        .and_then(|el| el.value().attr("alt"))
        .map(str::to_string)
}

/// Extracts the message text of a `notice-message` region, if one exists.
///
/// An unparseable notice body still produces a generic message so the
/// caller terminates instead of crawling past a gated page.
pub(crate) fn notice_message(doc: &Html) -> Option<String> {
    let notice = doc.select(&selector(".notice-message")).next()?;

    let message = notice
        .select(&selector(".link-override"))
        .next()
        .or_else(|| notice.select(&selector(".redirect-message")).next())
        .map(element_text)
        .unwrap_or_else(|| element_text(notice));

    if message.is_empty() {
        Some("Unable to read system notice".to_string())
    } else {
        Some(message)
    }
}

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn listing_items(doc: &Html) -> Vec<ListingItem> {
    let mut items = Vec::new();

    for figure in doc.select(&selector("figure")) {
        let Some(href) = figure
            .select(&selector("a[href]"))
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        // Prefer the `sid-<id>` figure attribute, fall back to the href
        let id = figure
            .value()
            .attr("id")
            .and_then(|id| id.strip_prefix("sid-"))
            .and_then(|digits| digits.parse().ok())
            .or_else(|| parse_view_id(href));

        let Some(id) = id else {
            tracing::debug!("Skipping figure without a submission id ({})", href);
            continue;
        };

        let title = figure
            .select(&selector("figcaption a"))
            .next()
            .map(|a| {
                a.value()
                    .attr("title")
                    .map(str::to_string)
                    .unwrap_or_else(|| element_text(a))
            })
            .unwrap_or_default();

        items.push(ListingItem {
            id,
            path: href.to_string(),
            title,
        });
    }

    items
}

/// Sequential pages advance through a form whose button reads "Next"; the
/// target page number is the second-to-last segment of the form action.
fn next_sequential(doc: &Html) -> Option<Cursor> {
    for form in doc.select(&selector("form[action]")) {
        let is_next = form
            .select(&selector("button.button.standard"))
            .any(|button| element_text(button) == "Next");
        if !is_next {
            continue;
        }

        let action = form.value().attr("action")?;
        return second_to_last_segment(action)?.parse().ok().map(Cursor::Page);
    }
    None
}

/// The inbox renders two structurally different "load more" controls; both
/// must be checked before concluding no further page exists.
fn next_inbox(doc: &Html) -> Option<Cursor> {
    let more = doc
        .select(&selector("a.button.standard.more"))
        .next()
        .or_else(|| doc.select(&selector("a.button.standard.more-half")).next())?;

    let href = more.value().attr("href")?;
    let token = second_to_last_segment(href)?;
    let token = token.strip_prefix("new~").unwrap_or(token);
    if token.is_empty() {
        None
    } else {
        Some(Cursor::Inbox(token.to_string()))
    }
}

/// Favorites chain through the last run of digits in the "Next" link,
/// reconstructed as `<digits>/next`.
fn next_favorites(doc: &Html) -> Option<Cursor> {
    let next = doc
        .select(&selector("a.button.standard.right"))
        .find(|a| element_text(*a) == "Next")?;

    let href = next.value().attr("href")?;
    let digits = Regex::new(r"\d+").expect("static pattern");
    let token = digits.find_iter(href).last()?;
    Some(Cursor::Favorites(format!("{}/next", token.as_str())))
}

fn second_to_last_segment(path: &str) -> Option<&str> {
    let segments: Vec<&str> = path.split('/').collect();
    if segments.len() < 2 {
        return None;
    }
    Some(segments[segments.len() - 2])
}
