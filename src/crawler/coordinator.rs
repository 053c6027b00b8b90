//! Crawl coordination
//!
//! Drives one (username x category) crawl to completion: walk listing
//! pages, filter and dedup the entries, fetch and extract each detail
//! page, download the media file with bounded retry, record the id and
//! optionally the metadata, then advance the cursor.
//!
//! Per-item failures are logged and skipped; a system notice or an
//! exhausted page fetch ends that username's crawl only; operator
//! interruption aborts the whole run.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use console::style;

use crate::config::{
    load_cookie_jar, normalize_username, parse_cursor, Category, Config,
};
use crate::crawler::downloader::{DownloadError, Downloader};
use crate::crawler::fetcher::{build_http_client, FetchError, Fetcher};
use crate::crawler::listing::{listing_path, logged_in_user, parse_listing, Cursor, PageOutcome};
use crate::crawler::submission::{extract, ExtractError, TitleFilter};
use crate::index::DownloadIndex;
use crate::output::{submission_paths, write_metadata};
use crate::{ConfigError, FadlError};

/// Why a single crawl stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrawlEnd {
    /// The listing ran out of pages or entries
    EndOfContent,
    /// The configured stop cursor was reached
    StopReached,
    /// Check mode hit the first already-downloaded submission
    CaughtUp,
    /// The site answered with a notice instead of content
    Notice(String),
}

/// What happened to one listing entry.
enum ItemOutcome {
    Downloaded(PathBuf),
    Skipped,
    /// A pre-existing legacy-named file was found in check mode
    CaughtUp,
}

/// Owns the session and drives crawls for every configured username.
pub struct Coordinator {
    config: Config,
    fetcher: Fetcher,
    downloader: Downloader,
    index: DownloadIndex,
    filter: Option<TitleFilter>,
    cancel: Arc<AtomicBool>,
}

impl Coordinator {
    pub fn new(config: Config, cancel: Arc<AtomicBool>) -> crate::Result<Self> {
        std::fs::create_dir_all(&config.output_root)?;

        let jar = match &config.cookie_file {
            Some(path) => Some(load_cookie_jar(path)?),
            None => None,
        };
        let client = build_http_client(&config.user_agent, jar)?;
        let fetcher = Fetcher::new(client.clone(), config.base_url.clone(), config.fetch_retries);
        let downloader = Downloader::new(client, cancel.clone());
        let index = DownloadIndex::load(&config.output_root)?;

        let filter = if config.filter_enabled {
            let filter = TitleFilter::new(&config.filter_pattern)
                .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
            Some(filter)
        } else {
            None
        };

        Ok(Coordinator {
            config,
            fetcher,
            downloader,
            index,
            filter,
            cancel,
        })
    }

    /// Crawls every configured username in order.
    ///
    /// A failed crawl ends that username only; the next one still runs.
    pub async fn run(&mut self) -> crate::Result<()> {
        let usernames = match self.config.category {
            // the inbox belongs to the session, not to a listed user
            Category::Submissions => vec![String::new()],
            _ => self.config.usernames.clone(),
        };

        for username in usernames {
            match self.crawl_user(&username).await {
                Ok(end) => self.report_end(&username, &end),
                Err(FadlError::Aborted) => {
                    println!("{}", style("Finished downloading").green().bright());
                    return Err(FadlError::Aborted);
                }
                Err(e) => {
                    eprintln!(
                        "{}",
                        style(format!("Crawl for \"{}\" failed: {}", username, e)).red()
                    );
                }
            }
        }

        Ok(())
    }

    /// Walks one username's listing to a terminal condition.
    pub async fn crawl_user(&mut self, username: &str) -> crate::Result<CrawlEnd> {
        let username = normalize_username(username);
        let category = self.config.category.clone();

        let mut cursor = match &self.config.start {
            Some(raw) => parse_cursor(raw, &category, "start").map_err(FadlError::Config)?,
            None => Cursor::Start,
        };
        let stop = self
            .config
            .stop
            .as_ref()
            .map(|raw| parse_cursor(raw, &category, "stop"))
            .transpose()
            .map_err(FadlError::Config)?;

        let mut first_page = true;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(FadlError::Aborted);
            }
            if stop.as_ref() == Some(&cursor) {
                return Ok(CrawlEnd::StopReached);
            }

            let path = listing_path(&category, &username, &cursor);
            let html = match self.fetcher.fetch_page(&path).await {
                Ok(html) => html,
                Err(FetchError::AuthRequired { .. }) => {
                    let message = "Login required, import browser cookies with -c".to_string();
                    println!("{}", style(format!("System Message: {}", message)).yellow());
                    return Ok(CrawlEnd::Notice(message));
                }
                Err(e) => return Err(e.into()),
            };

            if first_page {
                self.report_account_status(&html);
                first_page = false;
            }

            let page = match parse_listing(&html, &category) {
                PageOutcome::Notice(message) => {
                    println!("{}", style(format!("System Message: {}", message)).yellow());
                    return Ok(CrawlEnd::Notice(message));
                }
                PageOutcome::Empty => {
                    self.note_unreached_stop(&stop);
                    return Ok(CrawlEnd::EndOfContent);
                }
                PageOutcome::Listing(page) => page,
            };

            println!("Downloading page {} - {}", cursor, path);

            for item in &page.items {
                if self.cancel.load(Ordering::Relaxed) {
                    return Err(FadlError::Aborted);
                }

                if let Some(filter) = &self.filter {
                    if filter.matches(&item.title) {
                        println!(
                            "{}",
                            style(format!(
                                "\"{}\" was filtered and will not be downloaded - {}{}",
                                item.title, self.config.base_url, item.path
                            ))
                            .yellow()
                        );
                        continue;
                    }
                }

                if !self.config.redownload && self.index.contains(item.id) {
                    if self.config.check {
                        self.report_caught_up(&username);
                        return Ok(CrawlEnd::CaughtUp);
                    }
                    println!(
                        "{}",
                        style(format!(
                            "Skipping \"{}\" since it's already downloaded",
                            item.title
                        ))
                        .yellow()
                    );
                    continue;
                }

                match self.process_item(&item.path).await {
                    Ok(ItemOutcome::CaughtUp) => {
                        self.report_caught_up(&username);
                        return Ok(CrawlEnd::CaughtUp);
                    }
                    Ok(_) => {}
                    Err(FadlError::Extract(ExtractError::Notice(message))) => {
                        println!("{}", style(format!("System Message: {}", message)).yellow());
                        return Ok(CrawlEnd::Notice(message));
                    }
                    Err(FadlError::Aborted) => return Err(FadlError::Aborted),
                    Err(e) => {
                        // the item is lost, the crawl is not
                        eprintln!(
                            "{}",
                            style(format!("Failed to download \"{}\": {}", item.title, e)).red()
                        );
                    }
                }

                if self.config.interval_secs > 0 {
                    tokio::time::sleep(Duration::from_secs(self.config.interval_secs)).await;
                }
            }

            match page.next {
                Some(next) => cursor = next,
                None => {
                    self.note_unreached_stop(&stop);
                    return Ok(CrawlEnd::EndOfContent);
                }
            }
        }
    }

    /// Downloads one submission given its id, outside any listing walk.
    pub async fn download_single(&mut self, id: u64) -> crate::Result<()> {
        match self.process_item(&format!("/view/{}/", id)).await? {
            ItemOutcome::Downloaded(path) => {
                println!(
                    "{}",
                    style(format!("File saved as \"{}\"", path.display())).green()
                );
            }
            ItemOutcome::Skipped | ItemOutcome::CaughtUp => {
                println!(
                    "{}",
                    style(format!("Submission {} is already downloaded", id)).yellow()
                );
            }
        }
        Ok(())
    }

    /// Reports whether the supplied cookies carry a live session.
    pub async fn login_probe(&self) -> crate::Result<()> {
        let html = self.fetcher.fetch_page("/").await?;
        self.report_account_status(&html);
        Ok(())
    }

    /// Fetches, extracts and downloads one submission with bounded retry.
    ///
    /// Every attempt re-fetches the detail page: media URLs rotate, so a
    /// stale one must never be retried directly.
    async fn process_item(&mut self, detail_path: &str) -> crate::Result<ItemOutcome> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            let html = self.fetcher.fetch_page(detail_path).await?;
            let record = extract(
                &html,
                detail_path,
                &self.config.base_url,
                self.config.description_format,
            )?;

            let paths = submission_paths(&self.config, &record);
            if !self.config.redownload && paths.legacy.is_file() {
                if self.config.check {
                    return Ok(ItemOutcome::CaughtUp);
                }
                println!(
                    "{}",
                    style(format!(
                        "Skipping \"{}\" since it's already downloaded",
                        record.title
                    ))
                    .yellow()
                );
                return Ok(ItemOutcome::Skipped);
            }

            std::fs::create_dir_all(&paths.dir)?;
            let label = format!("{} - [{}]", record.title, record.rating);

            match self
                .downloader
                .download_file(&record.media_url, &paths.file, &label)
                .await
            {
                Ok(_) => {
                    self.index.record(record.id)?;
                    if self.config.metadata {
                        write_metadata(&paths.metadata, &record)?;
                    }
                    return Ok(ItemOutcome::Downloaded(paths.file));
                }
                Err(DownloadError::Interrupted) => return Err(FadlError::Aborted),
                Err(DownloadError::Status { url, status }) if (400..500).contains(&status) => {
                    eprintln!(
                        "{}",
                        style(format!(
                            "Got a HTTP {} while downloading \"{}\". URL {} ...skipping",
                            status,
                            paths.file.display(),
                            url
                        ))
                        .red()
                    );
                    return Ok(ItemOutcome::Skipped);
                }
                Err(e) => {
                    if attempt >= self.config.download_retries {
                        return Err(e.into());
                    }
                    tracing::warn!(
                        "Retrying {} (attempt {}/{}): {}",
                        detail_path,
                        attempt,
                        self.config.download_retries,
                        e
                    );
                }
            }
        }
    }

    fn report_account_status(&self, html: &str) {
        match logged_in_user(html) {
            Some(account) => {
                println!("{}", style(format!("Logged in as: {}", account)).green());
            }
            None => {
                println!(
                    "{}",
                    style(
                        "Not logged in, some galleries may be inaccessible \
                         and NSFW content is not downloadable"
                    )
                    .yellow()
                );
            }
        }
    }

    fn report_caught_up(&self, username: &str) {
        println!(
            "{}",
            style(format!(
                "Downloaded all recent files of \"{}\"",
                username
            ))
            .green()
        );
    }

    fn report_end(&self, username: &str, end: &CrawlEnd) {
        match end {
            CrawlEnd::EndOfContent => {
                if username.is_empty() {
                    println!("{}", style("Finished downloading submissions").green());
                } else {
                    println!(
                        "{}",
                        style(format!(
                            "Finished downloading {}'s {}",
                            username, self.config.category
                        ))
                        .green()
                    );
                }
            }
            CrawlEnd::StopReached => {
                println!("{}", style("Reached the requested stop page").green());
            }
            // both already reported where they were detected
            CrawlEnd::CaughtUp | CrawlEnd::Notice(_) => {}
        }
    }

    fn note_unreached_stop(&self, stop: &Option<Cursor>) {
        if let Some(stop) = stop {
            tracing::info!("Stop cursor {} was never reached", stop);
        }
    }
}
