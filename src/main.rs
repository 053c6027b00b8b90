//! furaffinity-dl command-line entry point

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use furaffinity_dl::config::{resolve_usernames, Category, Config, DescriptionFormat};
use furaffinity_dl::crawler::DEFAULT_FILTER_PATTERN;
use furaffinity_dl::{Coordinator, DownloadIndex, FadlError};

/// Downloads the gallery/scraps/favorites/folder of a FurAffinity user, or
/// the logged-in submissions inbox.
///
/// Log in to FurAffinity in a web browser and export cookies to download
/// age-restricted content or your submissions:
///   furaffinity-dl -c cookies.txt letodoesart
///   furaffinity-dl -c cookies.txt --sub
#[derive(Parser, Debug)]
#[command(name = "furaffinity-dl")]
#[command(version)]
#[command(about = "Downloads the content listings of a FurAffinity user", long_about = None)]
struct Cli {
    /// Username(s), whitespace-separated, or a path to a newline-delimited
    /// username file
    username: Option<String>,

    /// Category to download: gallery, scraps or favorites
    #[arg(default_value = "gallery")]
    category: String,

    /// Path to a Netscape cookies file
    #[arg(short, long)]
    cookies: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "Submissions")]
    output: PathBuf,

    /// Stop at the first already-downloaded submission
    #[arg(long)]
    check: bool,

    /// Browser user agent to present
    #[arg(long, alias = "ua", default_value = furaffinity_dl::config::DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Download the submissions inbox of the logged-in account
    #[arg(long, alias = "sub")]
    submissions: bool,

    /// Gallery folder path, e.g. 123456/Folder-Name-Here
    #[arg(short, long)]
    folder: Option<String>,

    /// Cursor to start from (page number, <id>/next or new~<id>@<n>)
    #[arg(short, long)]
    start: Option<String>,

    /// Cursor to stop on
    #[arg(short = 'S', long)]
    stop: Option<String>,

    /// Redownload files that were downloaded already
    #[arg(long, alias = "rd")]
    redownload: bool,

    /// Delay between downloaded submissions, in seconds
    #[arg(short, long, default_value_t = 0)]
    interval: u64,

    /// Disable separation into General/Mature/Adult subfolders
    #[arg(short, long)]
    rating: bool,

    /// Skip promotional submissions (YCH/commission state posts, ads)
    #[arg(long)]
    filter: bool,

    /// Override the title filter pattern
    #[arg(long, value_name = "REGEX")]
    filter_pattern: Option<String>,

    /// Write a JSON metadata record next to each download
    #[arg(short, long)]
    metadata: bool,

    /// Download a single submission by its id
    #[arg(long, value_name = "ID")]
    download: Option<u64>,

    /// Record the description as a JSON list of paragraphs
    #[arg(long, alias = "jd", conflicts_with = "html_description")]
    json_description: bool,

    /// Record the description as its raw HTML fragment
    #[arg(long)]
    html_description: bool,

    /// Verify that the supplied cookies carry a live session
    #[arg(long)]
    login: bool,

    /// Rebuild the download index from the output directory
    #[arg(long)]
    index: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    if cli.index {
        let count = DownloadIndex::rebuild(&config.output_root)
            .context("failed to rebuild the download index")?;
        println!(
            "Indexed {} downloaded submissions under {}",
            count,
            config.output_root.display()
        );
        return Ok(());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    spawn_interrupt_watcher(cancel.clone());

    let mut coordinator =
        Coordinator::new(config, cancel).context("failed to initialize the crawler")?;

    if cli.login {
        coordinator.login_probe().await?;
        return Ok(());
    }
    if let Some(id) = cli.download {
        coordinator.download_single(id).await?;
        return Ok(());
    }

    match coordinator.run().await {
        // operator interruption is a clean exit; partial files are gone
        Err(FadlError::Aborted) => Ok(()),
        other => Ok(other?),
    }
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let category = if cli.submissions {
        Category::Submissions
    } else if let Some(folder) = &cli.folder {
        Category::Folder(folder.clone())
    } else {
        Category::from_arg(&cli.category)
            .with_context(|| format!("unknown category '{}'", cli.category))?
    };

    let needs_username = !matches!(category, Category::Submissions)
        && !cli.login
        && !cli.index
        && cli.download.is_none();

    let usernames = match &cli.username {
        Some(raw) => resolve_usernames(raw)?,
        None if needs_username => bail!("a username (or username file) is required"),
        None => Vec::new(),
    };

    let description_format = if cli.html_description {
        DescriptionFormat::Html
    } else if cli.json_description {
        DescriptionFormat::Paragraphs
    } else {
        DescriptionFormat::Text
    };

    Ok(Config {
        usernames,
        category,
        output_root: cli.output.clone(),
        cookie_file: cli.cookies.clone(),
        user_agent: cli.user_agent.clone(),
        start: cli.start.clone(),
        stop: cli.stop.clone(),
        interval_secs: cli.interval,
        redownload: cli.redownload,
        rating_folders: !cli.rating,
        filter_enabled: cli.filter,
        filter_pattern: cli
            .filter_pattern
            .clone()
            .unwrap_or_else(|| DEFAULT_FILTER_PATTERN.to_string()),
        metadata: cli.metadata,
        check: cli.check,
        description_format,
        ..Config::default()
    })
}

fn spawn_interrupt_watcher(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after cleanup");
            cancel.store(true, Ordering::Relaxed);
        }
    });
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("furaffinity_dl=info,warn"),
            1 => EnvFilter::new("furaffinity_dl=debug,info"),
            2 => EnvFilter::new("furaffinity_dl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
