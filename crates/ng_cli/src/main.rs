use anyhow::{bail, Context};
use clap::Parser;
use ng_core::{ArticleFilter, ArticleRecord, ArticleStore, CrawlConfig};
use ng_crawler::{init_logging, CrawlOrchestrator};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const RECORD_SEPARATOR: &str = "---------";

#[derive(Parser, Debug)]
#[command(author, version, about = "Scrape news articles and query the stored copies", long_about = None)]
pub struct Cli {
    /// Storage backend: memory or sqlite
    #[arg(long, default_value = "sqlite")]
    storage: String,

    /// Database file for the sqlite backend
    #[arg(long)]
    database: Option<String>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Crawl TARGET_URL and store every article found
    Scrape,
    /// Print stored articles
    Retrieve {
        /// Only articles published on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
        /// Print a JSON array instead of text
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    load_env_file(None)?;

    let store = ng_storage::create_storage(&cli.storage, cli.database.as_deref())
        .await
        .with_context(|| format!("Failed to open {} storage", cli.storage))?;

    let command = match cli.command {
        Some(command) => command,
        None => prompt_command(BufReader::new(tokio::io::stdin())).await?,
    };

    let outcome = match command {
        Commands::Scrape => scrape(store.clone()).await,
        Commands::Retrieve { date, json } => retrieve(store.as_ref(), date.as_deref(), json).await,
    };

    if let Err(e) = store.close().await {
        warn!(error = %e, "Failed to close article store");
    }
    outcome
}

/// Loads `KEY=value` pairs from `path`, or from the nearest `.env` when
/// `path` is `None`. Variables already set in the process win, and a
/// missing file is not an error.
fn load_env_file(path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|_| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded environment file");
            Ok(Some(path))
        }
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e).context("Failed to load .env file"),
    }
}

/// The numbered menu shown when no subcommand is given.
async fn prompt_command<R>(input: R) -> anyhow::Result<Commands>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    println!("What do you want to do?\nEnter number\n  1: Scrape articles\n  2: Get articles from DB");
    let choice = lines.next_line().await?.unwrap_or_default();

    match choice.trim() {
        "1" => Ok(Commands::Scrape),
        "2" => {
            println!("Enter date (format: YYYY-MM-DD) to fetch articles, or press Enter to fetch all:");
            let date = lines.next_line().await?.unwrap_or_default();
            Ok(Commands::Retrieve {
                date: Some(date),
                json: false,
            })
        }
        other => bail!("Unknown option {:?}, expected 1 or 2", other),
    }
}

async fn scrape(store: Arc<dyn ArticleStore>) -> anyhow::Result<()> {
    let config = CrawlConfig::from_env().context("Invalid crawl configuration")?;
    let orchestrator = CrawlOrchestrator::new(config, store)?;

    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    let report = orchestrator.run_until_cancelled(token).await?;
    info!(
        links = report.links_discovered,
        visited = report.articles_visited,
        inserted = report.inserted,
        duplicates = report.duplicates,
        "Scrape finished"
    );

    if !report.is_clean() {
        bail!("{} articles could not be saved", report.write_failures);
    }
    Ok(())
}

async fn retrieve(store: &dyn ArticleStore, date: Option<&str>, json: bool) -> anyhow::Result<()> {
    let filter = ArticleFilter::from_input(date.unwrap_or_default());
    let articles = store.retrieve(&filter).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &articles)?;
        writeln!(out)?;
    } else if articles.is_empty() {
        match &filter.date_published {
            Some(date) => writeln!(out, "No articles found for {}.", date)?,
            None => writeln!(out, "No articles stored yet.")?,
        }
    } else {
        print_articles(&mut out, &articles)?;
    }
    Ok(())
}

fn print_articles<W: Write>(out: &mut W, articles: &[ArticleRecord]) -> std::io::Result<()> {
    for article in articles {
        writeln!(out, "Title: {}", article.title)?;
        writeln!(out, "Published Date: {}", article.date_published)?;
        writeln!(out, "Scraped at: {}", article.scraped_at.to_rfc3339())?;
        writeln!(out, "URL: {}", article.article_url)?;
        writeln!(out, "Content: {}", article.content)?;
        writeln!(out, "\n{}\n", RECORD_SEPARATOR)?;
    }
    Ok(())
}
