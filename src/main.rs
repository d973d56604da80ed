//! # News Ledger CLI (`news-ledger`)
//!
//! ## Usage
//!
//! ```bash
//! news-ledger --config ./config/news-ledger.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `news-ledger init` | Create the SQLite database and run schema migrations |
//! | `news-ledger run` | Feed stage, payload stage and sync in one run |
//! | `news-ledger feed` | Merge new feed entries into staging |
//! | `news-ledger ingest` | Merge the scraped JSON payload into staging |
//! | `news-ledger sync` | Insert staged records missing from the database |
//! | `news-ledger rebuild` | Reload the database from staging and restore counters |
//! | `news-ledger counters [restore]` | Show or repair sequence counters |
//! | `news-ledger classify "<title>"` | Classify a single title |
//! | `news-ledger list` | List stored articles |
//! | `news-ledger notebook <url> <link>` | Set an article's notebook link |
//! | `news-ledger status <url> <status>` | Mark an article covered / not covered |
//! | `news-ledger serve` | Start the HTTP server |

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use news_ledger::articles;
use news_ledger::classify::classify;
use news_ledger::config;
use news_ledger::migrate;
use news_ledger::models::ArticleStatus;
use news_ledger::pipeline::Pipeline;
use news_ledger::server;
use news_ledger::staging::StagingDocument;
use news_ledger::stats;

/// News Ledger: classify, number and store feed articles.
#[derive(Parser)]
#[command(
    name = "news-ledger",
    about = "News Ledger: classify, number and store feed articles",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/news-ledger.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Run the full pipeline: feed, scraped payload, sync.
    Run {
        /// Actor recorded on inserted records (default: pipeline.user_id).
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Fetch the configured feed and merge new entries into staging.
    Feed,

    /// Merge the configured scraped payload into staging.
    Ingest,

    /// Insert staged records that the database does not hold yet.
    Sync {
        /// Staging document to sync (default: staging.path).
        #[arg(long)]
        path: Option<PathBuf>,

        #[arg(long)]
        user_id: Option<String>,
    },

    /// Load every staged record into the database and restore counters.
    Rebuild {
        /// Delete all stored articles first.
        #[arg(long)]
        clear: bool,

        #[arg(long)]
        user_id: Option<String>,
    },

    /// Show sequence counters and per-category counts.
    Counters {
        #[command(subcommand)]
        action: Option<CountersAction>,
    },

    /// Classify a single title and print the result.
    Classify { title: String },

    /// List stored articles.
    List {
        /// Category label, e.g. "UPSC Key".
        #[arg(long)]
        category: Option<String>,

        /// `covered` or `not-covered`.
        #[arg(long)]
        status: Option<String>,
    },

    /// Set the notebook link of the article at URL.
    Notebook {
        url: String,
        link: String,

        #[arg(long)]
        user_id: Option<String>,
    },

    /// Set the coverage status of the article at URL.
    Status { url: String, status: StatusArg },

    /// Start the HTTP server on server.bind.
    Serve,
}

#[derive(Subcommand)]
enum CountersAction {
    /// Raise counters to the highest staged or stored id.
    Restore,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Covered,
    NotCovered,
}

impl From<StatusArg> for ArticleStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Covered => ArticleStatus::Covered,
            StatusArg::NotCovered => ArticleStatus::NotCovered,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Classify { title } = &cli.command {
        match classify(title) {
            Some((category, cleaned)) => {
                println!("category: {}", category);
                println!("id prefix: {}", category.family().prefix());
                println!("title: {}", cleaned);
            }
            None => println!("skip"),
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run { user_id } => {
            let user_id = user_id.unwrap_or_else(|| cfg.pipeline.user_id.clone());
            let pipeline = Pipeline::open(cfg).await?;
            let report = pipeline.run(&user_id).await;

            println!("Pipeline run: {:?}", report.status);
            println!("  feed new:  {}", report.feed_new);
            println!("  json new:  {}", report.json_new);
            println!("  db new:    {}", report.db_new);
            for error in &report.errors {
                println!("  error:     {}", error);
            }
            if !report.is_success() {
                anyhow::bail!("pipeline run failed");
            }
        }
        Commands::Feed => {
            if cfg.feed.is_none() {
                anyhow::bail!("no [feed] configured");
            }
            let pipeline = Pipeline::open(cfg).await?;
            if let Some(outcome) = pipeline.ingest_feed().await? {
                print_merge("feed", outcome.added, outcome.skipped, &outcome.new_ids);
            }
        }
        Commands::Ingest => {
            if cfg.source.is_none() {
                anyhow::bail!("no [source] configured");
            }
            let pipeline = Pipeline::open(cfg).await?;
            match pipeline.ingest_source().await? {
                Some(outcome) => {
                    print_merge("payload", outcome.added, outcome.skipped, &outcome.new_ids)
                }
                None => println!("Payload already consumed."),
            }
        }
        Commands::Sync { path, user_id } => {
            let user_id = user_id.unwrap_or_else(|| cfg.pipeline.user_id.clone());
            let pipeline = Pipeline::open(cfg).await?;
            let report = pipeline.sync(path.as_deref(), &user_id).await?;

            println!("Sync {}", report.state);
            println!("  candidates:    {}", report.candidates);
            println!("  inserted:      {}", report.inserted);
            println!("  skipped urls:  {}", report.skipped_urls);
            println!("  rejected keys: {}", report.rejected_keys);
        }
        Commands::Rebuild { clear, user_id } => {
            let user_id = user_id.unwrap_or_else(|| cfg.pipeline.user_id.clone());
            let pipeline = Pipeline::open(cfg).await?;
            let report = pipeline.rebuild(&user_id, clear).await?;

            println!("Rebuild complete");
            if clear {
                println!("  removed:   {}", report.removed);
            }
            println!("  processed: {}", report.processed);
            println!("  inserted:  {}", report.inserted);
            println!("  skipped:   {}", report.skipped);
            println!("  failed:    {}", report.failed);
            println!("  counters:");
            for (family, value) in report.counters.iter() {
                println!("    {}: {}", family.counter_key(), value);
            }
        }
        Commands::Counters { action } => {
            let staging_path = cfg.staging.path.clone();
            let pipeline = Pipeline::open(cfg).await?;
            match action {
                Some(CountersAction::Restore) => {
                    let counters = pipeline.restore_counters().await?;
                    println!("Counters restored");
                    for (family, value) in counters.iter() {
                        println!("  {}: {}", family.counter_key(), value);
                    }
                }
                None => {
                    let staging = StagingDocument::load_or_default(&staging_path)?;
                    let summary =
                        stats::collect(&staging, pipeline.articles(), pipeline.counters()).await?;
                    stats::print_summary(pipeline.config(), &summary);
                }
            }
        }
        Commands::List { category, status } => {
            let filter = articles::parse_filter(category.as_deref(), status.as_deref())?;
            let pipeline = Pipeline::open(cfg).await?;
            let records = articles::list_articles(pipeline.articles(), &filter).await?;
            articles::print_articles(&records);
        }
        Commands::Notebook { url, link, user_id } => {
            let user_id = user_id.unwrap_or_else(|| cfg.pipeline.user_id.clone());
            let pipeline = Pipeline::open(cfg).await?;
            let outcome =
                articles::update_notebook_link(pipeline.articles(), &url, &link, &user_id).await?;
            println!("Notebook link {}", articles::describe_update(outcome));
        }
        Commands::Status { url, status } => {
            let pipeline = Pipeline::open(cfg).await?;
            let status = ArticleStatus::from(status);
            let outcome = articles::update_status(pipeline.articles(), &url, status).await?;
            println!("Status {} ({})", articles::describe_update(outcome), status.as_str());
        }
        Commands::Serve => {
            server::run_server(cfg).await?;
        }
        Commands::Classify { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

fn print_merge(stage: &str, added: usize, skipped: usize, new_ids: &[String]) {
    println!("Merged {} into staging", stage);
    println!("  added:   {}", added);
    println!("  skipped: {}", skipped);
    for id in new_ids {
        println!("  + {}", id);
    }
}

