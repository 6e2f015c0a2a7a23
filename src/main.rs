use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use news_aggregator::app::{App, Command, CommandOutcome};
use news_aggregator::config::Config;
use news_aggregator::db::Repository;
use news_aggregator::error::{AppError, Result};
use news_aggregator::scheduler::Scheduler;
use news_aggregator::scrape::{ContentExtractor, SourceScraper};
use news_aggregator::services::{HttpFetch, Notifier, RateLimitedFetcher, ReqwestFetcher, TelegramNotifier};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Path to config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Run the discovery scheduler until interrupted
    Run,
    /// Run a single sweep and exit
    Sweep,
    /// Scrape a listing page and print what would be stored
    Parse { url: String },
    /// Register a source for a subscriber
    AddSource {
        #[arg(long)]
        subscriber: i64,
        url: String,
    },
    /// Scrape a subscriber's sources and deliver right away
    FetchNow {
        #[arg(long)]
        subscriber: i64,
    },
    /// Print store counters
    Stats,
    /// Send one message to every subscriber
    Broadcast { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let repository = Repository::new(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.db_path))?;
    let scraper = Arc::new(build_scraper(&config)?);

    match cli.command {
        CliCommand::Run => {
            let scheduler = Scheduler::new(
                repository,
                scraper,
                build_notifier(&config)?,
                config.sweep_interval(),
                config.max_concurrent_sources,
            );
            tokio::select! {
                _ = scheduler.run() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down");
                }
            }
        }

        CliCommand::Sweep => {
            let scheduler = Scheduler::new(
                repository,
                scraper,
                build_notifier(&config)?,
                config.sweep_interval(),
                config.max_concurrent_sources,
            );
            let report = scheduler.sweep().await?;
            println!(
                "Checked {} sources ({} failed), stored {} new articles, sent {} ({} failed)",
                report.sources_checked,
                report.sources_failed,
                report.articles_stored,
                report.delivery.sent,
                report.delivery.failed
            );
        }

        CliCommand::Parse { url } => {
            let app = App::new(repository, scraper, Arc::new(NoopNotifier), 1);
            let items = app.test_parse(&url).await?;
            println!("Found {} items on {}", items.len(), url);
            for (i, item) in items.iter().enumerate() {
                println!("\n{}. {}\n   {}\n   {}", i + 1, item.title, item.url, item.content);
            }
        }

        CliCommand::AddSource { subscriber, url } => {
            let app = App::new(repository, scraper, Arc::new(NoopNotifier), 1);
            if let CommandOutcome::SourceAdded { source_id } = app
                .handle_command(subscriber, Command::AddSource { url })
                .await?
            {
                println!("Added source {}", source_id);
            }
        }

        CliCommand::FetchNow { subscriber } => {
            let app = App::new(
                repository,
                scraper,
                build_notifier(&config)?,
                config.max_concurrent_sources,
            );
            if let CommandOutcome::Fetched(report) =
                app.handle_command(subscriber, Command::FetchNow).await?
            {
                if report.sources == 0 {
                    println!("No sources configured");
                } else if report.delivery.sent == 0 && report.delivery.failed == 0 {
                    println!("No news yet, check back shortly");
                } else {
                    println!(
                        "Sent {} articles ({} failed)",
                        report.delivery.sent, report.delivery.failed
                    );
                }
            }
        }

        CliCommand::Broadcast { text } => {
            let app = App::new(repository, scraper, build_notifier(&config)?, 1);
            let report = app.broadcast(&text).await?;
            println!(
                "Broadcast delivered to {} subscribers ({} failed)",
                report.sent, report.failed
            );
        }

        CliCommand::Stats => {
            let stats = repository.stats().await?;
            println!("Subscribers:     {}", stats.subscribers);
            println!("Sources:         {}", stats.sources);
            println!("Articles:        {}", stats.articles);
            println!("Unsent articles: {}", stats.unsent_articles);
        }
    }

    Ok(())
}

fn build_scraper(config: &Config) -> Result<SourceScraper> {
    let fetcher: Arc<dyn HttpFetch> = Arc::new(RateLimitedFetcher::new(
        ReqwestFetcher::new()?,
        config.max_requests_per_minute,
    ));
    let extractor = ContentExtractor::new(
        fetcher.clone(),
        config.article_timeout(),
        config.extract_delay(),
    );
    Ok(SourceScraper::new(fetcher, extractor, config.listing_timeout()))
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    let token = config.telegram_bot_token.as_deref().ok_or_else(|| {
        AppError::Config("telegram_bot_token is not set (or NEWS_BOT_TOKEN)".to_string())
    })?;
    Ok(Arc::new(TelegramNotifier::new(
        &config.telegram_api_base_url,
        token,
    )?))
}

/// Commands that never deliver still need a transport to build an `App`.
struct NoopNotifier;

#[async_trait::async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _subscriber_id: i64, _text: &str) -> Result<()> {
        Ok(())
    }
}
