//! eTender Crawler command line

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use etender_crawler::crawling::CrawlOrchestrator;
use etender_crawler::domain::{TenderRepository, TenderSearchCriteria};
use etender_crawler::infrastructure::config::etenders;
use etender_crawler::infrastructure::{
    AppConfig, DatabaseConnection, HttpClient, SqliteTenderRepository, init_logging_with_config,
    log_system_info,
};

#[derive(Parser)]
#[command(name = "etender-crawler")]
#[command(version, about = "Harvest tenders from the eProcurement portal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON, TOML or YAML)
    #[arg(short, long, global = true, env = "ETENDER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the portal and store every new tender
    Crawl {
        /// Maximum detail pages fetched at once
        #[arg(short = 'n', long)]
        max_concurrent: Option<usize>,
    },

    /// Search stored tenders, printing one JSON document per line
    Search {
        /// Case-insensitive text matched against title, reference number and tender id
        text: Option<String>,

        #[arg(short, long, default_value = "1")]
        page: u32,

        #[arg(short, long, default_value = "10")]
        quantity: u32,

        /// Stored key to sort by
        #[arg(short, long, default_value = "tender_title")]
        sort_by: String,

        /// Sort in descending order
        #[arg(long)]
        desc: bool,
    },

    /// Print the number of stored tenders
    Count,

    /// Print tenders grouped by category, closing soonest and best valued, as JSON
    Highlights {
        /// Maximum tenders per list
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if cli.debug {
        config.logging.level = "debug".to_string();
    }
    if !matches!(cli.command, Commands::Crawl { .. }) {
        // stdout carries query results
        config.logging.console_output = false;
        config.logging.file_output = true;
    }

    init_logging_with_config(&config.logging)?;
    log_system_info();

    let db = DatabaseConnection::from_config(&config.store)
        .await
        .with_context(|| format!("Failed to open store at {}", config.store.database_url))?;
    db.migrate(&config.store.collection)
        .await
        .context("Failed to prepare tender collection")?;
    let repository = Arc::new(SqliteTenderRepository::new(
        Arc::new(db.pool().clone()),
        config.store.collection.clone(),
    ));

    match cli.command {
        Commands::Crawl { max_concurrent } => {
            if let Some(limit) = max_concurrent {
                config.crawling.max_concurrent_details = limit;
                config.validate()?;
            }
            crawl(&config, repository).await
        }
        Commands::Search {
            text,
            page,
            quantity,
            sort_by,
            desc,
        } => {
            let criteria = TenderSearchCriteria {
                search: text,
                page,
                quantity,
                sort_by,
                descending: desc,
            };
            search(repository.as_ref(), &criteria).await
        }
        Commands::Count => {
            println!("{}", repository.count().await?);
            Ok(())
        }
        Commands::Highlights { limit } => {
            let highlights = repository.highlights(limit, portal_now()?).await?;
            println!("{}", serde_json::to_string_pretty(&highlights)?);
            Ok(())
        }
    }
}

async fn crawl(config: &AppConfig, repository: Arc<SqliteTenderRepository>) -> Result<()> {
    let http_client = HttpClient::new(config.http.clone(), config.portal.session_cookie.clone())?;
    let orchestrator = CrawlOrchestrator::new(Arc::new(http_client), repository, config)?;

    info!("Starting crawl of {}", config.portal.base_url);
    let summary = orchestrator.run().await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn search(repository: &dyn TenderRepository, criteria: &TenderSearchCriteria) -> Result<()> {
    let tenders = repository.search(criteria).await?;
    info!("Search matched {} tenders", tenders.len());

    for tender in &tenders {
        println!("{}", serde_json::to_string(tender)?);
    }
    Ok(())
}

/// Current wall-clock time in the portal's timezone
fn portal_now() -> Result<NaiveDateTime> {
    let offset = FixedOffset::east_opt(etenders::UTC_OFFSET_SECONDS)
        .context("Invalid portal UTC offset")?;
    Ok(Utc::now().with_timezone(&offset).naive_local())
}
