//! CLI administration tool for linkpulse.
//!
//! Inspects analytics and checks connectivity to the store and the click
//! queue without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Top links by click count
//! cargo run --bin linkpulse-admin -- analytics --limit 20
//!
//! # Check database connection
//! cargo run --bin linkpulse-admin -- db check
//!
//! # Check click queue depth
//! cargo run --bin linkpulse-admin -- queue check
//! ```
//!
//! # Environment Variables
//!
//! Same as the API server; see `linkpulse::config`.

use linkpulse::application::services::StatsService;
use linkpulse::config::{self, Config};
use linkpulse::domain::repositories::UrlRepository;
use linkpulse::infrastructure::persistence::{PgClickRepository, PgUrlRepository, connect_pool};
use linkpulse::infrastructure::queue::RedisStreamChannel;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for inspecting linkpulse.
#[derive(Parser)]
#[command(name = "linkpulse-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Show click totals per short link
    Analytics {
        /// Show at most this many rows
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Click queue operations
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection and report URL totals
    Check,
}

/// Click queue subcommands.
#[derive(Subcommand)]
enum QueueAction {
    /// Check Redis connection and report stream depth
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env()?;

    match cli.command {
        Commands::Analytics { limit } => handle_analytics(&config, limit).await?,
        Commands::Db { action } => handle_db_action(action, &config).await?,
        Commands::Queue { action } => handle_queue_action(action, &config).await?,
    }

    Ok(())
}

async fn open_pool(config: &Config) -> Result<Arc<PgPool>> {
    let pool = connect_pool(config)
        .await
        .context("Failed to connect to database")?;
    Ok(Arc::new(pool))
}

/// Prints the analytics table, most clicked first.
async fn handle_analytics(config: &Config, limit: Option<usize>) -> Result<()> {
    let pool = open_pool(config).await?;
    let stats = StatsService::new(Arc::new(PgClickRepository::new(pool.clone())));

    let rows = match limit {
        Some(limit) => stats.top(limit).await?,
        None => stats.analytics().await?,
    };

    println!("{}", "📊 Click Analytics".bright_blue().bold());
    println!();

    if rows.is_empty() {
        println!("{}", "  No short links yet".yellow());
        println!();
        return Ok(());
    }

    println!(
        "  {:<12} {:>8}  {}",
        "Code".bright_white().bold(),
        "Clicks".bright_white().bold(),
        "Long URL".bright_white().bold()
    );
    println!("  {}", "─".repeat(75).bright_black());

    for row in &rows {
        println!(
            "  {:<12} {:>8}  {}",
            row.short_code.cyan(),
            row.click_count.to_string().bright_green(),
            row.long_url
        );
    }

    let total: i64 = rows.iter().map(|row| row.click_count).sum();

    println!();
    println!(
        "  Links shown: {}   Clicks: {}",
        rows.len().to_string().bright_white().bold(),
        total.to_string().bright_white().bold()
    );
    println!();

    pool.close().await;
    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, config: &Config) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());
            println!(
                "  {}",
                config::mask_connection_string(&config.database_url).bright_black()
            );

            let pool = open_pool(config).await?;
            let urls = PgUrlRepository::new(pool.clone());

            let url_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM urls")
                .fetch_one(pool.as_ref())
                .await
                .context("Failed to count URLs (have migrations run?)")?;
            let max_id = urls.max_id().await?;

            println!("{}", "✅ Database connection OK".green().bold());
            println!("  URLs:    {}", url_count.to_string().bright_green().bold());
            println!("  Max id:  {}", max_id.to_string().bright_green().bold());
            println!();

            pool.close().await;
        }
    }

    Ok(())
}

/// Handles click queue diagnostic commands.
async fn handle_queue_action(action: QueueAction, config: &Config) -> Result<()> {
    match action {
        QueueAction::Check => {
            println!("{}", "🔍 Checking click queue...".bright_blue());
            println!(
                "  {}",
                config::mask_connection_string(&config.redis_url).bright_black()
            );

            let channel = RedisStreamChannel::connect(&config.redis_url, config.stream_settings())
                .await
                .context("Failed to connect to Redis")?;
            let stats = channel.stats().await?;

            println!("{}", "✅ Redis connection OK".green().bold());
            println!("  Stream:        {}", config.click_stream.cyan());
            println!("  Entries:       {}", stats.length.to_string().bright_green().bold());
            println!("  Pending:       {}", stats.pending.to_string().bright_green().bold());

            let dead = stats.dead_letters.to_string();
            let dead = if stats.dead_letters > 0 {
                dead.red().bold()
            } else {
                dead.bright_green().bold()
            };
            println!("  Dead letters:  {}", dead);
            println!();
        }
    }

    Ok(())
}
