//! mdpiharvest - browser-driven MDPI literature harvester
//!
//! Collects bibliographic records from MDPI search results for a topic and
//! year window, backfilling abstracts from detail pages, and writes them as
//! a JSON document.
//!
//! ## Usage
//!
//! ```bash
//! mdpiharvest harvest "computer science" --years-back 5 --count 100
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mdpiharvest::browser::{BrowserOptions, ChromeRenderer, Pacing, Renderer};
use mdpiharvest::cookies::CookieManager;
use mdpiharvest::crawl::{self, CrawlState};
use mdpiharvest::events::TracingObserver;
use mdpiharvest::query::SearchQuery;
use mdpiharvest::sink;
use std::path::PathBuf;
use tracing::{warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Browser-driven MDPI literature harvester
#[derive(Parser)]
#[command(name = "mdpiharvest")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest article records for a topic
    Harvest {
        /// Search topic
        topic: String,

        /// Year window: from (current year - years-back) to the current year
        #[arg(long, default_value_t = 5)]
        years_back: i32,

        /// Number of records to collect
        #[arg(long, default_value_t = 50)]
        count: usize,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Show the browser window instead of running headless
        #[arg(long)]
        headed: bool,

        /// Proxy URL (e.g., http://127.0.0.1:7890)
        #[arg(long)]
        proxy: Option<String>,

        /// Attach to a running browser's DevTools endpoint (e.g., ws://localhost:9222)
        #[arg(long)]
        remote_url: Option<String>,

        /// Do not load or persist session cookies
        #[arg(long)]
        no_cookies: bool,
    },

    /// Manage cookies
    Cookies {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Subcommand)]
enum CookieAction {
    /// Clear stored cookies
    Clear,
    /// Show cookie file path
    Path,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    match cli.command {
        Commands::Harvest {
            topic,
            years_back,
            count,
            output,
            headed,
            proxy,
            remote_url,
            no_cookies,
        } => {
            run_harvest(
                topic, years_back, count, output, headed, proxy, remote_url, no_cookies,
            )
            .await
        }
        Commands::Cookies { action } => handle_cookies(action),
    }
}

// ============================================================================
// Harvest
// ============================================================================

#[allow(clippy::too_many_arguments)]
async fn run_harvest(
    topic: String,
    years_back: i32,
    count: usize,
    output: PathBuf,
    headed: bool,
    proxy: Option<String>,
    remote_url: Option<String>,
    no_cookies: bool,
) -> Result<()> {
    // Invalid parameters are rejected here, before any navigation.
    let query = SearchQuery::from_years_back(topic, years_back, count)
        .context("Invalid search parameters")?;

    println!(
        "Harvesting MDPI for \"{}\" ({}-{}), target {} records",
        query.topic, query.year_from, query.year_to, query.target_count
    );

    let options = BrowserOptions {
        headless: !headed,
        proxy,
        remote_url,
        ..BrowserOptions::default()
    };
    let mut renderer = ChromeRenderer::launch(&options)
        .await
        .context("Failed to start browser session")?;

    let cookie_manager = (!no_cookies).then(CookieManager::default);
    if let Some(manager) = &cookie_manager {
        let cookies = manager.load();
        if !cookies.is_empty() {
            if let Err(e) = renderer.inject_cookies(&cookies).await {
                warn!("Cookie injection failed: {e}");
            }
        }
    }

    let mut observer = TracingObserver;
    let outcome = crawl::run_crawl(&mut renderer, &query, &Pacing::default(), &mut observer).await;

    if let Some(manager) = &cookie_manager {
        match renderer.session_cookies().await {
            Ok(cookies) if !cookies.is_empty() => {
                if let Err(e) = manager.save(&cookies) {
                    warn!("Could not persist cookies: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Could not read session cookies: {e}"),
        }
    }

    if let Err(e) = renderer.close().await {
        warn!("Browser shutdown: {e}");
    }

    // Partial results are always persisted, even after an abort.
    let path = sink::save_records(&output, &query, &outcome.records)
        .context("Failed to save records")?;

    match outcome.state {
        CrawlState::TargetReached => println!(
            "Done: {} records saved to {}",
            outcome.records.len(),
            path.display()
        ),
        CrawlState::Exhausted => println!(
            "Source exhausted: {} records saved to {}",
            outcome.records.len(),
            path.display()
        ),
        CrawlState::Aborted => println!(
            "Aborted early: {} records saved to {}",
            outcome.records.len(),
            path.display()
        ),
    }

    Ok(())
}

// ============================================================================
// Cookie Management
// ============================================================================

fn handle_cookies(action: CookieAction) -> Result<()> {
    let manager = CookieManager::new()?;

    match action {
        CookieAction::Clear => {
            manager.clear()?;
            println!("Cookies cleared.");
        }
        CookieAction::Path => {
            println!("Cookie file: {:?}", manager.path());
        }
    }

    Ok(())
}
