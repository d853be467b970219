//! # mdpiharvest
//!
//! Browser-driven harvester for MDPI bibliographic records.
//!
//! ## Modules
//!
//! - [`browser`] - Renderer session trait and the Chromium implementation
//! - [`query`] - Search query validation and URL construction
//! - [`extract`] - Field extraction with fallback selector chains
//! - [`detail`] - Detail-page fetching with location restore
//! - [`crawl`] - The pagination loop state machine
//! - [`events`] - Structured crawl progress events
//! - [`sink`] - JSON record persistence
//! - [`cookies`] - Cookie persistence across crawls
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mdpiharvest::browser::{BrowserOptions, ChromeRenderer, Pacing, Renderer};
//! use mdpiharvest::events::TracingObserver;
//! use mdpiharvest::query::SearchQuery;
//! use mdpiharvest::{crawl, sink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let query = SearchQuery::from_years_back("machine learning", 5, 20)?;
//!     let mut renderer = ChromeRenderer::launch(&BrowserOptions::default()).await?;
//!     let mut observer = TracingObserver;
//!     let outcome =
//!         crawl::run_crawl(&mut renderer, &query, &Pacing::default(), &mut observer).await;
//!     renderer.close().await?;
//!     sink::save_records(std::path::Path::new("./output"), &query, &outcome.records)?;
//!     Ok(())
//! }
//! ```

pub mod browser;
pub mod cookies;
pub mod crawl;
pub mod detail;
pub mod error;
pub mod events;
pub mod extract;
pub mod query;
pub mod record;
pub mod sink;

pub use error::{HarvestError, Result};
