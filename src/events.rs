//! Structured crawl progress events.
//!
//! The pagination loop reports progress through an injected observer
//! instead of printing as it goes, so control flow stays independent of
//! how progress is surfaced. The default observer logs via `tracing`.

use tracing::{debug, error, info, warn};

/// One progress or error condition reported during a crawl.
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    PageStarted { page: u32, url: String },
    /// Fragments located on the page after the fallback selector chain
    PageParsed { page: u32, fragments: usize },
    /// Page rendered but carried no item fragments
    PageEmpty { page: u32 },
    /// Page-level failure that ends the crawl
    PageAborted { page: u32, reason: String },
    ItemExtracted { count: usize, title: String },
    ItemSkipped { page: u32, reason: String },
    /// Inline abstract was absent; the detail page is being visited
    DetailFallback { link: String },
    TargetReached { count: usize },
}

/// Consumes crawl events as they occur.
pub trait CrawlObserver {
    fn on_event(&mut self, event: &CrawlEvent);
}

/// Default observer: structured logging via `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn on_event(&mut self, event: &CrawlEvent) {
        match event {
            CrawlEvent::PageStarted { page, url } => {
                info!(page, url = %url, "Fetching listing page");
            }
            CrawlEvent::PageParsed { page, fragments } => {
                info!(page, fragments, "Located item fragments");
            }
            CrawlEvent::PageEmpty { page } => {
                info!(page, "No articles on page, source exhausted");
            }
            CrawlEvent::PageAborted { page, reason } => {
                error!(page, reason = %reason, "Aborting crawl");
            }
            CrawlEvent::ItemExtracted { count, title } => {
                info!(count, title = %title, "Extracted record");
            }
            CrawlEvent::ItemSkipped { page, reason } => {
                debug!(page, reason = %reason, "Skipped item");
            }
            CrawlEvent::DetailFallback { link } => {
                warn!(link = %link, "Inline abstract missing, visiting detail page");
            }
            CrawlEvent::TargetReached { count } => {
                info!(count, "Target count reached");
            }
        }
    }
}

/// Test observer collecting every event in order.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<CrawlEvent>,
}

#[cfg(test)]
impl CrawlObserver for RecordingObserver {
    fn on_event(&mut self, event: &CrawlEvent) {
        self.events.push(event.clone());
    }
}
