//! The pagination loop: page-by-page traversal of search results.
//!
//! Drives one rendering session through listing pages, extracts each item,
//! visits detail pages when the inline abstract is insufficient, and folds
//! records into an accumulator until the target count is reached, the
//! source runs out, or a page-level failure aborts the crawl. Whatever was
//! accumulated is always handed back; no error escapes this loop.

use crate::browser::{Pacing, Renderer, BODY_MARKER};
use crate::detail;
use crate::events::{CrawlEvent, CrawlObserver};
use crate::extract::{self, DetailContent, ListingItem, SkipReason, ITEM_MARKER};
use crate::query::{build_search_url, SearchQuery, MDPI_BASE_URL};
use crate::record::{scraped_at_now, ArticleRecord};
use tracing::{debug, error, warn};
use url::Url;

/// Terminal state of one crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    /// Accumulator reached the requested count
    TargetReached,
    /// A page rendered with no item fragments; the source ran out
    Exhausted,
    /// Unrecoverable page-level failure; accumulated records are kept
    Aborted,
}

/// Accumulated records plus how the crawl ended.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub records: Vec<ArticleRecord>,
    pub state: CrawlState,
}

/// Run one crawl over `renderer` for `query`.
///
/// Pages are numbered from 1 and never revisited. The accumulator grows
/// monotonically and never exceeds `query.target_count`.
pub async fn run_crawl(
    renderer: &mut dyn Renderer,
    query: &SearchQuery,
    pacing: &Pacing,
    observer: &mut dyn CrawlObserver,
) -> CrawlOutcome {
    let mut records: Vec<ArticleRecord> = Vec::new();

    let base = match Url::parse(MDPI_BASE_URL) {
        Ok(base) => base,
        Err(e) => {
            error!("Invalid site base URL: {e}");
            return CrawlOutcome {
                records,
                state: CrawlState::Aborted,
            };
        }
    };

    let mut page: u32 = 1;
    let state = loop {
        let url = match build_search_url(query, page) {
            Ok(url) => url,
            Err(e) => {
                observer.on_event(&CrawlEvent::PageAborted {
                    page,
                    reason: format!("could not build search URL: {e}"),
                });
                break CrawlState::Aborted;
            }
        };
        observer.on_event(&CrawlEvent::PageStarted {
            page,
            url: url.to_string(),
        });

        if let Err(e) = renderer.open(url.as_str()).await {
            observer.on_event(&CrawlEvent::PageAborted {
                page,
                reason: format!("navigation failed: {e}"),
            });
            break CrawlState::Aborted;
        }

        // Human-paced delay; also lets page scripts populate the listing.
        tokio::time::sleep(pacing.page_delay()).await;

        match ensure_rendered(renderer, pacing).await {
            Ok(true) => {}
            Ok(false) => {
                observer.on_event(&CrawlEvent::PageAborted {
                    page,
                    reason: "page did not render within the bounded wait, even after refresh"
                        .to_string(),
                });
                break CrawlState::Aborted;
            }
            Err(e) => {
                observer.on_event(&CrawlEvent::PageAborted {
                    page,
                    reason: format!("render wait failed: {e}"),
                });
                break CrawlState::Aborted;
            }
        }

        // Item content gets its own bounded wait; expiry here is not an
        // error, the fragment chain below decides what the page holds.
        match renderer.wait_for(ITEM_MARKER, pacing.item_wait).await {
            Ok(true) => {}
            Ok(false) => debug!(page, "Item marker not seen before timeout"),
            Err(e) => {
                observer.on_event(&CrawlEvent::PageAborted {
                    page,
                    reason: format!("item wait failed: {e}"),
                });
                break CrawlState::Aborted;
            }
        }

        let html = match renderer.html().await {
            Ok(html) => html,
            Err(e) => {
                observer.on_event(&CrawlEvent::PageAborted {
                    page,
                    reason: format!("could not retrieve rendered markup: {e}"),
                });
                break CrawlState::Aborted;
            }
        };

        let parse = extract::parse_listing(&html, &base);
        observer.on_event(&CrawlEvent::PageParsed {
            page,
            fragments: parse.fragments,
        });

        if parse.fragments == 0 {
            if page == 1 {
                // An empty first page is almost certainly blocked access,
                // not an empty result set.
                observer.on_event(&CrawlEvent::PageAborted {
                    page,
                    reason: "no articles on the very first page; access likely blocked".to_string(),
                });
                break CrawlState::Aborted;
            }
            observer.on_event(&CrawlEvent::PageEmpty { page });
            break CrawlState::Exhausted;
        }

        for reason in &parse.skipped {
            match reason {
                SkipReason::MissingAnchor => observer.on_event(&CrawlEvent::ItemSkipped {
                    page,
                    reason: "no title anchor".to_string(),
                }),
                SkipReason::BadLink(msg) => {
                    warn!(page, "Unresolvable item link: {msg}");
                    observer.on_event(&CrawlEvent::ItemSkipped {
                        page,
                        reason: format!("unresolvable link: {msg}"),
                    });
                }
            }
        }

        let mut reached = false;
        for item in parse.items {
            let record = build_record(renderer, item, pacing, observer).await;
            let title = record.title.clone();
            records.push(record);
            observer.on_event(&CrawlEvent::ItemExtracted {
                count: records.len(),
                title,
            });
            if records.len() >= query.target_count {
                reached = true;
                break;
            }
        }
        if reached {
            observer.on_event(&CrawlEvent::TargetReached {
                count: records.len(),
            });
            break CrawlState::TargetReached;
        }

        page += 1;
    };

    CrawlOutcome { records, state }
}

/// Bounded wait for render completion, with one refresh-and-extended-wait
/// retry.
async fn ensure_rendered(renderer: &mut dyn Renderer, pacing: &Pacing) -> crate::Result<bool> {
    if renderer.wait_for(BODY_MARKER, pacing.render_wait).await? {
        return Ok(true);
    }
    warn!("Page body not seen before timeout, refreshing once");
    renderer.refresh().await?;
    renderer.wait_for(BODY_MARKER, pacing.retry_wait).await
}

/// Assemble one record, visiting the detail page when the fragment carried
/// no inline full abstract.
async fn build_record(
    renderer: &mut dyn Renderer,
    item: ListingItem,
    pacing: &Pacing,
    observer: &mut dyn CrawlObserver,
) -> ArticleRecord {
    let detail = match &item.inline_abstract {
        Some(text) => DetailContent::inline(text.clone()),
        None => {
            observer.on_event(&CrawlEvent::DetailFallback {
                link: item.link.clone(),
            });
            detail::fetch_detail(renderer, &item.link, pacing).await
        }
    };

    ArticleRecord {
        title: item.title,
        authors: item.authors,
        journal: item.journal,
        abstract_text: detail.abstract_text,
        keywords: detail.keywords,
        sections: detail.sections,
        references: detail.references,
        link: item.link,
        scraped_at: scraped_at_now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::ScriptedRenderer;
    use crate::events::RecordingObserver;
    use crate::record::{KEYWORDS_NOT_FOUND, NO_AUTHORS};

    fn query(target: usize) -> SearchQuery {
        SearchQuery::new("test", 2019, 2024, target).expect("valid query")
    }

    fn page_url(query: &SearchQuery, page: u32) -> String {
        build_search_url(query, page).expect("url").to_string()
    }

    fn listing_item(n: u32, abstract_div: &str) -> String {
        format!(
            r#"<div class="generic-item article-item">
                <a class="title-link" href="/j/{n}">Article {n}</a>
                <div class="authors">Author {n}</div>
                <div class="color-grey-dark">Journal {n}</div>
                {abstract_div}
            </div>"#
        )
    }

    fn listing_page(items: &[String]) -> String {
        format!("<html><body>{}</body></html>", items.concat())
    }

    const EMPTY_RESULTS_PAGE: &str = "<html><body><p>No articles found.</p></body></html>";

    async fn crawl(
        renderer: &mut ScriptedRenderer,
        query: &SearchQuery,
    ) -> (CrawlOutcome, RecordingObserver) {
        let mut observer = RecordingObserver::default();
        let outcome = run_crawl(renderer, query, &Pacing::immediate(), &mut observer).await;
        (outcome, observer)
    }

    #[tokio::test]
    async fn test_inline_abstracts_reach_target_without_detail_visits() {
        // Scenario A: one page, two inline full abstracts, target 2.
        let query = query(2);
        let page1 = listing_page(&[
            listing_item(1, r#"<div class="abstract-full">Abstract First. [...] Read more.</div>"#),
            listing_item(2, r#"<div class="abstract-full">Abstract Second. [...] Read more.</div>"#),
        ]);
        let mut renderer = ScriptedRenderer::new(&[(page_url(&query, 1).as_str(), page1.as_str())]);

        let (outcome, observer) = crawl(&mut renderer, &query).await;

        assert_eq!(outcome.state, CrawlState::TargetReached);
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].abstract_text, "First.");
        assert_eq!(outcome.records[0].keywords, KEYWORDS_NOT_FOUND);
        // No detail navigation: the only visit is the listing page itself.
        assert_eq!(renderer.visits, vec![page_url(&query, 1)]);
        assert!(!observer
            .events
            .iter()
            .any(|e| matches!(e, CrawlEvent::DetailFallback { .. })));
    }

    #[tokio::test]
    async fn test_cropped_abstract_triggers_detail_fetch() {
        // Scenario B: cropped-only abstract backfilled from the detail page.
        let query = query(1);
        let page1 = listing_page(&[listing_item(
            7,
            r#"<div class="abstract-cropped">Abstract Teaser [...] Read more.</div>"#,
        )]);
        let detail_url = "https://www.mdpi.com/j/7";
        let detail_page = r#"
            <html><body>
            <div class="html-abstract">Abstract The complete abstract.</div>
            </body></html>
        "#;
        let mut renderer = ScriptedRenderer::new(&[
            (page_url(&query, 1).as_str(), page1.as_str()),
            (detail_url, detail_page),
        ]);

        let (outcome, observer) = crawl(&mut renderer, &query).await;

        assert_eq!(outcome.state, CrawlState::TargetReached);
        assert_eq!(outcome.records[0].abstract_text, "The complete abstract.");
        assert!(observer
            .events
            .iter()
            .any(|e| matches!(e, CrawlEvent::DetailFallback { link } if link == detail_url)));
        // Listing -> detail -> back to listing
        assert_eq!(
            renderer.visits,
            vec![page_url(&query, 1), detail_url.to_string(), page_url(&query, 1)]
        );
    }

    #[tokio::test]
    async fn test_anchorless_fragment_is_skipped_silently() {
        // Scenario C: fragment without the title anchor leaves the
        // accumulator untouched and aborts nothing.
        let query = query(10);
        let page1 = listing_page(&[
            r#"<div class="generic-item article-item"><div class="authors">Orphan</div></div>"#
                .to_string(),
            listing_item(3, r#"<div class="abstract-full">Abstract Kept.</div>"#),
        ]);
        let mut renderer = ScriptedRenderer::new(&[
            (page_url(&query, 1).as_str(), page1.as_str()),
            (page_url(&query, 2).as_str(), EMPTY_RESULTS_PAGE),
        ]);

        let (outcome, observer) = crawl(&mut renderer, &query).await;

        assert_eq!(outcome.state, CrawlState::Exhausted);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].title, "Article 3");
        assert!(observer
            .events
            .iter()
            .any(|e| matches!(e, CrawlEvent::ItemSkipped { .. })));
        assert!(!observer
            .events
            .iter()
            .any(|e| matches!(e, CrawlEvent::PageAborted { .. })));
    }

    #[tokio::test]
    async fn test_render_timeout_aborts_but_keeps_records() {
        // Scenario D: page 3 never renders; pages 1-2 survive.
        let query = query(100);
        let page1 = listing_page(&[
            listing_item(1, r#"<div class="abstract-full">Abstract One.</div>"#),
            listing_item(2, r#"<div class="abstract-full">Abstract Two.</div>"#),
        ]);
        let page2 = listing_page(&[
            listing_item(3, r#"<div class="abstract-full">Abstract Three.</div>"#),
            listing_item(4, r#"<div class="abstract-full">Abstract Four.</div>"#),
        ]);
        let mut renderer = ScriptedRenderer::new(&[
            (page_url(&query, 1).as_str(), page1.as_str()),
            (page_url(&query, 2).as_str(), page2.as_str()),
            // page 3 absent: wait_for never succeeds
        ]);

        let (outcome, observer) = crawl(&mut renderer, &query).await;

        assert_eq!(outcome.state, CrawlState::Aborted);
        assert_eq!(outcome.records.len(), 4);
        assert_eq!(renderer.refreshes, 1);
        assert!(observer
            .events
            .iter()
            .any(|e| matches!(e, CrawlEvent::PageAborted { page: 3, .. })));
    }

    #[tokio::test]
    async fn test_empty_first_page_aborts_distinctly() {
        let query = query(5);
        let mut renderer =
            ScriptedRenderer::new(&[(page_url(&query, 1).as_str(), EMPTY_RESULTS_PAGE)]);

        let (outcome, observer) = crawl(&mut renderer, &query).await;

        assert_eq!(outcome.state, CrawlState::Aborted);
        assert!(outcome.records.is_empty());
        assert!(observer.events.iter().any(|e| matches!(
            e,
            CrawlEvent::PageAborted { page: 1, reason } if reason.contains("blocked")
        )));
    }

    #[tokio::test]
    async fn test_accumulator_never_exceeds_target() {
        // Three items on the page, target 2: the third is dropped.
        let query = query(2);
        let page1 = listing_page(&[
            listing_item(1, r#"<div class="abstract-full">Abstract A.</div>"#),
            listing_item(2, r#"<div class="abstract-full">Abstract B.</div>"#),
            listing_item(3, r#"<div class="abstract-full">Abstract C.</div>"#),
        ]);
        let mut renderer = ScriptedRenderer::new(&[(page_url(&query, 1).as_str(), page1.as_str())]);

        let (outcome, _) = crawl(&mut renderer, &query).await;

        assert_eq!(outcome.state, CrawlState::TargetReached);
        assert_eq!(outcome.records.len(), query.target_count);
    }

    #[tokio::test]
    async fn test_detail_failure_still_produces_record() {
        // Item needs a detail visit but the detail page never renders:
        // the record is appended with error sentinels.
        let query = query(1);
        let page1 = listing_page(&[listing_item(9, "")]);
        let mut renderer = ScriptedRenderer::new(&[(page_url(&query, 1).as_str(), page1.as_str())]);

        let (outcome, _) = crawl(&mut renderer, &query).await;

        assert_eq!(outcome.state, CrawlState::TargetReached);
        assert_eq!(outcome.records.len(), 1);
        let record = &outcome.records[0];
        assert_eq!(record.abstract_text, crate::record::ABSTRACT_ERROR);
        assert_eq!(record.authors, "Author 9");
        assert_ne!(record.authors, NO_AUTHORS);
    }
}
