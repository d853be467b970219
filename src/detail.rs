//! Detail-page fetching.
//!
//! Visits one article's permanent link to pull the full abstract, keywords,
//! body sections and references, then returns the session to wherever the
//! caller had it. Failures never propagate: the caller always gets detail
//! content, sentinel-valued when the fetch went wrong.

use crate::browser::{Pacing, Renderer, BODY_MARKER};
use crate::error::{HarvestError, Result};
use crate::extract::{self, DetailContent};
use std::time::Duration;
use tracing::{debug, warn};

/// Fetch detail content for `article_url`.
///
/// The session's current location is recorded first and restored before
/// returning, regardless of outcome; restoration after a failure is
/// best-effort. Any error during navigation or parsing yields
/// [`DetailContent::error`].
pub async fn fetch_detail(
    renderer: &mut dyn Renderer,
    article_url: &str,
    pacing: &Pacing,
) -> DetailContent {
    let prior = match renderer.current_url().await {
        Ok(url) if !url.is_empty() => Some(url),
        Ok(_) => None,
        Err(e) => {
            warn!("Could not record current location: {e}");
            None
        }
    };

    let content = match try_fetch(renderer, article_url, pacing).await {
        Ok(content) => content,
        Err(e) => {
            warn!(url = %article_url, "Detail fetch failed: {e}");
            DetailContent::error()
        }
    };

    if let Some(prior) = prior {
        if let Err(e) = renderer.open(&prior).await {
            warn!(url = %prior, "Failed to restore prior location: {e}");
        } else {
            sleep_ms(pacing.return_delay_ms).await;
        }
    }

    content
}

async fn try_fetch(
    renderer: &mut dyn Renderer,
    article_url: &str,
    pacing: &Pacing,
) -> Result<DetailContent> {
    renderer.open(article_url).await?;
    sleep_ms(pacing.detail_delay_ms).await;

    if !renderer.wait_for(BODY_MARKER, pacing.detail_wait).await? {
        return Err(HarvestError::RenderTimeout(BODY_MARKER.to_string()));
    }
    debug!(url = %article_url, "Detail page rendered");

    let html = renderer.html().await?;
    Ok(extract::extract_detail(&html))
}

async fn sleep_ms(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}
