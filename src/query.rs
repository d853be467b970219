//! Search query construction for the MDPI search endpoint.

use crate::error::{HarvestError, Result};
use chrono::{Datelike, Local};
use url::Url;

/// MDPI site root; also the base for resolving relative article links
pub const MDPI_BASE_URL: &str = "https://www.mdpi.com";

/// Results requested per listing page
pub const PAGE_COUNT: u32 = 50;

/// Filter parameters the search endpoint expects to be present even when unset
const EMPTY_FILTER_PARAMS: &[&str] = &["featured", "subjects", "journals", "article_types", "countries"];

/// One validated crawl request. Immutable after construction.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub topic: String,
    pub year_from: i32,
    pub year_to: i32,
    pub target_count: usize,
}

impl SearchQuery {
    /// Build a query, rejecting invalid year ranges and a zero target
    /// before any navigation happens.
    pub fn new(
        topic: impl Into<String>,
        year_from: i32,
        year_to: i32,
        target_count: usize,
    ) -> Result<Self> {
        let topic = topic.into();
        if topic.trim().is_empty() {
            return Err(HarvestError::Validation("topic must not be empty".to_string()));
        }
        if year_from > year_to {
            return Err(HarvestError::Validation(format!(
                "year_from {year_from} is after year_to {year_to}"
            )));
        }
        if target_count == 0 {
            return Err(HarvestError::Validation(
                "target_count must be positive".to_string(),
            ));
        }
        Ok(Self {
            topic,
            year_from,
            year_to,
            target_count,
        })
    }

    /// Convenience constructor: a window of `years_back` years ending at the
    /// current year.
    pub fn from_years_back(topic: impl Into<String>, years_back: i32, target_count: usize) -> Result<Self> {
        let current_year = Local::now().year();
        Self::new(topic, current_year - years_back, current_year, target_count)
    }

    /// Output filename: `mdpi_<topic with spaces as underscores>_<from>-<to>.json`
    pub fn output_filename(&self) -> String {
        format!(
            "mdpi_{}_{}-{}.json",
            self.topic.replace(' ', "_"),
            self.year_from,
            self.year_to
        )
    }
}

/// Build the search URL for one listing page (1-based).
///
/// The query string carries the topic (spaces encoded as `+`), the year
/// window, pubdate sorting, the fixed page size, the page number, and the
/// always-present empty filter parameters.
pub fn build_search_url(query: &SearchQuery, page_no: u32) -> Result<Url> {
    let mut url = Url::parse(&format!("{MDPI_BASE_URL}/search"))
        .map_err(|e| HarvestError::Config(format!("Invalid base URL: {e}")))?;

    {
        let mut params = url.query_pairs_mut();
        params.append_pair("q", &query.topic);
        params.append_pair("year_from", &query.year_from.to_string());
        params.append_pair("year_to", &query.year_to.to_string());
        params.append_pair("sort", "pubdate");
        params.append_pair("page_count", &PAGE_COUNT.to_string());
        params.append_pair("page_no", &page_no.to_string());
        for name in EMPTY_FILTER_PARAMS {
            params.append_pair(name, "");
        }
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_search_url() {
        let query = SearchQuery::new("computer science", 2019, 2024, 100).expect("valid query");
        let url = build_search_url(&query, 3).expect("Failed to build URL");
        let s = url.as_str();
        assert!(s.starts_with("https://www.mdpi.com/search?"));
        assert!(s.contains("q=computer+science"));
        assert!(s.contains("year_from=2019"));
        assert!(s.contains("year_to=2024"));
        assert!(s.contains("sort=pubdate"));
        assert!(s.contains("page_count=50"));
        assert!(s.contains("page_no=3"));
        for name in EMPTY_FILTER_PARAMS {
            assert!(s.contains(&format!("{name}=")), "missing filter param {name}");
        }
    }

    #[test]
    fn test_rejects_inverted_year_range() {
        let err = SearchQuery::new("test", 2024, 2019, 10).expect_err("must reject");
        assert!(matches!(err, HarvestError::Validation(_)));
    }

    #[test]
    fn test_rejects_zero_target() {
        assert!(SearchQuery::new("test", 2019, 2024, 0).is_err());
    }

    #[test]
    fn test_rejects_blank_topic() {
        assert!(SearchQuery::new("   ", 2019, 2024, 10).is_err());
    }

    #[test]
    fn test_years_back_window() {
        let query = SearchQuery::from_years_back("test", 5, 10).expect("valid query");
        assert_eq!(query.year_to - query.year_from, 5);
    }

    #[test]
    fn test_output_filename() {
        let query = SearchQuery::new("machine learning", 2020, 2025, 10).expect("valid query");
        assert_eq!(query.output_filename(), "mdpi_machine_learning_2020-2025.json");
    }
}
