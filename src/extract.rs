//! Field extraction from rendered MDPI markup.
//!
//! Every field is located through a declared fallback selector chain: the
//! chain is tried in order and the first non-empty match wins, so duplicate
//! class names across tiers always resolve to the first-listed tier. When a
//! whole chain misses, the field carries its sentinel string. All functions
//! here are pure: same markup in, same fields out.

use crate::record::{
    References, Sections, ABSTRACT_NOT_FOUND, FULL_CONTENT_SECTION, KEYWORDS_NOT_FOUND, NO_AUTHORS,
    UNKNOWN_JOURNAL,
};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Item-fragment locators, primary first
pub const ITEM_CHAIN: &[&str] = &[
    "div.generic-item.article-item",
    "div.article-item",
    "div.generic-item",
];

/// Structural marker waited on before a listing page is parsed
pub const ITEM_MARKER: &str = "div.generic-item";

/// Anchor carrying both the title and the permanent link
const TITLE_ANCHOR: &str = "a.title-link";

const AUTHORS_CHAIN: &[&str] = &["div.authors"];
const JOURNAL_CHAIN: &[&str] = &["div.color-grey-dark"];
const ABSTRACT_FULL_CHAIN: &[&str] = &["div.abstract-full"];
const ABSTRACT_CROPPED_CHAIN: &[&str] = &["div.abstract-cropped"];

/// Detail-page abstract locations, tried in order
const DETAIL_ABSTRACT_CHAIN: &[&str] = &[
    "div.html-abstract",
    "div.abstract",
    "section#abstract",
    "div.art-abstract",
];

const DETAIL_KEYWORDS_CHAIN: &[&str] = &[
    "span#html-keywords",
    "div.html-keywords",
    "div.art-keywords",
];

const DETAIL_BODY_CHAIN: &[&str] = &["div.html-body", "article", "div.html-content"];

const DETAIL_REFERENCES_CHAIN: &[&str] = &[
    "section#html-references_list",
    "div.html-references",
    "ol.references-list",
];

/// Truncation marker MDPI appends to cropped listing abstracts
const READ_MORE_MARKER: &str = "[...] Read more.";

/// Fields pulled from one listing-item fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingItem {
    pub title: String,
    pub link: String,
    pub authors: String,
    pub journal: String,
    /// Cleaned full abstract when the fragment carries one inline
    pub inline_abstract: Option<String>,
    /// The fragment only had the cropped teaser
    pub has_cropped: bool,
}

/// Why a fragment produced no item.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// No title anchor: silent skip, not an error
    MissingAnchor,
    /// The href could not be resolved against the site base
    BadLink(String),
}

/// Result of parsing one listing page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingParse {
    /// Fragments located by the winning selector tier
    pub fragments: usize,
    pub items: Vec<ListingItem>,
    pub skipped: Vec<SkipReason>,
}

/// Content extracted from (or substituted for) a detail page.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailContent {
    pub abstract_text: String,
    pub keywords: String,
    pub sections: Sections,
    pub references: References,
}

impl DetailContent {
    /// Detail fields for an item whose full abstract was inline; the
    /// detail page is never visited, so the rest stay at their sentinels.
    pub fn inline(abstract_text: String) -> Self {
        Self {
            abstract_text,
            keywords: KEYWORDS_NOT_FOUND.to_string(),
            sections: Sections::new(),
            references: References::not_found(),
        }
    }

    /// All-sentinel content produced when the detail fetch fails.
    pub fn error() -> Self {
        Self {
            abstract_text: crate::record::ABSTRACT_ERROR.to_string(),
            keywords: crate::record::KEYWORDS_ERROR.to_string(),
            sections: Sections::single(FULL_CONTENT_SECTION, crate::record::CONTENT_ERROR),
            references: References::error(),
        }
    }
}

/// Parse one rendered listing page into item fields.
///
/// Fragments without the title anchor are skipped silently; the caller
/// decides how to report the skip. `base` resolves relative hrefs.
pub fn parse_listing(html: &str, base: &Url) -> ListingParse {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let mut fragments = Vec::new();
    for css in ITEM_CHAIN {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        fragments = root.select(&selector).collect();
        if !fragments.is_empty() {
            break;
        }
    }

    let mut parse = ListingParse {
        fragments: fragments.len(),
        ..ListingParse::default()
    };

    let Ok(anchor_selector) = Selector::parse(TITLE_ANCHOR) else {
        return parse;
    };

    for fragment in fragments {
        let Some(anchor) = fragment.select(&anchor_selector).next() else {
            parse.skipped.push(SkipReason::MissingAnchor);
            continue;
        };

        let href = anchor.value().attr("href").unwrap_or("");
        let link = match base.join(href) {
            Ok(url) => url.to_string(),
            Err(e) => {
                parse.skipped.push(SkipReason::BadLink(format!("{href}: {e}")));
                continue;
            }
        };

        let inline_abstract =
            first_chain_text(fragment, ABSTRACT_FULL_CHAIN).map(|text| clean_abstract(&text));
        let has_cropped = first_chain_text(fragment, ABSTRACT_CROPPED_CHAIN).is_some();

        parse.items.push(ListingItem {
            title: element_text(&anchor),
            link,
            authors: first_chain_text(fragment, AUTHORS_CHAIN)
                .unwrap_or_else(|| NO_AUTHORS.to_string()),
            journal: first_chain_text(fragment, JOURNAL_CHAIN)
                .unwrap_or_else(|| UNKNOWN_JOURNAL.to_string()),
            inline_abstract,
            has_cropped,
        });
    }

    parse
}

/// Extract abstract, keywords, body sections and references from a
/// rendered detail page.
pub fn extract_detail(html: &str) -> DetailContent {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let abstract_text = first_chain_text(root, DETAIL_ABSTRACT_CHAIN)
        .map(|text| clean_abstract(&text))
        .unwrap_or_else(|| ABSTRACT_NOT_FOUND.to_string());

    let keywords = first_chain_text(root, DETAIL_KEYWORDS_CHAIN)
        .map(|text| clean_keywords(&text))
        .unwrap_or_else(|| KEYWORDS_NOT_FOUND.to_string());

    let sections = first_chain_element(root, DETAIL_BODY_CHAIN)
        .map(partition_sections)
        .unwrap_or_default();

    let references = first_chain_element(root, DETAIL_REFERENCES_CHAIN)
        .map(collect_references)
        .unwrap_or_else(References::not_found);

    DetailContent {
        abstract_text,
        keywords,
        sections,
        references,
    }
}

/// Drop the leading "Abstract" label and the trailing truncation marker.
pub fn clean_abstract(text: &str) -> String {
    let mut trimmed = text.trim();
    if let Some(prefix) = trimmed.get(..8) {
        if prefix.eq_ignore_ascii_case("abstract") {
            trimmed = trimmed[8..].trim_start();
        }
    }
    trimmed.replace(READ_MORE_MARKER, "").trim().to_string()
}

/// Drop the leading "Keywords" label and an optional separator colon.
fn clean_keywords(text: &str) -> String {
    let mut trimmed = text.trim();
    if let Some(prefix) = trimmed.get(..8) {
        if prefix.eq_ignore_ascii_case("keywords") {
            trimmed = trimmed[8..].trim_start();
            trimmed = trimmed.strip_prefix(':').unwrap_or(trimmed).trim_start();
        }
    }
    trimmed.to_string()
}

/// Whitespace-normalized text of an element subtree.
fn element_text(element: &ElementRef) -> String {
    let raw: String = element.text().collect();
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-empty text produced by the chain, in declared order.
fn first_chain_text(scope: ElementRef<'_>, chain: &[&str]) -> Option<String> {
    for css in chain {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(element) = scope.select(&selector).next() {
            let text = element_text(&element);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First element matched by the chain, in declared order.
fn first_chain_element<'a>(scope: ElementRef<'a>, chain: &[&str]) -> Option<ElementRef<'a>> {
    for css in chain {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        if let Some(element) = scope.select(&selector).next() {
            return Some(element);
        }
    }
    None
}

fn is_section_heading(element: &ElementRef) -> bool {
    matches!(element.value().name(), "h2" | "h3" | "h4")
}

/// Partition a content container by h2-h4 heading boundaries.
///
/// Each heading names a section holding the space-joined text of its
/// following siblings up to the next heading. A container without headings
/// becomes a single section named for the full content.
fn partition_sections(container: ElementRef) -> Sections {
    let Ok(heading_selector) = Selector::parse("h2, h3, h4") else {
        return Sections::new();
    };

    let headings: Vec<ElementRef> = container.select(&heading_selector).collect();
    if headings.is_empty() {
        return Sections::single(FULL_CONTENT_SECTION, element_text(&container));
    }

    let mut sections = Sections::new();
    for heading in headings {
        let mut chunks = Vec::new();
        for sibling in heading.next_siblings() {
            if let Some(element) = ElementRef::wrap(sibling) {
                if is_section_heading(&element) {
                    break;
                }
                let text = element_text(&element);
                if !text.is_empty() {
                    chunks.push(text);
                }
            } else if let Some(text) = sibling.value().as_text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.split_whitespace().collect::<Vec<_>>().join(" "));
                }
            }
        }
        sections.insert(element_text(&heading), chunks.join(" "));
    }
    sections
}

/// Collect reference entries as list items, falling back to paragraphs,
/// omitting empty ones.
fn collect_references(container: ElementRef) -> References {
    for css in ["li", "p"] {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let entries: Vec<String> = container
            .select(&selector)
            .map(|element| element_text(&element))
            .filter(|text| !text.is_empty())
            .collect();
        if !entries.is_empty() {
            return References::Listed(entries);
        }
    }
    References::Listed(Vec::new())
}
