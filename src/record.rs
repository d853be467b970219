//! Article record model and sentinel values.
//!
//! Every field of an [`ArticleRecord`] is always present: when extraction
//! fails or the source omits data, the field carries one of the sentinel
//! strings below instead of a null. Downstream consumers can rely on field
//! presence without schema checks.

use chrono::Local;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sentinel for a listing item without an authors block
pub const NO_AUTHORS: &str = "No Authors";
/// Sentinel for a listing item without a journal line
pub const UNKNOWN_JOURNAL: &str = "Unknown Journal";
/// Sentinel when no abstract container matches on the detail page
pub const ABSTRACT_NOT_FOUND: &str = "Abstract not found";
/// Sentinel when the detail fetch itself failed
pub const ABSTRACT_ERROR: &str = "Error retrieving abstract";
/// Sentinel when no keywords container matches
pub const KEYWORDS_NOT_FOUND: &str = "Keywords not found";
/// Sentinel when the detail fetch itself failed
pub const KEYWORDS_ERROR: &str = "Error retrieving keywords";
/// Sentinel when no references container matches
pub const REFERENCES_NOT_FOUND: &str = "References not found";
/// Sentinel when the detail fetch itself failed
pub const REFERENCES_ERROR: &str = "Error retrieving references";
/// Section text sentinel when the detail fetch itself failed
pub const CONTENT_ERROR: &str = "Error retrieving content";
/// Section name used when the content container has no headings
pub const FULL_CONTENT_SECTION: &str = "Full Content";

/// Timestamp format written to `scraped_at`
const SCRAPED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One harvested bibliographic record.
///
/// Serializes to the on-wire JSON shape: `abstract` and `full_content` are
/// the wire names for the abstract text and the section map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    pub authors: String,
    pub journal: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub keywords: String,
    #[serde(rename = "full_content")]
    pub sections: Sections,
    pub references: References,
    /// Absolute article URL; the only field safe to treat as a key
    pub link: String,
    pub scraped_at: String,
}

/// Current local time formatted for the `scraped_at` field.
pub fn scraped_at_now() -> String {
    Local::now().format(SCRAPED_AT_FORMAT).to_string()
}

/// Ordered section-heading -> section-text map.
///
/// Insertion order is document order and is preserved through JSON
/// serialization. Inserting an existing heading overwrites its text in
/// place, matching plain map semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections(Vec<(String, String)>);

impl Sections {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Single-section map, used for the no-headings fallback.
    pub fn single(heading: impl Into<String>, text: impl Into<String>) -> Self {
        Self(vec![(heading.into(), text.into())])
    }

    pub fn insert(&mut self, heading: String, text: String) {
        if let Some(entry) = self.0.iter_mut().find(|(h, _)| *h == heading) {
            entry.1 = text;
        } else {
            self.0.push((heading, text));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, heading: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(h, _)| h == heading)
            .map(|(_, t)| t.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(h, t)| (h.as_str(), t.as_str()))
    }
}

impl Serialize for Sections {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (heading, text) in &self.0 {
            map.serialize_entry(heading, text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Sections {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SectionsVisitor;

        impl<'de> Visitor<'de> for SectionsVisitor {
            type Value = Sections;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a map of section heading to section text")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut sections = Sections::new();
                while let Some((heading, text)) = access.next_entry::<String, String>()? {
                    sections.insert(heading, text);
                }
                Ok(sections)
            }
        }

        deserializer.deserialize_map(SectionsVisitor)
    }
}

/// Reference list, or a sentinel string when the references section is
/// absent or the detail fetch failed. Serializes untagged so the wire
/// format is either a JSON array or the literal sentinel string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum References {
    Listed(Vec<String>),
    Missing(String),
}

impl References {
    pub fn not_found() -> Self {
        Self::Missing(REFERENCES_NOT_FOUND.to_string())
    }

    pub fn error() -> Self {
        Self::Missing(REFERENCES_ERROR.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> ArticleRecord {
        let mut sections = Sections::new();
        sections.insert("1. Introduction".to_string(), "Context and aims.".to_string());
        sections.insert("2. Methods".to_string(), "Survey design.".to_string());
        ArticleRecord {
            title: "Grün energy transitions".to_string(),
            authors: "Müller, A.; Østergaard, B.".to_string(),
            journal: "Energies, 2024".to_string(),
            abstract_text: "We study energy transitions.".to_string(),
            keywords: "energy; transitions".to_string(),
            sections,
            references: References::Listed(vec![
                "Smith J. Prior work. 2020.".to_string(),
                "Doe A. Earlier survey. 2019.".to_string(),
            ]),
            link: "https://www.mdpi.com/1996-1073/17/1/42".to_string(),
            scraped_at: "2024-01-05 10:30:00".to_string(),
        }
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(sample_record()).expect("serialize");
        let obj = json.as_object().expect("object");
        for field in [
            "title",
            "authors",
            "journal",
            "abstract",
            "keywords",
            "full_content",
            "references",
            "link",
            "scraped_at",
        ] {
            assert!(obj.contains_key(field), "missing field {field}");
        }
        assert!(!obj.contains_key("abstract_text"));
        assert!(!obj.contains_key("sections"));
    }

    #[test]
    fn test_round_trip_preserves_content_and_order() {
        let records = vec![sample_record(), sample_record()];
        let json = serde_json::to_string_pretty(&records).expect("serialize");
        let parsed: Vec<ArticleRecord> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, records);

        // Section order must survive the trip
        let headings: Vec<&str> = parsed[0].sections.iter().map(|(h, _)| h).collect();
        assert_eq!(headings, vec!["1. Introduction", "2. Methods"]);
    }

    #[test]
    fn test_references_sentinel_serializes_as_string() {
        let json = serde_json::to_string(&References::not_found()).expect("serialize");
        assert_eq!(json, format!("\"{REFERENCES_NOT_FOUND}\""));

        let listed = References::Listed(vec!["only one".to_string()]);
        let json = serde_json::to_string(&listed).expect("serialize");
        assert_eq!(json, "[\"only one\"]");
    }

    #[test]
    fn test_sections_insert_overwrites_in_place() {
        let mut sections = Sections::new();
        sections.insert("A".to_string(), "first".to_string());
        sections.insert("B".to_string(), "second".to_string());
        sections.insert("A".to_string(), "replaced".to_string());
        assert_eq!(sections.len(), 2);
        assert_eq!(sections.get("A"), Some("replaced"));
        let order: Vec<&str> = sections.iter().map(|(h, _)| h).collect();
        assert_eq!(order, vec!["A", "B"]);
    }

    #[test]
    fn test_scraped_at_format() {
        let stamp = scraped_at_now();
        // YYYY-MM-DD HH:MM:SS
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[4..5], "-");
        assert_eq!(&stamp[10..11], " ");
        assert_eq!(&stamp[13..14], ":");
    }
}
