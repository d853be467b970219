//! Record sink: persists one crawl's records as a JSON document.

use crate::error::Result;
use crate::query::SearchQuery;
use crate::record::ArticleRecord;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write the accumulated records under `output_dir`, creating the directory
/// on demand. The file is a pretty-printed UTF-8 JSON array with non-ASCII
/// characters preserved literally; an empty accumulator still produces a
/// file holding `[]`. Returns the written path.
pub fn save_records(
    output_dir: &Path,
    query: &SearchQuery,
    records: &[ArticleRecord],
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(query.output_filename());

    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    records.serialize(&mut serializer)?;

    std::fs::write(&path, buf)?;
    info!(count = records.len(), path = %path.display(), "Saved records");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{References, Sections};
    use tempfile::TempDir;

    fn record(title: &str) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            authors: "Zoë Dupré".to_string(),
            journal: "Sensors, 2024".to_string(),
            abstract_text: "Résumé of findings.".to_string(),
            keywords: "Keywords not found".to_string(),
            sections: Sections::new(),
            references: References::not_found(),
            link: "https://www.mdpi.com/x/1".to_string(),
            scraped_at: "2024-06-01 12:00:00".to_string(),
        }
    }

    #[test]
    fn test_save_creates_dir_and_named_file() -> Result<()> {
        let temp = TempDir::new()?;
        let output_dir = temp.path().join("output");
        let query = SearchQuery::new("machine learning", 2020, 2025, 10)?;

        let path = save_records(&output_dir, &query, &[record("A")])?;

        assert!(path.exists());
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("mdpi_machine_learning_2020-2025.json")
        );
        Ok(())
    }

    #[test]
    fn test_round_trip_and_literal_non_ascii() -> Result<()> {
        let temp = TempDir::new()?;
        let query = SearchQuery::new("test", 2020, 2025, 10)?;
        let records = vec![record("First"), record("Second")];

        let path = save_records(temp.path(), &query, &records)?;
        let content = std::fs::read_to_string(&path)?;

        // Non-ASCII must not be \u-escaped
        assert!(content.contains("Zoë Dupré"));
        assert!(content.contains("Résumé"));

        let parsed: Vec<ArticleRecord> = serde_json::from_str(&content)?;
        assert_eq!(parsed, records);
        Ok(())
    }

    #[test]
    fn test_empty_accumulator_still_writes_file() -> Result<()> {
        let temp = TempDir::new()?;
        let query = SearchQuery::new("test", 2020, 2025, 10)?;

        let path = save_records(temp.path(), &query, &[])?;
        let content = std::fs::read_to_string(&path)?;
        assert_eq!(content.trim(), "[]");
        Ok(())
    }
}
