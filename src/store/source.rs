//! Loading mention and sector data from CSV sources.
//!
//! A source is either a local file path or an `http(s)://` URL. Remote
//! sources are fetched with a timeout; any read or transport failure is
//! reported as [`IndicatorError::DataUnavailable`].

use crate::error::{IndicatorError, Result};
use crate::models::{MentionRecord, Period};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Columns a mentions CSV must carry. `component` may stand in for `category`.
const MENTION_HEADERS: [&str; 4] = ["entity_id", "filing_date", "category", "count"];

/// Columns a sectors CSV must carry.
const SECTOR_HEADERS: [&str; 2] = ["entity_id", "sector"];

/// Records parsed from a mentions source.
#[derive(Debug, Clone, Default)]
pub struct LoadedMentions {
    pub records: Vec<MentionRecord>,
    /// Rows skipped because a field was empty or unparseable.
    pub malformed_rows: usize,
}

#[derive(Debug, Deserialize)]
struct MentionRow {
    #[serde(default)]
    entity_id: String,
    #[serde(default)]
    filing_date: String,
    #[serde(default, alias = "component")]
    category: String,
    #[serde(default)]
    count: String,
}

#[derive(Debug, Deserialize)]
struct SectorRow {
    entity_id: String,
    #[serde(default)]
    sector: String,
}

/// Read the raw text of a source.
pub async fn fetch_source(source: &str, timeout: Duration) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        debug!("Fetching remote source: {}", source);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IndicatorError::unavailable(format!("HTTP client: {}", e)))?;

        let response = client
            .get(source)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| IndicatorError::unavailable(format!("Could not fetch {}: {}", source, e)))?;

        response
            .text()
            .await
            .map_err(|e| IndicatorError::unavailable(format!("Could not read {}: {}", source, e)))
    } else {
        debug!("Reading local source: {}", source);
        tokio::fs::read_to_string(source)
            .await
            .map_err(|e| IndicatorError::unavailable(format!("Could not read {}: {}", source, e)))
    }
}

/// Fetch and parse a mentions CSV.
pub async fn load_mentions(source: &str, timeout: Duration) -> Result<LoadedMentions> {
    let content = fetch_source(source, timeout).await?;
    let loaded = parse_mentions(&content)?;

    info!(
        "Loaded {} mention records from {} ({} malformed rows skipped)",
        loaded.records.len(),
        source,
        loaded.malformed_rows
    );
    Ok(loaded)
}

/// Fetch and parse a sectors CSV into `(entity, sector)` pairs.
pub async fn load_sectors(source: &str, timeout: Duration) -> Result<Vec<(String, String)>> {
    let content = fetch_source(source, timeout).await?;
    let pairs = parse_sectors(&content)?;

    info!("Loaded {} sector assignments from {}", pairs.len(), source);
    Ok(pairs)
}

/// Parse mentions CSV text.
pub fn parse_mentions(content: &str) -> Result<LoadedMentions> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| IndicatorError::unavailable(format!("Error parsing CSV: {}", e)))?
        .clone();
    let found: Vec<&str> = headers.iter().map(str::trim).collect();
    let has = |name: &str| found.contains(&name);
    let missing_category = !has("category") && !has("component");
    if !has("entity_id") || !has("filing_date") || !has("count") || missing_category {
        return Err(IndicatorError::unavailable(format!(
            "CSV missing headers. Expected: {:?}. Found: {}.",
            MENTION_HEADERS,
            found.join(", ")
        )));
    }
    if has("category") && has("component") {
        return Err(IndicatorError::unavailable(format!(
            "CSV has both category and component columns. Found: {}.",
            found.join(", ")
        )));
    }

    let mut loaded = LoadedMentions::default();

    for (line, row) in reader.deserialize::<MentionRow>().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping unreadable mention row {}: {}", line + 2, e);
                loaded.malformed_rows += 1;
                continue;
            }
        };

        match parse_mention_row(&row) {
            Some(record) => loaded.records.push(record),
            None => {
                warn!("Skipping malformed mention row {}: {:?}", line + 2, row);
                loaded.malformed_rows += 1;
            }
        }
    }

    Ok(loaded)
}

fn parse_mention_row(row: &MentionRow) -> Option<MentionRecord> {
    let entity_id = row.entity_id.trim();
    let category = row.category.trim();
    if entity_id.is_empty() || category.is_empty() {
        return None;
    }

    let period: Period = row.filing_date.trim().parse().ok()?;
    let raw_count: f64 = row.count.trim().parse().ok()?;

    Some(MentionRecord::new(entity_id, period, category, raw_count))
}

/// Parse sectors CSV text.
pub fn parse_sectors(content: &str) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| IndicatorError::unavailable(format!("Error parsing CSV: {}", e)))?
        .clone();
    let found: Vec<&str> = headers.iter().map(str::trim).collect();
    if !SECTOR_HEADERS.iter().all(|h| found.contains(h)) {
        return Err(IndicatorError::unavailable(format!(
            "CSV missing headers. Expected: {:?}. Found: {}.",
            SECTOR_HEADERS,
            found.join(", ")
        )));
    }

    let mut pairs = Vec::new();
    for row in reader.deserialize::<SectorRow>() {
        match row {
            Ok(row) if !row.entity_id.trim().is_empty() => {
                pairs.push((row.entity_id.trim().to_string(), row.sector.trim().to_string()));
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable sector row: {}", e),
        }
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_parse_mentions_buckets_dates_into_quarters() {
        let csv = "entity_id,filing_date,category,count\n\
                   E1,2024-01-15,tariffs,3\n\
                   E1,2024-03-30,tariffs,2.5\n\
                   E2,2024Q2,layoffs,0\n";

        let loaded = parse_mentions(csv).unwrap();
        assert_eq!(loaded.records.len(), 3);
        assert_eq!(loaded.malformed_rows, 0);
        assert_eq!(loaded.records[0].period.to_string(), "2024Q1");
        assert_eq!(loaded.records[1].raw_count, 2.5);
        assert_eq!(loaded.records[2].period.to_string(), "2024Q2");
    }

    #[test]
    fn test_parse_mentions_accepts_component_alias() {
        let csv = "filing_date,count,component,entity_id\n2024-05-01,4,domestic_us,E9\n";
        let loaded = parse_mentions(csv).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].category, "domestic_us");
        assert_eq!(loaded.records[0].entity_id, "E9");
    }

    #[test]
    fn test_parse_mentions_skips_malformed_rows() {
        let csv = "entity_id,filing_date,category,count\n\
                   E1,2024-01-15,tariffs,\n\
                   E2,,tariffs,1\n\
                   E3,2024-01-15,tariffs,many\n\
                   E4,2024-01-15,tariffs,-2\n";

        let loaded = parse_mentions(csv).unwrap();
        // Negative counts are kept here; normalization rejects them.
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].raw_count, -2.0);
        assert_eq!(loaded.malformed_rows, 3);
    }

    #[test]
    fn test_parse_mentions_missing_headers() {
        let err = parse_mentions("date,value\n2024-01-01,3\n").unwrap_err();
        match err {
            IndicatorError::DataUnavailable(msg) => assert!(msg.contains("missing headers")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_mentions_rejects_category_and_component() {
        let csv = "entity_id,filing_date,category,component,count\nE1,2024-01-15,social,env,3\n";
        match parse_mentions(csv).unwrap_err() {
            IndicatorError::DataUnavailable(msg) => {
                assert!(msg.contains("both category and component"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_sectors() {
        let csv = "entity_id,sector\nE1,tech\nE2,\n,energy\n";
        let pairs = parse_sectors(csv).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("E1".to_string(), "tech".to_string()),
                ("E2".to_string(), String::new()),
            ]
        );
        assert!(parse_sectors("id,industry\nE1,tech\n").is_err());
    }

    #[tokio::test]
    async fn test_load_mentions_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "entity_id,filing_date,category,count").unwrap();
        writeln!(file, "E1,2023-11-02,war,7").unwrap();

        let path = file.path().to_string_lossy().to_string();
        let loaded = assert_ok!(load_mentions(&path, Duration::from_secs(1)).await);
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].period.to_string(), "2023Q4");
    }

    #[tokio::test]
    async fn test_missing_file_is_data_unavailable() {
        let result = load_mentions("/nonexistent/mentions.csv", Duration::from_secs(1)).await;
        let err = assert_err!(result);
        assert!(matches!(err, IndicatorError::DataUnavailable(_)));
    }
}
