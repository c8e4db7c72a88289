//! Data access for mention records and sector assignments.
//!
//! The engine only sees the [`MentionStore`] and [`SectorIndex`] traits.
//! The in-memory implementations here are populated from CSV sources
//! (see [`source`]) and are what the binary runs against.

pub mod source;

use crate::error::{IndicatorError, Result};
use crate::models::{EntityId, MentionRecord, PeriodRange, SectorId};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::{debug, info};

pub use source::{load_mentions, load_sectors, LoadedMentions};

/// Read-only access to raw mention records.
#[async_trait]
pub trait MentionStore: Send + Sync {
    /// Records in `range`, optionally restricted to one entity and/or category.
    async fn query(
        &self,
        entity_id: Option<&str>,
        range: &PeriodRange,
        category: Option<&str>,
    ) -> Result<Vec<MentionRecord>>;

    /// Monotonic stamp that changes whenever the underlying data changes.
    async fn version(&self) -> Result<u64>;

    /// Earliest and latest period with any record, if the store is non-empty.
    async fn period_bounds(&self) -> Result<Option<PeriodRange>>;
}

/// Entity → sector classification.
#[async_trait]
pub trait SectorIndex: Send + Sync {
    /// The sector an entity belongs to, or `None` if unclassified.
    async fn sector_of(&self, entity_id: &str) -> Result<Option<SectorId>>;

    /// All known sectors, sorted.
    async fn sectors(&self) -> Result<Vec<SectorId>>;
}

/// Mention store held in memory.
///
/// Every [`ingest`](InMemoryMentionStore::ingest) bumps the data version, so
/// cached series computed before the ingest are recomputed.
#[derive(Debug, Default)]
pub struct InMemoryMentionStore {
    records: RwLock<Vec<MentionRecord>>,
    version: AtomicU64,
}

impl InMemoryMentionStore {
    /// Create an empty store at version 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records (version 1).
    pub fn with_records(records: Vec<MentionRecord>) -> Self {
        let store = Self::new();
        store.ingest(records);
        store
    }

    /// Append newly extracted records and advance the data version.
    pub fn ingest(&self, records: Vec<MentionRecord>) -> u64 {
        let count = records.len();
        {
            let mut guard = self
                .records
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            guard.extend(records);
        }
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Ingested {} mention records (data version {})", count, version);
        version
    }

    fn snapshot(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<MentionRecord>>> {
        self.records
            .read()
            .map_err(|_| IndicatorError::unavailable("mention store lock poisoned"))
    }
}

#[async_trait]
impl MentionStore for InMemoryMentionStore {
    async fn query(
        &self,
        entity_id: Option<&str>,
        range: &PeriodRange,
        category: Option<&str>,
    ) -> Result<Vec<MentionRecord>> {
        let records = self.snapshot()?;
        let matched: Vec<MentionRecord> = records
            .iter()
            .filter(|r| range.contains(r.period))
            .filter(|r| entity_id.map_or(true, |e| r.entity_id == e))
            .filter(|r| category.map_or(true, |c| r.category == c))
            .cloned()
            .collect();

        debug!("Query {} returned {} records", range, matched.len());
        Ok(matched)
    }

    async fn version(&self) -> Result<u64> {
        Ok(self.version.load(Ordering::SeqCst))
    }

    async fn period_bounds(&self) -> Result<Option<PeriodRange>> {
        let records = self.snapshot()?;
        let min = records.iter().map(|r| r.period).min();
        let max = records.iter().map(|r| r.period).max();

        match (min, max) {
            (Some(start), Some(end)) => Ok(Some(PeriodRange::new(start, end)?)),
            _ => Ok(None),
        }
    }
}

/// Sector index backed by a fixed mapping.
#[derive(Debug, Clone, Default)]
pub struct StaticSectorIndex {
    assignments: HashMap<EntityId, SectorId>,
}

impl StaticSectorIndex {
    /// Build from `(entity, sector)` pairs. Empty sector names are dropped.
    pub fn from_pairs<I, E, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (E, S)>,
        E: Into<EntityId>,
        S: Into<SectorId>,
    {
        let assignments = pairs
            .into_iter()
            .map(|(e, s)| (e.into(), s.into()))
            .filter(|(_, s): &(EntityId, SectorId)| !s.trim().is_empty())
            .collect();
        Self { assignments }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }
}

#[async_trait]
impl SectorIndex for StaticSectorIndex {
    async fn sector_of(&self, entity_id: &str) -> Result<Option<SectorId>> {
        Ok(self.assignments.get(entity_id).cloned())
    }

    async fn sectors(&self) -> Result<Vec<SectorId>> {
        let unique: BTreeSet<&SectorId> = self.assignments.values().collect();
        Ok(unique.into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Period;

    fn q(year: i32, quarter: u8) -> Period {
        Period::new(year, quarter).unwrap()
    }

    fn sample_store() -> InMemoryMentionStore {
        InMemoryMentionStore::with_records(vec![
            MentionRecord::new("E1", q(2024, 1), "tariffs", 3.0),
            MentionRecord::new("E1", q(2024, 2), "tariffs", 5.0),
            MentionRecord::new("E2", q(2024, 2), "layoffs", 1.0),
            MentionRecord::new("E2", q(2024, 4), "tariffs", 2.0),
        ])
    }

    #[tokio::test]
    async fn test_query_filters() {
        let store = sample_store();
        let range = PeriodRange::new(q(2024, 1), q(2024, 2)).unwrap();

        let all = store.query(None, &range, None).await.unwrap();
        assert_eq!(all.len(), 3);

        let e1 = store.query(Some("E1"), &range, None).await.unwrap();
        assert_eq!(e1.len(), 2);

        let tariffs = store.query(None, &range, Some("tariffs")).await.unwrap();
        assert_eq!(tariffs.len(), 2);
        let periods: BTreeSet<Period> = tariffs.iter().map(|r| r.period).collect();
        assert_eq!(periods.len(), 2);
    }

    #[tokio::test]
    async fn test_version_bumps_on_ingest() {
        let store = InMemoryMentionStore::new();
        assert_eq!(store.version().await.unwrap(), 0);

        store.ingest(vec![MentionRecord::new("E1", q(2024, 1), "war", 1.0)]);
        assert_eq!(store.version().await.unwrap(), 1);

        store.ingest(Vec::new());
        assert_eq!(store.version().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_period_bounds() {
        let store = sample_store();
        let bounds = store.period_bounds().await.unwrap().unwrap();
        assert_eq!(bounds.start, q(2024, 1));
        assert_eq!(bounds.end, q(2024, 4));

        let empty = InMemoryMentionStore::new();
        assert!(empty.period_bounds().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_static_sector_index() {
        let index = StaticSectorIndex::from_pairs(vec![
            ("E1", "tech"),
            ("E2", "energy"),
            ("E3", "tech"),
            ("E4", " "),
        ]);

        assert_eq!(index.len(), 3);
        assert_eq!(index.sector_of("E1").await.unwrap(), Some("tech".to_string()));
        assert_eq!(index.sector_of("E4").await.unwrap(), None);
        assert_eq!(index.sector_of("missing").await.unwrap(), None);
        assert_eq!(index.sectors().await.unwrap(), vec!["energy", "tech"]);
    }
}
