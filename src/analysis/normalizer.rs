//! Sector-conditioned normalization of raw mention counts.
//!
//! Raw counts are only comparable inside a sector and period, so each
//! sector is min-max scaled on its own. Entities without a sector form
//! their own pool.

use crate::error::IndicatorError;
use crate::models::{Category, EntityId, MentionRecord, NormalizedScore, Period, SectorId};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Score given when a pool cannot be spread (single entity, all equal).
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Sector assignment per entity; `None` means unclassified.
pub type SectorMap = HashMap<EntityId, Option<SectorId>>;

/// Validated mention counts for one computation.
///
/// An entity is a participant in a period if it has at least one valid
/// record there. Participants with no record for a category count as zero
/// mentions of it.
#[derive(Debug, Default)]
pub struct MentionTable {
    counts: BTreeMap<Period, BTreeMap<EntityId, HashMap<Category, f64>>>,
    excluded: Vec<IndicatorError>,
}

impl MentionTable {
    /// Validate and index records. Records for the same entity, period and
    /// category are summed; a sum that overflows is excluded like an invalid
    /// record.
    pub fn build(records: Vec<MentionRecord>) -> Self {
        let mut table = Self::default();

        for record in records {
            if !record.raw_count.is_finite() || record.raw_count < 0.0 {
                let err = IndicatorError::invalid_record(
                    &record.entity_id,
                    format!(
                        "count {} for {} in {} must be a non-negative number",
                        record.raw_count, record.category, record.period
                    ),
                );
                warn!("Excluding record: {}", err);
                table.excluded.push(err);
                continue;
            }

            *table
                .counts
                .entry(record.period)
                .or_default()
                .entry(record.entity_id)
                .or_default()
                .entry(record.category)
                .or_insert(0.0) += record.raw_count;
        }

        let Self { counts, excluded } = &mut table;
        for (period, entities) in counts.iter_mut() {
            for (entity_id, categories) in entities.iter_mut() {
                categories.retain(|category, total| {
                    if total.is_finite() {
                        return true;
                    }
                    let err = IndicatorError::invalid_record(
                        entity_id.as_str(),
                        format!("summed count for {} in {} is not finite", category, period),
                    );
                    warn!("Excluding record: {}", err);
                    excluded.push(err);
                    false
                });
            }
            entities.retain(|_, categories| !categories.is_empty());
        }
        counts.retain(|_, entities| !entities.is_empty());

        table
    }

    /// Entities that filed in the period, sorted by id.
    pub fn participants(&self, period: Period) -> Vec<&EntityId> {
        self.counts
            .get(&period)
            .map(|entities| entities.keys().collect())
            .unwrap_or_default()
    }

    /// Raw count for a participant; zero when it filed but never mentioned
    /// the category.
    pub fn count(&self, period: Period, entity_id: &str, category: &str) -> Option<f64> {
        self.counts
            .get(&period)?
            .get(entity_id)
            .map(|categories| categories.get(category).copied().unwrap_or(0.0))
    }

    /// Every entity appearing in any period.
    pub fn entities(&self) -> Vec<EntityId> {
        let mut all: Vec<EntityId> = self
            .counts
            .values()
            .flat_map(|entities| entities.keys().cloned())
            .collect();
        all.sort();
        all.dedup();
        all
    }

    /// Records rejected during validation.
    pub fn excluded(&self) -> &[IndicatorError] {
        &self.excluded
    }
}

/// Scale values to `[0, 1]` by their own min and max.
///
/// A single value or a pool of equal values maps to [`NEUTRAL_SCORE`].
pub fn min_max(values: &[f64]) -> Vec<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let spread = max - min;

    if values.len() < 2 || spread <= 0.0 {
        return vec![NEUTRAL_SCORE; values.len()];
    }

    values.iter().map(|v| (v - min) / spread).collect()
}

/// Normalize one category for one period across every participant.
///
/// Returns one score per participant, ordered by entity id.
pub fn normalize(
    period: Period,
    category: &str,
    table: &MentionTable,
    sectors: &SectorMap,
) -> Vec<NormalizedScore> {
    let mut pools: BTreeMap<Option<&SectorId>, Vec<(&EntityId, f64)>> = BTreeMap::new();

    for entity_id in table.participants(period) {
        let count = table.count(period, entity_id, category).unwrap_or(0.0);
        let sector = sectors.get(entity_id).and_then(Option::as_ref);
        pools.entry(sector).or_default().push((entity_id, count));
    }

    let mut scores: Vec<NormalizedScore> = pools
        .into_values()
        .flat_map(|pool| {
            let raw: Vec<f64> = pool.iter().map(|(_, count)| *count).collect();
            let scaled = min_max(&raw);
            pool.into_iter()
                .zip(scaled)
                .map(|((entity_id, _), value)| NormalizedScore {
                    entity_id: entity_id.clone(),
                    period,
                    category: category.to_string(),
                    value,
                })
                .collect::<Vec<_>>()
        })
        .collect();

    scores.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(year: i32, quarter: u8) -> Period {
        Period::new(year, quarter).unwrap()
    }

    fn sectors(pairs: &[(&str, Option<&str>)]) -> SectorMap {
        pairs
            .iter()
            .map(|(e, s)| (e.to_string(), s.map(String::from)))
            .collect()
    }

    fn score_of(scores: &[NormalizedScore], entity_id: &str) -> f64 {
        scores
            .iter()
            .find(|s| s.entity_id == entity_id)
            .map(|s| s.value)
            .unwrap()
    }

    #[test]
    fn test_zero_mention_filer_is_scored() {
        let p1 = q(2024, 1);
        let table = MentionTable::build(vec![
            MentionRecord::new("E1", p1, "dei", 10.0),
            MentionRecord::new("E2", p1, "dei", 0.0),
        ]);
        let map = sectors(&[("E1", Some("S1")), ("E2", Some("S1"))]);

        let scores = normalize(p1, "dei", &table, &map);
        assert_eq!(scores.len(), 2);
        assert_eq!(score_of(&scores, "E1"), 1.0);
        assert_eq!(score_of(&scores, "E2"), 0.0);
    }

    #[test]
    fn test_non_filer_is_excluded() {
        let p1 = q(2024, 1);
        let p2 = q(2024, 2);
        let table = MentionTable::build(vec![
            MentionRecord::new("E1", p1, "dei", 4.0),
            MentionRecord::new("E3", p1, "dei", 2.0),
            MentionRecord::new("E1", p2, "dei", 6.0),
            MentionRecord::new("E2", p2, "dei", 1.0),
        ]);
        let map = sectors(&[("E1", Some("S1")), ("E2", Some("S1")), ("E3", Some("S1"))]);

        let scores = normalize(p2, "dei", &table, &map);
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.entity_id != "E3"));
    }

    #[test]
    fn test_missing_category_counts_as_zero_for_filers() {
        let p = q(2024, 1);
        let table = MentionTable::build(vec![
            MentionRecord::new("E1", p, "tariffs", 5.0),
            MentionRecord::new("E2", p, "layoffs", 3.0),
        ]);
        let map = sectors(&[("E1", Some("S1")), ("E2", Some("S1"))]);

        assert_eq!(table.count(p, "E2", "tariffs"), Some(0.0));
        assert_eq!(table.count(p, "E9", "tariffs"), None);

        let scores = normalize(p, "tariffs", &table, &map);
        assert_eq!(score_of(&scores, "E1"), 1.0);
        assert_eq!(score_of(&scores, "E2"), 0.0);
    }

    #[test]
    fn test_monotonic_within_sector() {
        let p = q(2024, 1);
        let counts = [3.0, 17.0, 8.0, 0.0, 11.0];
        let records = counts
            .iter()
            .enumerate()
            .map(|(i, c)| MentionRecord::new(format!("E{}", i), p, "war", *c))
            .collect();
        let table = MentionTable::build(records);
        let map: SectorMap = (0..counts.len())
            .map(|i| (format!("E{}", i), Some("S1".to_string())))
            .collect();

        let scores = normalize(p, "war", &table, &map);
        for i in 0..counts.len() {
            for j in 0..counts.len() {
                let (si, sj) = (
                    score_of(&scores, &format!("E{}", i)),
                    score_of(&scores, &format!("E{}", j)),
                );
                if counts[i] < counts[j] {
                    assert!(si < sj, "E{} ({}) should score below E{} ({})", i, si, j, sj);
                }
            }
        }
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(&s.value)));
    }

    #[test]
    fn test_equal_counts_and_singletons_are_neutral() {
        let p = q(2024, 1);
        let table = MentionTable::build(vec![
            MentionRecord::new("E1", p, "space", 4.0),
            MentionRecord::new("E2", p, "space", 4.0),
            MentionRecord::new("E3", p, "space", 9.0),
        ]);
        let map = sectors(&[("E1", Some("S1")), ("E2", Some("S1")), ("E3", Some("S2"))]);

        let scores = normalize(p, "space", &table, &map);
        assert!(scores.iter().all(|s| s.value == NEUTRAL_SCORE));
    }

    #[test]
    fn test_category_with_no_mentions_anywhere_is_neutral() {
        let p = q(2024, 1);
        let table = MentionTable::build(vec![
            MentionRecord::new("E1", p, "tariffs", 4.0),
            MentionRecord::new("E2", p, "tariffs", 1.0),
        ]);
        let map = sectors(&[("E1", Some("S1")), ("E2", Some("S1"))]);

        let scores = normalize(p, "nuclear", &table, &map);
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.value == NEUTRAL_SCORE));
    }

    #[test]
    fn test_sectors_are_normalized_independently() {
        let p = q(2024, 1);
        let table = MentionTable::build(vec![
            MentionRecord::new("A1", p, "llm", 100.0),
            MentionRecord::new("A2", p, "llm", 50.0),
            MentionRecord::new("B1", p, "llm", 2.0),
            MentionRecord::new("B2", p, "llm", 1.0),
            MentionRecord::new("U1", p, "llm", 7.0),
        ]);
        let map = sectors(&[
            ("A1", Some("tech")),
            ("A2", Some("tech")),
            ("B1", Some("retail")),
            ("B2", Some("retail")),
        ]);

        let scores = normalize(p, "llm", &table, &map);
        assert_eq!(score_of(&scores, "A1"), 1.0);
        assert_eq!(score_of(&scores, "B1"), 1.0);
        assert_eq!(score_of(&scores, "B2"), 0.0);
        // Alone in the unclassified pool.
        assert_eq!(score_of(&scores, "U1"), NEUTRAL_SCORE);
    }

    #[test]
    fn test_invalid_records_are_excluded_and_reported() {
        let p = q(2024, 1);
        let table = MentionTable::build(vec![
            MentionRecord::new("E1", p, "war", -3.0),
            MentionRecord::new("E2", p, "war", f64::NAN),
            MentionRecord::new("E3", p, "war", 2.0),
        ]);

        assert_eq!(table.excluded().len(), 2);
        assert!(matches!(
            &table.excluded()[0],
            IndicatorError::InvalidRecord { entity_id, .. } if entity_id == "E1"
        ));
        let participants: Vec<&str> = table.participants(p).into_iter().map(|e| e.as_str()).collect();
        assert_eq!(participants, vec!["E3"]);
    }

    #[test]
    fn test_duplicate_records_are_summed() {
        let p = q(2024, 1);
        let table = MentionTable::build(vec![
            MentionRecord::new("E1", p, "war", 2.0),
            MentionRecord::new("E1", p, "war", 3.0),
        ]);
        assert_eq!(table.count(p, "E1", "war"), Some(5.0));
        assert_eq!(table.entities(), vec!["E1".to_string()]);
    }

    #[test]
    fn test_overflowing_sum_is_excluded() {
        let p = q(2024, 1);
        let table = MentionTable::build(vec![
            MentionRecord::new("E1", p, "war", 1e308),
            MentionRecord::new("E1", p, "war", 1e308),
            MentionRecord::new("E2", p, "war", 0.0),
            MentionRecord::new("E3", p, "war", 4.0),
        ]);
        let map = sectors(&[("E1", Some("S1")), ("E2", Some("S1")), ("E3", Some("S1"))]);

        assert_eq!(table.excluded().len(), 1);
        assert_eq!(table.count(p, "E1", "war"), None);

        let scores = normalize(p, "war", &table, &map);
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(&s.value)));
        assert_eq!(score_of(&scores, "E3"), 1.0);
    }

    #[test]
    fn test_min_max_edges() {
        assert!(min_max(&[]).is_empty());
        assert_eq!(min_max(&[7.0]), vec![NEUTRAL_SCORE]);
        assert_eq!(min_max(&[2.0, 4.0, 6.0]), vec![0.0, 0.5, 1.0]);
    }
}
