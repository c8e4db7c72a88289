//! Aggregation of normalized scores into index values.
//!
//! Category scores are first combined per entity (weighted mean), then
//! averaged across the entities of a grouping and rescaled to the output
//! range.

use crate::analysis::normalizer::SectorMap;
use crate::error::{IndicatorError, Result};
use crate::models::{Category, EntityId, Grouping, NormalizedScore, SeriesPoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output range of index values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputScale {
    pub min: f64,
    pub max: f64,
}

impl Default for OutputScale {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
        }
    }
}

impl OutputScale {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || max <= min {
            return Err(IndicatorError::invalid_definition(format!(
                "scale max ({}) must be greater than min ({})",
                max, min
            )));
        }
        Ok(Self { min, max })
    }

    /// Map a `[0, 1]` value onto the scale.
    pub fn rescale(&self, unit: f64) -> f64 {
        self.min + unit * (self.max - self.min)
    }
}

/// Combine per-category scores into one score per entity.
///
/// `by_category` pairs each category's normalized weight with its scores.
/// Every participant carries a score for every category, so the result is
/// a plain weighted sum.
pub fn combine_categories(
    by_category: &[(Category, f64, Vec<NormalizedScore>)],
) -> BTreeMap<EntityId, f64> {
    let mut combined: BTreeMap<EntityId, f64> = BTreeMap::new();

    for (_, weight, scores) in by_category {
        for score in scores {
            *combined.entry(score.entity_id.clone()).or_insert(0.0) += weight * score.value;
        }
    }

    combined
}

/// Whether an entity belongs to a grouping.
fn in_grouping(
    entity_id: &str,
    grouping: &Grouping,
    sectors: &SectorMap,
    include_unclassified: bool,
) -> bool {
    let sector = sectors.get(entity_id).and_then(Option::as_ref);
    match (grouping, sector) {
        (Grouping::Market, Some(_)) => true,
        (Grouping::Market, None) => include_unclassified,
        (Grouping::Sector(wanted), Some(sector)) => wanted == sector,
        (Grouping::Sector(_), None) => false,
    }
}

/// Average entity scores within a grouping and rescale.
///
/// Returns the index value and the number of contributing entities, or
/// `None` when no entity is eligible.
pub fn aggregate(
    entity_scores: &BTreeMap<EntityId, f64>,
    grouping: &Grouping,
    sectors: &SectorMap,
    include_unclassified: bool,
    scale: &OutputScale,
) -> Option<(f64, usize)> {
    let eligible: Vec<f64> = entity_scores
        .iter()
        .filter(|(entity_id, _)| in_grouping(entity_id, grouping, sectors, include_unclassified))
        .map(|(_, score)| *score)
        .collect();

    if eligible.is_empty() {
        return None;
    }

    let mean = eligible.iter().sum::<f64>() / eligible.len() as f64;
    Some((scale.rescale(mean), eligible.len()))
}

/// Trailing moving average over `window` periods.
///
/// Only non-gap values inside the window are averaged; gaps stay gaps.
pub fn smooth(points: &[SeriesPoint], window: usize) -> Vec<SeriesPoint> {
    if window <= 1 {
        return points.to_vec();
    }

    points
        .iter()
        .map(|point| {
            let span = i64::try_from(window - 1).unwrap_or(i64::MAX);
            let earliest = point.period.index().saturating_sub(span);

            let in_window: Vec<f64> = points
                .iter()
                .filter(|p| p.period.index() >= earliest && p.period <= point.period)
                .map(|p| p.value)
                .collect();

            SeriesPoint {
                period: point.period,
                value: in_window.iter().sum::<f64>() / in_window.len() as f64,
                entities: point.entities,
            }
        })
        .collect()
}
