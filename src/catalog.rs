//! Registry of indicator definitions and the per-series computation.
//!
//! The catalog is built once from configuration. `compute` drives the
//! normalizer and aggregator over every period of a range.

use crate::analysis::{self, MentionTable, OutputScale, SectorMap};
use crate::error::{IndicatorError, Result};
use crate::models::{
    Category, Entity, Grouping, IndicatorDefinition, IndicatorSeries, IndicatorSummary, PeriodRange,
    SeriesPoint,
};
use crate::store::{MentionStore, SectorIndex};
use std::collections::BTreeMap;
use tracing::{debug, info, trace};

/// Immutable mapping from indicator id to definition.
#[derive(Debug, Clone, Default)]
pub struct IndicatorCatalog {
    definitions: BTreeMap<String, IndicatorDefinition>,
    scale: OutputScale,
}

impl IndicatorCatalog {
    /// Build a catalog, validating every definition.
    pub fn new(definitions: Vec<IndicatorDefinition>, scale: OutputScale) -> Result<Self> {
        let mut catalog = Self {
            definitions: BTreeMap::new(),
            scale,
        };

        for definition in definitions {
            catalog.register(definition)?;
        }

        info!("Indicator catalog loaded with {} indicators", catalog.len());
        Ok(catalog)
    }

    /// Add a definition. Fails on duplicate ids or invalid weights.
    pub fn register(&mut self, definition: IndicatorDefinition) -> Result<()> {
        validate_definition(&definition)?;

        if self.definitions.contains_key(&definition.indicator_id) {
            return Err(IndicatorError::invalid_definition(format!(
                "duplicate indicator id '{}'",
                definition.indicator_id
            )));
        }

        self.definitions
            .insert(definition.indicator_id.clone(), definition);
        Ok(())
    }

    /// Look up a definition by id.
    pub fn resolve(&self, indicator_id: &str) -> Result<&IndicatorDefinition> {
        self.definitions
            .get(indicator_id)
            .ok_or_else(|| IndicatorError::UnknownIndicator(indicator_id.to_string()))
    }

    /// Summaries of every registered indicator, ordered by id.
    pub fn summaries(&self) -> Vec<IndicatorSummary> {
        self.definitions.values().map(|d| d.summary()).collect()
    }

    /// Category weights for a request: every category of the indicator, or
    /// only `category` (at full weight) when one is selected.
    pub fn weights_for(
        &self,
        indicator_id: &str,
        category: Option<&str>,
    ) -> Result<Vec<(Category, f64)>> {
        let definition = self.resolve(indicator_id)?;

        match category {
            None => Ok(definition.normalized_weights()),
            Some(category) if definition.categories.iter().any(|c| c == category) => {
                Ok(vec![(category.to_string(), 1.0)])
            }
            Some(category) => Err(IndicatorError::invalid_definition(format!(
                "indicator '{}' has no category '{}' (available: {})",
                indicator_id,
                category,
                definition.categories.join(", ")
            ))),
        }
    }

    pub fn scale(&self) -> &OutputScale {
        &self.scale
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Compute the full series for an indicator over `range`, optionally
    /// restricted to one of its categories.
    ///
    /// Periods are processed in ascending order. Any upstream failure fails
    /// the whole call; periods with no eligible entity become gaps.
    pub async fn compute(
        &self,
        indicator_id: &str,
        category: Option<&str>,
        range: PeriodRange,
        grouping: &Grouping,
        store: &dyn MentionStore,
        sectors: &dyn SectorIndex,
    ) -> Result<IndicatorSeries> {
        let definition = self.resolve(indicator_id)?;
        let weights = self.weights_for(indicator_id, category)?;
        debug!("Computing {} for {} over {}", indicator_id, grouping, range);

        let records = store.query(None, &range, None).await?;
        let table = MentionTable::build(records);

        let mut entities = Vec::new();
        for entity_id in table.entities() {
            let sector_id = sectors.sector_of(&entity_id).await?;
            entities.push(Entity {
                entity_id,
                sector_id,
            });
        }
        let unclassified = entities.iter().filter(|e| e.sector_id.is_none()).count();
        if unclassified > 0 {
            debug!("{} of {} entities have no sector", unclassified, entities.len());
        }
        let sector_map: SectorMap = entities
            .into_iter()
            .map(|e| (e.entity_id, e.sector_id))
            .collect();

        let mut points = Vec::new();

        for period in range.iter() {
            let by_category: Vec<_> = weights
                .iter()
                .map(|(category, weight)| {
                    let scores = analysis::normalize(period, category, &table, &sector_map);
                    for score in &scores {
                        trace!(
                            "{} {} {}: {:.3}",
                            score.period,
                            score.category,
                            score.entity_id,
                            score.value
                        );
                    }
                    (category.clone(), *weight, scores)
                })
                .collect();

            let entity_scores = analysis::combine_categories(&by_category);

            match analysis::aggregate(
                &entity_scores,
                grouping,
                &sector_map,
                definition.policy.include_unclassified,
                &self.scale,
            ) {
                Some((value, entities)) => points.push(SeriesPoint {
                    period,
                    value,
                    entities,
                }),
                None => debug!("{} has no eligible entities in {}", grouping, period),
            }
        }

        if let Some(window) = definition.policy.smoothing_window {
            points = analysis::smooth(&points, window);
        }

        Ok(IndicatorSeries {
            indicator_id: definition.indicator_id.clone(),
            category: category.map(String::from),
            grouping_key: grouping.key().to_string(),
            range,
            points,
            excluded_records: table.excluded().len(),
        })
    }
}

fn validate_definition(definition: &IndicatorDefinition) -> Result<()> {
    let id = &definition.indicator_id;

    if id.trim().is_empty() {
        return Err(IndicatorError::invalid_definition("indicator id is empty"));
    }

    if definition.categories.is_empty() {
        return Err(IndicatorError::invalid_definition(format!(
            "indicator '{}' has no categories",
            id
        )));
    }

    for (category, weight) in &definition.policy.weights {
        if !definition.categories.contains(category) {
            return Err(IndicatorError::invalid_definition(format!(
                "indicator '{}' weights unknown category '{}'",
                id, category
            )));
        }
        if !weight.is_finite() || *weight <= 0.0 {
            return Err(IndicatorError::invalid_definition(format!(
                "indicator '{}' has non-positive weight {} for '{}'",
                id, weight, category
            )));
        }
    }

    if definition.policy.smoothing_window == Some(0) {
        return Err(IndicatorError::invalid_definition(format!(
            "indicator '{}' has a zero smoothing window",
            id
        )));
    }

    Ok(())
}
