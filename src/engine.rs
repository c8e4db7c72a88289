//! The indicator service exposed to the surrounding layers.
//!
//! [`IndicatorEngine`] ties the catalog, the data sources and the series
//! cache together. `get_series` is the only data-producing entry point.

use crate::cache::{CacheKey, SeriesCache};
use crate::catalog::IndicatorCatalog;
use crate::error::Result;
use crate::models::{
    Grouping, IndicatorSeries, IndicatorSummary, Period, PeriodRange, SectorRanking,
};
use crate::store::{MentionStore, SectorIndex};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, info};

/// Computes and caches indicator series.
pub struct IndicatorEngine {
    catalog: Arc<IndicatorCatalog>,
    store: Arc<dyn MentionStore>,
    sectors: Arc<dyn SectorIndex>,
    cache: SeriesCache,
}

impl IndicatorEngine {
    pub fn new(
        catalog: IndicatorCatalog,
        store: Arc<dyn MentionStore>,
        sectors: Arc<dyn SectorIndex>,
    ) -> Self {
        Self {
            catalog: Arc::new(catalog),
            store,
            sectors,
            cache: SeriesCache::new(),
        }
    }

    pub fn catalog(&self) -> &IndicatorCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }

    /// Summaries of every registered indicator.
    pub fn list_indicators(&self) -> Vec<IndicatorSummary> {
        self.catalog.summaries()
    }

    /// The full range of periods present in the mention store.
    pub async fn available_range(&self) -> Result<Option<PeriodRange>> {
        self.store.period_bounds().await
    }

    /// Series for one indicator, range and grouping, optionally restricted
    /// to a single category of the indicator.
    ///
    /// Unknown indicators and foreign categories fail before the cache is
    /// touched. The data version is read first so a series computed from
    /// older data is never served.
    pub async fn get_series(
        &self,
        indicator_id: &str,
        category: Option<&str>,
        range: PeriodRange,
        grouping: Grouping,
    ) -> Result<IndicatorSeries> {
        self.catalog.weights_for(indicator_id, category)?;
        let version = self.store.version().await?;

        let key = CacheKey::new(indicator_id, category, range, grouping.clone());
        let catalog = Arc::clone(&self.catalog);
        let store = Arc::clone(&self.store);
        let sectors = Arc::clone(&self.sectors);
        let id = indicator_id.to_string();
        let category = category.map(String::from);

        let series = self
            .cache
            .get_or_compute(key, version, move || async move {
                catalog
                    .compute(
                        &id,
                        category.as_deref(),
                        range,
                        &grouping,
                        store.as_ref(),
                        sectors.as_ref(),
                    )
                    .await
            })
            .await?;

        Ok(series.as_ref().clone())
    }

    /// One series per known sector, computed concurrently.
    pub async fn get_sector_breakdown(
        &self,
        indicator_id: &str,
        category: Option<&str>,
        range: PeriodRange,
    ) -> Result<Vec<IndicatorSeries>> {
        self.catalog.weights_for(indicator_id, category)?;
        let sectors = self.sectors.sectors().await?;
        info!(
            "Computing {} for {} sectors over {}",
            indicator_id,
            sectors.len(),
            range
        );

        try_join_all(
            sectors
                .into_iter()
                .map(|sector| {
                    self.get_series(indicator_id, category, range, Grouping::Sector(sector))
                }),
        )
        .await
    }

    /// Sectors ordered by their index value in `period`, highest first.
    ///
    /// Sectors with no eligible entities in the period are left out. Ties
    /// are broken by sector id.
    pub async fn rank_sectors(
        &self,
        indicator_id: &str,
        category: Option<&str>,
        period: Period,
    ) -> Result<Vec<SectorRanking>> {
        let breakdown = self
            .get_sector_breakdown(indicator_id, category, PeriodRange::single(period))
            .await?;

        let mut values: Vec<(String, f64)> = breakdown
            .into_iter()
            .filter_map(|series| {
                let value = series.value_at(period)?;
                Some((series.grouping_key, value))
            })
            .collect();

        values.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        debug!("Ranked {} sectors for {} in {}", values.len(), indicator_id, period);

        Ok(values
            .into_iter()
            .enumerate()
            .map(|(i, (sector_id, value))| SectorRanking {
                rank: i + 1,
                sector_id,
                value,
            })
            .collect())
    }
}
