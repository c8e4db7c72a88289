//! Report types and rendering.

pub mod generator;

use crate::analysis::OutputScale;
use crate::models::{Category, IndicatorSeries, IndicatorSummary, Period, SectorRanking};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use generator::render;

/// Metadata about a report run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
    /// Mention store data version the values were computed from.
    pub data_version: u64,
    /// Output scale of index values.
    pub scale: OutputScale,
    /// Mention rows skipped while loading the source.
    pub malformed_rows: usize,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
}

/// A series together with its indicator's display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedSeries {
    pub name: String,
    #[serde(flatten)]
    pub series: IndicatorSeries,
}

/// What a report contains.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportBody {
    /// Registered indicators.
    Indicators { indicators: Vec<IndicatorSummary> },
    /// Computed series.
    Series { series: Vec<NamedSeries> },
    /// Sector rankings, one per requested indicator.
    Rankings { rankings: Vec<IndicatorRanking> },
}

/// Sector ranking for one indicator and period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorRanking {
    pub indicator_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub period: Period,
    pub sectors: Vec<SectorRanking>,
}

/// A complete report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    #[serde(flatten)]
    pub body: ReportBody,
}
