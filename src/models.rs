//! Data models for the indicator engine.
//!
//! This module contains the core data structures shared across the
//! application: periods, mention records, indicator definitions and the
//! computed series.

use crate::error::{IndicatorError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a filing entity (company, fund, ...).
pub type EntityId = String;

/// Identifier of a sector classification.
pub type SectorId = String;

/// Topical bucket of mentions (e.g. "tariffs").
pub type Category = String;

/// Earliest year a period may fall in.
pub const MIN_YEAR: i32 = 1;

/// Latest year a period may fall in.
pub const MAX_YEAR: i32 = 9999;

/// A calendar quarter between [`MIN_YEAR`] and [`MAX_YEAR`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    quarter: u8,
}

impl Period {
    /// Create a period, validating the year and quarter number.
    pub fn new(year: i32, quarter: u8) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(IndicatorError::InvalidPeriod(format!(
                "year must be {}-{}, got {}",
                MIN_YEAR, MAX_YEAR, year
            )));
        }
        if !(1..=4).contains(&quarter) {
            return Err(IndicatorError::InvalidPeriod(format!(
                "quarter must be 1-4, got {}",
                quarter
            )));
        }
        Ok(Self { year, quarter })
    }

    /// The quarter containing the given date.
    pub fn from_date(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), ((date.month0() / 3) + 1) as u8)
    }

    /// Number of quarters since the start of year 0.
    pub fn index(&self) -> i64 {
        i64::from(self.year) * 4 + i64::from(self.quarter) - 1
    }

    /// The following quarter, or `None` past [`MAX_YEAR`].
    pub fn next(&self) -> Option<Self> {
        if self.quarter == 4 {
            Self::new(self.year + 1, 1).ok()
        } else {
            Some(Self {
                year: self.year,
                quarter: self.quarter + 1,
            })
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

impl FromStr for Period {
    type Err = IndicatorError;

    /// Accepts `2024Q1`, `2024-Q1` (case-insensitive) or a `YYYY-MM-DD` date.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();

        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Self::from_date(date);
        }

        let upper = trimmed.to_uppercase();
        let (year, quarter) = upper
            .split_once('Q')
            .ok_or_else(|| IndicatorError::InvalidPeriod(format!("unrecognized period '{}'", s)))?;

        let year: i32 = year
            .trim_end_matches('-')
            .parse()
            .map_err(|_| IndicatorError::InvalidPeriod(format!("bad year in '{}'", s)))?;
        let quarter: u8 = quarter
            .parse()
            .map_err(|_| IndicatorError::InvalidPeriod(format!("bad quarter in '{}'", s)))?;

        Self::new(year, quarter)
    }
}

impl TryFrom<String> for Period {
    type Error = IndicatorError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// An inclusive, ascending range of periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodRange {
    pub start: Period,
    pub end: Period,
}

impl PeriodRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: Period, end: Period) -> Result<Self> {
        if start > end {
            return Err(IndicatorError::InvalidPeriod(format!(
                "range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one period.
    pub fn single(period: Period) -> Self {
        Self {
            start: period,
            end: period,
        }
    }

    pub fn contains(&self, period: Period) -> bool {
        self.start <= period && period <= self.end
    }

    /// Iterate every period in the range in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Period> {
        let end = self.end;
        std::iter::successors(Some(self.start), move |p| p.next().filter(|next| *next <= end))
    }

    /// Number of periods in the range.
    pub fn len(&self) -> usize {
        (self.end.index() - self.start.index() + 1) as usize
    }
}

impl fmt::Display for PeriodRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One raw mention count for an entity, period and category.
///
/// `raw_count` is kept as read from the source; validation happens in the
/// normalization stage so rejected records can be reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionRecord {
    pub entity_id: EntityId,
    pub period: Period,
    pub category: Category,
    pub raw_count: f64,
}

impl MentionRecord {
    pub fn new(
        entity_id: impl Into<EntityId>,
        period: Period,
        category: impl Into<Category>,
        raw_count: f64,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            period,
            category: category.into(),
            raw_count,
        }
    }
}

/// An entity together with its sector assignment (if known).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: EntityId,
    pub sector_id: Option<SectorId>,
}

/// A raw count rescaled to be comparable within its sector and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedScore {
    pub entity_id: EntityId,
    pub period: Period,
    pub category: Category,
    /// Value in `[0, 1]`.
    pub value: f64,
}

/// The unit an indicator is aggregated over by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingKind {
    /// One series over every entity.
    #[default]
    Market,
    /// One series per sector.
    Sector,
}

impl fmt::Display for GroupingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupingKind::Market => write!(f, "market"),
            GroupingKind::Sector => write!(f, "sector"),
        }
    }
}

/// Concrete grouping key for a series request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grouping {
    /// Market-wide, keyed as `"all"`.
    Market,
    /// A single sector.
    Sector(SectorId),
}

impl Grouping {
    /// The key recorded on the output series.
    pub fn key(&self) -> &str {
        match self {
            Grouping::Market => "all",
            Grouping::Sector(sector) => sector,
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// How category scores are combined into one index value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    /// Relative weight per category; categories not listed weigh 1.0.
    #[serde(default)]
    pub weights: BTreeMap<Category, f64>,
    /// Trailing moving-average window applied after aggregation.
    #[serde(default)]
    pub smoothing_window: Option<usize>,
    /// Whether entities with no sector count towards market-wide values.
    #[serde(default = "default_true")]
    pub include_unclassified: bool,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            smoothing_window: None,
            include_unclassified: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl AggregationPolicy {
    /// The raw weight configured for a category.
    pub fn weight_of(&self, category: &str) -> f64 {
        self.weights.get(category).copied().unwrap_or(1.0)
    }
}

/// Static definition of an indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDefinition {
    pub indicator_id: String,
    pub name: String,
    pub display_category: String,
    pub categories: Vec<Category>,
    pub policy: AggregationPolicy,
    pub grouping: GroupingKind,
}

impl IndicatorDefinition {
    /// Weights normalized to sum to 1 over this indicator's categories.
    pub fn normalized_weights(&self) -> Vec<(Category, f64)> {
        let total: f64 = self
            .categories
            .iter()
            .map(|c| self.policy.weight_of(c))
            .sum();

        self.categories
            .iter()
            .map(|c| (c.clone(), self.policy.weight_of(c) / total))
            .collect()
    }

    /// Summary exposed by `list_indicators`.
    pub fn summary(&self) -> IndicatorSummary {
        IndicatorSummary {
            id: self.indicator_id.clone(),
            name: self.name.clone(),
            display_category: self.display_category.clone(),
            grouping: self.grouping,
            categories: self
                .categories
                .iter()
                .map(|c| CategoryOption::from_value(c))
                .collect(),
        }
    }
}

/// A selectable category with a human label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryOption {
    pub value: String,
    pub label: String,
}

impl CategoryOption {
    /// Build an option, title-casing the value for its label.
    pub fn from_value(value: &str) -> Self {
        let label = value
            .split(['_', '-'])
            .filter(|w| !w.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        Self {
            value: value.to_string(),
            label,
        }
    }
}

/// Indicator summary for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSummary {
    pub id: String,
    pub name: String,
    pub display_category: String,
    pub grouping: GroupingKind,
    pub categories: Vec<CategoryOption>,
}

/// One value of an indicator series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub period: Period,
    pub value: f64,
    /// Number of entities that contributed to the value.
    pub entities: usize,
}

/// A computed indicator series for one grouping key.
///
/// Points are in ascending period order with no duplicates; a period with
/// no eligible entities is absent rather than zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub indicator_id: String,
    /// The single category the series was restricted to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub grouping_key: String,
    pub range: PeriodRange,
    pub points: Vec<SeriesPoint>,
    /// Records dropped as invalid during normalization.
    pub excluded_records: usize,
}

impl IndicatorSeries {
    /// Value for a given period, if not a gap.
    pub fn value_at(&self, period: Period) -> Option<f64> {
        self.points
            .iter()
            .find(|p| p.period == period)
            .map(|p| p.value)
    }

    /// Periods in range with no value.
    pub fn gaps(&self) -> Vec<Period> {
        self.range
            .iter()
            .filter(|p| !self.points.iter().any(|pt| pt.period == *p))
            .collect()
    }
}

/// A sector's position in a ranking for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorRanking {
    pub rank: usize,
    pub sector_id: SectorId,
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(year: i32, quarter: u8) -> Period {
        Period::new(year, quarter).unwrap()
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!("2024Q1".parse::<Period>().unwrap(), q(2024, 1));
        assert_eq!("2023-q4".parse::<Period>().unwrap(), q(2023, 4));
        assert_eq!("2024-05-17".parse::<Period>().unwrap(), q(2024, 2));
        assert_eq!("2024-12-31".parse::<Period>().unwrap(), q(2024, 4));
        assert!("2024Q5".parse::<Period>().is_err());
        assert!("last year".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_display_and_ordering() {
        assert_eq!(q(2024, 3).to_string(), "2024Q3");
        assert!(q(2023, 4) < q(2024, 1));
        assert_eq!(q(2023, 4).next(), Some(q(2024, 1)));
        assert_eq!(q(2024, 1).index() - q(2023, 4).index(), 1);
    }

    #[test]
    fn test_period_year_bounds() {
        assert!(Period::new(0, 1).is_err());
        assert!(Period::new(10_000, 1).is_err());
        assert!(Period::new(i32::MAX, 4).is_err());
        assert!("2147483647Q4".parse::<Period>().is_err());
        assert_eq!(q(MAX_YEAR, 4).next(), None);
    }

    #[test]
    fn test_range_at_upper_bound_terminates() {
        let last = q(MAX_YEAR, 4);
        let range = PeriodRange::new(q(MAX_YEAR, 3), last).unwrap();
        let periods: Vec<Period> = range.iter().collect();
        assert_eq!(periods, vec![q(MAX_YEAR, 3), last]);
        assert_eq!(range.len(), 2);
        assert_eq!(PeriodRange::single(last).len(), 1);
    }

    #[test]
    fn test_period_serde_as_string() {
        let json = serde_json::to_string(&q(2024, 2)).unwrap();
        assert_eq!(json, "\"2024Q2\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q(2024, 2));
    }

    #[test]
    fn test_period_range_iter() {
        let range = PeriodRange::new(q(2023, 3), q(2024, 2)).unwrap();
        let periods: Vec<String> = range.iter().map(|p| p.to_string()).collect();
        assert_eq!(periods, vec!["2023Q3", "2023Q4", "2024Q1", "2024Q2"]);
        assert_eq!(range.len(), 4);
        assert!(range.contains(q(2024, 1)));
        assert!(!range.contains(q(2024, 3)));
    }

    #[test]
    fn test_period_range_rejects_inverted() {
        assert!(PeriodRange::new(q(2024, 2), q(2024, 1)).is_err());
        assert_eq!(PeriodRange::single(q(2024, 2)).len(), 1);
    }

    #[test]
    fn test_normalized_weights() {
        let mut policy = AggregationPolicy::default();
        policy.weights.insert("environmental".to_string(), 2.0);
        let definition = IndicatorDefinition {
            indicator_id: "esg_index".to_string(),
            name: "ESG Index".to_string(),
            display_category: "Governance".to_string(),
            categories: vec!["environmental".to_string(), "social".to_string()],
            policy,
            grouping: GroupingKind::Market,
        };

        let weights = definition.normalized_weights();
        assert_eq!(weights[0].0, "environmental");
        assert!((weights[0].1 - 2.0 / 3.0).abs() < 1e-12);
        assert!((weights[1].1 - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_category_option_label() {
        let option = CategoryOption::from_value("semiconductor_materials");
        assert_eq!(option.label, "Semiconductor Materials");
        assert_eq!(CategoryOption::from_value("dei").label, "Dei");
        assert_eq!(CategoryOption::from_value("supply-chain").label, "Supply Chain");
    }

    #[test]
    fn test_grouping_key() {
        assert_eq!(Grouping::Market.key(), "all");
        assert_eq!(Grouping::Sector("tech".to_string()).key(), "tech");
    }

    #[test]
    fn test_series_gaps() {
        let series = IndicatorSeries {
            indicator_id: "x".to_string(),
            category: None,
            grouping_key: "all".to_string(),
            range: PeriodRange::new(q(2024, 1), q(2024, 3)).unwrap(),
            points: vec![
                SeriesPoint {
                    period: q(2024, 1),
                    value: 10.0,
                    entities: 1,
                },
                SeriesPoint {
                    period: q(2024, 3),
                    value: 30.0,
                    entities: 1,
                },
            ],
            excluded_records: 0,
        };
        assert_eq!(series.gaps(), vec![q(2024, 2)]);
        assert_eq!(series.value_at(q(2024, 3)), Some(30.0));
        assert_eq!(series.value_at(q(2024, 2)), None);
    }
}
