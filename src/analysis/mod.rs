//! Normalization and aggregation of mention counts.

pub mod aggregator;
pub mod normalizer;

pub use aggregator::{aggregate, combine_categories, smooth, OutputScale};
pub use normalizer::{normalize, MentionTable, SectorMap};
