//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.indicators.toml` files, including the declarative indicator catalog.

use crate::analysis::OutputScale;
use crate::catalog::IndicatorCatalog;
use crate::cli::OutputFormat;
use crate::models::{AggregationPolicy, GroupingKind, IndicatorDefinition};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".indicators.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Data source settings.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Output scale of index values.
    #[serde(default)]
    pub scale: ScaleConfig,

    /// Indicator catalog.
    #[serde(default = "default_indicators")]
    pub indicators: Vec<IndicatorConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            sources: SourcesConfig::default(),
            scale: ScaleConfig::default(),
            indicators: default_indicators(),
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path (stdout when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Default output format.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Where mention and sector data come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Mentions CSV: file path or http(s) URL.
    #[serde(default = "default_mentions")]
    pub mentions: String,

    /// Sectors CSV: file path or http(s) URL.
    #[serde(default = "default_sectors")]
    pub sectors: String,

    /// Timeout for remote sources, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            mentions: default_mentions(),
            sectors: default_sectors(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl SourcesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn default_mentions() -> String {
    "data/mentions.csv".to_string()
}

fn default_sectors() -> String {
    "data/sectors.csv".to_string()
}

fn default_timeout() -> u64 {
    10
}

/// Output scale settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleConfig {
    #[serde(default)]
    pub min: f64,

    #[serde(default = "default_scale_max")]
    pub max: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: default_scale_max(),
        }
    }
}

fn default_scale_max() -> f64 {
    100.0
}

/// One `[[indicators]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub display_category: String,

    pub categories: Vec<String>,

    /// Category weights; unlisted categories weigh 1.0.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub weights: BTreeMap<String, f64>,

    #[serde(default)]
    pub grouping: GroupingKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smoothing_window: Option<usize>,

    #[serde(default = "default_true")]
    pub include_unclassified: bool,
}

fn default_true() -> bool {
    true
}

impl From<&IndicatorConfig> for IndicatorDefinition {
    fn from(config: &IndicatorConfig) -> Self {
        Self {
            indicator_id: config.id.clone(),
            name: config.name.clone(),
            display_category: config.display_category.clone(),
            categories: config.categories.clone(),
            policy: AggregationPolicy {
                weights: config.weights.clone(),
                smoothing_window: config.smoothing_window,
                include_unclassified: config.include_unclassified,
            },
            grouping: config.grouping,
        }
    }
}

/// Built-in catalog: one market-wide index per tracked topic.
fn default_indicators() -> Vec<IndicatorConfig> {
    let topics: [(&str, &str, &str); 25] = [
        ("chemicals", "Chemicals Index", "Resources"),
        ("dei", "DEI Index", "Governance"),
        ("electronic_components", "Electronic Components Index", "Resources"),
        ("esg", "ESG Index", "Governance"),
        ("explosive_materials", "Explosive Materials Index", "Resources"),
        ("health_research", "Health Research Index", "Health"),
        ("health", "Health Index", "Health"),
        ("layoffs", "Layoffs Index", "Employment"),
        ("llm", "LLM Index", "Technology"),
        ("metals", "Metals Index", "Resources"),
        ("military_equipment", "Military Equipment Index", "War"),
        ("nuclear", "Nuclear Index", "Technology"),
        ("outsourcing", "Outsourcing Index", "Market Dynamics"),
        ("pandemic", "Pandemic Index", "Health"),
        ("political_stability", "Political Stability Index", "International"),
        ("propellant_components", "Propellant Components Index", "Resources"),
        ("raw_materials", "Raw Materials Index", "Resources"),
        ("semiconductor_materials", "Semiconductor Materials Index", "Resources"),
        ("sovereign_crisis", "Sovereign Crisis Index", "International"),
        ("space", "Space Index", "Technology"),
        ("supplier_concentration", "Supplier Concentration Index", "Market Dynamics"),
        ("supply_chain", "Supply Chain Index", "Trade"),
        ("tariffs", "Tariffs Index", "Trade"),
        ("terrorism", "Terrorism Index", "Terrorism"),
        ("war", "War Index", "War"),
    ];

    topics
        .iter()
        .map(|(topic, name, display_category)| {
            let categories = if *topic == "esg" {
                vec!["environmental", "social", "governance"]
            } else {
                vec![*topic]
            };

            IndicatorConfig {
                id: format!("{}_index", topic),
                name: name.to_string(),
                display_category: display_category.to_string(),
                categories: categories.into_iter().map(String::from).collect(),
                weights: BTreeMap::new(),
                grouping: GroupingKind::Market,
                smoothing_window: None,
                include_unclassified: true,
            }
        })
        .collect()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings when given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref mentions) = args.mentions {
            self.sources.mentions = mentions.clone();
        }
        if let Some(ref sectors) = args.sectors {
            self.sources.sectors = sectors.clone();
        }
        if let Some(timeout) = args.timeout {
            self.sources.timeout_seconds = timeout;
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.to_string_lossy().to_string());
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Build the validated indicator catalog described by this config.
    pub fn build_catalog(&self) -> Result<IndicatorCatalog> {
        let scale = OutputScale::new(self.scale.min, self.scale.max)
            .context("Invalid [scale] settings")?;
        let definitions = self.indicators.iter().map(IndicatorDefinition::from).collect();

        IndicatorCatalog::new(definitions, scale).context("Invalid [[indicators]] settings")
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
