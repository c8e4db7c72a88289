//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{Grouping, Period, PeriodRange};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filing Indicators - comparable topic indices from regulatory filings
///
/// Turns per-entity keyword mention counts into sector-normalized
/// indicator series (ESG, tariffs, layoffs, ...).
///
/// Examples:
///   indicators --list
///   indicators --indicator esg_index --from 2023Q1 --to 2024Q4
///   indicators --indicator tariffs_index,war_index --format json
///   indicators --indicator esg_index --component social
///   indicators --indicator dei_index --by-sector
///   indicators --indicator layoffs_index --rank 2024Q2
///   indicators --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Indicator id(s) to compute (comma-separated)
    ///
    /// Use --list to see the registered indicators.
    #[arg(short, long, value_name = "ID", value_delimiter = ',')]
    pub indicator: Vec<String>,

    /// List registered indicators and exit
    #[arg(short, long)]
    pub list: bool,

    /// First period of the series (e.g. 2023Q1 or 2023-02-15)
    ///
    /// Defaults to the earliest period in the mention data.
    #[arg(long, value_name = "PERIOD")]
    pub from: Option<Period>,

    /// Last period of the series (inclusive)
    ///
    /// Defaults to the latest period in the mention data.
    #[arg(long, value_name = "PERIOD")]
    pub to: Option<Period>,

    /// Restrict the series to one sector
    #[arg(short, long, value_name = "SECTOR", conflicts_with = "by_sector")]
    pub sector: Option<String>,

    /// Compute one series per sector
    #[arg(long)]
    pub by_sector: bool,

    /// Restrict the indicator to one of its categories
    ///
    /// Use --list to see each indicator's categories.
    #[arg(long, value_name = "CATEGORY")]
    pub component: Option<String>,

    /// Rank sectors by index value in the given period
    #[arg(
        long,
        value_name = "PERIOD",
        conflicts_with_all = ["sector", "by_sector", "from", "to"]
    )]
    pub rank: Option<Period>,

    /// Mentions CSV (file path or http(s) URL)
    ///
    /// Columns: entity_id, filing_date, category, count.
    #[arg(long, value_name = "SOURCE", env = "INDICATORS_MENTIONS")]
    pub mentions: Option<String>,

    /// Sectors CSV (file path or http(s) URL)
    ///
    /// Columns: entity_id, sector.
    #[arg(long, value_name = "SOURCE", env = "INDICATORS_SECTORS")]
    pub sectors: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .indicators.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output file path (prints to stdout when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json, csv)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Timeout for remote data sources in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .indicators.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for rendered series.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if !self.list && self.indicator.is_empty() {
            return Err("Specify at least one --indicator, or use --list".to_string());
        }

        if self.indicator.iter().any(|id| id.trim().is_empty()) {
            return Err("Indicator ids must not be empty".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(format!("--from {} is after --to {}", from, to));
            }
        }

        if let Some(ref sector) = self.sector {
            if sector.trim().is_empty() {
                return Err("Sector must not be empty".to_string());
            }
        }

        if let Some(ref component) = self.component {
            if component.trim().is_empty() {
                return Err("Component must not be empty".to_string());
            }
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` wins over a config file asking for verbose output.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// The selected category, if any.
    pub fn component(&self) -> Option<&str> {
        self.component.as_deref().map(str::trim)
    }

    /// The grouping requested for single-series output.
    pub fn grouping(&self) -> Grouping {
        match self.sector {
            Some(ref sector) => Grouping::Sector(sector.trim().to_string()),
            None => Grouping::Market,
        }
    }

    /// Resolve the requested range, filling open ends from the data bounds.
    ///
    /// Returns `Ok(None)` when an end is open and there is no data to fill it.
    pub fn effective_range(
        &self,
        bounds: Option<PeriodRange>,
    ) -> Result<Option<PeriodRange>, String> {
        let start = self.from.or(bounds.map(|b| b.start));
        let end = self.to.or(bounds.map(|b| b.end));

        match (start, end) {
            (Some(start), Some(end)) => PeriodRange::new(start, end)
                .map(Some)
                .map_err(|e| e.to_string()),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            indicator: vec!["esg_index".to_string()],
            list: false,
            from: None,
            to: None,
            sector: None,
            by_sector: false,
            component: None,
            rank: None,
            mentions: None,
            sectors: None,
            config: None,
            output: None,
            format: None,
            timeout: None,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    fn q(year: i32, quarter: u8) -> Period {
        Period::new(year, quarter).unwrap()
    }

    #[test]
    fn test_parse_from_command_line() {
        let args = Args::try_parse_from([
            "indicators",
            "--indicator",
            "esg_index,tariffs_index",
            "--from",
            "2023Q1",
            "--to",
            "2024-06-30",
            "--format",
            "csv",
        ])
        .unwrap();

        assert_eq!(args.indicator, vec!["esg_index", "tariffs_index"]);
        assert_eq!(args.from, Some(q(2023, 1)));
        assert_eq!(args.to, Some(q(2024, 2)));
        assert_eq!(args.format, Some(OutputFormat::Csv));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_sector_conflicts_with_by_sector() {
        let result = Args::try_parse_from([
            "indicators",
            "-i",
            "dei_index",
            "--sector",
            "tech",
            "--by-sector",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rank_conflicts_with_range() {
        let result = Args::try_parse_from([
            "indicators",
            "-i",
            "dei_index",
            "--rank",
            "2024Q2",
            "--from",
            "2024Q1",
        ]);
        assert!(result.is_err());

        let result = Args::try_parse_from([
            "indicators", "-i", "dei_index", "--rank", "2024Q2", "--to", "2024Q3",
        ]);
        assert!(result.is_err());

        let args =
            Args::try_parse_from(["indicators", "-i", "dei_index", "--rank", "2024Q2"]).unwrap();
        assert_eq!(args.rank, Some(q(2024, 2)));
    }

    #[test]
    fn test_component_selection() {
        let args = Args::try_parse_from([
            "indicators",
            "--indicator",
            "esg_index",
            "--component",
            " social ",
        ])
        .unwrap();
        assert_eq!(args.component(), Some("social"));
        assert!(args.validate().is_ok());

        let mut args = make_args();
        assert_eq!(args.component(), None);
        args.component = Some("  ".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_requires_indicator_or_list() {
        let mut args = make_args();
        args.indicator.clear();
        assert!(args.validate().is_err());

        args.list = true;
        assert!(args.validate().is_ok());

        args.list = false;
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_inverted_range() {
        let mut args = make_args();
        args.from = Some(q(2024, 3));
        args.to = Some(q(2024, 1));
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_effective_range_uses_bounds() {
        let bounds = PeriodRange::new(q(2022, 1), q(2024, 4)).unwrap();
        let mut args = make_args();

        assert_eq!(args.effective_range(Some(bounds)).unwrap(), Some(bounds));
        assert_eq!(args.effective_range(None).unwrap(), None);

        args.from = Some(q(2024, 1));
        let range = args.effective_range(Some(bounds)).unwrap().unwrap();
        assert_eq!(range.start, q(2024, 1));
        assert_eq!(range.end, q(2024, 4));

        args.from = Some(q(2025, 1));
        assert!(args.effective_range(Some(bounds)).is_err());
    }

    #[test]
    fn test_grouping() {
        let mut args = make_args();
        assert_eq!(args.grouping(), Grouping::Market);
        args.sector = Some("energy".to_string());
        assert_eq!(args.grouping(), Grouping::Sector("energy".to_string()));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
