//! Filing Indicators - comparable topic indices from regulatory filings
//!
//! A CLI tool that turns per-entity keyword mention counts extracted from
//! filings into sector-normalized indicator series.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, data source, unknown indicator, etc.)

mod analysis;
mod cache;
mod catalog;
mod cli;
mod config;
mod engine;
mod error;
mod models;
mod report;
mod store;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use engine::IndicatorEngine;
use futures::future::try_join_all;
use models::{GroupingKind, IndicatorSeries, PeriodRange};
use report::{IndicatorRanking, NamedSeries, Report, ReportBody, ReportMetadata};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use store::{InMemoryMentionStore, MentionStore, StaticSectorIndex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Load configuration before logging so [general] verbose applies
    let (config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&args, &config);

    info!("Filing Indicators v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        ConfigSource::File(ref path) => info!("Loaded config from {}", path.display()),
        ConfigSource::Defaults => debug!("No config file found, using defaults"),
        ConfigSource::Fallback(ref e) => warn!("Failed to load config, using defaults: {}", e),
    }

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .indicators.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("Created {} with default settings.", CONFIG_FILE);
    println!("Edit it to point at your data sources and tune the indicator catalog.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = args.log_level(config.general.verbose);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the requested command. Returns the process exit code.
async fn run(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();

    config.merge_with_args(&args);

    let catalog = config.build_catalog()?;
    if catalog.is_empty() {
        warn!("The indicator catalog is empty");
    }
    info!("Catalog holds {} indicators", catalog.len());

    // --list needs no mention data
    if args.list {
        let report = Report {
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                data_version: 0,
                scale: *catalog.scale(),
                malformed_rows: 0,
                duration_seconds: start_time.elapsed().as_secs_f64(),
            },
            body: ReportBody::Indicators {
                indicators: catalog.summaries(),
            },
        };
        emit(&report, &config)?;
        return Ok(0);
    }

    // Load data sources
    let timeout = config.sources.timeout();
    let (loaded, sector_pairs) = tokio::try_join!(
        store::load_mentions(&config.sources.mentions, timeout),
        store::load_sectors(&config.sources.sectors, timeout),
    )?;
    if loaded.malformed_rows > 0 {
        warn!(
            "Skipped {} malformed rows in {}",
            loaded.malformed_rows, config.sources.mentions
        );
    }

    let mentions = Arc::new(InMemoryMentionStore::with_records(loaded.records));
    let sectors = StaticSectorIndex::from_pairs(sector_pairs);
    info!("{} entities have a sector assignment", sectors.len());

    let engine = IndicatorEngine::new(catalog, mentions.clone(), Arc::new(sectors));

    // Resolve every requested indicator (and category) before computing anything
    let category = args.component();
    for id in &args.indicator {
        engine.catalog().weights_for(id, category)?;
    }

    let body = if let Some(period) = args.rank {
        let rankings = try_join_all(args.indicator.iter().map(|id| {
            let engine = &engine;
            async move {
                let sectors = engine.rank_sectors(id, category, period).await?;
                let name = engine.catalog().resolve(id)?.name.clone();
                Ok::<_, error::IndicatorError>(IndicatorRanking {
                    indicator_id: id.clone(),
                    name,
                    category: category.map(String::from),
                    period,
                    sectors,
                })
            }
        }))
        .await?;

        ReportBody::Rankings { rankings }
    } else {
        let bounds = engine.available_range().await?;
        let range = match args.effective_range(bounds) {
            Ok(Some(range)) => range,
            Ok(None) => bail!("No mention data loaded; pass --from and --to explicitly"),
            Err(e) => bail!(e),
        };
        info!(
            "Computing {} indicator(s) over {} ({} periods)",
            args.indicator.len(),
            range,
            range.len()
        );

        let per_indicator = try_join_all(
            args.indicator
                .iter()
                .map(|id| series_for(&engine, &args, id, range)),
        )
        .await?;

        ReportBody::Series {
            series: per_indicator.into_iter().flatten().collect(),
        }
    };

    debug!("Series cache holds {} entries", engine.cache().len());

    let report = Report {
        metadata: ReportMetadata {
            generated_at: Utc::now(),
            data_version: mentions.version().await?,
            scale: *engine.catalog().scale(),
            malformed_rows: loaded.malformed_rows,
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        body,
    };
    emit(&report, &config)?;

    Ok(0)
}

/// Series requested for one indicator.
///
/// An explicit `--sector` yields that sector's series; `--by-sector`, or an
/// indicator whose default grouping is per sector, yields one series per
/// known sector; otherwise the market-wide series.
async fn series_for(
    engine: &IndicatorEngine,
    args: &Args,
    indicator_id: &str,
    range: PeriodRange,
) -> error::Result<Vec<NamedSeries>> {
    let definition = engine.catalog().resolve(indicator_id)?;
    let name = definition.name.clone();

    let series: Vec<IndicatorSeries> = if args.sector.is_none()
        && (args.by_sector || definition.grouping == GroupingKind::Sector)
    {
        engine
            .get_sector_breakdown(indicator_id, args.component(), range)
            .await?
    } else {
        vec![
            engine
                .get_series(indicator_id, args.component(), range, args.grouping())
                .await?,
        ]
    };

    for s in &series {
        if s.excluded_records > 0 {
            warn!(
                "{} ({}): {} invalid records excluded",
                s.indicator_id, s.grouping_key, s.excluded_records
            );
        }
    }

    Ok(series
        .into_iter()
        .map(|series| NamedSeries {
            name: name.clone(),
            series,
        })
        .collect())
}

/// Render the report and write it to the configured output.
fn emit(report: &Report, config: &Config) -> Result<()> {
    let output = report::render(report, config.general.format)?;

    match config.general.output {
        Some(ref path) => {
            std::fs::write(path, &output)
                .with_context(|| format!("Failed to write report to {}", path))?;
            info!("Report saved to: {}", path);
        }
        None => print!("{}", output),
    }

    Ok(())
}

/// Where the configuration came from, reported once logging is up.
enum ConfigSource {
    File(PathBuf),
    Defaults,
    Fallback(String),
}

/// Load configuration from file or use defaults.
///
/// An explicit `--config` that fails to load is an error; a broken default
/// file falls back to the built-in settings.
fn load_config(args: &Args) -> Result<(Config, ConfigSource)> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, ConfigSource::File(config_path.clone())));
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok((config, ConfigSource::File(PathBuf::from(CONFIG_FILE)))),
        Ok(None) => Ok((Config::default(), ConfigSource::Defaults)),
        Err(e) => Ok((Config::default(), ConfigSource::Fallback(format!("{:#}", e)))),
    }
}
