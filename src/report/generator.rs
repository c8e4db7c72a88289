//! Report rendering.
//!
//! Renders indicator listings, series and sector rankings as Markdown,
//! JSON or CSV.

use crate::cli::OutputFormat;
use crate::models::IndicatorSummary;
use crate::report::{IndicatorRanking, NamedSeries, Report, ReportBody, ReportMetadata};
use anyhow::{Context, Result};

/// Render a report in the requested format.
pub fn render(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Markdown => Ok(generate_markdown_report(report)),
        OutputFormat::Json => generate_json_report(report),
        OutputFormat::Csv => generate_csv_report(report),
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Filing Indicators Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(&report.metadata));

    match &report.body {
        ReportBody::Indicators { indicators } => {
            output.push_str(&generate_indicators_section(indicators));
        }
        ReportBody::Series { series } => {
            output.push_str("## Series\n\n");
            if series.is_empty() {
                output.push_str("No series were requested.\n\n");
            }
            for named in series {
                output.push_str(&generate_series_block(named));
            }
        }
        ReportBody::Rankings { rankings } => {
            output.push_str("## Sector Rankings\n\n");
            for ranking in rankings {
                output.push_str(&generate_ranking_block(ranking));
            }
        }
    }

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Data Version:** {}\n", metadata.data_version));
    section.push_str(&format!(
        "- **Scale:** {} to {}\n",
        metadata.scale.min, metadata.scale.max
    ));
    if metadata.malformed_rows > 0 {
        section.push_str(&format!(
            "- **Malformed Rows Skipped:** {}\n",
            metadata.malformed_rows
        ));
    }
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the indicator listing.
fn generate_indicators_section(indicators: &[IndicatorSummary]) -> String {
    let mut section = String::new();

    section.push_str("## Indicators\n\n");
    section.push_str("| Id | Name | Group | Grouping | Categories |\n");
    section.push_str("|:---|:---|:---|:---:|:---|\n");

    for summary in indicators {
        let categories: Vec<&str> = summary.categories.iter().map(|c| c.label.as_str()).collect();
        section.push_str(&format!(
            "| `{}` | {} | {} | {} | {} |\n",
            summary.id,
            summary.name,
            summary.display_category,
            summary.grouping,
            categories.join(", ")
        ));
    }
    section.push('\n');

    section
}

/// Generate the block for a single series.
fn generate_series_block(named: &NamedSeries) -> String {
    let mut block = String::new();
    let series = &named.series;

    match series.category {
        Some(ref category) => block.push_str(&format!(
            "### {} (`{}` / {}, {})\n\n",
            named.name, series.indicator_id, category, series.grouping_key
        )),
        None => block.push_str(&format!(
            "### {} (`{}`, {})\n\n",
            named.name, series.indicator_id, series.grouping_key
        )),
    }

    let gaps = series.gaps();
    block.push_str(&format!(
        "*Range: {} | Points: {} | Gaps: {} | Excluded records: {}*\n\n",
        series.range,
        series.points.len(),
        gaps.len(),
        series.excluded_records
    ));

    if series.points.is_empty() {
        block.push_str("No eligible filings in this range.\n\n");
        return block;
    }

    block.push_str("| Period | Index Value | Entities |\n");
    block.push_str("|:---|---:|---:|\n");
    for point in &series.points {
        block.push_str(&format!(
            "| {} | {:.2} | {} |\n",
            point.period, point.value, point.entities
        ));
    }
    block.push('\n');

    if !gaps.is_empty() {
        let listed: Vec<String> = gaps.iter().map(|p| p.to_string()).collect();
        block.push_str(&format!("> No eligible filings in: {}\n\n", listed.join(", ")));
    }

    block
}

/// Generate the block for one ranking.
fn generate_ranking_block(ranking: &IndicatorRanking) -> String {
    let mut block = String::new();

    match ranking.category {
        Some(ref category) => block.push_str(&format!(
            "### {} (`{}` / {}), {}\n\n",
            ranking.name, ranking.indicator_id, category, ranking.period
        )),
        None => block.push_str(&format!(
            "### {} (`{}`), {}\n\n",
            ranking.name, ranking.indicator_id, ranking.period
        )),
    }

    if ranking.sectors.is_empty() {
        block.push_str("No sector has eligible filings in this period.\n\n");
        return block;
    }

    block.push_str("| Rank | Sector | Index Value |\n");
    block.push_str("|:---:|:---|---:|\n");
    for row in &ranking.sectors {
        block.push_str(&format!(
            "| {} | {} | {:.2} |\n",
            row.rank, row.sector_id, row.value
        ));
    }
    block.push('\n');

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    format!(
        "---\n\n*Report generated by filing-indicators v{}*\n",
        env!("CARGO_PKG_VERSION")
    )
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}

/// Generate a CSV report (one row per series point, indicator or ranking).
pub fn generate_csv_report(report: &Report) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    match &report.body {
        ReportBody::Indicators { indicators } => {
            writer.write_record(["id", "name", "display_category", "grouping", "categories"])?;
            for summary in indicators {
                let categories: Vec<&str> =
                    summary.categories.iter().map(|c| c.value.as_str()).collect();
                writer.write_record([
                    summary.id.as_str(),
                    summary.name.as_str(),
                    summary.display_category.as_str(),
                    &summary.grouping.to_string(),
                    &categories.join(";"),
                ])?;
            }
        }
        ReportBody::Series { series } => {
            writer.write_record([
                "indicator_id",
                "category",
                "grouping",
                "period",
                "value",
                "entities",
            ])?;
            for named in series {
                let category = named.series.category.as_deref().unwrap_or("");
                for point in &named.series.points {
                    writer.write_record([
                        named.series.indicator_id.as_str(),
                        category,
                        named.series.grouping_key.as_str(),
                        &point.period.to_string(),
                        &format!("{:.4}", point.value),
                        &point.entities.to_string(),
                    ])?;
                }
            }
        }
        ReportBody::Rankings { rankings } => {
            writer.write_record(["indicator_id", "period", "rank", "sector", "value"])?;
            for ranking in rankings {
                for row in &ranking.sectors {
                    writer.write_record([
                        ranking.indicator_id.as_str(),
                        &ranking.period.to_string(),
                        &row.rank.to_string(),
                        row.sector_id.as_str(),
                        &format!("{:.4}", row.value),
                    ])?;
                }
            }
        }
    }

    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}
