//! Runs one land-cover area series over a region and prints the chart series.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use landcover_core::{
    Category, CoverageSeriesBuilder, InMemoryArchive, LandCoverCatalog, PipelineConfig, Region, SeriesRequest,
    TimeSeries,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "landcover", about = "Land-cover class area time series over a region")]
struct Args {
    /// TOML pipeline config. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Region as JSON, e.g. {"type":"point","lon":10.0,"lat":45.0}.
    #[arg(short, long, required_unless_present = "list_categories")]
    region: Option<PathBuf>,

    /// Directory of classified scene JSON files.
    #[arg(short, long, required_unless_present_any = ["list_categories", "plan"])]
    scenes: Option<PathBuf>,

    /// Catalog label or class index.
    #[arg(short = 'k', long, default_value = "Water")]
    category: Category,

    #[arg(short, long, value_enum, default_value = "csv")]
    format: Format,

    /// Print the run plan and exit without querying.
    #[arg(long)]
    plan: bool,

    /// Print the class catalog and exit.
    #[arg(long)]
    list_categories: bool,
}

fn print_csv(series: &TimeSeries) {
    println!("window,time_start_ms,area_{},gap_filled", series.unit.key());
    for point in series.chart_points() {
        println!("{},{},{},{}", point.label, point.time_start.timestamp_millis(), point.area, point.gap_filled);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if args.list_categories {
        for (idx, label) in LandCoverCatalog::default().labels().enumerate() {
            println!("{idx}\t{label}");
        }
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let region_path = args.region.context("--region is required")?;
    let region = Region::from_json_file(&region_path)?;
    let request = SeriesRequest::from_config(region, args.category, &config);
    let builder = CoverageSeriesBuilder::new(config);

    let plan = builder.plan(&request).context("planning series")?;
    if args.plan {
        println!("{plan}");
        return Ok(());
    }

    let scenes = args.scenes.context("--scenes is required")?;
    let archive =
        InMemoryArchive::load_dir(&scenes).with_context(|| format!("loading scenes from {}", scenes.display()))?;
    info!(scenes = archive.len(), "archive loaded");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let series = plan.materialize(&archive, &cancel).await.context("running series")?;
    match args.format {
        Format::Csv => print_csv(&series),
        Format::Json => println!("{}", serde_json::to_string_pretty(&series.chart_points())?),
    }
    Ok(())
}
