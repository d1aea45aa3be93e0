//! Renders every window of a series as a PNG frame, one file per window.
//! Matched pixels shade from steel blue (no area) to white (largest pixel);
//! masked pixels are transparent.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use landcover_core::{
    Category, CoverageSeriesBuilder, InMemoryArchive, PipelineConfig, Region, SeriesRequest, ThumbnailFrame,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOW: [u8; 3] = [70, 130, 180];
const HIGH: [u8; 3] = [255, 255, 255];

#[derive(Parser, Debug)]
#[command(name = "thumbnails", about = "Render a land-cover area series as PNG frames")]
struct Args {
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Region as JSON.
    #[arg(short, long)]
    region: PathBuf,

    /// Directory of classified scene JSON files.
    #[arg(short, long)]
    scenes: PathBuf,

    #[arg(short = 'k', long, default_value = "Water")]
    category: Category,

    #[arg(short, long, default_value = "data/thumbnails")]
    out: PathBuf,

    /// Output pixels per grid pixel.
    #[arg(long, default_value_t = 4)]
    zoom: u32,
}

fn shade(t: f32) -> image::Rgba<u8> {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    image::Rgba([mix(LOW[0], HIGH[0]), mix(LOW[1], HIGH[1]), mix(LOW[2], HIGH[2]), 255])
}

fn render(frame: &ThumbnailFrame, zoom: u32) -> image::RgbaImage {
    let zoom = zoom.max(1);
    let mut img = image::RgbaImage::new(frame.width as u32 * zoom, frame.height as u32 * zoom);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let (r, c) = ((y / zoom) as usize, (x / zoom) as usize);
        *px = match frame.values[r * frame.width + c] {
            Some(v) => shade(v),
            None => image::Rgba([0, 0, 0, 0]),
        };
    }
    img
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    let request = SeriesRequest::from_config(Region::from_json_file(&args.region)?, args.category, &config);
    let archive = InMemoryArchive::load_dir(&args.scenes)
        .with_context(|| format!("loading scenes from {}", args.scenes.display()))?;

    let series = CoverageSeriesBuilder::new(config)
        .run(&request, &archive, &CancellationToken::new())
        .await
        .context("running series")?;

    // Shared scale so frames are comparable across windows.
    let max = series
        .entries
        .iter()
        .flat_map(|e| e.data.iter().flatten())
        .fold(0.0_f64, |acc, &v| acc.max(v));

    fs::create_dir_all(&args.out).with_context(|| format!("creating {}", args.out.display()))?;
    for (idx, frame) in series.thumbnail_frames(0.0, max).iter().enumerate() {
        let path = args.out.join(format!("frame_{idx:03}_{}.png", frame.label));
        render(frame, args.zoom)
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!(path = %path.display(), "wrote frame");
    }
    Ok(())
}
