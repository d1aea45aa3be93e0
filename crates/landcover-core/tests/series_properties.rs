//! End-to-end properties of series runs against an in-memory archive.

use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;
use async_trait::async_trait;
use chrono::NaiveDate;
use landcover_core::{
    AnalysisGrid, AreaUnit, Bounds, Category, ClassRaster, CoverageSeriesBuilder, DateRange, InMemoryArchive,
    PipelineConfig, PipelineError, PixelAreaReference, QueryError, RasterArchive, RasterSet, Region, Scene,
    SeriesRequest,
};
use tokio_util::sync::CancellationToken;

const PIXEL_M2: f64 = 10_000.0;
const WATER: u8 = 5;
const VEGETATION: u8 = 3;

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        unit: AreaUnit::SquareMetres,
        pixel_area: PixelAreaReference::Uniform { m2: PIXEL_M2 },
        ..PipelineConfig::default()
    }
}

fn region() -> Region {
    Region::rectangle(10.0, 45.0, 10.02, 45.02)
}

fn scene(id: &str, acquired: NaiveDate, class: u8) -> Scene {
    Scene {
        id: id.to_string(),
        acquired,
        band: "SCL".to_string(),
        raster: ClassRaster::new(40, 40, Bounds::new(9.5, 10.5, 44.5, 45.5), class),
    }
}

struct Counting {
    inner: InMemoryArchive,
    queries: AtomicUsize,
}

impl Counting {
    fn new(scenes: Vec<Scene>) -> Self {
        Self { inner: InMemoryArchive::new(scenes).unwrap(), queries: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl RasterArchive for Counting {
    async fn query(&self, region: &Region, range: &DateRange, band: &str) -> Result<RasterSet, QueryError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(region, range, band).await
    }
}

fn request(category: Category) -> SeriesRequest {
    SeriesRequest::from_config(region(), category, &config())
}

#[tokio::test]
async fn reference_range_gives_one_entry_per_quarter() {
    let archive = Counting::new(vec![scene("a", d(2017, 5, 1), WATER)]);
    let builder = CoverageSeriesBuilder::new(config());
    let series = builder
        .run(&request(Category::name("Water")), &archive, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(series.len(), 21);
    assert_eq!(archive.queries.load(Ordering::SeqCst), 21);
    assert_eq!(series.entries[0].label(), "2017-04");
    assert_eq!(series.entries[20].label(), "2022-04");
    for pair in series.entries.windows(2) {
        assert!(pair[0].time_start < pair[1].time_start);
    }
}

#[tokio::test]
async fn area_is_pixel_area_times_matched_pixels() {
    let archive = Counting::new(vec![scene("a", d(2017, 5, 1), WATER)]);
    let builder = CoverageSeriesBuilder::new(config());
    let series = builder
        .run(&request(Category::name("Water")), &archive, &CancellationToken::new())
        .await
        .unwrap();

    let grid = AnalysisGrid::for_region(&region(), 100.0, 4_000_000).unwrap();
    let first = &series.entries[0];
    assert_eq!(first.matched_pixels(), grid.inside_count());
    assert_relative_eq!(first.sum(), PIXEL_M2 * grid.inside_count() as f64, max_relative = 1e-12);
    assert!(!first.is_gap_filled);
}

#[tokio::test]
async fn gap_window_matches_a_no_match_window_except_for_the_flag() {
    // 2017-04 quarter has vegetation only, 2017-07 quarter has nothing.
    let archive = Counting::new(vec![scene("veg", d(2017, 5, 1), VEGETATION)]);
    let builder = CoverageSeriesBuilder::new(config());
    let series = builder
        .run(&request(Category::name("Water")), &archive, &CancellationToken::new())
        .await
        .unwrap();

    let (observed, gap) = (&series.entries[0], &series.entries[1]);
    assert!(!observed.is_gap_filled);
    assert!(gap.is_gap_filled);
    assert_eq!(observed.sum(), 0.0);
    assert_eq!(gap.sum(), 0.0);
    assert_eq!(observed.data, gap.data);
    assert_eq!(series.gap_filled_count(), 20);
}

#[tokio::test]
async fn repeated_runs_are_bit_identical() {
    let archive = Counting::new(vec![
        scene("a", d(2018, 1, 3), WATER),
        scene("b", d(2018, 2, 3), VEGETATION),
        scene("c", d(2018, 3, 3), WATER),
    ]);
    let mut cfg = config();
    cfg.pixel_area = PixelAreaReference::Spherical;
    let builder = CoverageSeriesBuilder::new(cfg.clone());
    let req = SeriesRequest::from_config(region(), Category::Index(5), &cfg);

    let a = builder.run(&req, &archive, &CancellationToken::new()).await.unwrap();
    let b = builder.run(&req, &archive, &CancellationToken::new()).await.unwrap();
    assert_eq!(a, b);
    for (x, y) in a.entries.iter().zip(&b.entries) {
        assert_eq!(x.sum().to_bits(), y.sum().to_bits());
    }
}

#[tokio::test]
async fn tied_votes_resolve_to_lowest_class() {
    let archive = Counting::new(vec![
        scene("w1", d(2017, 4, 10), WATER),
        scene("s1", d(2017, 5, 10), 2),
        scene("w2", d(2017, 6, 10), WATER),
        scene("s2", d(2017, 6, 20), 2),
    ]);
    let builder = CoverageSeriesBuilder::new(config());
    let cancel = CancellationToken::new();

    let water = builder.run(&request(Category::name("Water")), &archive, &cancel).await.unwrap();
    assert_eq!(water.entries[0].matched_pixels(), 0);

    let shadows = builder.run(&request(Category::Index(2)), &archive, &cancel).await.unwrap();
    assert!(shadows.entries[0].matched_pixels() > 0);
}

#[tokio::test]
async fn doubling_the_step_halves_the_windows() {
    let archive = Counting::new(Vec::new());
    let builder = CoverageSeriesBuilder::new(config());
    let mut req = request(Category::default());
    req.step_months = 6;
    let series = builder.run(&req, &archive, &CancellationToken::new()).await.unwrap();
    assert_eq!(series.len(), 11);
    assert_eq!(series.entries[1].label(), "2017-10");
    assert!(series.entries.iter().all(|e| e.is_gap_filled));
}

#[tokio::test]
async fn out_of_range_category_is_rejected_before_any_query() {
    let archive = Counting::new(vec![scene("a", d(2017, 5, 1), WATER)]);
    let builder = CoverageSeriesBuilder::new(config());
    let err = builder
        .run(&request(Category::Index(11)), &archive, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidCategory(_)));
    assert_eq!(archive.queries.load(Ordering::SeqCst), 0);
}
