//! Series orchestrator: validates inputs, plans the run and materialises each
//! window concurrently against a [`RasterArchive`].
//!
//! Per window:
//!   1. Query (timeout + retry)
//!   2. Mode reduction, or gap fill when nothing usable came back
//!   3. Match & mask
//!   4. Area aggregation and time tag
//!
//! Windows are independent. Transient query faults degrade to a gap-filled
//! window; a fatal fault or cancellation aborts the whole run.

use std::sync::Arc;

use chrono::NaiveDate;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::archive::RasterArchive;
use crate::area::{aggregate, AreaRaster, PixelAreas};
use crate::catalog::{Category, LandCoverCatalog};
use crate::classify::mode_reduce_until;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, QueryError};
use crate::geometry::{AnalysisGrid, Region};
use crate::graph::{RunSettings, SeriesPlan};
use crate::mask::{gap_fill, match_class};
use crate::raster::RasterSet;
use crate::series::TimeSeries;
use crate::window::{generate_windows, TemporalWindow};

/// Everything a single run depends on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesRequest {
    pub region: Region,
    pub category: Category,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub step_months: u32,
}

impl SeriesRequest {
    /// Request over the configured date range and step.
    pub fn from_config(region: Region, category: Category, config: &PipelineConfig) -> Self {
        Self {
            region,
            category,
            start: config.start_date,
            end: config.end_date,
            step_months: config.step_months,
        }
    }
}

/// Builds and runs series plans under one configuration.
#[derive(Debug, Clone)]
pub struct CoverageSeriesBuilder {
    config: PipelineConfig,
    catalog: LandCoverCatalog,
}

impl CoverageSeriesBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config, catalog: LandCoverCatalog::default() }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &LandCoverCatalog {
        &self.catalog
    }

    /// Validate `request` and describe the run. Issues no query.
    ///
    /// Category is checked first, then geometry, then the date range.
    pub fn plan(&self, request: &SeriesRequest) -> PipelineResult<SeriesPlan> {
        let target = self.catalog.resolve(&request.category)?;
        let grid = AnalysisGrid::for_region(&request.region, self.config.scale_m, self.config.max_pixels)?;
        let windows = generate_windows(request.start, request.end, request.step_months)?;

        let settings = RunSettings {
            band: self.config.band.clone(),
            unit: self.config.unit,
            pixel_area: self.config.pixel_area,
            max_concurrency: self.config.max_concurrency.max(1),
            query_timeout: self.config.query_timeout(),
            retry: self.config.retry.normalized(),
            clip_to: self.config.clip_queries_to_range.then_some(request.end),
        };
        let stages = SeriesPlan::stage_chain(windows.len(), request.step_months, target, &settings);
        Ok(SeriesPlan {
            region: request.region.clone(),
            target,
            target_label: self.catalog.label(target).to_string(),
            grid: Arc::new(grid),
            windows,
            stages,
            settings,
        })
    }

    /// Plan and materialise in one step.
    pub async fn run(
        &self,
        request: &SeriesRequest,
        archive: &dyn RasterArchive,
        cancel: &CancellationToken,
    ) -> PipelineResult<TimeSeries> {
        let plan = self.plan(request)?;
        plan.materialize(archive, cancel).await
    }
}

impl SeriesPlan {
    /// Evaluate every window against `archive`, at most
    /// `settings.max_concurrency` at a time, preserving window order.
    ///
    /// Per-window reduction runs on the blocking pool, so `cancel` is
    /// observed while rasters are being reduced and not only between queries.
    pub async fn materialize(
        &self,
        archive: &dyn RasterArchive,
        cancel: &CancellationToken,
    ) -> PipelineResult<TimeSeries> {
        let span = info_span!(
            "series_run",
            target = %self.target_label,
            windows = self.windows.len(),
            grid_width = self.grid.width,
            grid_height = self.grid.height,
        );
        async move {
            info!(inside_pixels = self.grid.inside_count(), "materialising series");
            let pixel_areas = &self.settings.pixel_area.evaluate(&self.grid);

            let work = stream::iter(self.windows.iter().copied())
                .map(move |window| async move { self.evaluate_window(window, archive, pixel_areas, cancel).await })
                .buffered(self.settings.max_concurrency)
                .try_collect::<Vec<_>>();

            let entries = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("run cancelled, discarding partial results");
                    return Err(PipelineError::Cancelled);
                }
                res = work => res?,
            };

            let series = TimeSeries::assemble(self.target_label.clone(), self.settings.unit, &self.windows, entries)?;
            info!(gap_filled = series.gap_filled_count(), "series complete");
            Ok(series)
        }
        .instrument(span)
        .await
    }

    async fn evaluate_window(
        &self,
        window: TemporalWindow,
        archive: &dyn RasterArchive,
        pixel_areas: &PixelAreas,
        cancel: &CancellationToken,
    ) -> PipelineResult<AreaRaster> {
        let source = match self.query_window(&window, archive).await {
            Ok(mut set) => {
                let dropped = set.retain_consistent();
                if dropped > 0 {
                    warn!(window = window.index, label = %window.label(), dropped, "discarding rasters that do not match their dimensions");
                }
                Some(set)
            }
            Err(QueryError::Transient(message)) => {
                warn!(window = window.index, label = %window.label(), %message, "query retries exhausted, gap filling");
                None
            }
            Err(QueryError::Fatal(message)) => {
                return Err(PipelineError::QueryFatal {
                    window: window.index,
                    label: window.label(),
                    message,
                });
            }
        };
        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let grid = Arc::clone(&self.grid);
        let areas = pixel_areas.clone();
        let (target, unit) = (self.target, self.settings.unit);
        let token = cancel.clone();
        let span = Span::current();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            let mask = match source {
                Some(set) if !set.is_empty() => {
                    let classification = mode_reduce_until(&set, &grid, || token.is_cancelled());
                    if token.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }
                    let mask = match_class(&classification, target);
                    debug!(
                        window = window.index,
                        label = %window.label(),
                        scenes = set.len(),
                        matched = mask.matched(),
                        "window reduced"
                    );
                    mask
                }
                Some(_) => {
                    debug!(window = window.index, label = %window.label(), "no imagery, gap filling");
                    gap_fill(&grid)
                }
                None => gap_fill(&grid),
            };
            aggregate(&mask, &areas, unit, &window)
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("window {} reduction failed: {e}", window.index)))?
    }

    async fn query_window(&self, window: &TemporalWindow, archive: &dyn RasterArchive) -> Result<RasterSet, QueryError> {
        let range = match self.settings.clip_to {
            Some(limit) => window.clamped_to(limit),
            None => window.range(),
        };
        let region = &self.region;
        let band = self.settings.band.as_str();
        let timeout = self.settings.query_timeout;
        self.settings
            .retry
            .retry_async(
                |attempt| {
                    let range = &range;
                    async move {
                        if attempt > 0 {
                            debug!(window = window.index, attempt, "retrying query");
                        }
                        match tokio::time::timeout(timeout, archive.query(region, range, band)).await {
                            Ok(res) => res,
                            Err(_) => Err(QueryError::Transient(format!("timed out after {} ms", timeout.as_millis()))),
                        }
                    }
                },
                QueryError::is_retryable,
            )
            .await
    }
}
