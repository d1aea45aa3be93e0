//! Land-cover class area time series over a user-selected region.
//!
//! A [`SeriesRequest`] is planned into a [`SeriesPlan`] (grid, windows and
//! stage chain), then materialised against a [`RasterArchive`] into a
//! [`TimeSeries`] of per-window [`AreaRaster`]s. [`SeriesSession`] drives
//! repeated runs from input events.

pub mod archive;
pub mod area;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod mask;
pub mod pipeline;
pub mod raster;
pub mod retry;
pub mod series;
pub mod session;
pub mod window;

pub use archive::{InMemoryArchive, RasterArchive, Scene};
pub use area::{aggregate, AreaRaster, AreaUnit, PixelAreaReference, PixelAreas};
pub use catalog::{Category, ClassIndex, LandCoverCatalog};
pub use classify::{mode_reduce, mode_reduce_until};
pub use config::PipelineConfig;
pub use error::{ArchiveLoadError, ConfigError, PipelineError, PipelineResult, QueryError, RegionLoadError};
pub use geometry::{AnalysisGrid, Bounds, LonLat, Region};
pub use graph::{SeriesPlan, Stage};
pub use mask::{gap_fill, match_class, MatchMask};
pub use pipeline::{CoverageSeriesBuilder, SeriesRequest};
pub use raster::{ClassRaster, RasterSet, NODATA_CLASS};
pub use retry::RetryPolicy;
pub use series::{ChartPoint, ThumbnailFrame, TimeSeries};
pub use session::{InputEvent, InputState, SeriesSession, SeriesUpdate};
pub use window::{generate_windows, DateRange, TemporalWindow};
