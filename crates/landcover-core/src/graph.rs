//! Explicit description of one series computation.
//!
//! A [`SeriesPlan`] is built from a validated request without touching the
//! archive. It records the analysis grid, the windows and the per-window
//! stage chain so the computation can be inspected (or printed) before it is
//! materialised against a backend.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::area::{AreaUnit, PixelAreaReference};
use crate::catalog::ClassIndex;
use crate::geometry::{AnalysisGrid, Region};
use crate::retry::RetryPolicy;
use crate::window::TemporalWindow;

/// One node of the per-window chain, in evaluation order.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Window bounds from the generator.
    Window { count: usize, step_months: u32 },
    /// Archive query for the classification band; empty result → gap fill.
    Query { band: String },
    /// Per-pixel majority vote, lowest class on ties.
    ReduceMode,
    /// Keep pixels equal to the target class.
    Mask { target: ClassIndex },
    /// Multiply by pixel area and convert.
    Area { unit: AreaUnit },
    /// Stamp with the window start time.
    Tag,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Window { count, step_months } => write!(f, "window({count} × {step_months} mo)"),
            Stage::Query { band } => write!(f, "query({band})"),
            Stage::ReduceMode => f.write_str("reduce(mode)"),
            Stage::Mask { target } => write!(f, "mask(== {target})"),
            Stage::Area { unit } => write!(f, "area({unit})"),
            Stage::Tag => f.write_str("tag(time_start)"),
        }
    }
}

/// Per-run settings carried by the plan. Each run owns its own copy.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub band: String,
    pub unit: AreaUnit,
    pub pixel_area: PixelAreaReference,
    pub max_concurrency: usize,
    pub query_timeout: Duration,
    pub retry: RetryPolicy,
    /// Query ranges are clipped to this date when set.
    pub clip_to: Option<NaiveDate>,
}

/// Validated, lazily evaluated description of a series run.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPlan {
    pub region: Region,
    pub target: ClassIndex,
    pub target_label: String,
    /// Shared with the blocking tasks that reduce each window.
    pub grid: Arc<AnalysisGrid>,
    pub windows: Vec<TemporalWindow>,
    pub stages: Vec<Stage>,
    pub settings: RunSettings,
}

impl SeriesPlan {
    pub(crate) fn stage_chain(windows: usize, step_months: u32, target: ClassIndex, settings: &RunSettings) -> Vec<Stage> {
        vec![
            Stage::Window { count: windows, step_months },
            Stage::Query { band: settings.band.clone() },
            Stage::ReduceMode,
            Stage::Mask { target },
            Stage::Area { unit: settings.unit },
            Stage::Tag,
        ]
    }
}

impl fmt::Display for SeriesPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "series of `{}` (class {}) on {}×{} grid, {} windows",
            self.target_label,
            self.target,
            self.grid.width,
            self.grid.height,
            self.windows.len()
        )?;
        let chain: Vec<String> = self.stages.iter().map(Stage::to_string).collect();
        write!(f, "  {}", chain.join(" -> "))
    }
}
