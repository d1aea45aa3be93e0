//! Area aggregation: matched pixels → per-pixel surface area in a target unit.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::geometry::AnalysisGrid;
use crate::mask::MatchMask;
use crate::window::TemporalWindow;

/// Mean Earth radius (IUGG) in metres.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AreaUnit {
    #[serde(rename = "m2")]
    SquareMetres,
    #[serde(rename = "ha")]
    Hectares,
    #[default]
    #[serde(rename = "km2")]
    SquareKilometres,
}

impl AreaUnit {
    /// Square metres per unit.
    pub fn divisor(self) -> f64 {
        match self {
            AreaUnit::SquareMetres => 1.0,
            AreaUnit::Hectares => 1e4,
            AreaUnit::SquareKilometres => 1e6,
        }
    }

    /// Config spelling of the unit.
    pub fn key(self) -> &'static str {
        match self {
            AreaUnit::SquareMetres => "m2",
            AreaUnit::Hectares => "ha",
            AreaUnit::SquareKilometres => "km2",
        }
    }
}

impl fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AreaUnit::SquareMetres => "m²",
            AreaUnit::Hectares => "ha",
            AreaUnit::SquareKilometres => "km²",
        })
    }
}

/// Source of per-pixel surface area.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PixelAreaReference {
    /// Exact spherical cell area: R² · Δλ · (sin φ_north − sin φ_south).
    #[default]
    Spherical,
    /// Every pixel covers the same area in m².
    Uniform { m2: f64 },
}

impl PixelAreaReference {
    /// Evaluate the reference on `grid` (m² per pixel, row-major).
    pub fn evaluate(&self, grid: &AnalysisGrid) -> PixelAreas {
        let values = match *self {
            PixelAreaReference::Uniform { m2 } => vec![m2; grid.len()],
            PixelAreaReference::Spherical => {
                let (dlon, _) = grid.pixel_deg();
                let dlon_rad = dlon.to_radians();
                (0..grid.height)
                    .flat_map(|r| {
                        let (south, north) = grid.row_lat_span(r);
                        let a = EARTH_RADIUS_M * EARTH_RADIUS_M
                            * dlon_rad
                            * (north.to_radians().sin() - south.to_radians().sin());
                        std::iter::repeat_n(a, grid.width)
                    })
                    .collect()
            }
        };
        PixelAreas {
            m2: Arc::new(values),
            width: grid.width,
            height: grid.height,
        }
    }
}

/// Per-pixel area raster shared by every window of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelAreas {
    pub m2: Arc<Vec<f64>>,
    pub width: usize,
    pub height: usize,
}

/// Surface area of matched pixels for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaRaster {
    /// Row-major; `None` for pixels that did not match (masked out).
    pub data: Vec<Option<f64>>,
    pub width: usize,
    pub height: usize,
    pub window_index: usize,
    pub time_start: DateTime<Utc>,
    pub unit: AreaUnit,
    /// True when the window had no usable imagery and was gap-filled.
    pub is_gap_filled: bool,
}

impl AreaRaster {
    /// Spatial sum over matched pixels. 0.0 when nothing matched.
    pub fn sum(&self) -> f64 {
        self.data.iter().flatten().sum()
    }

    pub fn matched_pixels(&self) -> usize {
        self.data.iter().filter(|v| v.is_some()).count()
    }

    pub fn label(&self) -> String {
        self.time_start.format("%Y-%m").to_string()
    }

    pub fn time_start_millis(&self) -> i64 {
        self.time_start.timestamp_millis()
    }
}

/// Multiply the mask by the pixel-area reference and convert to `unit`.
pub fn aggregate(
    mask: &MatchMask,
    areas: &PixelAreas,
    unit: AreaUnit,
    window: &TemporalWindow,
) -> PipelineResult<AreaRaster> {
    if mask.width != areas.width || mask.height != areas.height {
        return Err(PipelineError::Internal(format!(
            "mask {}×{} does not match pixel-area raster {}×{}",
            mask.width, mask.height, areas.width, areas.height
        )));
    }
    let divisor = unit.divisor();
    let data = mask
        .data
        .iter()
        .zip(areas.m2.iter())
        .map(|(&hit, &m2)| hit.then(|| m2 / divisor))
        .collect();
    Ok(AreaRaster {
        data,
        width: mask.width,
        height: mask.height,
        window_index: window.index,
        time_start: window.time_start(),
        unit,
        is_gap_filled: mask.gap_filled,
    })
}
