//! Time series assembly and the reductions downstream renderers consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::area::{AreaRaster, AreaUnit};
use crate::error::{PipelineError, PipelineResult};
use crate::window::TemporalWindow;

/// One area raster per generated window, in window order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    /// Catalog label of the target class.
    pub target: String,
    pub unit: AreaUnit,
    pub entries: Vec<AreaRaster>,
}

/// `(timestamp, scalar area)` pair for the chart consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub time_start: DateTime<Utc>,
    pub label: String,
    pub area: f64,
    pub gap_filled: bool,
}

/// One normalised 2-D frame for the thumbnail consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailFrame {
    pub label: String,
    pub width: usize,
    pub height: usize,
    /// Row-major values in `[0, 1]`; `None` for masked pixels.
    pub values: Vec<Option<f32>>,
}

impl TimeSeries {
    /// Collect per-window rasters, checking they line up with `windows`.
    pub fn assemble(
        target: impl Into<String>,
        unit: AreaUnit,
        windows: &[TemporalWindow],
        entries: Vec<AreaRaster>,
    ) -> PipelineResult<Self> {
        if entries.len() != windows.len() {
            return Err(PipelineError::Internal(format!(
                "{} rasters for {} windows",
                entries.len(),
                windows.len()
            )));
        }
        for (w, e) in windows.iter().zip(&entries) {
            if e.window_index != w.index || e.time_start_millis() != w.time_start_millis() {
                return Err(PipelineError::Internal(format!(
                    "raster for window {} ({}) is out of order",
                    e.window_index,
                    e.label()
                )));
            }
        }
        Ok(Self { target: target.into(), unit, entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn gap_filled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_gap_filled).count()
    }

    /// Spatial sum of each window, in window order.
    pub fn chart_points(&self) -> Vec<ChartPoint> {
        self.entries
            .iter()
            .map(|e| ChartPoint {
                time_start: e.time_start,
                label: e.label(),
                area: e.sum(),
                gap_filled: e.is_gap_filled,
            })
            .collect()
    }

    /// Frames normalised from `[min, max]` to `[0, 1]`, clamped.
    pub fn thumbnail_frames(&self, min: f64, max: f64) -> Vec<ThumbnailFrame> {
        let span = max - min;
        self.entries
            .iter()
            .map(|e| ThumbnailFrame {
                label: e.label(),
                width: e.width,
                height: e.height,
                values: e
                    .data
                    .iter()
                    .map(|v| {
                        v.map(|a| {
                            if span > 0.0 {
                                ((a - min) / span).clamp(0.0, 1.0) as f32
                            } else {
                                0.0
                            }
                        })
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::generate_windows;
    use chrono::NaiveDate;

    fn windows() -> Vec<TemporalWindow> {
        generate_windows(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 7, 1).unwrap(),
            3,
        )
        .unwrap()
    }

    fn raster(w: &TemporalWindow, data: Vec<Option<f64>>, gap: bool) -> AreaRaster {
        AreaRaster {
            width: data.len(),
            height: 1,
            data,
            window_index: w.index,
            time_start: w.time_start(),
            unit: AreaUnit::SquareKilometres,
            is_gap_filled: gap,
        }
    }

    #[test]
    fn chart_points_follow_window_order() {
        let ws = windows();
        let entries = vec![
            raster(&ws[0], vec![Some(0.5), None, Some(0.25)], false),
            raster(&ws[1], vec![None, None, None], true),
        ];
        let series = TimeSeries::assemble("Water", AreaUnit::SquareKilometres, &ws, entries).unwrap();
        let points = series.chart_points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].label, "2020-01");
        assert!((points[0].area - 0.75).abs() < 1e-12);
        assert_eq!(points[1].label, "2020-04");
        assert_eq!(points[1].area, 0.0);
        assert!(points[1].gap_filled);
        assert_eq!(series.gap_filled_count(), 1);
    }

    #[test]
    fn assemble_rejects_missing_windows() {
        let ws = windows();
        let entries = vec![raster(&ws[0], vec![None], false)];
        assert!(TimeSeries::assemble("Water", AreaUnit::default(), &ws, entries).is_err());
    }

    #[test]
    fn assemble_rejects_swapped_windows() {
        let ws = windows();
        let entries = vec![raster(&ws[1], vec![None], false), raster(&ws[0], vec![None], false)];
        assert!(TimeSeries::assemble("Water", AreaUnit::default(), &ws, entries).is_err());
    }

    #[test]
    fn thumbnail_frames_normalise_and_clamp() {
        let ws = windows();
        let entries = vec![
            raster(&ws[0], vec![Some(0.0), Some(0.5), Some(2.0), None], false),
            raster(&ws[1], vec![None; 4], true),
        ];
        let series = TimeSeries::assemble("Water", AreaUnit::default(), &ws, entries).unwrap();
        let frames = series.thumbnail_frames(0.0, 1.0);
        assert_eq!(frames[0].values, vec![Some(0.0), Some(0.5), Some(1.0), None]);
        assert_eq!(frames[1].label, "2020-04");
        assert!(frames[1].values.iter().all(Option::is_none));
    }
}
