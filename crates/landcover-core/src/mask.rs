//! Match & mask against the target class, plus the gap-fill placeholder.

use crate::catalog::ClassIndex;
use crate::geometry::AnalysisGrid;
use crate::raster::ClassRaster;

/// Binary raster of pixels that matched the target class.
/// Row-major; `false` means masked out (no value), not zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchMask {
    pub data: Vec<bool>,
    pub width: usize,
    pub height: usize,
    /// Set when the mask stands in for a window without source imagery.
    pub gap_filled: bool,
}

impl MatchMask {
    pub fn matched(&self) -> usize {
        self.data.iter().filter(|&&m| m).count()
    }
}

/// Keep only pixels whose class equals `target`.
pub fn match_class(classification: &ClassRaster, target: ClassIndex) -> MatchMask {
    let t = target.value();
    MatchMask {
        data: classification.data.iter().map(|&c| c == t).collect(),
        width: classification.width,
        height: classification.height,
        gap_filled: false,
    }
}

/// Placeholder for a window with no usable imagery: the same extent as a real
/// mask and no matching pixel anywhere, whatever the target class.
pub fn gap_fill(grid: &AnalysisGrid) -> MatchMask {
    MatchMask {
        data: vec![false; grid.len()],
        width: grid.width,
        height: grid.height,
        gap_filled: true,
    }
}
