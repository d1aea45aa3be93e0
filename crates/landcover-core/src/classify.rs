//! Per-pixel majority vote across the source rasters of one window.
//!
//! Every source raster is sampled nearest-neighbour at each analysis-grid
//! pixel centre. Nodata samples do not vote. The most frequent class wins and
//! ties resolve to the lowest class code, so results never depend on the
//! order the archive returned its scenes in.

#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::geometry::AnalysisGrid;
use crate::raster::{ClassRaster, RasterSet, NODATA_CLASS};

/// Collapse `set` into one classification raster on `grid`.
///
/// Pixels outside the region, or without a single valid vote, are
/// [`NODATA_CLASS`].
pub fn mode_reduce(set: &RasterSet, grid: &AnalysisGrid) -> ClassRaster {
    mode_reduce_until(set, grid, || false)
}

/// [`mode_reduce`] that stops filling rows once `stop` returns true.
/// Rows not yet reduced at that point stay [`NODATA_CLASS`], so callers must
/// discard the result when they stopped it.
pub fn mode_reduce_until<F>(set: &RasterSet, grid: &AnalysisGrid, stop: F) -> ClassRaster
where
    F: Fn() -> bool + Sync,
{
    let mut out = ClassRaster::nodata(grid.width, grid.height, grid.bounds);
    if grid.is_empty() {
        return out;
    }

    #[cfg(feature = "threading")]
    out.data.par_chunks_mut(grid.width).enumerate().for_each(|(r, row)| {
        if !stop() {
            reduce_row(set, grid, r, row);
        }
    });

    #[cfg(not(feature = "threading"))]
    for (r, row) in out.data.chunks_mut(grid.width).enumerate() {
        if stop() {
            break;
        }
        reduce_row(set, grid, r, row);
    }

    out
}

/// Most frequent value; ties go to the lowest value. `None` for no votes.
pub fn majority(votes: &mut [u8]) -> Option<u8> {
    votes.sort_unstable();
    let mut best: Option<(u8, usize)> = None;
    let mut i = 0;
    while i < votes.len() {
        let class = votes[i];
        let run = votes[i..].iter().take_while(|&&v| v == class).count();
        // Ascending scan with strict comparison keeps the lowest class on ties.
        if best.map_or(true, |(_, n)| run > n) {
            best = Some((class, run));
        }
        i += run;
    }
    best.map(|(class, _)| class)
}
