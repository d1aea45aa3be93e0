use serde::{Deserialize, Serialize};

use crate::geometry::Bounds;

/// Class code for pixels without a valid classification.
pub const NODATA_CLASS: u8 = 255;

/// A 2D grid of discrete class codes, row-major, row 0 at the northern edge.
/// Coordinate math uses f64; class codes are u8.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRaster {
    /// Row-major class codes; [`NODATA_CLASS`] marks missing pixels.
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub bounds: Bounds,
}

impl ClassRaster {
    /// Create a new ClassRaster filled with the given class.
    pub fn new(width: usize, height: usize, bounds: Bounds, fill: u8) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            bounds,
        }
    }

    /// Create a raster with no valid pixels.
    pub fn nodata(width: usize, height: usize, bounds: Bounds) -> Self {
        Self::new(width, height, bounds, NODATA_CLASS)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u8 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, class: u8) {
        self.data[row * self.width + col] = class;
    }

    /// Nearest-neighbour sample at (lon, lat).
    /// Returns None outside the raster bounds, on a nodata pixel, or past the
    /// end of a truncated buffer.
    pub fn sample_nearest(&self, lon: f64, lat: f64) -> Option<u8> {
        if self.width == 0 || self.height == 0 || !self.bounds.contains(lon, lat) {
            return None;
        }
        let fx = (lon - self.bounds.min_lon) / (self.bounds.max_lon - self.bounds.min_lon) * self.width as f64;
        let fy = (self.bounds.max_lat - lat) / (self.bounds.max_lat - self.bounds.min_lat) * self.height as f64;
        let col = (fx.floor() as usize).min(self.width - 1);
        let row = (fy.floor() as usize).min(self.height - 1);
        match self.data.get(row * self.width + col) {
            None | Some(&NODATA_CLASS) => None,
            Some(&class) => Some(class),
        }
    }

    /// Number of pixels holding `class`.
    pub fn count(&self, class: u8) -> usize {
        self.data.iter().filter(|&&c| c == class).count()
    }

    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.width * self.height
            && self.bounds.max_lon > self.bounds.min_lon
            && self.bounds.max_lat > self.bounds.min_lat
    }
}

/// Source rasters returned by the archive for one window and region.
/// Empty when no imagery intersects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterSet {
    pub rasters: Vec<ClassRaster>,
}

impl RasterSet {
    pub fn new(rasters: Vec<ClassRaster>) -> Self {
        Self { rasters }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassRaster> {
        self.rasters.iter()
    }

    /// Drop rasters whose buffer or bounds do not match their dimensions.
    /// Returns how many were dropped.
    pub fn retain_consistent(&mut self) -> usize {
        let before = self.rasters.len();
        self.rasters.retain(ClassRaster::is_consistent);
        before - self.rasters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_raster() -> ClassRaster {
        let mut r = ClassRaster::new(4, 4, Bounds::new(0.0, 4.0, 0.0, 4.0), 3);
        r.set(0, 0, 7);
        r.set(3, 3, NODATA_CLASS);
        r
    }

    #[test]
    fn sample_maps_north_west_corner_to_first_pixel() {
        let r = unit_raster();
        assert_eq!(r.sample_nearest(0.5, 3.5), Some(7));
        assert_eq!(r.sample_nearest(2.5, 2.5), Some(3));
    }

    #[test]
    fn sample_on_far_edge_stays_in_range() {
        let r = unit_raster();
        assert_eq!(r.sample_nearest(0.0, 4.0), Some(7));
        assert_eq!(r.sample_nearest(3.9, 4.0), Some(3));
    }

    #[test]
    fn sample_nodata_and_out_of_bounds_return_none() {
        let r = unit_raster();
        assert_eq!(r.sample_nearest(3.5, 0.5), None);
        assert_eq!(r.sample_nearest(-1.0, 2.0), None);
        assert_eq!(r.sample_nearest(2.0, 4.5), None);
    }

    #[test]
    fn count_and_consistency() {
        let r = unit_raster();
        assert_eq!(r.count(3), 14);
        assert!(r.is_consistent());
        let broken = ClassRaster { data: vec![1; 3], ..r };
        assert!(!broken.is_consistent());
    }

    #[test]
    fn truncated_buffer_samples_as_nodata() {
        let mut r = unit_raster();
        r.data.truncate(3);
        assert_eq!(r.sample_nearest(0.5, 3.5), Some(7));
        assert_eq!(r.sample_nearest(2.5, 2.5), None);
    }

    #[test]
    fn retain_consistent_drops_broken_rasters() {
        let good = unit_raster();
        let mut short = unit_raster();
        short.data.truncate(3);
        let mut set = RasterSet::new(vec![short, good.clone()]);
        assert_eq!(set.retain_consistent(), 1);
        assert_eq!(set.rasters, vec![good]);
    }
}
