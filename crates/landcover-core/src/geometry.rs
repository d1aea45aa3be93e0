//! Region geometry and the equirectangular analysis grid derived from it.
//! All coordinate math uses f64 degrees.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult, RegionLoadError};

/// Metres per degree of latitude (and of longitude at the equator).
pub const METRES_PER_DEG: f64 = 111_320.0;

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LonLat {
    /// Longitude in degrees, -180 to +180.
    pub lon: f64,
    /// Latitude in degrees, -90 to +90.
    pub lat: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    fn is_valid(self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }
}

/// Axis-aligned geographic bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self { min_lon, max_lon, min_lat, max_lat }
    }

    /// True if the two boxes share any area or edge.
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// The user-selected region: a drawn polygon or a single clicked point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Region {
    Point { lon: f64, lat: f64 },
    /// Outer ring; the closing vertex may be repeated or omitted.
    Polygon { ring: Vec<LonLat> },
}

impl Region {
    pub fn point(lon: f64, lat: f64) -> Self {
        Region::Point { lon, lat }
    }

    /// Axis-aligned rectangle polygon, mostly useful for tests and tooling.
    pub fn rectangle(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Region::Polygon {
            ring: vec![
                LonLat::new(min_lon, min_lat),
                LonLat::new(max_lon, min_lat),
                LonLat::new(max_lon, max_lat),
                LonLat::new(min_lon, max_lat),
            ],
        }
    }

    /// Read a region from a JSON file such as `{"type":"point","lon":10.0,"lat":45.0}`.
    /// Geometry is not validated here; planning does that.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RegionLoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RegionLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| RegionLoadError::Decode {
            path: path.display().to_string(),
            source,
        })
    }

    /// Reject empty, degenerate or out-of-range geometry.
    pub fn validate(&self) -> PipelineResult<()> {
        match self {
            Region::Point { lon, lat } => {
                if !LonLat::new(*lon, *lat).is_valid() {
                    return Err(PipelineError::InvalidGeometry(format!(
                        "point ({lon}, {lat}) is outside the valid coordinate range"
                    )));
                }
                Ok(())
            }
            Region::Polygon { ring } => {
                if let Some(bad) = ring.iter().find(|p| !p.is_valid()) {
                    return Err(PipelineError::InvalidGeometry(format!(
                        "vertex ({}, {}) is outside the valid coordinate range",
                        bad.lon, bad.lat
                    )));
                }
                let vertices = open_ring(ring);
                let mut distinct: Vec<LonLat> = Vec::with_capacity(vertices.len());
                for v in vertices {
                    if !distinct.contains(v) {
                        distinct.push(*v);
                    }
                }
                if distinct.len() < 3 {
                    return Err(PipelineError::InvalidGeometry(format!(
                        "polygon needs at least 3 distinct vertices, got {}",
                        distinct.len()
                    )));
                }
                if shoelace_area(vertices).abs() < 1e-12 {
                    return Err(PipelineError::InvalidGeometry(
                        "polygon encloses zero area".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Region::Point { lon, lat } => Bounds::new(*lon, *lon, *lat, *lat),
            Region::Polygon { ring } => ring.iter().fold(
                Bounds::new(f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
                |b, p| Bounds::new(b.min_lon.min(p.lon), b.max_lon.max(p.lon), b.min_lat.min(p.lat), b.max_lat.max(p.lat)),
            ),
        }
    }

    /// Even-odd point-in-polygon test. A point region contains nothing;
    /// its single grid pixel is marked inside by [`AnalysisGrid::for_region`].
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let ring = match self {
            Region::Point { .. } => return false,
            Region::Polygon { ring } => open_ring(ring),
        };
        let mut inside = false;
        let n = ring.len();
        let mut j = n.wrapping_sub(1);
        for i in 0..n {
            let (a, b) = (ring[i], ring[j]);
            if (a.lat > lat) != (b.lat > lat) {
                let x = (b.lon - a.lon) * (lat - a.lat) / (b.lat - a.lat) + a.lon;
                if lon < x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

/// Drop a repeated closing vertex if present.
fn open_ring(ring: &[LonLat]) -> &[LonLat] {
    match (ring.first(), ring.last()) {
        (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
        _ => ring,
    }
}

fn shoelace_area(ring: &[LonLat]) -> f64 {
    let n = ring.len();
    (0..n)
        .map(|i| {
            let (a, b) = (ring[i], ring[(i + 1) % n]);
            a.lon * b.lat - b.lon * a.lat
        })
        .sum::<f64>()
        / 2.0
}

/// Sampling grid covering a region's bounding box at a fixed scale.
///
/// Row 0 is the northern edge. Pixels whose centre falls outside the region
/// carry no value in any raster built on the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisGrid {
    pub width: usize,
    pub height: usize,
    pub bounds: Bounds,
    inside: Vec<bool>,
}

impl AnalysisGrid {
    /// Build the grid for `region` at `scale_m` metres per pixel.
    ///
    /// Longitude spacing is widened by 1/cos(mid-latitude) so pixels stay
    /// roughly square on the ground.
    pub fn for_region(region: &Region, scale_m: f64, max_pixels: usize) -> PipelineResult<Self> {
        region.validate()?;
        if !(scale_m.is_finite() && scale_m > 0.0) {
            return Err(PipelineError::InvalidRequest(format!("scale {scale_m} m must be positive")));
        }
        let b = region.bounds();
        let mid_lat = (b.min_lat + b.max_lat) / 2.0;
        let dlat = scale_m / METRES_PER_DEG;
        let dlon = scale_m / (METRES_PER_DEG * mid_lat.to_radians().cos().max(1e-6));

        if let Region::Point { lon, lat } = region {
            let bounds = Bounds::new(lon - dlon / 2.0, lon + dlon / 2.0, lat - dlat / 2.0, lat + dlat / 2.0);
            return Ok(Self { width: 1, height: 1, bounds, inside: vec![true] });
        }

        let width = (((b.max_lon - b.min_lon) / dlon).ceil() as usize).max(1);
        let height = (((b.max_lat - b.min_lat) / dlat).ceil() as usize).max(1);
        if width.saturating_mul(height) > max_pixels {
            return Err(PipelineError::InvalidGeometry(format!(
                "region needs a {width}×{height} grid at {scale_m} m, limit is {max_pixels} pixels"
            )));
        }
        let bounds = Bounds::new(
            b.min_lon,
            b.min_lon + width as f64 * dlon,
            b.max_lat - height as f64 * dlat,
            b.max_lat,
        );
        let mut grid = Self { width, height, bounds, inside: Vec::with_capacity(width * height) };
        for r in 0..height {
            for c in 0..width {
                let (lon, lat) = grid.pixel_center(r, c);
                grid.inside.push(region.contains(lon, lat));
            }
        }
        if !grid.inside.iter().any(|&i| i) {
            return Err(PipelineError::InvalidGeometry(format!(
                "region covers no pixel centre at {scale_m} m scale"
            )));
        }
        Ok(grid)
    }

    /// Grid over explicit bounds with every pixel inside. Used by tests and tools.
    pub fn from_bounds(bounds: Bounds, width: usize, height: usize) -> Self {
        Self { width, height, bounds, inside: vec![true; width * height] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixel_deg(&self) -> (f64, f64) {
        (
            (self.bounds.max_lon - self.bounds.min_lon) / self.width as f64,
            (self.bounds.max_lat - self.bounds.min_lat) / self.height as f64,
        )
    }

    /// Centre of pixel `(row, col)` as `(lon, lat)`.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let (dlon, dlat) = self.pixel_deg();
        (
            self.bounds.min_lon + (col as f64 + 0.5) * dlon,
            self.bounds.max_lat - (row as f64 + 0.5) * dlat,
        )
    }

    /// Latitude span `(south, north)` of a pixel row.
    pub fn row_lat_span(&self, row: usize) -> (f64, f64) {
        let (_, dlat) = self.pixel_deg();
        let north = self.bounds.max_lat - row as f64 * dlat;
        (north - dlat, north)
    }

    #[inline]
    pub fn is_inside(&self, idx: usize) -> bool {
        self.inside[idx]
    }

    pub fn inside_count(&self) -> usize {
        self.inside.iter().filter(|&&i| i).count()
    }
}
