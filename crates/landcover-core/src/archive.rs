//! Raster query client contract and an in-memory archive backend.
//!
//! The remote archive is an opaque dependency: given a region, a date range and
//! a band name it returns the classified rasters intersecting both, or an empty
//! set. Absence of imagery is a normal outcome, never an error.

use std::path::Path;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ArchiveLoadError, QueryError};
use crate::geometry::Region;
use crate::raster::{ClassRaster, RasterSet};
use crate::window::DateRange;

#[async_trait]
pub trait RasterArchive: Send + Sync {
    /// Rasters of `band` acquired within `range` whose footprint intersects `region`.
    async fn query(&self, region: &Region, range: &DateRange, band: &str) -> Result<RasterSet, QueryError>;
}

/// One classified acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub acquired: NaiveDate,
    pub band: String,
    pub raster: ClassRaster,
}

/// Scenes held in memory, ordered by acquisition date.
#[derive(Debug, Clone, Default)]
pub struct InMemoryArchive {
    scenes: Vec<Scene>,
}

impl InMemoryArchive {
    /// Rejects any scene whose raster does not match its own dimensions.
    pub fn new(mut scenes: Vec<Scene>) -> Result<Self, ArchiveLoadError> {
        if let Some(bad) = scenes.iter().find(|s| !s.raster.is_consistent()) {
            return Err(ArchiveLoadError::Malformed {
                id: bad.id.clone(),
                message: "raster data length or bounds do not match its dimensions".to_string(),
            });
        }
        scenes.sort_by(|a, b| a.acquired.cmp(&b.acquired).then_with(|| a.id.cmp(&b.id)));
        Ok(Self { scenes })
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Load every `*.json` scene file in `dir`.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ArchiveLoadError> {
        let dir = dir.as_ref();
        let io_err = |source| ArchiveLoadError::Io { path: dir.display().to_string(), source };
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(io_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?
            .into_iter()
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|x| x == "json"))
            .collect();
        paths.sort();

        let mut scenes = Vec::with_capacity(paths.len());
        for path in paths {
            let text = std::fs::read_to_string(&path).map_err(|source| ArchiveLoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let scene: Scene = serde_json::from_str(&text).map_err(|source| ArchiveLoadError::Decode {
                path: path.display().to_string(),
                source,
            })?;
            scenes.push(scene);
        }
        debug!(dir = %dir.display(), scenes = scenes.len(), "loaded scene archive");
        Self::new(scenes)
    }
}

#[async_trait]
impl RasterArchive for InMemoryArchive {
    async fn query(&self, region: &Region, range: &DateRange, band: &str) -> Result<RasterSet, QueryError> {
        if band.is_empty() {
            return Err(QueryError::Fatal("band name is empty".to_string()));
        }
        if range.end <= range.start {
            return Err(QueryError::Fatal(format!("empty date range {}..{}", range.start, range.end)));
        }
        let footprint = region.bounds();
        let rasters = self
            .scenes
            .iter()
            .filter(|s| s.band == band && range.contains(s.acquired) && s.raster.bounds.intersects(&footprint))
            .map(|s| s.raster.clone())
            .collect();
        Ok(RasterSet::new(rasters))
    }
}
