//! Pipeline configuration, loadable from TOML. Every key has a default.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::area::{AreaUnit, PixelAreaReference};
use crate::error::ConfigError;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
    #[serde(default = "default_end_date")]
    pub end_date: NaiveDate,
    #[serde(default = "default_step_months")]
    pub step_months: u32,
    /// Name of the classification band in the archive.
    #[serde(default = "default_band")]
    pub band: String,
    /// Ground size of an analysis-grid pixel, metres.
    #[serde(default = "default_scale_m")]
    pub scale_m: f64,
    #[serde(default = "default_max_pixels")]
    pub max_pixels: usize,
    #[serde(default)]
    pub unit: AreaUnit,
    #[serde(default)]
    pub pixel_area: PixelAreaReference,
    /// Windows materialised at the same time.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Timeout for a single query attempt.
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Clip the query range of the last window to `end_date`.
    #[serde(default)]
    pub clip_queries_to_range: bool,
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2017, 4, 1).unwrap_or_default()
}

fn default_end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2022, 7, 1).unwrap_or_default()
}

fn default_step_months() -> u32 {
    3
}

fn default_band() -> String {
    "SCL".to_string()
}

fn default_scale_m() -> f64 {
    100.0
}

fn default_max_pixels() -> usize {
    4_000_000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_query_timeout_ms() -> u64 {
    30_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            start_date: default_start_date(),
            end_date: default_end_date(),
            step_months: default_step_months(),
            band: default_band(),
            scale_m: default_scale_m(),
            max_pixels: default_max_pixels(),
            unit: AreaUnit::default(),
            pixel_area: PixelAreaReference::default(),
            max_concurrency: default_max_concurrency(),
            query_timeout_ms: default_query_timeout_ms(),
            retry: RetryPolicy::default(),
            clip_queries_to_range: false,
        }
    }
}

impl PipelineConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let cfg = Self::from_toml_str(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })?;
        Ok(cfg)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut cfg: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        cfg.retry = cfg.retry.normalized();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_months == 0 {
            return Err(ConfigError::Invalid { key: "step_months", message: "must be at least 1".into() });
        }
        if !(self.scale_m.is_finite() && self.scale_m > 0.0) {
            return Err(ConfigError::Invalid { key: "scale_m", message: format!("{} is not positive", self.scale_m) });
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid { key: "max_concurrency", message: "must be at least 1".into() });
        }
        if self.max_pixels == 0 {
            return Err(ConfigError::Invalid { key: "max_pixels", message: "must be at least 1".into() });
        }
        if self.band.trim().is_empty() {
            return Err(ConfigError::Invalid { key: "band", message: "must not be empty".into() });
        }
        if let PixelAreaReference::Uniform { m2 } = self.pixel_area {
            if !(m2.is_finite() && m2 > 0.0) {
                return Err(ConfigError::Invalid { key: "pixel_area.m2", message: format!("{m2} is not positive") });
            }
        }
        Ok(())
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}
