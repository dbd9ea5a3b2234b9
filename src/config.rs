//! Engine tuning knobs.
//!
//! All sizes are expressed in target-local units before the uniform fit scale
//! of the loaded target is applied; see [`EngineConfig::zone_extent`] and
//! friends for the world-space values the engine actually uses.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geom::Tolerance;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("`{field}` must be a finite positive number, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("`{field}` must lie between 0 and 1, got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },
    #[error("invalid configuration: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Side length of a zone decal.
    pub zone_size: f64,
    /// Side length of a sticker decal before `sticker_scale` is applied.
    pub sticker_size: f64,
    pub sticker_scale: f64,
    /// Fraction of the zone size within which a marker counts as matching.
    pub match_fraction: f64,
    /// Projection box depth as a fraction of the decal width.
    pub depth_fraction: f64,
    /// Lift of the fallback quad along the surface normal.
    pub surface_offset: f64,
    /// Lift of review ghosts along the surface normal.
    pub ghost_offset: f64,
    /// Largest dimension a loaded target is scaled to.
    pub fit_size: f64,
    pub tolerance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            zone_size: 0.15,
            sticker_size: 0.25,
            sticker_scale: 0.8,
            match_fraction: 0.8,
            depth_fraction: 0.4,
            surface_offset: 0.02,
            ghost_offset: 0.05,
            fit_size: 4.0,
            tolerance: 1e-9,
        }
    }
}

impl EngineConfig {
    /// Parses a JSON config; absent fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("zoneSize", self.zone_size),
            ("stickerSize", self.sticker_size),
            ("stickerScale", self.sticker_scale),
            ("matchFraction", self.match_fraction),
            ("depthFraction", self.depth_fraction),
            ("fitSize", self.fit_size),
            ("tolerance", self.tolerance),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        for (field, value) in [("surfaceOffset", self.surface_offset), ("ghostOffset", self.ghost_offset)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NotPositive { field, value });
            }
        }
        if self.match_fraction > 1.0 {
            return Err(ConfigError::OutOfUnitRange {
                field: "matchFraction",
                value: self.match_fraction,
            });
        }
        Ok(())
    }

    /// World-space side length of a zone decal on a target with `uniform_scale`.
    #[must_use]
    pub fn zone_extent(&self, uniform_scale: f64) -> f64 {
        self.zone_size * uniform_scale
    }

    #[must_use]
    pub fn sticker_extent(&self, uniform_scale: f64) -> f64 {
        self.sticker_size * uniform_scale * self.sticker_scale
    }

    /// Maximum marker distance (target-local units) for a zone to count as matched.
    #[must_use]
    pub fn match_threshold(&self, uniform_scale: f64) -> f64 {
        self.zone_extent(uniform_scale) * self.match_fraction
    }

    #[must_use]
    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.tolerance)
    }
}
