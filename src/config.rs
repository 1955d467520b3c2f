//! Scanner configuration.
//!
//! Defaults match the printed sheet generator. A JSON profile can replace any
//! subset of the fields and a handful of `SHEET_*` environment variables
//! override the per-deployment values on top of that.

use crate::error::{Result, ScanError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Global 2-D offset added to every alignment target, in canonical pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Horizontal offset
    pub dx: f32,
    /// Vertical offset
    pub dy: f32,
}

/// Corner marker detection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerParams {
    /// Gaussian blur sigma applied before thresholding
    pub blur_sigma: f32,
    /// Adaptive threshold window side
    pub block_size: u32,
    /// Adaptive threshold offset below the local mean
    pub offset: i32,
    /// Closing radius (L-infinity)
    pub close_radius: u8,
    /// Opening radius (L-infinity)
    pub open_radius: u8,
    /// Smallest contour area kept, in pixels
    pub min_area: f64,
    /// Largest contour area kept, as a fraction of the image area
    pub max_area_fraction: f64,
    /// Accepted bounding-box aspect ratio range
    pub aspect_min: f32,
    /// Upper end of the aspect ratio range
    pub aspect_max: f32,
    /// Polygon approximation tolerance relative to the contour perimeter
    pub approx_epsilon: f64,
}

impl Default for MarkerParams {
    fn default() -> Self {
        Self {
            blur_sigma: 1.4,
            block_size: 91,
            offset: 11,
            close_radius: 4,
            open_radius: 1,
            min_area: 80.0,
            max_area_fraction: 0.05,
            aspect_min: 0.7,
            aspect_max: 1.4,
            approx_epsilon: 0.04,
        }
    }
}

/// Identifier search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentifierParams {
    /// Region most likely to hold the symbol, as `[x0, y0, x1, y1]` fractions
    pub crop: [f32; 4],
    /// Upscale factors tried after the crop
    pub upscales: Vec<u32>,
    /// Blur sigma of the smoothed variant
    pub blur_sigma: f32,
    /// Adaptive threshold window side of the binarized variant
    pub block_size: u32,
    /// Adaptive threshold offset of the binarized variant
    pub offset: i32,
}

impl Default for IdentifierParams {
    fn default() -> Self {
        Self {
            crop: [0.6, 0.0, 1.0, 0.4],
            upscales: vec![2, 3],
            blur_sigma: 0.8,
            block_size: 31,
            offset: 5,
        }
    }
}

/// Full scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Canonical pixels per layout point
    pub px_per_pt: f32,
    /// Offset added to every alignment target
    pub calibration: Calibration,
    /// Fill ratio at or above which a bubble counts as marked
    pub fill_threshold: f32,
    /// Padding around the identifier rectangle masked out of the marker search
    pub identifier_pad: i32,
    /// Marker detection
    pub markers: MarkerParams,
    /// Identifier search
    pub identifier: IdentifierParams,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            px_per_pt: 2.5,
            calibration: Calibration::default(),
            fill_threshold: 0.33,
            identifier_pad: 30,
            markers: MarkerParams::default(),
            identifier: IdentifierParams::default(),
        }
    }
}

impl ScanConfig {
    /// Load a JSON profile; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse a JSON profile
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ScanError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SHEET_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = parse_override::<f32>(&lookup, "SHEET_PX_PER_PT")? {
            self.px_per_pt = v;
        }
        if let Some(v) = parse_override::<f32>(&lookup, "SHEET_CALIB_X")? {
            self.calibration.dx = v;
        }
        if let Some(v) = parse_override::<f32>(&lookup, "SHEET_CALIB_Y")? {
            self.calibration.dy = v;
        }
        if let Some(v) = parse_override::<f32>(&lookup, "SHEET_FILL_THRESHOLD")? {
            self.fill_threshold = v;
        }
        if let Some(v) = parse_override::<i32>(&lookup, "SHEET_QR_PAD")? {
            self.identifier_pad = v;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if !(self.px_per_pt.is_finite() && self.px_per_pt > 0.0) {
            return Err(ScanError::Config {
                message: format!("px_per_pt must be positive, got {}", self.px_per_pt),
            });
        }
        if !(0.0..=1.0).contains(&self.fill_threshold) {
            return Err(ScanError::Config {
                message: format!("fill_threshold must be in [0, 1], got {}", self.fill_threshold),
            });
        }
        if self.identifier.upscales.contains(&0) {
            return Err(ScanError::Config {
                message: "upscale factors must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| ScanError::Config {
            message: format!("{key}={raw:?} is not a valid value"),
        })
}
