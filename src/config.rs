//! Runtime configuration.
//!
//! Every field has a default, so an empty document is a valid configuration:
//!
//! ```yaml
//! sensor:
//!   resolution_x: 4096
//!   resolution_y: 4096
//!   report_format: full
//! tracking:
//!   candidate_policy: largest_area
//! target:
//!   width_m: 0.08
//!   height_m: 0.03
//! replay:
//!   frame_rate_hz: 200.0
//!   max_packet_words: 129
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::packet::MAX_KNOWN_WORDS;
use crate::pose::{CameraIntrinsics, TargetGeometry};
use crate::sensor::ReportFormat;
use crate::tracking::CandidatePolicy;
use crate::{Result, TrackingError};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PixtrackConfig {
    pub sensor: SensorConfig,
    pub tracking: TrackingConfig,
    pub target: TargetConfig,
    pub replay: ReplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Interpolated output resolution.
    pub resolution_x: u16,
    pub resolution_y: u16,
    pub report_format: ReportFormat,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self { resolution_x: 4096, resolution_y: 4096, report_format: ReportFormat::Full }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub candidate_policy: CandidatePolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub width_m: f64,
    pub height_m: f64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        let geometry = TargetGeometry::default();
        Self { width_m: geometry.width_m, height_m: geometry.height_m }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Pace replayed frames at this rate. Unpaced when absent.
    pub frame_rate_hz: Option<f64>,
    /// Largest header word count accepted before resynchronizing.
    pub max_packet_words: u8,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { frame_rate_hz: None, max_packet_words: MAX_KNOWN_WORDS }
    }
}

impl ReplayConfig {
    /// Interval between paced frames, `None` when unpaced or the rate is unusable.
    pub fn frame_period(&self) -> Option<Duration> {
        let rate = self.frame_rate_hz?;
        Duration::try_from_secs_f64(1.0 / rate).ok().filter(|period| !period.is_zero())
    }
}

impl PixtrackConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensor.resolution_x == 0 || self.sensor.resolution_y == 0 {
            return Err(TrackingError::config(format!(
                "sensor resolution must be non-zero, got {}x{}",
                self.sensor.resolution_x, self.sensor.resolution_y
            )));
        }
        if !is_positive(self.target.width_m) || !is_positive(self.target.height_m) {
            return Err(TrackingError::config(format!(
                "target size must be positive, got {} x {} m",
                self.target.width_m, self.target.height_m
            )));
        }
        if let Some(rate) = self.replay.frame_rate_hz {
            if !is_positive(rate) {
                return Err(TrackingError::config(format!(
                    "replay frame rate must be positive, got {}",
                    rate
                )));
            }
            if self.replay.frame_period().is_none() {
                return Err(TrackingError::config(format!(
                    "replay frame rate {} is too high to pace",
                    rate
                )));
            }
        }
        if self.replay.max_packet_words < MAX_KNOWN_WORDS {
            return Err(TrackingError::config(format!(
                "max_packet_words {} is below the largest packet ({} words)",
                self.replay.max_packet_words, MAX_KNOWN_WORDS
            )));
        }
        Ok(())
    }

    pub fn intrinsics(&self) -> CameraIntrinsics {
        CameraIntrinsics::from_resolution(self.sensor.resolution_x, self.sensor.resolution_y)
    }

    pub fn target(&self) -> TargetGeometry {
        TargetGeometry { width_m: self.target.width_m, height_m: self.target.height_m }
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
