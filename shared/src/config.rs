//! Tunables for the capture, simulation, animation and download features.
//!
//! Every section is a serde struct with defaults, `with_*` setters and a `validated()` clamp.
//! Shells may ship a partial JSON document; missing fields keep their defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::{
    validate_file_name, CameraFacing, DownloadError, DEFAULT_DOWNLOAD_FILE_NAME,
    DEFAULT_IDEAL_HEIGHT, DEFAULT_IDEAL_WIDTH,
};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;
pub const DEFAULT_MAX_FRAME_DIMENSION: u32 = 8192;

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_PROGRESS_STEP: u8 = 5;
pub const DEFAULT_PROCESSING_DELAY_MS: u64 = 3000;
pub const PLACEHOLDER_LABEL: &str = "Monarch Butterfly";
pub const PLACEHOLDER_CONFIDENCE_PERCENT: u8 = 98;

pub const DEFAULT_PARTICLE_COUNT: usize = 25;
pub const MAX_PARTICLE_COUNT: usize = 500;
pub const DEFAULT_LINK_DISTANCE: f32 = 100.0;
pub const DEFAULT_MAX_SPEED: f32 = 0.5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid download file name: {0}")]
    FileName(#[from] DownloadError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub capture: CaptureConfig,
    pub simulation: SimulationConfig,
    pub animation: AnimationConfig,
    pub download: DownloadConfig,
}

impl AppConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_json::from_str(json)?;
        validate_file_name(&config.download.file_name)?;
        Ok(config.validated())
    }

    pub fn validated(self) -> Self {
        Self {
            capture: self.capture.validated(),
            simulation: self.simulation.validated(),
            animation: self.animation.validated(),
            download: self.download.validated(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub facing: CameraFacing,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub jpeg_quality: u8,
    pub max_frame_dimension: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            facing: CameraFacing::Back,
            ideal_width: DEFAULT_IDEAL_WIDTH,
            ideal_height: DEFAULT_IDEAL_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_frame_dimension: DEFAULT_MAX_FRAME_DIMENSION,
        }
    }
}

impl CaptureConfig {
    pub fn with_facing(mut self, facing: CameraFacing) -> Self {
        self.facing = facing;
        self
    }

    pub fn with_ideal_resolution(mut self, width: u32, height: u32) -> Self {
        self.ideal_width = width.max(1);
        self.ideal_height = height.max(1);
        self
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn with_max_frame_dimension(mut self, max: u32) -> Self {
        self.max_frame_dimension = max.max(1);
        self
    }

    pub fn validated(mut self) -> Self {
        self.ideal_width = self.ideal_width.clamp(1, self.max_frame_dimension.max(1));
        self.ideal_height = self.ideal_height.clamp(1, self.max_frame_dimension.max(1));
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        self.max_frame_dimension = self.max_frame_dimension.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub tick_interval_ms: u64,
    pub progress_step: u8,
    pub processing_delay_ms: u64,
    pub label: String,
    pub confidence_percent: u8,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            progress_step: DEFAULT_PROGRESS_STEP,
            processing_delay_ms: DEFAULT_PROCESSING_DELAY_MS,
            label: PLACEHOLDER_LABEL.to_string(),
            confidence_percent: PLACEHOLDER_CONFIDENCE_PERCENT,
        }
    }
}

impl SimulationConfig {
    pub fn with_tick_interval_ms(mut self, millis: u64) -> Self {
        self.tick_interval_ms = millis.clamp(1, 60_000);
        self
    }

    pub fn with_progress_step(mut self, step: u8) -> Self {
        self.progress_step = step.clamp(1, 100);
        self
    }

    pub fn with_processing_delay_ms(mut self, millis: u64) -> Self {
        self.processing_delay_ms = millis.min(600_000);
        self
    }

    pub fn validated(mut self) -> Self {
        self.tick_interval_ms = self.tick_interval_ms.clamp(1, 60_000);
        self.progress_step = self.progress_step.clamp(1, 100);
        self.processing_delay_ms = self.processing_delay_ms.min(600_000);
        self.confidence_percent = self.confidence_percent.min(100);
        if self.label.trim().is_empty() {
            self.label = PLACEHOLDER_LABEL.to_string();
        }
        self
    }

    /// Number of ticks from 0 to 100.
    pub fn ticks_to_complete(&self) -> u32 {
        let step = u32::from(self.progress_step.max(1));
        100u32.div_ceil(step)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub particle_count: usize,
    pub link_distance: f32,
    /// Per-axis speed bound in pixels per frame.
    pub max_speed: f32,
    pub min_size: f32,
    pub max_size: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            particle_count: DEFAULT_PARTICLE_COUNT,
            link_distance: DEFAULT_LINK_DISTANCE,
            max_speed: DEFAULT_MAX_SPEED,
            min_size: 1.0,
            max_size: 4.0,
        }
    }
}

impl AnimationConfig {
    pub fn with_particle_count(mut self, count: usize) -> Self {
        self.particle_count = count.min(MAX_PARTICLE_COUNT);
        self
    }

    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        self.particle_count = self.particle_count.min(MAX_PARTICLE_COUNT);
        if !self.link_distance.is_finite() || self.link_distance < 0.0 {
            self.link_distance = defaults.link_distance;
        }
        if !self.max_speed.is_finite() || self.max_speed <= 0.0 {
            self.max_speed = defaults.max_speed;
        }
        if !self.min_size.is_finite()
            || !self.max_size.is_finite()
            || self.min_size <= 0.0
            || self.max_size <= self.min_size
        {
            self.min_size = defaults.min_size;
            self.max_size = defaults.max_size;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub file_name: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_DOWNLOAD_FILE_NAME.to_string(),
        }
    }
}

impl DownloadConfig {
    pub fn validated(mut self) -> Self {
        if validate_file_name(&self.file_name).is_err() {
            self.file_name = DEFAULT_DOWNLOAD_FILE_NAME.to_string();
        }
        self
    }
}
