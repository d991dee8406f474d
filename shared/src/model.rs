use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::camera_session::CameraSessions;
use crate::capabilities::{CameraError, CameraFacing, TimerId};
use crate::capture::CapturedImage;
use crate::config::AppConfig;
use crate::loading_animation::ParticleField;
use crate::simulator::{Identification, Simulation, SimulationPhase};
use crate::AppError;

/// The user-visible state. Always derived from [`Flow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    #[default]
    Idle,
    Camera,
    Uploading,
    Processing,
    Result,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraPhase {
    /// An acquire is outstanding.
    Starting,
    Live,
    /// A still awaits submit or retake. The stream is already released.
    Preview(CapturedImage),
    Failed(CameraError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFlow {
    pub facing: CameraFacing,
    pub phase: CameraPhase,
    /// A frame grab was requested and has not come back yet.
    pub capture_in_flight: bool,
}

impl CameraFlow {
    pub fn starting(facing: CameraFacing) -> Self {
        Self {
            facing,
            phase: CameraPhase::Starting,
            capture_in_flight: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentificationResult {
    /// Timer id of the attempt that produced this result.
    pub attempt: TimerId,
    pub identification: Identification,
    pub image: CapturedImage,
}

#[derive(Debug, Clone, Default)]
pub enum Flow {
    #[default]
    Idle,
    Camera(CameraFlow),
    Identifying(Simulation),
    Result(IdentificationResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Info,
}

/// A transient, non-error message such as "Insect Identified!".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
    pub kind: NoticeKind,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>, kind: NoticeKind) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
        }
    }
}

#[derive(Debug)]
pub struct Model {
    pub flow: Flow,
    pub config: AppConfig,
    /// `None` until the shell reports whether a camera API exists.
    pub camera_supported: Option<bool>,
    pub sessions: CameraSessions,
    pub loading_animation: Option<ParticleField>,
    pub active_error: Option<AppError>,
    pub notice: Option<Notice>,
    pub download_in_flight: bool,
    next_timer: u64,
    rng: StdRng,
}

impl Default for Model {
    fn default() -> Self {
        Self::with_rng(AppConfig::default(), StdRng::from_entropy())
    }
}

impl Model {
    pub fn new(config: AppConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Reproducible particle seeding.
    pub fn with_seed(config: AppConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: AppConfig, rng: StdRng) -> Self {
        Self {
            flow: Flow::Idle,
            config,
            camera_supported: None,
            sessions: CameraSessions::new(),
            loading_animation: None,
            active_error: None,
            notice: None,
            download_in_flight: false,
            next_timer: 0,
            rng,
        }
    }

    pub fn state(&self) -> AppState {
        match &self.flow {
            Flow::Idle => AppState::Idle,
            Flow::Camera(_) => AppState::Camera,
            Flow::Identifying(sim) => match sim.phase() {
                SimulationPhase::Uploading => AppState::Uploading,
                // A completed simulation is replaced by `Flow::Result` in the same update.
                SimulationPhase::Processing | SimulationPhase::Completed => AppState::Processing,
            },
            Flow::Result(_) => AppState::Result,
        }
    }

    /// Upload progress of the running attempt; 0 when none is running.
    pub fn progress(&self) -> u8 {
        match &self.flow {
            Flow::Identifying(sim) => sim.progress(),
            Flow::Result(_) => 100,
            Flow::Idle | Flow::Camera(_) => 0,
        }
    }

    pub fn camera(&self) -> Option<&CameraFlow> {
        match &self.flow {
            Flow::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn camera_mut(&mut self) -> Option<&mut CameraFlow> {
        match &mut self.flow {
            Flow::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn simulation(&self) -> Option<&Simulation> {
        match &self.flow {
            Flow::Identifying(sim) => Some(sim),
            _ => None,
        }
    }

    pub fn active_timer(&self) -> Option<TimerId> {
        self.simulation().map(Simulation::timer_id)
    }

    pub fn issue_timer_id(&mut self) -> TimerId {
        self.next_timer += 1;
        TimerId(self.next_timer)
    }

    pub fn seed_animation(&mut self, width: u32, height: u32) {
        self.loading_animation = Some(ParticleField::new(
            width,
            height,
            &self.config.animation,
            &mut self.rng,
        ));
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }

    pub fn show_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }
}
