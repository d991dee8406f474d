#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod camera_session;
pub mod capabilities;
pub mod capture;
pub mod config;
pub mod event;
pub mod loading_animation;
pub mod model;
pub mod simulator;
pub mod view;

#[cfg(feature = "headless")]
pub mod shell;

use serde::{Deserialize, Serialize};

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::AppConfig;
pub use event::{Event, SelectedFile};
pub use model::{AppState, Model};
pub use view::ViewModel;

use capabilities::{CameraError, DownloadError};
use capture::CaptureError;
use config::ConfigError;
use simulator::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    CameraPermissionDenied,
    CameraNotSupported,
    CameraUnavailable,
    CaptureNotReady,
    CaptureFailed,
    ProcessingFailure,
    DownloadFailed,
    InvalidConfig,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::CameraPermissionDenied => "CAMERA_PERMISSION_DENIED",
            Self::CameraNotSupported => "CAMERA_NOT_SUPPORTED",
            Self::CameraUnavailable => "CAMERA_UNAVAILABLE",
            Self::CaptureNotReady => "CAPTURE_NOT_READY",
            Self::CaptureFailed => "CAPTURE_FAILED",
            Self::ProcessingFailure => "PROCESSING_FAILURE",
            Self::DownloadFailed => "DOWNLOAD_FAILED",
            Self::InvalidConfig => "INVALID_CONFIG",
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        !matches!(self, Self::CameraNotSupported | Self::InvalidConfig)
    }

    /// Where the shell shows this kind of error unless the caller overrides it.
    #[must_use]
    pub const fn default_placement(self) -> ErrorPlacement {
        match self {
            Self::CameraPermissionDenied
            | Self::CameraUnavailable
            | Self::CaptureNotReady
            | Self::CaptureFailed => ErrorPlacement::Inline,

            Self::CameraNotSupported
            | Self::ProcessingFailure
            | Self::DownloadFailed
            | Self::InvalidConfig => ErrorPlacement::Banner,
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::CameraNotSupported => "Camera Not Supported",
            Self::CameraPermissionDenied | Self::CameraUnavailable => "Camera Error",
            Self::DownloadFailed => "Download Failed",
            Self::CaptureNotReady
            | Self::CaptureFailed
            | Self::ProcessingFailure
            | Self::InvalidConfig => "Error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPlacement {
    /// Inside the camera view, next to a retry action.
    Inline,
    /// A dismissible notice over whatever view is current.
    Banner,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub placement: ErrorPlacement,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            placement: kind.default_placement(),
        }
    }

    #[must_use]
    pub fn with_placement(mut self, placement: ErrorPlacement) -> Self {
        self.placement = placement;
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::CameraPermissionDenied => {
                "Could not access camera. Please ensure you've granted camera permissions.".into()
            }
            ErrorKind::CameraNotSupported => {
                "Your device doesn't support camera access. Please try uploading an image instead."
                    .into()
            }
            ErrorKind::CameraUnavailable => {
                "The camera is unavailable. Please close other apps using it and try again.".into()
            }
            ErrorKind::CaptureNotReady => {
                "The camera isn't ready yet. Please wait a moment and try again.".into()
            }
            ErrorKind::CaptureFailed => "Failed to capture the image. Please try again.".into(),
            ErrorKind::ProcessingFailure => {
                "Failed to process the image. Please try again.".into()
            }
            ErrorKind::DownloadFailed => "Could not save the image. Please try again.".into(),
            ErrorKind::InvalidConfig => self.message.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

impl From<CameraError> for AppError {
    fn from(e: CameraError) -> Self {
        let kind = match &e {
            CameraError::PermissionDenied => ErrorKind::CameraPermissionDenied,
            CameraError::NotSupported => ErrorKind::CameraNotSupported,
            CameraError::DeviceUnavailable { .. } => ErrorKind::CameraUnavailable,
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<CaptureError> for AppError {
    fn from(e: CaptureError) -> Self {
        let kind = if e.is_not_ready() {
            ErrorKind::CaptureNotReady
        } else {
            ErrorKind::CaptureFailed
        };
        AppError::new(kind, e.to_string())
    }
}

impl From<SimulationError> for AppError {
    fn from(e: SimulationError) -> Self {
        AppError::new(ErrorKind::ProcessingFailure, e.to_string())
    }
}

impl From<DownloadError> for AppError {
    fn from(e: DownloadError) -> Self {
        AppError::new(ErrorKind::DownloadFailed, e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::InvalidConfig, format!("Invalid configuration: {e}"))
    }
}
