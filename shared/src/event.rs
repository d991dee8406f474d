use serde::{Deserialize, Serialize};
use std::fmt;

use crate::capabilities::{
    AcquireTicket, CameraResult, DownloadResult, StreamId, TimerId, TimerOutput,
};
use crate::config::AppConfig;

// --- A file handed over by the picker or a drop ---

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

impl fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

// --- Event enum: large variants boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    // Shell lifecycle
    CameraSupportReported {
        supported: bool,
    },
    ConfigLoaded(Box<AppConfig>),
    Teardown,

    // Idle
    TakePhotoRequested,
    FileSelected(Box<SelectedFile>),
    FileDropped(Box<SelectedFile>),

    // Camera
    FlipCameraRequested,
    CaptureRequested,
    RetakeRequested,
    CaptureSubmitted,
    RetryCameraRequested,

    // Anywhere
    CancelRequested,
    NewIdentificationRequested,
    DownloadRequested,
    ErrorDismissed,
    NoticeDismissed,
    AnimationFrame {
        width: u32,
        height: u32,
    },

    // Capability responses
    #[serde(skip)]
    CameraAcquired {
        ticket: AcquireTicket,
        result: Box<CameraResult>,
    },
    #[serde(skip)]
    FrameGrabbed {
        stream: StreamId,
        result: Box<CameraResult>,
    },
    #[serde(skip)]
    TimerElapsed(TimerOutput),
    #[serde(skip)]
    DownloadFinished {
        attempt: TimerId,
        result: Box<DownloadResult>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::CameraSupportReported { .. } => "camera_support_reported",
            Event::ConfigLoaded(_) => "config_loaded",
            Event::Teardown => "teardown",
            Event::TakePhotoRequested => "take_photo_requested",
            Event::FileSelected(_) => "file_selected",
            Event::FileDropped(_) => "file_dropped",
            Event::FlipCameraRequested => "flip_camera_requested",
            Event::CaptureRequested => "capture_requested",
            Event::RetakeRequested => "retake_requested",
            Event::CaptureSubmitted => "capture_submitted",
            Event::RetryCameraRequested => "retry_camera_requested",
            Event::CancelRequested => "cancel_requested",
            Event::NewIdentificationRequested => "new_identification_requested",
            Event::DownloadRequested => "download_requested",
            Event::ErrorDismissed => "error_dismissed",
            Event::NoticeDismissed => "notice_dismissed",
            Event::AnimationFrame { .. } => "animation_frame",
            Event::CameraAcquired { .. } => "camera_acquired",
            Event::FrameGrabbed { .. } => "frame_grabbed",
            Event::TimerElapsed(_) => "timer_elapsed",
            Event::DownloadFinished { .. } => "download_finished",
        }
    }

    pub fn is_user_initiated(&self) -> bool {
        matches!(
            self,
            Event::TakePhotoRequested
                | Event::FileSelected(_)
                | Event::FileDropped(_)
                | Event::FlipCameraRequested
                | Event::CaptureRequested
                | Event::RetakeRequested
                | Event::CaptureSubmitted
                | Event::RetryCameraRequested
                | Event::CancelRequested
                | Event::NewIdentificationRequested
                | Event::DownloadRequested
                | Event::ErrorDismissed
                | Event::NoticeDismissed
        )
    }
}
