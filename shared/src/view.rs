use serde::{Deserialize, Serialize};

use crate::capabilities::CameraFacing;
use crate::capture::CapturedImage;
use crate::loading_animation::{ParticleField, LINK_COLOR};
use crate::model::{AppState, CameraFlow, CameraPhase, Flow, Model, Notice};
use crate::{AppError, ErrorPlacement};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub title: String,
    pub message: String,
    pub placement: ErrorPlacement,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            title: e.kind.title().to_string(),
            message: e.user_facing_message(),
            placement: e.placement,
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImagePreview {
    pub file_name: String,
    pub mime_type: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl From<&CapturedImage> for ImagePreview {
    fn from(image: &CapturedImage) -> Self {
        Self {
            file_name: image.file_name().to_string(),
            mime_type: image.mime_type().to_string(),
            width: image.width(),
            height: image.height(),
            data: image.data().to_vec(),
        }
    }
}

impl std::fmt::Debug for ImagePreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePreview")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CameraViewPhase {
    Starting,
    Live,
    Preview,
    Failed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CameraView {
    pub facing: CameraFacing,
    pub phase: CameraViewPhase,
    /// Shell attaches this stream to its video element while live.
    pub stream: Option<String>,
    pub preview: Option<ImagePreview>,
    pub capture_in_flight: bool,
    pub can_capture: bool,
    pub error: Option<UserFacingError>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ParticleView {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub color: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LinkView {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AnimationView {
    pub width: u32,
    pub height: u32,
    pub particles: Vec<ParticleView>,
    pub links: Vec<LinkView>,
    pub link_color: String,
}

impl From<&ParticleField> for AnimationView {
    fn from(field: &ParticleField) -> Self {
        let particles = field.particles();
        let (width, height) = field.size();
        Self {
            width,
            height,
            particles: particles
                .iter()
                .map(|p| ParticleView {
                    x: p.x,
                    y: p.y,
                    size: p.size,
                    color: p.color.css(),
                })
                .collect(),
            links: field
                .links()
                .into_iter()
                .map(|link| LinkView {
                    x1: particles[link.from].x,
                    y1: particles[link.from].y,
                    x2: particles[link.to].x,
                    y2: particles[link.to].y,
                })
                .collect(),
            link_color: LINK_COLOR.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Idle {
        /// `None` while unknown; the take-photo action stays enabled.
        camera_supported: Option<bool>,
    },
    Camera(CameraView),
    Uploading {
        progress: u8,
        image: ImagePreview,
    },
    Processing {
        image: ImagePreview,
        animation: Option<AnimationView>,
    },
    Result {
        label: String,
        confidence_percent: u8,
        image: ImagePreview,
        download_in_flight: bool,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ViewModel {
    pub app_state: AppState,
    pub state: ViewState,
    pub progress: u8,
    /// Banner errors only; inline errors live in [`CameraView`].
    pub error: Option<UserFacingError>,
    pub notice: Option<Notice>,
}

fn camera_view(camera: &CameraFlow, model: &Model) -> CameraView {
    let (phase, preview) = match &camera.phase {
        CameraPhase::Starting => (CameraViewPhase::Starting, None),
        CameraPhase::Live => (CameraViewPhase::Live, None),
        CameraPhase::Preview(image) => (CameraViewPhase::Preview, Some(ImagePreview::from(image))),
        CameraPhase::Failed(_) => (CameraViewPhase::Failed, None),
    };

    let stream = model
        .sessions
        .live()
        .map(|session| session.stream.as_str().to_string());

    CameraView {
        facing: camera.facing,
        phase,
        can_capture: phase == CameraViewPhase::Live && !camera.capture_in_flight,
        stream,
        preview,
        capture_in_flight: camera.capture_in_flight,
        error: model
            .active_error
            .as_ref()
            .filter(|e| e.placement == ErrorPlacement::Inline)
            .map(UserFacingError::from),
    }
}

pub fn build(model: &Model) -> ViewModel {
    let state = match &model.flow {
        Flow::Idle => ViewState::Idle {
            camera_supported: model.camera_supported,
        },
        Flow::Camera(camera) => ViewState::Camera(camera_view(camera, model)),
        Flow::Identifying(sim) => match model.state() {
            AppState::Uploading => ViewState::Uploading {
                progress: sim.progress(),
                image: ImagePreview::from(sim.image()),
            },
            _ => ViewState::Processing {
                image: ImagePreview::from(sim.image()),
                animation: model.loading_animation.as_ref().map(AnimationView::from),
            },
        },
        Flow::Result(result) => ViewState::Result {
            label: result.identification.label.clone(),
            confidence_percent: result.identification.confidence_percent,
            image: ImagePreview::from(&result.image),
            download_in_flight: model.download_in_flight,
        },
    };

    ViewModel {
        app_state: model.state(),
        state,
        progress: model.progress(),
        error: model
            .active_error
            .as_ref()
            .filter(|e| e.placement == ErrorPlacement::Banner)
            .map(UserFacingError::from),
        notice: model.notice.clone(),
    }
}
