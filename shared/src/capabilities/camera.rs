use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const DEFAULT_IDEAL_WIDTH: u32 = 1280;
pub const DEFAULT_IDEAL_HEIGHT: u32 = 720;

pub struct Camera<E> {
    context: CapabilityContext<CameraOperation, E>,
}

impl<Ev> Capability<Ev> for Camera<Ev> {
    type Operation = CameraOperation;
    type MappedSelf<MappedEv> = Camera<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Camera::new(self.context.map_event(f))
    }
}

impl<E> Camera<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<CameraOperation, E>) -> Self {
        Self { context }
    }

    /// Ask the shell to open a video stream. Resolves once the user has answered the
    /// permission prompt and the device is running.
    pub fn acquire<F>(&self, ticket: AcquireTicket, request: StreamRequest, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(CameraOperation::Acquire { ticket, request })
                .await;
            ctx.update_app(callback(result));
        });
    }

    /// Grab the current frame of a live stream as raw RGBA pixels.
    pub fn grab_frame<F>(&self, stream: StreamId, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx
                .request_from_shell(CameraOperation::GrabFrame { stream })
                .await;
            ctx.update_app(callback(result));
        });
    }

    /// Stop every track of the stream. Shells must treat unknown or already released
    /// streams as a no-op.
    pub fn release(&self, stream: StreamId) {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            ctx.notify_shell(CameraOperation::Release { stream }).await;
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraOperation {
    Acquire {
        ticket: AcquireTicket,
        request: StreamRequest,
    },
    GrabFrame {
        stream: StreamId,
    },
    Release {
        stream: StreamId,
    },
}

impl Operation for CameraOperation {
    type Output = CameraResult;
}

/// Identifies one acquire request; a stream answering an older ticket is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AcquireTicket(pub u64);

impl fmt::Display for AcquireTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "acquire#{}", self.0)
    }
}

/// Shell-assigned handle of a live video stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(pub String);

impl StreamId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    /// The selfie camera ("user" facing mode).
    Front,
    /// The rear camera ("environment" facing mode).
    #[default]
    Back,
}

impl CameraFacing {
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back => Self::Front,
        }
    }

    /// Name of the facing mode in the media-capture constraint vocabulary.
    #[must_use]
    pub const fn constraint_name(self) -> &'static str {
        match self {
            Self::Front => "user",
            Self::Back => "environment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub facing: CameraFacing,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl StreamRequest {
    pub fn new(facing: CameraFacing) -> Self {
        Self {
            facing,
            ideal_width: DEFAULT_IDEAL_WIDTH,
            ideal_height: DEFAULT_IDEAL_HEIGHT,
        }
    }

    pub fn with_ideal_resolution(mut self, width: u32, height: u32) -> Self {
        self.ideal_width = width.max(1);
        self.ideal_height = height.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub stream: StreamId,
    pub facing: CameraFacing,
    pub width: u32,
    pub height: u32,
}

/// One video frame as the shell read it off the stream: tightly packed RGBA8.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    pub stream: StreamId,
    pub width: u32,
    pub height: u32,
    #[serde(with = "serde_bytes")]
    pub rgba: Vec<u8>,
}

// Pixel data stays out of logs.
impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("stream", &self.stream)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rgba_len", &self.rgba.len())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CameraOutput {
    Stream(StreamInfo),
    Frame(RawFrame),
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("camera not supported on this platform")]
    NotSupported,

    #[error("camera unavailable: {reason}")]
    DeviceUnavailable { reason: String },
}

pub type CameraResult = Result<CameraOutput, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_flip_round_trips() {
        assert_eq!(CameraFacing::Back.flipped(), CameraFacing::Front);
        assert_eq!(CameraFacing::Front.flipped().flipped(), CameraFacing::Front);
    }

    #[test]
    fn facing_uses_media_constraint_names() {
        assert_eq!(CameraFacing::Front.constraint_name(), "user");
        assert_eq!(CameraFacing::Back.constraint_name(), "environment");
    }

    #[test]
    fn stream_request_defaults_to_720p() {
        let request = StreamRequest::new(CameraFacing::Back);
        assert_eq!(request.ideal_width, 1280);
        assert_eq!(request.ideal_height, 720);

        let clamped = request.with_ideal_resolution(0, 0);
        assert_eq!((clamped.ideal_width, clamped.ideal_height), (1, 1));
    }

    #[test]
    fn raw_frame_debug_hides_pixels() {
        let frame = RawFrame {
            stream: StreamId::new("s1"),
            width: 2,
            height: 1,
            rgba: vec![7; 8],
        };
        let rendered = format!("{frame:?}");
        assert!(rendered.contains("rgba_len: 8"));
        assert!(!rendered.contains("[7, 7"));
    }
}
