mod camera;
mod download;
mod timer;

pub use self::camera::{
    AcquireTicket, Camera, CameraError, CameraFacing, CameraOperation, CameraOutput,
    CameraResult, RawFrame, StreamId, StreamInfo, StreamRequest, DEFAULT_IDEAL_HEIGHT,
    DEFAULT_IDEAL_WIDTH,
};
pub use self::download::{
    validate_file_name, Download, DownloadError, DownloadOperation, DownloadOutput,
    DownloadResult, SaveRequest, DEFAULT_DOWNLOAD_FILE_NAME,
};
pub use self::timer::{Timer, TimerId, TimerOperation, TimerOutput};

// Crux's built-in Render capability covers view updates as-is.
pub use crux_core::render::Render;

use crate::app::App;
use crate::event::Event;

#[derive(crux_core::macros::Effect)]
#[effect(app = "App")]
pub struct Capabilities {
    pub render: Render<Event>,
    pub camera: Camera<Event>,
    pub timer: Timer<Event>,
    pub download: Download<Event>,
}
