use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::capabilities::{CameraError, RawFrame, StreamId, StreamInfo, StreamRequest};

/// Camera hardware as seen by the headless shell.
#[async_trait::async_trait]
pub trait MediaDevices: Send + Sync {
    fn is_supported(&self) -> bool;

    /// Open a stream, prompting for permission if the platform does.
    async fn acquire(&self, request: &StreamRequest) -> Result<StreamInfo, CameraError>;

    async fn grab_frame(&self, stream: &StreamId) -> Result<RawFrame, CameraError>;

    /// Stop every track of `stream`. Unknown or already stopped streams are ignored.
    fn release(&self, stream: &StreamId);
}

/// Synthetic camera for tests and tooling.
///
/// Frames are a deterministic gradient. The first `warm_up_frames` grabs of each stream
/// report zero dimensions, the way a video element does before its metadata loads.
pub struct FakeMediaDevices {
    supported: bool,
    permission_granted: AtomicBool,
    frame_width: u32,
    frame_height: u32,
    warm_up_frames: u32,
    warm_up_remaining: AtomicU32,
    next_stream: AtomicU64,
    acquired_total: AtomicU64,
    live: Mutex<HashSet<StreamId>>,
}

impl Default for FakeMediaDevices {
    fn default() -> Self {
        Self {
            supported: true,
            permission_granted: AtomicBool::new(true),
            frame_width: 64,
            frame_height: 48,
            warm_up_frames: 0,
            warm_up_remaining: AtomicU32::new(0),
            next_stream: AtomicU64::new(0),
            acquired_total: AtomicU64::new(0),
            live: Mutex::new(HashSet::new()),
        }
    }
}

impl FakeMediaDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::default()
        }
    }

    pub fn with_permission(self, granted: bool) -> Self {
        self.permission_granted.store(granted, Ordering::SeqCst);
        self
    }

    pub fn with_frame_size(mut self, width: u32, height: u32) -> Self {
        self.frame_width = width;
        self.frame_height = height;
        self
    }

    pub fn with_warm_up_frames(mut self, frames: u32) -> Self {
        self.warm_up_frames = frames;
        self
    }

    /// Simulates the user changing the permission in system settings.
    pub fn set_permission(&self, granted: bool) {
        self.permission_granted.store(granted, Ordering::SeqCst);
    }

    pub fn live_tracks(&self) -> usize {
        self.live().len()
    }

    pub fn acquired_total(&self) -> u64 {
        self.acquired_total.load(Ordering::SeqCst)
    }

    fn live(&self) -> MutexGuard<'_, HashSet<StreamId>> {
        match self.live.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn gradient(&self) -> Vec<u8> {
        let (w, h) = (self.frame_width, self.frame_height);
        let mut rgba = Vec::with_capacity((w as usize) * (h as usize) * 4);
        for y in 0..h {
            for x in 0..w {
                rgba.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 96, 255]);
            }
        }
        rgba
    }
}

#[async_trait::async_trait]
impl MediaDevices for FakeMediaDevices {
    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn acquire(&self, request: &StreamRequest) -> Result<StreamInfo, CameraError> {
        if !self.supported {
            return Err(CameraError::NotSupported);
        }
        if !self.permission_granted.load(Ordering::SeqCst) {
            return Err(CameraError::PermissionDenied);
        }

        let n = self.next_stream.fetch_add(1, Ordering::SeqCst) + 1;
        let stream = StreamId::new(format!("fake-{n}"));
        self.live().insert(stream.clone());
        self.acquired_total.fetch_add(1, Ordering::SeqCst);
        self.warm_up_remaining
            .store(self.warm_up_frames, Ordering::SeqCst);
        debug!(%stream, facing = request.facing.constraint_name(), "fake camera acquired");

        Ok(StreamInfo {
            stream,
            facing: request.facing,
            width: self.frame_width,
            height: self.frame_height,
        })
    }

    async fn grab_frame(&self, stream: &StreamId) -> Result<RawFrame, CameraError> {
        if !self.live().contains(stream) {
            return Err(CameraError::DeviceUnavailable {
                reason: format!("stream {stream} is not live"),
            });
        }

        let warming = self
            .warm_up_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if warming {
            return Ok(RawFrame {
                stream: stream.clone(),
                width: 0,
                height: 0,
                rgba: Vec::new(),
            });
        }

        Ok(RawFrame {
            stream: stream.clone(),
            width: self.frame_width,
            height: self.frame_height,
            rgba: self.gradient(),
        })
    }

    fn release(&self, stream: &StreamId) {
        if self.live().remove(stream) {
            debug!(%stream, "fake camera released");
        }
    }
}
