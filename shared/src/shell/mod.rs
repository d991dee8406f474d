//! A tokio-driven shell that runs the core without a platform host.
//!
//! Effects are executed in the order the core emits them. Camera requests go to a
//! [`MediaDevices`] implementation, timers are tokio sleeps whose ids come back over a
//! channel, and downloads are written into a directory on disk.

mod devices;

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;

use crux_core::{Core, Request};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub use self::devices::{FakeMediaDevices, MediaDevices};

use crate::capabilities::{
    validate_file_name, CameraOperation, CameraOutput, DownloadError, DownloadOperation,
    DownloadOutput, DownloadResult, SaveRequest, TimerId, TimerOperation, TimerOutput,
};
use crate::{App, Capabilities, Effect, Event, ViewModel};

struct PendingTimer {
    request: Request<TimerOperation>,
    task: JoinHandle<()>,
}

pub struct HeadlessShell<D: MediaDevices> {
    core: Core<Effect, App>,
    devices: D,
    download_dir: PathBuf,
    timers: HashMap<TimerId, PendingTimer>,
    fired_tx: mpsc::UnboundedSender<TimerId>,
    fired_rx: mpsc::UnboundedReceiver<TimerId>,
    renders: usize,
}

impl<D: MediaDevices> HeadlessShell<D> {
    pub fn new(devices: D, download_dir: impl Into<PathBuf>) -> Self {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        Self {
            core: Core::new::<Capabilities>(),
            devices,
            download_dir: download_dir.into(),
            timers: HashMap::new(),
            fired_tx,
            fired_rx,
            renders: 0,
        }
    }

    /// Report platform capabilities to the core.
    pub async fn start(&mut self) {
        let supported = self.devices.is_supported();
        self.dispatch(Event::CameraSupportReported { supported })
            .await;
    }

    /// Process one event and every effect that follows from it, except timers still
    /// sleeping.
    pub async fn dispatch(&mut self, event: Event) {
        debug!(event = event.name(), "dispatch");
        let effects = self.core.process_event(event);
        self.run_effects(effects).await;
    }

    /// Wait for the next timer to fire and process it. Returns `false` when no timer is
    /// pending.
    pub async fn advance(&mut self) -> bool {
        while !self.timers.is_empty() {
            let Some(id) = self.fired_rx.recv().await else {
                return false;
            };
            // A firing can race a cancel; the request is already gone then.
            let Some(mut pending) = self.timers.remove(&id) else {
                continue;
            };
            debug!(%id, "timer fired");
            let effects = self
                .core
                .resolve(&mut pending.request, TimerOutput::Fired { id });
            self.run_effects(effects).await;
            return true;
        }
        false
    }

    /// Fire timers until none is pending.
    pub async fn run_until_idle(&mut self) {
        while self.advance().await {}
    }

    pub fn view(&self) -> ViewModel {
        self.core.view()
    }

    pub fn devices(&self) -> &D {
        &self.devices
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Render(_) => {
                    self.renders += 1;
                    debug!(renders = self.renders, "render");
                }

                Effect::Camera(mut request) => {
                    let operation = request.operation.clone();
                    debug!(?operation, "camera effect");
                    match operation {
                        CameraOperation::Acquire { request: stream_request, .. } => {
                            let result = self
                                .devices
                                .acquire(&stream_request)
                                .await
                                .map(CameraOutput::Stream);
                            queue.extend(self.core.resolve(&mut request, result));
                        }
                        CameraOperation::GrabFrame { stream } => {
                            let result = self
                                .devices
                                .grab_frame(&stream)
                                .await
                                .map(CameraOutput::Frame);
                            queue.extend(self.core.resolve(&mut request, result));
                        }
                        CameraOperation::Release { stream } => {
                            self.devices.release(&stream);
                        }
                    }
                }

                Effect::Timer(request) => {
                    let operation = request.operation;
                    debug!(?operation, "timer effect");
                    match operation {
                        TimerOperation::Start { id, millis } => {
                            let tx = self.fired_tx.clone();
                            let task = tokio::spawn(async move {
                                tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
                                let _ = tx.send(id);
                            });
                            if let Some(previous) =
                                self.timers.insert(id, PendingTimer { request, task })
                            {
                                previous.task.abort();
                            }
                        }
                        TimerOperation::Cancel { id } => {
                            if let Some(pending) = self.timers.remove(&id) {
                                pending.task.abort();
                            }
                        }
                    }
                }

                Effect::Download(mut request) => {
                    let DownloadOperation::Save(save) = request.operation.clone();
                    debug!(?save, "download effect");
                    let result = self.save(save).await;
                    queue.extend(self.core.resolve(&mut request, result));
                }
            }
        }
    }

    async fn save(&self, save: SaveRequest) -> DownloadResult {
        validate_file_name(&save.file_name)?;
        let path = self.download_dir.join(&save.file_name);
        tokio::fs::write(&path, &save.data)
            .await
            .map_err(|e| DownloadError::Failed {
                reason: e.to_string(),
            })?;
        Ok(DownloadOutput::Saved {
            file_name: save.file_name,
        })
    }
}

impl<D: MediaDevices> Drop for HeadlessShell<D> {
    fn drop(&mut self) {
        for (_, pending) in self.timers.drain() {
            pending.task.abort();
        }
    }
}
