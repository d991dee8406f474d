use std::mem;

use tracing::{debug, info, warn};

use crate::camera_session::{AcquireOutcome, SessionCommand};
use crate::capabilities::{
    AcquireTicket, CameraError, CameraFacing, CameraOutput, CameraResult, Capabilities,
    DownloadOutput, DownloadResult, SaveRequest, StreamId, StreamRequest, TimerId, TimerOutput,
};
use crate::capture::{capture_frame, is_image_mime, CaptureError, CapturedImage};
use crate::event::{Event, SelectedFile};
use crate::model::{
    AppState, CameraFlow, CameraPhase, Flow, IdentificationResult, Model, Notice, NoticeKind,
};
use crate::simulator::{Simulation, SimulationError, SimulationStep};
use crate::view::{self, ViewModel};
use crate::{AppError, ErrorPlacement};

#[derive(Default)]
pub struct App;

impl App {
    fn run_session_commands(commands: Vec<SessionCommand>, caps: &Capabilities) {
        for command in commands {
            match command {
                SessionCommand::Acquire { ticket, request } => {
                    debug!(%ticket, facing = ?request.facing, "acquiring camera");
                    caps.camera.acquire(ticket, request, move |result| Event::CameraAcquired {
                        ticket,
                        result: Box::new(result),
                    });
                }
                SessionCommand::Release { stream } => {
                    debug!(%stream, "releasing camera");
                    caps.camera.release(stream);
                }
            }
        }
    }

    /// Drop whatever the current view holds: timer, camera session, animation, pending save.
    fn leave_current(model: &mut Model, caps: &Capabilities) {
        if let Some(timer) = model.active_timer() {
            debug!(%timer, "cancelling simulation timer");
            caps.timer.cancel(timer);
        }
        Self::run_session_commands(model.sessions.release(), caps);
        model.loading_animation = None;
        model.download_in_flight = false;
    }

    fn reset_to_idle(model: &mut Model, caps: &Capabilities) {
        Self::leave_current(model, caps);
        if model.state() != AppState::Idle {
            info!(from = ?model.state(), "returning to idle");
        }
        model.flow = Flow::Idle;
    }

    fn clear_inline_error(model: &mut Model) {
        if model
            .active_error
            .as_ref()
            .is_some_and(|e| e.placement == ErrorPlacement::Inline)
        {
            model.clear_error();
        }
    }

    fn open_camera(model: &mut Model, caps: &Capabilities, facing: CameraFacing) {
        let capture = &model.config.capture;
        let request = StreamRequest::new(facing)
            .with_ideal_resolution(capture.ideal_width, capture.ideal_height);

        let commands = model.sessions.acquire(request);
        model.flow = Flow::Camera(CameraFlow::starting(facing));
        Self::clear_inline_error(model);
        Self::run_session_commands(commands, caps);
    }

    fn start_identification(model: &mut Model, caps: &Capabilities, image: CapturedImage) {
        Self::leave_current(model, caps);

        let timer = model.issue_timer_id();
        debug!(%timer, source = ?image.source(), "starting identification");
        match Simulation::start(timer, image, model.config.simulation.clone()) {
            Ok(sim) => {
                let tick = sim.tick_interval_ms();
                model.flow = Flow::Identifying(sim);
                model.clear_error();
                model.notice = None;
                caps.timer.start(timer, tick, Event::TimerElapsed);
            }
            Err(e) => Self::fail_processing(model, caps, e),
        }
    }

    fn fail_processing(model: &mut Model, caps: &Capabilities, error: SimulationError) {
        warn!(error = %error, "identification failed");
        Self::reset_to_idle(model, caps);
        model.set_error(AppError::from(error));
    }

    fn accept_file(model: &mut Model, caps: &Capabilities, file: SelectedFile) {
        if model.state() != AppState::Idle {
            debug!(state = ?model.state(), "file ignored outside idle");
            return;
        }
        if !is_image_mime(&file.mime_type) {
            debug!(mime_type = %file.mime_type, "ignoring non-image file");
            return;
        }

        info!(
            file_name = %file.name,
            mime_type = %file.mime_type,
            size_bytes = file.data.len(),
            "image selected"
        );
        let image = CapturedImage::from_upload(file.name, file.mime_type, file.data);
        Self::start_identification(model, caps, image);
        caps.render.render();
    }

    fn on_camera_acquired(
        model: &mut Model,
        caps: &Capabilities,
        ticket: AcquireTicket,
        result: CameraResult,
    ) {
        let result = match result {
            Ok(CameraOutput::Stream(info)) => Ok(info),
            Ok(CameraOutput::Frame(_)) => Err(CameraError::DeviceUnavailable {
                reason: "unexpected frame in acquire response".into(),
            }),
            Err(e) => Err(e),
        };

        match model.sessions.on_acquired(ticket, result) {
            AcquireOutcome::Stale { release } => {
                if let Some(command) = release {
                    Self::run_session_commands(vec![command], caps);
                }
            }
            AcquireOutcome::Live(session) => {
                let Some(camera) = model.camera_mut() else {
                    warn!(stream = %session.stream, "stream went live outside the camera view");
                    Self::run_session_commands(model.sessions.release(), caps);
                    return;
                };
                camera.phase = CameraPhase::Live;
                camera.facing = session.facing;
                info!(
                    stream = %session.stream,
                    facing = ?session.facing,
                    width = session.width,
                    height = session.height,
                    "camera live"
                );
                Self::clear_inline_error(model);
                caps.render.render();
            }
            AcquireOutcome::Failed(error) => {
                warn!(error = %error, "camera acquisition failed");
                if matches!(error, CameraError::NotSupported) {
                    model.camera_supported = Some(false);
                    Self::reset_to_idle(model, caps);
                } else if let Some(camera) = model.camera_mut() {
                    camera.phase = CameraPhase::Failed(error.clone());
                }
                model.set_error(AppError::from(error));
                caps.render.render();
            }
        }
    }

    fn on_frame_grabbed(
        model: &mut Model,
        caps: &Capabilities,
        stream: StreamId,
        result: CameraResult,
    ) {
        let capture_config = model.config.capture.clone();
        let live = model.sessions.live().cloned();
        let Some(camera) = model.camera_mut() else {
            debug!(%stream, "frame arrived after leaving the camera view");
            return;
        };
        camera.capture_in_flight = false;

        let session = match (&camera.phase, live) {
            (CameraPhase::Live, Some(session)) if session.stream == stream => session,
            _ => {
                debug!(%stream, "frame for a stream that is no longer live");
                caps.render.render();
                return;
            }
        };

        let outcome = match result {
            Ok(CameraOutput::Frame(frame)) => {
                capture_frame(&session, frame, &capture_config).map_err(AppError::from)
            }
            Ok(CameraOutput::Stream(_)) => Err(AppError::from(CaptureError::Encode {
                reason: "unexpected stream in frame response".into(),
            })),
            Err(e) => Err(AppError::from(e)),
        };

        match outcome {
            Ok(image) => {
                info!(size_bytes = image.len(), "capture ready for preview");
                camera.phase = CameraPhase::Preview(image);
                Self::run_session_commands(model.sessions.release(), caps);
                Self::clear_inline_error(model);
            }
            Err(error) => {
                warn!(error = %error, "capture failed");
                // Capture problems never leave the camera view.
                model.set_error(error.with_placement(ErrorPlacement::Inline));
            }
        }
        caps.render.render();
    }

    fn on_timer(model: &mut Model, caps: &Capabilities, output: TimerOutput) {
        let step = match &mut model.flow {
            Flow::Identifying(sim) => sim.on_timer(output),
            _ => {
                debug!(timer = %output.id(), "timer fired with no simulation running");
                return;
            }
        };

        match step {
            Ok(SimulationStep::Progress { next_in_ms, .. }) => {
                caps.timer.start(output.id(), next_in_ms, Event::TimerElapsed);
                caps.render.render();
            }
            Ok(SimulationStep::EnterProcessing { delay_ms }) => {
                info!(delay_ms, "processing");
                caps.timer.start(output.id(), delay_ms, Event::TimerElapsed);
                caps.render.render();
            }
            Ok(SimulationStep::Completed(identification)) => {
                let Flow::Identifying(sim) = mem::take(&mut model.flow) else {
                    return;
                };
                model.loading_animation = None;
                model.show_notice(Notice::new(
                    "Insect Identified!",
                    format!(
                        "We've identified a {} in your image.",
                        identification.label
                    ),
                    NoticeKind::Success,
                ));
                model.flow = Flow::Result(IdentificationResult {
                    attempt: output.id(),
                    identification,
                    image: sim.into_image(),
                });
                caps.render.render();
            }
            Err(e) if e.is_stale() => {
                debug!(error = %e, "ignoring stale timer");
            }
            Err(e) => {
                Self::fail_processing(model, caps, e);
                caps.render.render();
            }
        }
    }

    fn request_download(model: &mut Model, caps: &Capabilities) {
        let Flow::Result(result) = &model.flow else {
            debug!("download requested without a result");
            return;
        };
        if model.download_in_flight {
            debug!("download already in flight");
            return;
        }

        let request = SaveRequest::new(
            model.config.download.file_name.clone(),
            result.image.mime_type(),
            result.image.data().to_vec(),
        );
        match request {
            Ok(request) => {
                info!(
                    file_name = %request.file_name,
                    size_bytes = request.data.len(),
                    "saving result image"
                );
                let attempt = result.attempt;
                model.download_in_flight = true;
                caps.download.save(request, move |result| Event::DownloadFinished {
                    attempt,
                    result: Box::new(result),
                });
            }
            Err(e) => {
                warn!(error = %e, "download rejected");
                model.set_error(AppError::from(e));
            }
        }
        caps.render.render();
    }

    fn on_download_finished(
        model: &mut Model,
        caps: &Capabilities,
        attempt: TimerId,
        result: DownloadResult,
    ) {
        if !matches!(&model.flow, Flow::Result(current) if current.attempt == attempt) {
            debug!(%attempt, "save finished for a result no longer shown");
            return;
        }

        model.download_in_flight = false;
        match result {
            Ok(DownloadOutput::Saved { file_name }) => {
                info!(%file_name, "result image saved");
                model.show_notice(Notice::new(
                    "Image Downloaded",
                    "Your identified insect image has been downloaded.",
                    NoticeKind::Info,
                ));
            }
            Err(e) => {
                warn!(error = %e, "saving result image failed");
                model.set_error(AppError::from(e));
            }
        }
        caps.render.render();
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        if event.is_user_initiated() {
            debug!(event = event.name(), state = ?model.state(), "user action");
        }

        match event {
            Event::CameraSupportReported { supported } => {
                model.camera_supported = Some(supported);
                caps.render.render();
            }

            Event::ConfigLoaded(config) => {
                model.config = config.validated();
                info!("configuration replaced");
                caps.render.render();
            }

            Event::Teardown => {
                Self::reset_to_idle(model, caps);
                model.clear_error();
                model.notice = None;
                caps.render.render();
            }

            Event::TakePhotoRequested => {
                if model.state() != AppState::Idle {
                    return;
                }
                if model.camera_supported == Some(false) {
                    model.set_error(AppError::from(CameraError::NotSupported));
                    caps.render.render();
                    return;
                }
                model.clear_error();
                let facing = model.config.capture.facing;
                Self::open_camera(model, caps, facing);
                caps.render.render();
            }

            Event::FileSelected(file) | Event::FileDropped(file) => {
                Self::accept_file(model, caps, *file);
            }

            Event::FlipCameraRequested => {
                let Some(camera) = model.camera() else {
                    return;
                };
                if !matches!(camera.phase, CameraPhase::Starting | CameraPhase::Live) {
                    return;
                }
                let facing = camera.facing.flipped();
                Self::open_camera(model, caps, facing);
                caps.render.render();
            }

            Event::CaptureRequested => {
                let stream = match (model.camera(), model.sessions.live()) {
                    (Some(camera), Some(session))
                        if camera.phase == CameraPhase::Live && !camera.capture_in_flight =>
                    {
                        session.stream.clone()
                    }
                    _ => {
                        debug!("capture requested without a live stream");
                        return;
                    }
                };
                if let Some(camera) = model.camera_mut() {
                    camera.capture_in_flight = true;
                }
                let grabbed = stream.clone();
                caps.camera.grab_frame(stream, move |result| Event::FrameGrabbed {
                    stream: grabbed,
                    result: Box::new(result),
                });
                caps.render.render();
            }

            Event::FrameGrabbed { stream, result } => {
                Self::on_frame_grabbed(model, caps, stream, *result);
            }

            Event::RetakeRequested => {
                let Some(camera) = model.camera() else {
                    return;
                };
                if !matches!(camera.phase, CameraPhase::Preview(_)) {
                    return;
                }
                let facing = camera.facing;
                Self::open_camera(model, caps, facing);
                caps.render.render();
            }

            Event::CaptureSubmitted => {
                let image = match model.camera_mut() {
                    Some(camera) => match mem::replace(&mut camera.phase, CameraPhase::Starting) {
                        CameraPhase::Preview(image) => image,
                        other => {
                            camera.phase = other;
                            return;
                        }
                    },
                    None => return,
                };
                Self::start_identification(model, caps, image);
                caps.render.render();
            }

            Event::RetryCameraRequested => {
                let Some(camera) = model.camera() else {
                    return;
                };
                if !matches!(camera.phase, CameraPhase::Failed(_)) {
                    return;
                }
                let facing = camera.facing;
                model.clear_error();
                Self::open_camera(model, caps, facing);
                caps.render.render();
            }

            Event::CameraAcquired { ticket, result } => {
                Self::on_camera_acquired(model, caps, ticket, *result);
            }

            Event::CancelRequested => match model.state() {
                AppState::Camera | AppState::Uploading | AppState::Processing => {
                    Self::reset_to_idle(model, caps);
                    model.clear_error();
                    caps.render.render();
                }
                AppState::Idle | AppState::Result => {}
            },

            Event::NewIdentificationRequested => {
                if model.state() == AppState::Result {
                    Self::reset_to_idle(model, caps);
                    model.clear_error();
                    model.notice = None;
                    caps.render.render();
                }
            }

            Event::TimerElapsed(output) => Self::on_timer(model, caps, output),

            Event::DownloadRequested => Self::request_download(model, caps),

            Event::DownloadFinished { attempt, result } => {
                Self::on_download_finished(model, caps, attempt, *result);
            }

            Event::ErrorDismissed => {
                model.clear_error();
                caps.render.render();
            }

            Event::NoticeDismissed => {
                model.notice = None;
                caps.render.render();
            }

            Event::AnimationFrame { width, height } => {
                if model.state() != AppState::Processing {
                    return;
                }
                match model.loading_animation.as_mut() {
                    Some(field) if field.size() == (width, height) => field.step(),
                    _ => model.seed_animation(width, height),
                }
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        view::build(model)
    }
}

