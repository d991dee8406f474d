use crux_core::testing::AppTester;
use crux_core::Request;
use image::ImageEncoder;

use shared::capabilities::{
    DownloadError, DownloadOperation, DownloadOutput, TimerId, TimerOperation, TimerOutput,
};
use shared::config::{AnimationConfig, AppConfig, SimulationConfig};
use shared::view::ViewState;
use shared::{App, AppState, Effect, ErrorKind, Event, Model, SelectedFile};

type Tester = AppTester<App, Effect>;

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(16, 12, image::Rgba([230, 120, 20, 255]));
    let mut buffer = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buffer)
        .write_image(img.as_raw(), 16, 12, image::ExtendedColorType::Rgba8)
        .unwrap();
    buffer
}

fn dropped_png() -> Event {
    Event::FileDropped(Box::new(SelectedFile::new(
        "monarch.png",
        "image/png",
        png_bytes(),
    )))
}

fn timer_requests(effects: Vec<Effect>) -> Vec<Request<TimerOperation>> {
    effects
        .into_iter()
        .filter_map(|effect| match effect {
            Effect::Timer(request) => Some(request),
            _ => None,
        })
        .collect()
}

fn single_start(effects: Vec<Effect>) -> (Request<TimerOperation>, TimerId, u64) {
    let mut starts: Vec<_> = timer_requests(effects)
        .into_iter()
        .filter(|r| matches!(r.operation, TimerOperation::Start { .. }))
        .collect();
    assert_eq!(starts.len(), 1, "expected exactly one timer start");
    let request = starts.remove(0);
    let TimerOperation::Start { id, millis } = request.operation else {
        unreachable!()
    };
    (request, id, millis)
}

/// Resolve a timer and feed the resulting events back into the app.
fn resolve_timer(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<TimerOperation>,
    output: TimerOutput,
) -> Vec<Effect> {
    let update = app.resolve(request, output).expect("timer resolves");
    let mut effects = update.effects;
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

fn fire(app: &Tester, model: &mut Model, request: &mut Request<TimerOperation>) -> Vec<Effect> {
    let TimerOperation::Start { id, .. } = request.operation else {
        panic!("not a start request");
    };
    resolve_timer(app, model, request, TimerOutput::Fired { id })
}

fn download_request(effects: Vec<Effect>) -> Option<Request<DownloadOperation>> {
    effects.into_iter().find_map(|e| match e {
        Effect::Download(request) => Some(request),
        _ => None,
    })
}

/// Drive a dropped PNG all the way to the result view.
fn run_to_result(app: &Tester, model: &mut Model) {
    let update = app.update(dropped_png(), model);
    let (mut request, _, _) = single_start(update.effects);
    while model.state() != AppState::Result {
        let effects = fire(app, model, &mut request);
        if model.state() == AppState::Result {
            break;
        }
        request = single_start(effects).0;
    }
}

#[test]
fn dropped_png_runs_the_full_simulation() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(dropped_png(), &mut model);
    assert_eq!(model.state(), AppState::Uploading);
    assert_eq!(model.progress(), 0);
    assert!(update.effects.iter().any(|e| matches!(e, Effect::Render(_))));

    let (mut request, attempt, millis) = single_start(update.effects);
    assert_eq!(millis, 100);

    let mut seen = Vec::new();
    for _ in 0..20 {
        let effects = fire(&app, &mut model, &mut request);
        seen.push(model.progress());
        let (next, id, millis) = single_start(effects);
        assert_eq!(id, attempt);
        request = next;
        if model.state() == AppState::Processing {
            assert_eq!(millis, 3000);
        } else {
            assert_eq!(millis, 100);
        }
    }

    let expected: Vec<u8> = (1..=20).map(|n| n * 5).collect();
    assert_eq!(seen, expected);
    assert_eq!(model.state(), AppState::Processing);

    let effects = fire(&app, &mut model, &mut request);
    assert!(timer_requests(effects).is_empty());
    assert_eq!(model.state(), AppState::Result);

    let view = app.view(&model);
    match view.state {
        ViewState::Result {
            label,
            confidence_percent,
            image,
            ..
        } => {
            assert_eq!(label, "Monarch Butterfly");
            assert_eq!(confidence_percent, 98);
            assert_eq!(image.mime_type, "image/png");
            assert_eq!((image.width, image.height), (Some(16), Some(12)));
        }
        other => panic!("expected result view, got {other:?}"),
    }
    let notice = view.notice.expect("success notice");
    assert_eq!(notice.title, "Insect Identified!");
    assert!(notice.message.contains("Monarch Butterfly"));
}

#[test]
fn non_image_drop_is_ignored() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(
        Event::FileDropped(Box::new(SelectedFile::new(
            "notes.txt",
            "text/plain",
            b"not an insect".to_vec(),
        ))),
        &mut model,
    );
    assert!(update.effects.is_empty());
    assert_eq!(model.state(), AppState::Idle);
}

#[test]
fn any_image_type_is_accepted_without_inspection() {
    let app = Tester::default();
    let mut model = Model::default();

    app.update(
        Event::FileSelected(Box::new(SelectedFile::new(
            "bug.heic",
            "image/heic",
            vec![0xAA; 32],
        ))),
        &mut model,
    );
    assert_eq!(model.state(), AppState::Uploading);
}

#[test]
fn empty_image_fails_processing_and_resets() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(
        Event::FileSelected(Box::new(SelectedFile::new("empty.png", "image/png", vec![]))),
        &mut model,
    );
    assert_eq!(model.state(), AppState::Idle);
    assert!(timer_requests(update.effects).is_empty());

    let view = app.view(&model);
    let error = view.error.expect("banner error");
    assert_eq!(error.error_code, "PROCESSING_FAILURE");
}

#[test]
fn cancel_while_uploading_cancels_timer_and_ignores_late_tick() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(dropped_png(), &mut model);
    let (mut request, attempt, _) = single_start(update.effects);
    let effects = fire(&app, &mut model, &mut request);
    let (mut pending, _, _) = single_start(effects);
    assert_eq!(model.progress(), 5);

    let update = app.update(Event::CancelRequested, &mut model);
    assert_eq!(model.state(), AppState::Idle);
    assert_eq!(model.progress(), 0);
    let cancels: Vec<_> = timer_requests(update.effects)
        .into_iter()
        .filter(|r| r.operation == TimerOperation::Cancel { id: attempt })
        .collect();
    assert_eq!(cancels.len(), 1);

    // The shell fires anyway: nothing happens.
    let effects = fire(&app, &mut model, &mut pending);
    assert!(effects.is_empty());
    assert_eq!(model.state(), AppState::Idle);
}

#[test]
fn tick_from_an_earlier_attempt_does_not_advance_a_new_one() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(dropped_png(), &mut model);
    let (mut old, first, _) = single_start(update.effects);
    app.update(Event::CancelRequested, &mut model);

    let update = app.update(dropped_png(), &mut model);
    let (_, second, _) = single_start(update.effects);
    assert_ne!(first, second);

    fire(&app, &mut model, &mut old);
    assert_eq!(model.state(), AppState::Uploading);
    assert_eq!(model.progress(), 0);
}

#[test]
fn timer_cancelled_by_shell_is_a_processing_failure() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(dropped_png(), &mut model);
    let (mut request, id, _) = single_start(update.effects);

    resolve_timer(&app, &mut model, &mut request, TimerOutput::Cancelled { id });
    assert_eq!(model.state(), AppState::Idle);
    assert_eq!(
        model.active_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::ProcessingFailure)
    );
}

#[test]
fn cancel_while_processing_returns_to_idle() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(dropped_png(), &mut model);
    let (mut request, id, _) = single_start(update.effects);
    while model.state() == AppState::Uploading {
        let effects = fire(&app, &mut model, &mut request);
        request = single_start(effects).0;
    }
    assert_eq!(model.state(), AppState::Processing);

    app.update(
        Event::AnimationFrame {
            width: 400,
            height: 300,
        },
        &mut model,
    );
    assert!(model.loading_animation.is_some());

    let update = app.update(Event::CancelRequested, &mut model);
    assert_eq!(model.state(), AppState::Idle);
    assert!(model.loading_animation.is_none());
    assert!(timer_requests(update.effects)
        .iter()
        .any(|r| r.operation == TimerOperation::Cancel { id }));
}

#[test]
fn animation_frames_only_run_while_processing() {
    let app = Tester::default();
    let mut model = Model::default();

    let update = app.update(
        Event::AnimationFrame {
            width: 100,
            height: 100,
        },
        &mut model,
    );
    assert!(update.effects.is_empty());
    assert!(model.loading_animation.is_none());
}

#[test]
fn download_saves_result_under_fixed_name() {
    let app = Tester::default();
    let mut model = Model::default();
    run_to_result(&app, &mut model);

    let update = app.update(Event::DownloadRequested, &mut model);
    let mut download = download_request(update.effects).expect("download effect");

    let DownloadOperation::Save(save) = &download.operation;
    assert_eq!(save.file_name, "detected-insect.png");
    assert_eq!(save.data, png_bytes());
    assert!(model.download_in_flight);

    // A second click while saving does nothing.
    let update = app.update(Event::DownloadRequested, &mut model);
    assert!(update.effects.is_empty());

    let update = app
        .resolve(
            &mut download,
            Ok(DownloadOutput::Saved {
                file_name: "detected-insect.png".into(),
            }),
        )
        .expect("download resolves");
    for event in update.events {
        app.update(event, &mut model);
    }
    assert!(!model.download_in_flight);
    assert_eq!(model.state(), AppState::Result);
    assert_eq!(
        model.notice.as_ref().map(|n| n.title.as_str()),
        Some("Image Downloaded")
    );
}

#[test]
fn failed_download_keeps_result_and_shows_banner() {
    let app = Tester::default();
    let mut model = Model::default();
    run_to_result(&app, &mut model);

    let update = app.update(Event::DownloadRequested, &mut model);
    let mut download = download_request(update.effects).expect("download effect");

    let update = app
        .resolve(
            &mut download,
            Err(DownloadError::Failed {
                reason: "disk full".into(),
            }),
        )
        .expect("download resolves");
    for event in update.events {
        app.update(event, &mut model);
    }

    assert_eq!(model.state(), AppState::Result);
    let error = app.view(&model).error.expect("banner");
    assert_eq!(error.error_code, "DOWNLOAD_FAILED");

    app.update(Event::ErrorDismissed, &mut model);
    assert!(app.view(&model).error.is_none());
}

#[test]
fn new_identification_returns_to_idle() {
    let app = Tester::default();
    let mut model = Model::default();
    run_to_result(&app, &mut model);

    app.update(Event::NewIdentificationRequested, &mut model);
    assert_eq!(model.state(), AppState::Idle);
    assert!(model.notice.is_none());
    assert_eq!(model.progress(), 0);
}

#[test]
fn loaded_config_applies_to_the_next_attempt() {
    let app = Tester::default();
    let mut model = Model::default();

    let config = AppConfig {
        simulation: SimulationConfig::default()
            .with_progress_step(50)
            .with_tick_interval_ms(10),
        ..AppConfig::default()
    };
    app.update(Event::ConfigLoaded(Box::new(config)), &mut model);

    let update = app.update(dropped_png(), &mut model);
    let (mut request, _, millis) = single_start(update.effects);
    assert_eq!(millis, 10);

    let effects = fire(&app, &mut model, &mut request);
    assert_eq!(model.progress(), 50);
    let (mut request, _, _) = single_start(effects);
    let effects = fire(&app, &mut model, &mut request);
    assert_eq!(model.state(), AppState::Processing);
    let (_, _, millis) = single_start(effects);
    assert_eq!(millis, 3000);
}

#[test]
fn save_from_an_earlier_result_does_not_touch_the_next_one() {
    let app = Tester::default();
    let mut model = Model::default();
    run_to_result(&app, &mut model);

    let update = app.update(Event::DownloadRequested, &mut model);
    let mut first_save = download_request(update.effects).expect("first download");

    app.update(Event::NewIdentificationRequested, &mut model);
    assert_eq!(model.state(), AppState::Idle);
    assert!(!model.download_in_flight);

    run_to_result(&app, &mut model);
    let update = app.update(Event::DownloadRequested, &mut model);
    let mut second_save = download_request(update.effects).expect("second download");
    assert!(model.download_in_flight);

    // The first save completes while the second result is on screen.
    let update = app
        .resolve(
            &mut first_save,
            Ok(DownloadOutput::Saved {
                file_name: "detected-insect.png".into(),
            }),
        )
        .expect("download resolves");
    for event in update.events {
        app.update(event, &mut model);
    }
    assert!(model.download_in_flight);
    assert_eq!(
        model.notice.as_ref().map(|n| n.title.as_str()),
        Some("Insect Identified!")
    );

    let update = app
        .resolve(
            &mut second_save,
            Ok(DownloadOutput::Saved {
                file_name: "detected-insect.png".into(),
            }),
        )
        .expect("download resolves");
    for event in update.events {
        app.update(event, &mut model);
    }
    assert!(!model.download_in_flight);
    assert_eq!(
        model.notice.as_ref().map(|n| n.title.as_str()),
        Some("Image Downloaded")
    );
}

#[test]
fn particle_count_comes_from_config() {
    let app = Tester::default();
    let mut model = Model::default();

    let config = AppConfig {
        simulation: SimulationConfig::default().with_progress_step(100),
        animation: AnimationConfig::default().with_particle_count(7),
        ..AppConfig::default()
    };
    app.update(Event::ConfigLoaded(Box::new(config)), &mut model);

    let update = app.update(dropped_png(), &mut model);
    let (mut request, _, _) = single_start(update.effects);
    fire(&app, &mut model, &mut request);
    assert_eq!(model.state(), AppState::Processing);

    app.update(
        Event::AnimationFrame {
            width: 200,
            height: 120,
        },
        &mut model,
    );
    match app.view(&model).state {
        ViewState::Processing {
            animation: Some(animation),
            ..
        } => {
            assert_eq!(animation.particles.len(), 7);
            assert_eq!((animation.width, animation.height), (200, 120));
        }
        other => panic!("expected processing view, got {other:?}"),
    }
}
