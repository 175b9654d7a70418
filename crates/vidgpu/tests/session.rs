use std::path::{Path, PathBuf};

use vidgpu::{
    CaptureError, DriverState, Effect, FrameSequencePlayer, Session, SessionError, SessionToken, Settings, SourceSelection, SurfaceRequest,
};

const INPUT_COLOR: [u8; 3] = [200, 100, 50];

fn input_frame(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("vidgpu-session-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("frame.png");
    let [r, g, b] = INPUT_COLOR;
    image::RgbaImage::from_pixel(64, 36, image::Rgba([r, g, b, 255])).save(&path).unwrap();
    path
}

fn init(path: &Path, settings: Settings) -> Option<Session<FrameSequencePlayer>> {
    let result = pollster::block_on(Session::init(
        SurfaceRequest::Offscreen { size: (64, 36) },
        FrameSequencePlayer::new(24),
        &SourceSelection::file(path.to_path_buf()),
        settings,
        &SessionToken::new(),
    ));
    match result {
        Ok(session) => Some(session),
        Err(SessionError::AdapterUnavailable(_) | SessionError::MissingFeatures(_) | SessionError::DeviceUnavailable(_)) => {
            eprintln!("skipping: no adapter with FLOAT32_FILTERABLE");
            None
        }
        Err(e) => panic!("session init failed: {e}"),
    }
}

fn assert_close(actual: &image::Rgba<u8>, expected: [u8; 3]) {
    for channel in 0..3 {
        let difference = (actual[channel] as i16 - expected[channel] as i16).abs();
        assert!(difference <= 2, "{actual:?} is not close to {expected:?}");
    }
}

#[test]
fn init_without_source_fails_before_touching_the_gpu() {
    let result = pollster::block_on(Session::init(
        SurfaceRequest::Offscreen { size: (64, 36) },
        FrameSequencePlayer::new(24),
        &SourceSelection::default(),
        Settings::default(),
        &SessionToken::new(),
    ));
    assert!(matches!(result, Err(SessionError::NoSource)));
}

#[test]
fn empty_url_counts_as_no_source() {
    let result = pollster::block_on(Session::init(
        SurfaceRequest::Offscreen { size: (64, 36) },
        FrameSequencePlayer::new(24),
        &SourceSelection::url(""),
        Settings::default(),
        &SessionToken::new(),
    ));
    assert!(matches!(result, Err(SessionError::NoSource)));
}

#[test]
fn cancelled_init_releases_and_reports_cancellation() {
    let path = input_frame("cancelled");
    let token = SessionToken::new();
    token.cancel();
    let result = pollster::block_on(Session::init(
        SurfaceRequest::Offscreen { size: (64, 36) },
        FrameSequencePlayer::new(24),
        &SourceSelection::file(path),
        Settings::default(),
        &token,
    ));
    match result {
        Err(SessionError::Cancelled) => {}
        Err(SessionError::AdapterUnavailable(_) | SessionError::MissingFeatures(_) | SessionError::DeviceUnavailable(_)) => {
            eprintln!("skipping: no adapter with FLOAT32_FILTERABLE");
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("cancelled init produced a session"),
    }
}

#[test]
fn original_shows_the_input_frame() {
    let path = input_frame("original");
    let Some(session) = init(&path, Settings::default()) else {
        return;
    };

    assert_eq!(session.effect(), Some(Effect::Original));
    assert_eq!(session.video_dimensions(), Some((64, 36)));
    assert_eq!(session.output_dimensions(), Some((64, 36)));
    assert_eq!(session.driver_state(), DriverState::Running);
    assert!(session.has_registered_notification());
    assert_eq!(session.frames_rendered(), 1);

    let frame = pollster::block_on(session.capture_frame()).expect("capture");
    assert_eq!(frame.dimensions(), (64, 36));
    assert_close(frame.get_pixel(10, 10), INPUT_COLOR);
    assert_close(frame.get_pixel(50, 30), INPUT_COLOR);
}

#[test]
fn comparison_splits_raw_marker_and_processed() {
    let path = input_frame("comparison");
    let Some(mut session) = init(&path, Settings::default()) else {
        return;
    };

    let change = session
        .apply_settings(Settings {
            effect: "Mode A".to_string(),
            compare_on: true,
            split_ratio: 30.0,
            ..Default::default()
        })
        .expect("apply");
    assert!(change.rebuild);
    assert!(change.comparison);

    assert_eq!(session.output_dimensions(), Some((128, 72)));
    assert_eq!(session.target_dimensions(), Some((128, 72)));

    let frame = pollster::block_on(session.capture_frame()).expect("capture");
    assert_eq!(frame.dimensions(), (128, 72));
    // Columns 25, 38 and 60 sample at 0.20, 0.3008 and 0.47 of the width
    assert_close(frame.get_pixel(25, 36), INPUT_COLOR);
    assert_eq!(frame.get_pixel(38, 36).0, [255, 0, 0, 255]);
    assert_ne!(frame.get_pixel(60, 36).0, [255, 0, 0, 255]);
}

#[test]
fn unknown_effect_falls_back_to_original() {
    let path = input_frame("unknown");
    let Some(session) = init(
        &path,
        Settings {
            effect: "Sharpen-Max".to_string(),
            ..Default::default()
        },
    ) else {
        return;
    };

    assert_eq!(session.effect(), Some(Effect::Original));
    assert_eq!(session.output_dimensions(), Some((64, 36)));
}

#[test]
fn rebuild_swaps_pipeline_and_bindings_together() {
    let path = input_frame("rebuild");
    let Some(mut session) = init(&path, Settings::default()) else {
        return;
    };
    let initial = session.pipeline_generation().expect("generation");
    assert_eq!(session.bindings_generation(), Some(initial));

    let mode_a = Settings {
        effect: "Mode A".to_string(),
        ..Default::default()
    };
    assert!(session.apply_settings(mode_a.clone()).expect("apply").rebuild);
    let after_effect = session.pipeline_generation().expect("generation");
    assert!(after_effect > initial);
    assert_eq!(session.bindings_generation(), Some(after_effect));

    let compared = Settings { compare_on: true, ..mode_a };
    assert!(session.apply_settings(compared.clone()).expect("apply").rebuild);
    let after_toggle = session.pipeline_generation().expect("generation");
    assert!(after_toggle > after_effect);
    assert_eq!(session.output_dimensions(), Some((128, 72)));

    let moved = Settings { split_ratio: 75.0, ..compared };
    let change = session.apply_settings(moved.clone()).expect("apply");
    assert!(!change.rebuild);
    assert!(change.comparison);
    assert_eq!(session.pipeline_generation(), Some(after_toggle));

    let unchanged = session.apply_settings(moved).expect("apply");
    assert!(unchanged.is_empty());
}

#[test]
fn settings_inbox_is_drained_on_refresh() {
    let path = input_frame("inbox");
    let Some(mut session) = init(&path, Settings::default()) else {
        return;
    };

    let inbox = session.settings_inbox();
    inbox.submit(Settings {
        effect: "Restore-CNNM".to_string(),
        ..Default::default()
    });
    inbox.submit(Settings {
        effect: "Upscale-CNNx2M".to_string(),
        ..Default::default()
    });
    assert_eq!(session.effect(), Some(Effect::Original));

    session.on_display_refresh().expect("refresh");
    assert!(!inbox.is_pending());
    assert_eq!(session.effect(), Some(Effect::UpscaleX2M));
    assert_eq!(session.settings().effect, "Upscale-CNNx2M");
}

#[test]
fn teardown_is_idempotent() {
    let path = input_frame("teardown");
    let Some(mut session) = init(&path, Settings::default()) else {
        return;
    };

    session.teardown();
    session.teardown();
    assert!(session.is_torn_down());
    assert_eq!(session.driver_state(), DriverState::Stopped);
    assert!(!session.has_registered_notification());
    assert!(!session.on_display_refresh().expect("refresh"));
    assert!(matches!(session.apply_settings(Settings::default()), Err(SessionError::TornDown)));
    assert!(matches!(pollster::block_on(session.capture_frame()), Err(CaptureError::TornDown)));
}

#[test]
fn paused_session_redraws_on_split_change() {
    let path = input_frame("paused");
    let Some(mut session) = init(
        &path,
        Settings {
            effect: "Mode A".to_string(),
            compare_on: true,
            split_ratio: 30.0,
            ..Default::default()
        },
    ) else {
        return;
    };
    session.pause().expect("pause");
    let rendered = session.frames_rendered();

    let change = session
        .apply_settings(Settings {
            effect: "Mode A".to_string(),
            compare_on: true,
            split_ratio: 70.0,
            ..Default::default()
        })
        .expect("apply");
    assert!(!change.rebuild);
    assert_eq!(session.frames_rendered(), rendered + 1);
    assert_eq!(session.frames_skipped(), 0);

    let frame = pollster::block_on(session.capture_frame()).expect("capture");
    assert_close(frame.get_pixel(60, 36), INPUT_COLOR);
    assert_eq!(frame.get_pixel(89, 36).0, [255, 0, 0, 255]);
}

#[test]
fn failed_source_replacement_keeps_the_driver_running() {
    let path = input_frame("replace");
    let Some(mut session) = init(&path, Settings::default()) else {
        return;
    };

    let result = pollster::block_on(session.replace_source(&SourceSelection::url("https://example.com/video.mp4")));
    assert!(matches!(result, Err(SessionError::Decode(_))));
    assert_eq!(session.driver_state(), DriverState::Running);
    assert!(session.has_registered_notification());
    assert_eq!(session.video_dimensions(), Some((64, 36)));

    let frame = pollster::block_on(session.capture_frame()).expect("capture");
    assert_close(frame.get_pixel(10, 10), INPUT_COLOR);
}
