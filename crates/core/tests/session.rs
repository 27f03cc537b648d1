use std::{
    sync::{mpsc, Arc, Mutex},
    thread,
    time::Duration,
};

use saber_preview_core::{
    params::catalog,
    render::LightKind,
    scene::{BLADE_NODE, MODEL_NODE},
    session::{standard_control_ids, PHOTO_BUTTON},
    CaptureRequest, ControlPanel, Extent, HeadlessRenderer, ModelState, PreviewError,
    PreviewSession, Renderer, Scene, SceneGraph, SceneSettings, SharedRenderer, SharedScene,
    SharedSurface, ToggleState,
};

const SETTINGS: &str = r##"{
    "bloomStrength": 1.5,
    "bloomThreshold": 0.2,
    "bloomRadius": 0.3,
    "bloomExposure": 1.1,
    "ambientLight": 2.5,
    "directionalLight": 4,
    "emissionIntensity": 0.5,
    "zoomMin": 40,
    "zoomMax": 120,
    "zoomSpeed": 20,
    "dragRotationSpeed": 0.005,
    "zoomDistance": 500,
    "bladeToggleMs": 300,
    "photoMode": {
        "resolution": [640, 480],
        "imageQuality": 0.75,
        "background": "#202020",
        "dofEnabled": false,
        "dofFocus": 80,
        "dofAperture": 5.6
    }
}"##;

struct Viewer {
    renderer: Arc<Mutex<HeadlessRenderer>>,
    scene: Arc<Mutex<SceneGraph>>,
    panel: Arc<Mutex<ControlPanel>>,
    session: PreviewSession,
}

fn viewer() -> Viewer {
    let renderer = Arc::new(Mutex::new(HeadlessRenderer::new(Extent::new(400, 300))));
    let scene = Arc::new(Mutex::new(SceneGraph::with_saber()));
    let panel = Arc::new(Mutex::new(ControlPanel::with_controls(standard_control_ids())));

    let shared_renderer: SharedRenderer = renderer.clone();
    let shared_scene: SharedScene = scene.clone();
    let mut session = PreviewSession::new(shared_renderer, shared_scene).unwrap();
    let surface: SharedSurface = panel.clone();
    session.attach_surface(&surface).unwrap();

    Viewer {
        renderer,
        scene,
        panel,
        session,
    }
}

#[test]
fn startup_documents_configure_the_whole_viewer() {
    let mut v = viewer();
    let settings = SceneSettings::from_json(SETTINGS).unwrap();
    v.session.apply_settings(&settings).unwrap();
    v.session
        .apply_model_state(&ModelState::from_json(r#"{"bladeOn": false}"#).unwrap())
        .unwrap();

    {
        let renderer = v.renderer.lock().unwrap();
        assert_eq!(renderer.post_process().bloom_strength, 1.5);
        assert_eq!(renderer.post_process().exposure, 1.1);
        assert_eq!(renderer.light_intensity(LightKind::Directional), 4.0);
    }
    {
        let scene = v.scene.lock().unwrap();
        assert_eq!(scene.camera_distance(), 120.0);
        assert_eq!(scene.node(BLADE_NODE).unwrap().emissive_intensity, 5.0);
        assert_eq!(scene.is_visible(BLADE_NODE), Some(false));
    }

    let panel = v.panel.lock().unwrap();
    assert_eq!(panel.value("zoom-max-input"), Some("120"));
    assert_eq!(panel.value("photo-quality-value"), Some("75%"));
    assert_eq!(panel.value("toggle-switch"), Some("false"));
}

#[test]
fn applying_settings_twice_changes_nothing() {
    let mut v = viewer();
    let settings = SceneSettings::from_json(SETTINGS).unwrap();

    v.session.apply_settings(&settings).unwrap();
    let store_once = v.session.store().snapshot();
    let render_once = v.renderer.lock().unwrap().state().clone();

    v.session.apply_settings(&settings).unwrap();
    assert_eq!(v.session.store().snapshot(), store_once);
    assert_eq!(v.renderer.lock().unwrap().state(), &render_once);
}

#[test]
fn blade_toggle_runs_to_completion_on_the_frame_clock() {
    let mut v = viewer();
    v.panel.lock().unwrap().input("toggle-switch", "false");
    v.session.pump_controls().unwrap();

    let mut last = 1.0;
    for _ in 0..30 {
        v.session.tick(Duration::from_millis(16)).unwrap();
        let scale = v.scene.lock().unwrap().node_scale(BLADE_NODE).unwrap();
        assert!(scale <= last);
        last = scale;
    }
    assert_eq!(v.session.toggles().state(BLADE_NODE), Some(ToggleState::Off));
    assert_eq!(last, 0.01);

    v.session.set_blade(true).unwrap();
    assert_eq!(v.scene.lock().unwrap().is_visible(BLADE_NODE), Some(true));
    for _ in 0..30 {
        v.session.tick(Duration::from_millis(16)).unwrap();
    }
    assert_eq!(v.session.toggles().state(BLADE_NODE), Some(ToggleState::On));
    assert_eq!(v.scene.lock().unwrap().node_scale(BLADE_NODE), Some(1.0));
}

#[test]
fn photo_leaves_live_view_untouched() {
    let mut v = viewer();
    v.session
        .apply_settings(&SceneSettings::from_json(SETTINGS).unwrap())
        .unwrap();
    v.session.tick(Duration::from_millis(16)).unwrap();
    let live = v.renderer.lock().unwrap().state().clone();

    v.panel.lock().unwrap().input(PHOTO_BUTTON, "");
    let pump = v.session.pump_controls().unwrap();

    assert_eq!(pump.photos.len(), 1);
    assert_eq!(pump.photos[0].extent, Extent::new(640, 480));
    assert_eq!(&pump.photos[0].bytes[..2], &[0xFF, 0xD8]);
    assert_eq!(v.renderer.lock().unwrap().state(), &live);
}

#[test]
fn second_photo_is_rejected_while_first_is_rendering() {
    let v = viewer();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    v.renderer.lock().unwrap().set_render_hook(move |_| {
        let _ = started_tx.send(());
        let _ = release_rx.recv();
        Ok(())
    });

    let handle = v.session.capture_handle();
    let worker = thread::spawn(move || handle.capture(&CaptureRequest::new(100, 50)));
    started_rx.recv().unwrap();

    let busy = v.session.take_photo();
    assert!(matches!(busy, Err(PreviewError::CaptureBusy)));

    release_tx.send(()).unwrap();
    let first = worker.join().unwrap().unwrap();
    assert_eq!(first.extent, Extent::new(100, 50));
    assert_eq!(v.renderer.lock().unwrap().output_size(), Extent::new(400, 300));
}

#[test]
fn pointer_and_wheel_drive_the_view() {
    let mut v = viewer();
    v.session.pointer_down(0.0, 0.0);
    v.session.pointer_move(30.0, -10.0).unwrap();
    v.session.pointer_up();

    let rotation = v.scene.lock().unwrap().node(MODEL_NODE).unwrap().transform.rotation;
    assert!((rotation.y - 0.3).abs() < 1e-6);
    assert!((rotation.x + 0.1).abs() < 1e-6);

    for _ in 0..20 {
        v.session.zoom(-1.0).unwrap();
    }
    assert_eq!(v.scene.lock().unwrap().camera_distance(), 10.0);
    assert_eq!(v.session.store().number(catalog::ZOOM_DISTANCE), Some(10.0));
}
