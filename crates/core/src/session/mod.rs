//! Preview session: wires the parameter store, control bindings, blade
//! animation and photo capture to one renderer and one scene.
//!
//! The host drives it with a simple loop: forward pointer and wheel input,
//! call [`PreviewSession::pump_controls`] to apply control edits, then
//! [`PreviewSession::tick`] once per displayed frame.

mod layout;

use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

pub use layout::{standard_control_ids, EMISSION_GAIN, PHOTO_BUTTON};

use crate::{
    bindings::{ControlBindingRegistry, EffectContext},
    capture::{
        CaptureCoordinator, CaptureOutput, CaptureRequest, DepthOfFieldRequest, FocusTarget,
        PresetResolutions, ResolutionStrategy,
    },
    config::{ModelState, SceneSettings},
    params::{catalog, ParamValue, ParameterStore, SettingsSnapshot},
    scene::{NodeTransform, BLADE_NODE, CAMERA_NODE, MODEL_NODE},
    shared::lock,
    timeline::{FrameClock, FrameTick},
    Color, PreviewError, Result, SharedRenderer, SharedScene, SharedSurface, ToggleAnimator,
};

/// Yaw added to the model per frame while auto-rotating.
const AUTO_ROTATE_YAW: f32 = 0.004;
/// Amplitude of the slow pitch wobble while auto-rotating.
const AUTO_ROTATE_WOBBLE: f32 = 0.0008;

/// Outcome of one [`PreviewSession::pump_controls`] call.
#[derive(Debug, Default)]
pub struct ControlPump {
    /// Control edits written to the store.
    pub applied: usize,
    /// Edits whose text could not be turned into a value.
    pub rejected: usize,
    pub photos: Vec<CaptureOutput>,
}

pub struct PreviewSession {
    store: ParameterStore,
    registry: ControlBindingRegistry,
    toggles: ToggleAnimator,
    capture: Arc<CaptureCoordinator>,
    resolutions: Box<dyn ResolutionStrategy>,
    renderer: SharedRenderer,
    scene: SharedScene,
    clock: FrameClock,
    pointer: Option<(f32, f32)>,
}

impl PreviewSession {
    /// Builds a session with the standard catalog, controls and effects, and
    /// pushes every default value to the renderer and scene.
    pub fn new(renderer: SharedRenderer, scene: SharedScene) -> Result<Self> {
        let store = ParameterStore::standard();
        let mut registry = ControlBindingRegistry::new();
        layout::install_bindings(&mut registry, &store)?;
        layout::install_effects(&mut registry);

        let blade_ms = store.number(catalog::BLADE_TOGGLE_MS).unwrap_or_default();
        let mut session = Self {
            toggles: ToggleAnimator::new(scene.clone(), blade_ms),
            capture: Arc::new(CaptureCoordinator::new(renderer.clone(), scene.clone())),
            resolutions: Box::new(PresetResolutions),
            store,
            registry,
            renderer,
            scene,
            clock: FrameClock::new(),
            pointer: None,
        };
        let defaults = session.store.snapshot();
        session.apply_snapshot(&defaults)?;
        Ok(session)
    }

    /// Replaces the capture coordinator, e.g. to change encoder or naming.
    pub fn with_capture(mut self, coordinator: CaptureCoordinator) -> Self {
        self.capture = Arc::new(coordinator);
        self
    }

    pub fn with_resolution_strategy(mut self, strategy: impl ResolutionStrategy + 'static) -> Self {
        self.resolutions = Box::new(strategy);
        self
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    pub fn registry(&self) -> &ControlBindingRegistry {
        &self.registry
    }

    pub fn toggles(&self) -> &ToggleAnimator {
        &self.toggles
    }

    /// Handle for taking photos from another thread.
    pub fn capture_handle(&self) -> Arc<CaptureCoordinator> {
        self.capture.clone()
    }

    pub fn renderer_handle(&self) -> SharedRenderer {
        self.renderer.clone()
    }

    pub fn scene_handle(&self) -> SharedScene {
        self.scene.clone()
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Links the control surface and brings every control up to date.
    pub fn attach_surface(&mut self, surface: &SharedSurface) -> Result<usize> {
        self.registry.attach_surface(surface);
        self.registry.sync_controls(&self.store)
    }

    pub fn detach_surface(&mut self) {
        self.registry.detach_surface();
    }

    /// Writes one parameter and propagates it.
    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> Result<()> {
        self.store.set(key, value)?;
        self.flush()?;
        Ok(())
    }

    pub fn apply_snapshot(&mut self, snapshot: &SettingsSnapshot) -> Result<usize> {
        let applied = self.store.apply_snapshot(snapshot)?;
        self.flush()?;
        Ok(applied)
    }

    pub fn apply_settings(&mut self, settings: &SceneSettings) -> Result<usize> {
        let applied = self.apply_snapshot(&settings.to_snapshot())?;
        info!(applied, "scene settings applied");
        Ok(applied)
    }

    /// Places the model and snaps the blade to its initial state without
    /// animating.
    pub fn apply_model_state(&mut self, state: &ModelState) -> Result<()> {
        if let Some(placement) = &state.model {
            let transform = placement.apply_to(NodeTransform::default());
            if !lock(&self.scene, "scene")?.set_transform(MODEL_NODE, transform) {
                warn!(node = MODEL_NODE, "model root not in scene, placement skipped");
            }
        }

        let duration = self.store.number(catalog::BLADE_TOGGLE_MS).unwrap_or_default();
        self.toggles.register(BLADE_NODE, state.blade_on, duration)?;
        self.set(catalog::BLADE_ON, state.blade_on)?;
        info!(blade_on = state.blade_on, "model state applied");
        Ok(())
    }

    /// Applies pending control edits. The capture button takes a photo with
    /// the parameters as they stand at that point in the event sequence.
    pub fn pump_controls(&mut self) -> Result<ControlPump> {
        let mut pump = ControlPump::default();
        let Some(surface) = self.registry.surface() else {
            return Ok(pump);
        };
        let events = lock(&surface, "control surface")?.drain_events();

        for event in &events {
            if event.control_id == PHOTO_BUTTON {
                self.flush()?;
                match self.take_photo() {
                    Ok(photo) => pump.photos.push(photo),
                    Err(PreviewError::CaptureBusy) => warn!("photo request dropped, capture in progress"),
                    Err(err) => return Err(err),
                }
                continue;
            }

            match self.registry.handle_event(&mut self.store, event) {
                Ok(true) => pump.applied += 1,
                Ok(false) => {}
                Err(PreviewError::InvalidValue { key, reason }) => {
                    warn!(%key, %reason, "control edit rejected");
                    pump.rejected += 1;
                }
                Err(err) => return Err(err),
            }
        }

        self.flush()?;
        Ok(pump)
    }

    /// Advances the shared clock by `delta`, steps the blade animation and
    /// auto-rotation, then renders the frame.
    pub fn tick(&mut self, delta: Duration) -> Result<FrameTick> {
        let tick = self.clock.advance(delta);
        self.toggles.tick(tick.now)?;

        if self.store.flag(catalog::AUTO_ROTATE).unwrap_or(false) && self.pointer.is_none() {
            let wobble = tick.now.as_secs_f32().sin() * AUTO_ROTATE_WOBBLE;
            lock(&self.scene, "scene")?.rotate(MODEL_NODE, AUTO_ROTATE_YAW, wobble);
        }

        lock(&self.renderer, "renderer")?.render()?;
        Ok(tick)
    }

    /// Mouse wheel: moves the camera one `zoomSpeed` step per notch, within
    /// `[zoomMin, zoomMax]`.
    pub fn zoom(&mut self, delta_y: f32) -> Result<f32> {
        let current = self.store.number(catalog::ZOOM_DISTANCE).unwrap_or_default();
        if delta_y == 0.0 || !delta_y.is_finite() {
            return Ok(current);
        }
        let speed = self.store.number(catalog::ZOOM_SPEED).unwrap_or_default();
        let target = current + delta_y.signum() * speed;
        let applied = self.store.set(catalog::ZOOM_DISTANCE, target)?;
        self.flush()?;
        Ok(applied.as_number().unwrap_or(current))
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        self.pointer = Some((x, y));
    }

    /// Drag rotation goes straight to the scene; it is view state, not a
    /// parameter.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Result<()> {
        let Some((last_x, last_y)) = self.pointer else {
            return Ok(());
        };
        self.pointer = Some((x, y));

        let speed = self
            .store
            .number(catalog::DRAG_ROTATION_SPEED)
            .unwrap_or_default();
        let (dx, dy) = (x - last_x, y - last_y);
        if !lock(&self.scene, "scene")?.rotate(MODEL_NODE, dx * speed, dy * speed) {
            debug!("drag ignored, model not loaded");
        }
        Ok(())
    }

    pub fn pointer_up(&mut self) {
        self.pointer = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.pointer.is_some()
    }

    pub fn set_blade(&mut self, on: bool) -> Result<()> {
        self.set(catalog::BLADE_ON, on)
    }

    pub fn toggle_blade(&mut self) -> Result<bool> {
        let on = !self.store.flag(catalog::BLADE_ON).unwrap_or(false);
        self.set_blade(on)?;
        Ok(on)
    }

    /// Builds the capture request described by the photo parameters.
    pub fn photo_request(&self) -> Result<CaptureRequest> {
        let canvas = lock(&self.renderer, "renderer")?.output_size();
        let choice = self.store.text(catalog::PHOTO_RESOLUTION).unwrap_or("canvas");
        let resolution = self.resolutions.resolve(choice, canvas)?;

        let mut request = CaptureRequest::from_resolution(resolution)
            .with_quality(self.store.number(catalog::PHOTO_QUALITY).unwrap_or(1.0))
            .with_background(self.store.color(catalog::PHOTO_BACKGROUND).unwrap_or(Color::BLACK));

        if self.store.flag(catalog::DOF_ENABLED).unwrap_or(false) {
            let focus = if self.store.flag(catalog::DOF_AUTO_FOCUS).unwrap_or(false) {
                FocusTarget::Node {
                    camera: CAMERA_NODE.to_string(),
                    target: MODEL_NODE.to_string(),
                }
            } else {
                FocusTarget::Distance(self.store.number(catalog::DOF_FOCUS).unwrap_or_default())
            };
            request = request.with_depth_of_field(DepthOfFieldRequest {
                enabled: true,
                focus,
                aperture: self.store.number(catalog::DOF_APERTURE).unwrap_or_default(),
            });
        }
        Ok(request)
    }

    pub fn take_photo(&self) -> Result<CaptureOutput> {
        // The request reads the live canvas size; a capture in flight holds
        // the renderer.
        if self.capture.is_busy() {
            return Err(PreviewError::CaptureBusy);
        }
        let request = self.photo_request()?;
        self.capture.capture(&request)
    }

    fn flush(&mut self) -> Result<usize> {
        let mut ctx = EffectContext {
            store: &mut self.store,
            renderer: &self.renderer,
            scene: &self.scene,
            toggles: &mut self.toggles,
            now: self.clock.now(),
        };
        self.registry.flush(&mut ctx)
    }
}

impl std::fmt::Debug for PreviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewSession")
            .field("frame", &self.clock.frame())
            .field("bindings", &self.registry.len())
            .field("toggles", &self.toggles)
            .field("capture", &self.capture)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        bindings::ControlPanel,
        render::{HeadlessRenderer, LightKind, Renderer},
        scene::{Scene, SceneGraph},
        toggle::ToggleState,
    };

    struct Harness {
        renderer: Arc<Mutex<HeadlessRenderer>>,
        scene: Arc<Mutex<SceneGraph>>,
        panel: Arc<Mutex<ControlPanel>>,
        session: PreviewSession,
    }

    fn harness() -> Harness {
        let renderer = Arc::new(Mutex::new(HeadlessRenderer::new(crate::render::Extent::new(
            320, 180,
        ))));
        let scene = Arc::new(Mutex::new(SceneGraph::with_saber()));
        let panel = Arc::new(Mutex::new(ControlPanel::with_controls(standard_control_ids())));

        let shared_renderer: SharedRenderer = renderer.clone();
        let shared_scene: SharedScene = scene.clone();
        let mut session = PreviewSession::new(shared_renderer, shared_scene).unwrap();
        let surface: SharedSurface = panel.clone();
        session.attach_surface(&surface).unwrap();

        Harness {
            renderer,
            scene,
            panel,
            session,
        }
    }

    impl Harness {
        fn input(&self, id: &str, raw: &str) {
            assert!(self.panel.lock().unwrap().input(id, raw), "no control {id}");
        }

        fn control(&self, id: &str) -> String {
            self.panel.lock().unwrap().value(id).unwrap().to_string()
        }
    }

    #[test]
    fn defaults_reach_renderer_scene_and_controls() {
        let h = harness();
        let renderer = h.renderer.lock().unwrap();
        assert_eq!(renderer.post_process().bloom_strength, 2.2);
        assert_eq!(renderer.light_intensity(LightKind::Ambient), 1.0);
        drop(renderer);

        let scene = h.scene.lock().unwrap();
        assert_eq!(scene.camera_distance(), 100.0);
        assert_eq!(scene.node(BLADE_NODE).unwrap().emissive_intensity, 8.0);
        drop(scene);

        assert_eq!(h.control("bloom-strength-value"), "2.2");
        assert_eq!(h.control("photo-quality-value"), "92%");
        assert_eq!(h.control("toggle-switch"), "true");
    }

    #[test]
    fn slider_edit_updates_renderer_and_label() {
        let mut h = harness();
        h.input("bloom-strength-slider", "4.0");
        let pump = h.session.pump_controls().unwrap();

        assert_eq!(pump.applied, 1);
        assert_eq!(h.control("bloom-strength-value"), "4");
        assert_eq!(h.renderer.lock().unwrap().post_process().bloom_strength, 4.0);
    }

    #[test]
    fn bad_control_text_is_counted_not_fatal() {
        let mut h = harness();
        h.input("zoom-speed-input", "fast");
        h.input("ambient-light-slider", "3");
        let pump = h.session.pump_controls().unwrap();

        assert_eq!(pump.rejected, 1);
        assert_eq!(pump.applied, 1);
        assert_eq!(h.renderer.lock().unwrap().light_intensity(LightKind::Ambient), 3.0);
    }

    #[test]
    fn wheel_zoom_steps_and_clamps() {
        let mut h = harness();
        assert_eq!(h.session.zoom(1.0).unwrap(), 125.0);
        assert_eq!(h.session.zoom(-3.0).unwrap(), 100.0);
        assert_eq!(h.session.zoom(0.0).unwrap(), 100.0);

        h.session.set(catalog::ZOOM_DISTANCE, 10_000.0).unwrap();
        assert_eq!(h.scene.lock().unwrap().camera_distance(), 350.0);

        h.input("zoom-max-input", "200");
        h.session.pump_controls().unwrap();
        assert_eq!(h.session.store().number(catalog::ZOOM_DISTANCE), Some(200.0));
        assert_eq!(h.scene.lock().unwrap().camera_distance(), 200.0);
    }

    #[test]
    fn drag_rotates_model_only_while_pressed() {
        let mut h = harness();
        h.session.pointer_move(50.0, 50.0).unwrap();
        h.session.pointer_down(10.0, 10.0);
        h.session.pointer_move(20.0, 15.0).unwrap();
        h.session.pointer_up();
        h.session.pointer_move(90.0, 90.0).unwrap();

        let rotation = h.scene.lock().unwrap().node(MODEL_NODE).unwrap().transform.rotation;
        assert!((rotation.y - 0.1).abs() < 1e-6);
        assert!((rotation.x - 0.05).abs() < 1e-6);
    }

    #[test]
    fn auto_rotate_turns_model_each_frame() {
        let mut h = harness();
        h.session.set(catalog::AUTO_ROTATE, true).unwrap();
        for _ in 0..10 {
            h.session.tick(Duration::from_millis(16)).unwrap();
        }
        let rotation = h.scene.lock().unwrap().node(MODEL_NODE).unwrap().transform.rotation;
        assert!((rotation.y - 10.0 * AUTO_ROTATE_YAW).abs() < 1e-5);
        assert_eq!(h.renderer.lock().unwrap().frames_rendered(), 10);
    }

    #[test]
    fn blade_switch_animates_over_configured_duration() {
        let mut h = harness();
        h.input("toggle-switch", "off");
        h.session.pump_controls().unwrap();
        assert!(matches!(
            h.session.toggles().state(BLADE_NODE),
            Some(ToggleState::TurningOff { .. })
        ));

        h.session.tick(Duration::from_millis(200)).unwrap();
        let half = h.scene.lock().unwrap().node_scale(BLADE_NODE).unwrap();
        assert!(half < 1.0 && half > 0.01);

        h.session.tick(Duration::from_millis(200)).unwrap();
        assert_eq!(h.session.toggles().state(BLADE_NODE), Some(ToggleState::Off));
        let scene = h.scene.lock().unwrap();
        assert_eq!(scene.node_scale(BLADE_NODE), Some(0.01));
        assert_eq!(scene.is_visible(BLADE_NODE), Some(false));
    }

    #[test]
    fn model_state_snaps_blade_without_animation() {
        let mut h = harness();
        let state = ModelState::from_json(r#"{"bladeOn": false, "model": {"position": [1, 2, 3]}}"#).unwrap();
        h.session.apply_model_state(&state).unwrap();

        assert_eq!(h.session.toggles().state(BLADE_NODE), Some(ToggleState::Off));
        assert_eq!(h.control("toggle-switch"), "false");
        let scene = h.scene.lock().unwrap();
        assert_eq!(scene.node_scale(BLADE_NODE), Some(0.01));
        assert_eq!(scene.world_position(MODEL_NODE), Some(glam::Vec3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn photo_button_captures_with_photo_parameters() {
        let mut h = harness();
        h.input("photo-resolution-select", "1280x720");
        h.input("photo-bg-color", "#ff0000");
        h.input(PHOTO_BUTTON, "");
        let pump = h.session.pump_controls().unwrap();

        assert_eq!(pump.photos.len(), 1);
        let photo = &pump.photos[0];
        assert_eq!(photo.extent, crate::render::Extent::new(1280, 720));
        assert!(photo.name.contains("-hd-"));

        let renderer = h.renderer.lock().unwrap();
        assert_eq!(renderer.output_size(), crate::render::Extent::new(320, 180));
        assert_eq!(renderer.background(), Color::BLACK);
    }

    #[test]
    fn auto_focus_targets_model_root() {
        let mut h = harness();
        h.session.set(catalog::DOF_ENABLED, true).unwrap();
        h.session.set(catalog::DOF_AUTO_FOCUS, true).unwrap();

        let request = h.session.photo_request().unwrap();
        let dof = request.depth_of_field.unwrap();
        assert_eq!(
            dof.focus,
            FocusTarget::Node {
                camera: CAMERA_NODE.to_string(),
                target: MODEL_NODE.to_string(),
            }
        );
        assert_eq!(dof.aperture, 2.8);
    }
}
