use std::path::Path;

use glam::Vec3;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    params::{catalog, SettingsSnapshot},
    scene::NodeTransform,
    Color, PreviewError, Result,
};

pub const SETTINGS_FILE: &str = "initial-scene-settings.json";
pub const MODEL_STATE_FILE: &str = "saber-initial-state.json";

/// Both startup documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub scene: SceneSettings,
    pub model: ModelState,
}

impl AppConfig {
    /// Loads both documents from `dir`. A document that cannot be read is
    /// logged and replaced by its defaults.
    pub fn load_dir(dir: &Path) -> Self {
        let scene = SceneSettings::from_path(&dir.join(SETTINGS_FILE)).unwrap_or_else(|err| {
            warn!(%err, "using default scene settings");
            SceneSettings::default()
        });
        let model = ModelState::from_path(&dir.join(MODEL_STATE_FILE)).unwrap_or_else(|err| {
            warn!(%err, "using default model state");
            ModelState::default()
        });
        Self { scene, model }
    }
}

/// Contents of `initial-scene-settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SceneSettings {
    pub bloom_strength: f32,
    pub bloom_threshold: f32,
    pub bloom_radius: f32,
    pub bloom_exposure: f32,
    pub ambient_light: f32,
    pub directional_light: f32,
    pub emission_intensity: f32,
    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_speed: f32,
    pub drag_rotation_speed: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom_distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_rotate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blade_toggle_ms: Option<f32>,
    pub photo_mode: PhotoSettings,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            bloom_strength: 2.2,
            bloom_threshold: 0.0,
            bloom_radius: 0.25,
            bloom_exposure: 1.0,
            ambient_light: 1.0,
            directional_light: 1.0,
            emission_intensity: 0.8,
            zoom_min: 10.0,
            zoom_max: 350.0,
            zoom_speed: 25.0,
            drag_rotation_speed: 0.01,
            zoom_distance: None,
            auto_rotate: None,
            blade_toggle_ms: None,
            photo_mode: PhotoSettings::default(),
        }
    }
}

impl SceneSettings {
    pub fn from_path(path: &Path) -> Result<Self> {
        let settings: Self = read_document(path)?;
        info!(path = %path.display(), "scene settings loaded");
        Ok(settings)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Flattens the document into store keys. Optional fields that are absent
    /// are left out so the store keeps its current value.
    pub fn to_snapshot(&self) -> SettingsSnapshot {
        let mut snapshot = SettingsSnapshot::new()
            .with(catalog::BLOOM_STRENGTH, self.bloom_strength)
            .with(catalog::BLOOM_THRESHOLD, self.bloom_threshold)
            .with(catalog::BLOOM_RADIUS, self.bloom_radius)
            .with(catalog::BLOOM_EXPOSURE, self.bloom_exposure)
            .with(catalog::AMBIENT_LIGHT, self.ambient_light)
            .with(catalog::DIRECTIONAL_LIGHT, self.directional_light)
            .with(catalog::EMISSION_INTENSITY, self.emission_intensity)
            .with(catalog::ZOOM_MIN, self.zoom_min)
            .with(catalog::ZOOM_MAX, self.zoom_max)
            .with(catalog::ZOOM_SPEED, self.zoom_speed)
            .with(catalog::DRAG_ROTATION_SPEED, self.drag_rotation_speed);

        if let Some(distance) = self.zoom_distance {
            snapshot.insert(catalog::ZOOM_DISTANCE, distance);
        }
        if let Some(auto_rotate) = self.auto_rotate {
            snapshot.insert(catalog::AUTO_ROTATE, auto_rotate);
        }
        if let Some(ms) = self.blade_toggle_ms {
            snapshot.insert(catalog::BLADE_TOGGLE_MS, ms);
        }

        let photo = &self.photo_mode;
        snapshot.insert(catalog::PHOTO_RESOLUTION, photo.resolution.to_label());
        snapshot.insert(catalog::PHOTO_QUALITY, photo.image_quality);
        snapshot.insert(catalog::PHOTO_BACKGROUND, photo.background);
        snapshot.insert(catalog::DOF_ENABLED, photo.dof_enabled);
        snapshot.insert(catalog::DOF_FOCUS, photo.dof_focus);
        snapshot.insert(catalog::DOF_APERTURE, photo.dof_aperture);
        if let Some(auto_focus) = photo.dof_auto_focus {
            snapshot.insert(catalog::DOF_AUTO_FOCUS, auto_focus);
        }
        snapshot
    }
}

/// `photoMode` object of the settings document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoSettings {
    pub resolution: ResolutionSetting,
    pub image_quality: f32,
    pub background: Color,
    pub dof_enabled: bool,
    pub dof_focus: f32,
    pub dof_aperture: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dof_auto_focus: Option<bool>,
}

impl Default for PhotoSettings {
    fn default() -> Self {
        Self {
            resolution: ResolutionSetting::Size([1920, 1080]),
            image_quality: 0.92,
            background: Color::BLACK,
            dof_enabled: false,
            dof_focus: 100.0,
            dof_aperture: 2.8,
            dof_auto_focus: None,
        }
    }
}

/// Photo resolution as written in the document: explicit pixels, a label, or
/// the pair of window-size placeholders meaning "current canvas".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolutionSetting {
    Size([u32; 2]),
    Placeholder([String; 2]),
    Label(String),
}

impl ResolutionSetting {
    pub fn to_label(&self) -> String {
        match self {
            ResolutionSetting::Size([width, height]) => format!("{width}x{height}"),
            ResolutionSetting::Placeholder(_) => "canvas".to_string(),
            ResolutionSetting::Label(label) => label.clone(),
        }
    }
}

/// Contents of `saber-initial-state.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelState {
    pub blade_on: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelPlacement>,
}

impl Default for ModelState {
    fn default() -> Self {
        Self {
            blade_on: true,
            model: None,
        }
    }
}

impl ModelState {
    pub fn from_path(path: &Path) -> Result<Self> {
        let state: Self = read_document(path)?;
        info!(path = %path.display(), blade_on = state.blade_on, "model state loaded");
        Ok(state)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Placement of the model root. Missing triples keep the value of the base
/// transform; rotation is in radians.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPlacement {
    pub position: Option<[f32; 3]>,
    pub scale: Option<[f32; 3]>,
    pub rotation: Option<[f32; 3]>,
}

impl ModelPlacement {
    pub fn apply_to(&self, mut transform: NodeTransform) -> NodeTransform {
        if let Some(position) = self.position {
            transform.position = Vec3::from_array(position);
        }
        if let Some(scale) = self.scale {
            transform.scale = Vec3::from_array(scale);
        }
        if let Some(rotation) = self.rotation {
            transform.rotation = Vec3::from_array(rotation);
        }
        transform
    }
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let unavailable = |reason: String| PreviewError::AssetUnavailable {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|err| unavailable(err.to_string()))?;
    serde_json::from_str(&text).map_err(|err| unavailable(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterStore;

    #[test]
    fn parses_full_settings_document() {
        let settings = SceneSettings::from_json(
            r##"{
                "bloomStrength": 3.1,
                "bloomThreshold": 0.1,
                "bloomRadius": 0.4,
                "bloomExposure": 1.2,
                "ambientLight": 2,
                "directionalLight": 0.5,
                "emissionIntensity": 0.6,
                "zoomMin": 20,
                "zoomMax": 300,
                "zoomSpeed": 15,
                "dragRotationSpeed": 0.02,
                "photoMode": {
                    "resolution": ["window.innerWidth", "window.innerHeight"],
                    "imageQuality": 0.8,
                    "background": "#101820",
                    "dofEnabled": true,
                    "dofFocus": 120,
                    "dofAperture": 4
                }
            }"##,
        )
        .unwrap();

        assert_eq!(settings.zoom_max, 300.0);
        assert_eq!(settings.photo_mode.resolution.to_label(), "canvas");
        assert_eq!(settings.photo_mode.background, Color::rgb(0x10, 0x18, 0x20));
        assert_eq!(settings.zoom_distance, None);

        let snapshot = settings.to_snapshot();
        assert!(snapshot.get(catalog::ZOOM_DISTANCE).is_none());
        assert_eq!(
            snapshot.get(catalog::PHOTO_QUALITY).and_then(|v| v.as_number()),
            Some(0.8)
        );
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings = SceneSettings::from_json(r#"{"photoMode": {"resolution": [1280, 720]}}"#).unwrap();
        assert_eq!(settings.bloom_strength, 2.2);
        assert_eq!(settings.photo_mode.resolution.to_label(), "1280x720");
        assert_eq!(settings.photo_mode.image_quality, 0.92);
    }

    #[test]
    fn defaults_match_the_standard_catalog() {
        let mut store = ParameterStore::standard();
        let before = store.snapshot();
        store.apply_snapshot(&SceneSettings::default().to_snapshot()).unwrap();
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn model_state_applies_present_triples_only() {
        let state = ModelState::from_json(
            r#"{"bladeOn": false, "model": {"position": [0, -5, 0], "rotation": [0, 1.5, 0]}}"#,
        )
        .unwrap();
        assert!(!state.blade_on);

        let transform = state.model.unwrap().apply_to(NodeTransform::default());
        assert_eq!(transform.position, Vec3::new(0.0, -5.0, 0.0));
        assert_eq!(transform.rotation.y, 1.5);
        assert_eq!(transform.scale, Vec3::ONE);
    }

    #[test]
    fn unreadable_documents_are_asset_errors() {
        let err = SceneSettings::from_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, PreviewError::AssetUnavailable { .. }));

        let config = AppConfig::load_dir(Path::new("/definitely/not/here"));
        assert_eq!(config, AppConfig::default());
    }
}
