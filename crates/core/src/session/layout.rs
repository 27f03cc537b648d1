use crate::{
    bindings::{Binding, ControlBindingRegistry, Direction, EffectContext},
    params::{catalog, ParamValue, ParameterStore},
    render::{LightKind, PostProcess},
    scene::BLADE_NODE,
    shared::lock,
    Result,
};

/// Control that triggers a capture instead of editing a parameter.
pub const PHOTO_BUTTON: &str = "photo-take-btn";

/// Emissive intensity applied to the blade per unit of `emissionIntensity`.
pub const EMISSION_GAIN: f32 = 10.0;

/// Slider controls paired with a read-only value label: `<stem>-slider` and
/// `<stem>-value`.
const SLIDERS: [(&str, &str); 11] = [
    ("bloom-strength", catalog::BLOOM_STRENGTH),
    ("bloom-threshold", catalog::BLOOM_THRESHOLD),
    ("bloom-radius", catalog::BLOOM_RADIUS),
    ("bloom-exposure", catalog::BLOOM_EXPOSURE),
    ("ambient-light", catalog::AMBIENT_LIGHT),
    ("directional-light", catalog::DIRECTIONAL_LIGHT),
    ("emission-intensity", catalog::EMISSION_INTENSITY),
    ("drag-rotation-speed", catalog::DRAG_ROTATION_SPEED),
    ("photo-quality", catalog::PHOTO_QUALITY),
    ("photo-dof-focus", catalog::DOF_FOCUS),
    ("photo-dof-aperture", catalog::DOF_APERTURE),
];

const NUMBER_INPUTS: [(&str, &str); 3] = [
    ("zoom-min-input", catalog::ZOOM_MIN),
    ("zoom-max-input", catalog::ZOOM_MAX),
    ("zoom-speed-input", catalog::ZOOM_SPEED),
];

const CHECKBOXES: [(&str, &str); 4] = [
    ("toggle-switch", catalog::BLADE_ON),
    ("auto-rotate-toggle", catalog::AUTO_ROTATE),
    ("photo-dof-toggle", catalog::DOF_ENABLED),
    ("photo-dof-auto-focus", catalog::DOF_AUTO_FOCUS),
];

/// Every control id of the standard panel, the capture button included.
pub fn standard_control_ids() -> Vec<String> {
    let mut ids = Vec::new();
    for (stem, _) in SLIDERS {
        ids.push(format!("{stem}-slider"));
        ids.push(format!("{stem}-value"));
    }
    ids.extend(NUMBER_INPUTS.iter().map(|(id, _)| id.to_string()));
    ids.extend(CHECKBOXES.iter().map(|(id, _)| id.to_string()));
    ids.push("photo-bg-color".to_string());
    ids.push("photo-resolution-select".to_string());
    ids.push(PHOTO_BUTTON.to_string());
    ids
}

pub(crate) fn install_bindings(registry: &mut ControlBindingRegistry, store: &ParameterStore) -> Result<()> {
    for (stem, key) in SLIDERS {
        registry.bind(store, Binding::slider(format!("{stem}-slider"), key))?;
        registry.bind(store, Binding::label(format!("{stem}-value"), key))?;
    }
    for (id, key) in NUMBER_INPUTS {
        registry.bind(store, Binding::slider(id, key))?;
    }
    for (id, key) in CHECKBOXES {
        registry.bind(store, Binding::checkbox(id, key))?;
    }
    registry.bind(store, Binding::new("photo-bg-color", catalog::PHOTO_BACKGROUND, Direction::Both))?;
    registry.bind(
        store,
        Binding::new("photo-resolution-select", catalog::PHOTO_RESOLUTION, Direction::Both),
    )?;
    Ok(())
}

fn post_effect(
    apply: fn(&mut PostProcess, f32),
) -> impl FnMut(&ParamValue, &mut EffectContext<'_>) -> Result<()> + Send + 'static {
    move |value, ctx| {
        if let Some(v) = value.as_number() {
            let mut renderer = lock(ctx.renderer, "renderer")?;
            let mut post = renderer.post_process();
            apply(&mut post, v);
            renderer.set_post_process(post);
        }
        Ok(())
    }
}

fn light_effect(
    light: LightKind,
) -> impl FnMut(&ParamValue, &mut EffectContext<'_>) -> Result<()> + Send + 'static {
    move |value, ctx| {
        if let Some(v) = value.as_number() {
            lock(ctx.renderer, "renderer")?.set_light_intensity(light, v);
        }
        Ok(())
    }
}

pub(crate) fn install_effects(registry: &mut ControlBindingRegistry) {
    registry.on_change(catalog::BLOOM_STRENGTH, post_effect(|p, v| p.bloom_strength = v));
    registry.on_change(catalog::BLOOM_THRESHOLD, post_effect(|p, v| p.bloom_threshold = v));
    registry.on_change(catalog::BLOOM_RADIUS, post_effect(|p, v| p.bloom_radius = v));
    registry.on_change(catalog::BLOOM_EXPOSURE, post_effect(|p, v| p.exposure = v));
    registry.on_change(catalog::AMBIENT_LIGHT, light_effect(LightKind::Ambient));
    registry.on_change(catalog::DIRECTIONAL_LIGHT, light_effect(LightKind::Directional));

    registry.on_change(catalog::EMISSION_INTENSITY, |value, ctx| {
        if let Some(v) = value.as_number() {
            if !lock(ctx.scene, "scene")?.set_emissive_intensity(BLADE_NODE, v * EMISSION_GAIN) {
                tracing::debug!("blade not loaded yet, emission applies on next change");
            }
        }
        Ok(())
    });

    registry.on_change(catalog::ZOOM_DISTANCE, |value, ctx| {
        if let Some(v) = value.as_number() {
            lock(ctx.scene, "scene")?.set_camera_distance(v);
        }
        Ok(())
    });

    registry.on_change(catalog::BLADE_TOGGLE_MS, |value, ctx| {
        if let Some(ms) = value.as_number() {
            ctx.toggles.set_default_duration(ms);
            ctx.toggles.set_duration(BLADE_NODE, ms);
        }
        Ok(())
    });

    registry.on_change(catalog::BLADE_ON, |value, ctx| match value.as_flag() {
        Some(on) => ctx.toggles.set_target(BLADE_NODE, on, ctx.now),
        None => Ok(()),
    });
}
