use crate::Color;

use super::{format_number, ParamValue, Parameter, Range};

pub const BLOOM_STRENGTH: &str = "bloomStrength";
pub const BLOOM_THRESHOLD: &str = "bloomThreshold";
pub const BLOOM_RADIUS: &str = "bloomRadius";
pub const BLOOM_EXPOSURE: &str = "bloomExposure";
pub const AMBIENT_LIGHT: &str = "ambientLight";
pub const DIRECTIONAL_LIGHT: &str = "directionalLight";
pub const EMISSION_INTENSITY: &str = "emissionIntensity";
pub const ZOOM_MIN: &str = "zoomMin";
pub const ZOOM_MAX: &str = "zoomMax";
pub const ZOOM_SPEED: &str = "zoomSpeed";
pub const ZOOM_DISTANCE: &str = "zoomDistance";
pub const DRAG_ROTATION_SPEED: &str = "dragRotationSpeed";
pub const AUTO_ROTATE: &str = "autoRotate";
pub const BLADE_ON: &str = "bladeOn";
pub const BLADE_TOGGLE_MS: &str = "bladeToggleMs";
pub const PHOTO_RESOLUTION: &str = "photoResolution";
pub const PHOTO_QUALITY: &str = "photoQuality";
pub const PHOTO_BACKGROUND: &str = "photoBackground";
pub const DOF_ENABLED: &str = "dofEnabled";
pub const DOF_FOCUS: &str = "dofFocus";
pub const DOF_APERTURE: &str = "dofAperture";
pub const DOF_AUTO_FOCUS: &str = "dofAutoFocus";

fn milliseconds(value: &ParamValue) -> String {
    match value {
        ParamValue::Number(v) => format!("{} ms", format_number(*v, 0)),
        other => super::format_value(other),
    }
}

fn percent(value: &ParamValue) -> String {
    match value {
        ParamValue::Number(v) => format!("{}%", format_number(*v * 100.0, 0)),
        other => super::format_value(other),
    }
}

pub fn standard_parameters() -> Vec<Parameter> {
    vec![
        Parameter::number(BLOOM_STRENGTH, 2.2).within(0.0, 5.0),
        Parameter::number(BLOOM_THRESHOLD, 0.0).within(0.0, 1.0),
        Parameter::number(BLOOM_RADIUS, 0.25).within(0.0, 1.0),
        Parameter::number(BLOOM_EXPOSURE, 1.0).within(0.0, 2.0),
        Parameter::number(AMBIENT_LIGHT, 1.0).within(0.0, 10.0),
        Parameter::number(DIRECTIONAL_LIGHT, 1.0).within(0.0, 10.0),
        Parameter::number(EMISSION_INTENSITY, 0.8).within(0.0, 1.0),
        Parameter::number(ZOOM_MIN, 10.0).within(1.0, 350.0),
        Parameter::number(ZOOM_MAX, 350.0).within(10.0, 1000.0),
        Parameter::number(ZOOM_SPEED, 25.0).within(0.1, 100.0),
        Parameter::number(ZOOM_DISTANCE, 100.0).with_range(Range::linked(ZOOM_MIN, ZOOM_MAX)),
        Parameter::number(DRAG_ROTATION_SPEED, 0.01).within(0.001, 0.1),
        Parameter::flag(AUTO_ROTATE, false),
        Parameter::flag(BLADE_ON, true),
        Parameter::number(BLADE_TOGGLE_MS, 400.0)
            .within(0.0, 5_000.0)
            .with_display(milliseconds),
        Parameter::text(PHOTO_RESOLUTION, "1920x1080"),
        Parameter::number(PHOTO_QUALITY, 0.92)
            .within(0.1, 1.0)
            .with_display(percent),
        Parameter::color(PHOTO_BACKGROUND, Color::BLACK),
        Parameter::flag(DOF_ENABLED, false),
        Parameter::number(DOF_FOCUS, 100.0).within(10.0, 500.0),
        Parameter::number(DOF_APERTURE, 2.8).within(0.5, 16.0),
        Parameter::flag(DOF_AUTO_FOCUS, false),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn keys_are_unique() {
        let params = standard_parameters();
        let keys: HashSet<_> = params.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys.len(), params.len());
    }

    #[test]
    fn display_transforms_apply_to_labels() {
        let params = standard_parameters();
        let find = |key: &str| params.iter().find(|p| p.key == key).unwrap();

        assert_eq!(find(BLADE_TOGGLE_MS).format(&ParamValue::Number(400.0)), "400 ms");
        assert_eq!(find(PHOTO_QUALITY).format(&ParamValue::Number(0.92)), "92%");
        assert_eq!(find(BLOOM_STRENGTH).format(&ParamValue::Number(4.0)), "4");
    }
}
