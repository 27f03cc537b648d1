use chrono::Local;

use crate::{render::Extent, Color, PreviewError, Result};

/// Largest photo side accepted. Keeps the frame allocation bounded and stays
/// well inside the JPEG limit of 65535.
pub const MAX_CAPTURE_SIDE: u32 = 16_384;

/// Where the depth-of-field pass should focus.
#[derive(Debug, Clone, PartialEq)]
pub enum FocusTarget {
    Distance(f32),
    /// Straight-line distance between two scene nodes, measured when the
    /// capture runs.
    Node { camera: String, target: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepthOfFieldRequest {
    pub enabled: bool,
    pub focus: FocusTarget,
    pub aperture: f32,
}

/// Parameters of one photo. Submitted by reference and never mutated by the
/// coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    /// Encoder quality in `0..=1`.
    pub quality: f32,
    pub background: Color,
    pub depth_of_field: Option<DepthOfFieldRequest>,
    /// Short label embedded in generated file names.
    pub tag: String,
}

impl CaptureRequest {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            quality: 0.92,
            background: Color::BLACK,
            depth_of_field: None,
            tag: format!("{width}x{height}"),
        }
    }

    pub fn from_resolution(resolution: Resolution) -> Self {
        let mut request = Self::new(resolution.extent.width, resolution.extent.height);
        request.tag = resolution.tag;
        request
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality.clamp(0.0, 1.0);
        self
    }

    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    pub fn with_depth_of_field(mut self, depth_of_field: DepthOfFieldRequest) -> Self {
        self.depth_of_field = Some(depth_of_field);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.width, self.height)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extent().is_empty() {
            return Err(PreviewError::invalid(
                "capture",
                format!("{}x{} is not a valid output size", self.width, self.height),
            ));
        }
        if self.width > MAX_CAPTURE_SIDE || self.height > MAX_CAPTURE_SIDE {
            return Err(PreviewError::invalid(
                "capture",
                format!(
                    "{}x{} exceeds the {MAX_CAPTURE_SIDE} pixel limit per side",
                    self.width, self.height
                ),
            ));
        }
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(PreviewError::invalid(
                "capture",
                format!("quality {} is outside 0..=1", self.quality),
            ));
        }
        Ok(())
    }
}

/// Output size chosen for a capture plus the tag naming it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub extent: Extent,
    pub tag: String,
}

/// Turns the operator's resolution choice into pixel dimensions. `canvas` is
/// the renderer's current output size.
pub trait ResolutionStrategy: Send + Sync {
    fn resolve(&self, choice: &str, canvas: Extent) -> Result<Resolution>;
}

/// Fixed list of pixel sizes plus the live canvas. Any `WIDTHxHEIGHT` label is
/// accepted as well.
#[derive(Debug, Clone, Default)]
pub struct PresetResolutions;

impl PresetResolutions {
    pub const PRESETS: [(&'static str, u32, u32); 3] = [
        ("fullhd", 1920, 1080),
        ("hd", 1280, 720),
        ("4k", 3840, 2160),
    ];
}

impl ResolutionStrategy for PresetResolutions {
    fn resolve(&self, choice: &str, canvas: Extent) -> Result<Resolution> {
        let choice = choice.trim().to_ascii_lowercase();
        if choice.is_empty() || choice == "canvas" {
            return Ok(Resolution {
                extent: canvas,
                tag: "canvas".to_string(),
            });
        }

        if let Some((tag, width, height)) = Self::PRESETS.iter().find(|(tag, _, _)| *tag == choice) {
            return Ok(Resolution {
                extent: Extent::new(*width, *height),
                tag: tag.to_string(),
            });
        }

        let extent = parse_dimensions(&choice)
            .ok_or_else(|| PreviewError::invalid("photoResolution", format!("unknown resolution `{choice}`")))?;
        let tag = Self::PRESETS
            .iter()
            .find(|(_, w, h)| Extent::new(*w, *h) == extent)
            .map(|(tag, _, _)| tag.to_string())
            .unwrap_or(choice);
        Ok(Resolution { extent, tag })
    }
}

/// Quality labels mapped to multiples of the canvas size.
#[derive(Debug, Clone)]
pub struct ScaledResolutions {
    factors: Vec<(String, f32)>,
}

impl ScaledResolutions {
    pub fn new(factors: impl IntoIterator<Item = (String, f32)>) -> Self {
        Self {
            factors: factors.into_iter().collect(),
        }
    }
}

impl Default for ScaledResolutions {
    fn default() -> Self {
        Self::new([
            ("standard".to_string(), 1.0),
            ("high".to_string(), 2.0),
            ("ultra".to_string(), 4.0),
        ])
    }
}

impl ResolutionStrategy for ScaledResolutions {
    fn resolve(&self, choice: &str, canvas: Extent) -> Result<Resolution> {
        let choice = choice.trim().to_ascii_lowercase();
        let (tag, factor) = self
            .factors
            .iter()
            .find(|(label, _)| *label == choice)
            .ok_or_else(|| PreviewError::invalid("photoResolution", format!("unknown quality `{choice}`")))?;

        let scale = |v: u32| ((v as f32 * factor).round() as u32).max(1);
        Ok(Resolution {
            extent: Extent::new(scale(canvas.width), scale(canvas.height)),
            tag: tag.clone(),
        })
    }
}

fn parse_dimensions(text: &str) -> Option<Extent> {
    let (width, height) = text.split_once(['x', ','])?;
    let width = width.trim().parse().ok()?;
    let height = height.trim().parse().ok()?;
    let extent = Extent::new(width, height);
    (!extent.is_empty()).then_some(extent)
}

/// How captured files are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureNaming {
    /// Same name every time; the extension is appended when missing.
    Fixed(String),
    /// `<prefix>-<tag>-<timestamp>-<sequence>.<ext>`, unique within a session.
    Timestamped { prefix: String },
}

impl Default for CaptureNaming {
    fn default() -> Self {
        CaptureNaming::Timestamped {
            prefix: "saber-photo".to_string(),
        }
    }
}

impl CaptureNaming {
    pub fn name(&self, tag: &str, extension: &str, sequence: u64) -> String {
        match self {
            CaptureNaming::Fixed(name) => {
                if name.ends_with(&format!(".{extension}")) {
                    name.clone()
                } else {
                    format!("{name}.{extension}")
                }
            }
            CaptureNaming::Timestamped { prefix } => {
                let stamp = Local::now().format("%Y%m%d-%H%M%S");
                format!("{prefix}-{tag}-{stamp}-{sequence:03}.{extension}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANVAS: Extent = Extent::new(800, 600);

    #[test]
    fn presets_resolve_labels_sizes_and_canvas() {
        let presets = PresetResolutions;

        let hd = presets.resolve("HD", CANVAS).unwrap();
        assert_eq!(hd.extent, Extent::new(1280, 720));

        let by_size = presets.resolve("3840x2160", CANVAS).unwrap();
        assert_eq!(by_size.tag, "4k");

        let custom = presets.resolve("640,480", CANVAS).unwrap();
        assert_eq!(custom.extent, Extent::new(640, 480));
        assert_eq!(custom.tag, "640,480");

        let canvas = presets.resolve("", CANVAS).unwrap();
        assert_eq!(canvas.extent, CANVAS);

        assert!(presets.resolve("huge", CANVAS).is_err());
        assert!(presets.resolve("0x10", CANVAS).is_err());
    }

    #[test]
    fn scaled_labels_multiply_canvas() {
        let scaled = ScaledResolutions::default();
        let ultra = scaled.resolve("ultra", CANVAS).unwrap();
        assert_eq!(ultra.extent, Extent::new(3200, 2400));
        assert_eq!(ultra.tag, "ultra");
        assert!(scaled.resolve("1920x1080", CANVAS).is_err());
    }

    #[test]
    fn request_validation() {
        assert!(CaptureRequest::new(0, 10).validate().is_err());
        assert!(CaptureRequest::new(MAX_CAPTURE_SIDE, 10).validate().is_ok());
        assert!(CaptureRequest::new(100_000, 100_000).validate().is_err());
        assert!(CaptureRequest::new(10, MAX_CAPTURE_SIDE + 1).validate().is_err());
        assert!(CaptureRequest::new(10, 10).with_quality(3.0).validate().is_ok());

        let mut request = CaptureRequest::new(10, 10);
        request.quality = f32::NAN;
        assert!(request.validate().is_err());
    }

    #[test]
    fn naming_schemes() {
        let fixed = CaptureNaming::Fixed("saber-photo".to_string());
        assert_eq!(fixed.name("hd", "jpg", 7), "saber-photo.jpg");
        let fixed = CaptureNaming::Fixed("shot.png".to_string());
        assert_eq!(fixed.name("hd", "png", 7), "shot.png");

        let stamped = CaptureNaming::default();
        let first = stamped.name("hd", "jpg", 1);
        let second = stamped.name("hd", "jpg", 2);
        assert!(first.starts_with("saber-photo-hd-"));
        assert!(first.ends_with("-001.jpg"));
        assert_ne!(first, second);
    }
}
