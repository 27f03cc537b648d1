use serde::{Deserialize, Serialize};

use crate::{Color, PreviewError, Result};

/// Pixel dimensions of the render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Bloom pass and tone mapping parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostProcess {
    pub bloom_strength: f32,
    pub bloom_threshold: f32,
    pub bloom_radius: f32,
    pub exposure: f32,
}

impl Default for PostProcess {
    fn default() -> Self {
        Self {
            bloom_strength: 0.5,
            bloom_threshold: 1.0,
            bloom_radius: 0.75,
            exposure: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthOfField {
    pub enabled: bool,
    pub focus_distance: f32,
    pub aperture: f32,
}

impl Default for DepthOfField {
    fn default() -> Self {
        Self {
            enabled: false,
            focus_distance: 100.0,
            aperture: 2.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Ambient,
    Directional,
}

/// Tightly packed RGBA8 pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(PreviewError::msg(format!(
                "pixel buffer holds {} bytes, expected {expected} for {width}x{height}",
                rgba.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn filled(extent: Extent, color: Color) -> Self {
        let mut rgba = Vec::with_capacity(extent.pixel_count() * 4);
        for _ in 0..extent.pixel_count() {
            rgba.extend_from_slice(&[color.r, color.g, color.b, 255]);
        }
        Self {
            width: extent.width,
            height: extent.height,
            rgba,
        }
    }

    /// Drops the alpha channel.
    pub fn to_rgb(&self) -> Vec<u8> {
        self.rgba
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()
    }
}

/// Rendering backend collaborator. Implementations own the actual GPU
/// resources; the core only reads and writes the presentation state listed
/// here and asks for a frame.
pub trait Renderer: Send {
    fn output_size(&self) -> Extent;
    fn set_output_size(&mut self, size: Extent);
    fn background(&self) -> Color;
    fn set_background(&mut self, color: Color);
    fn post_process(&self) -> PostProcess;
    fn set_post_process(&mut self, settings: PostProcess);
    fn depth_of_field(&self) -> DepthOfField;
    fn set_depth_of_field(&mut self, settings: DepthOfField);
    fn light_intensity(&self, light: LightKind) -> f32;
    fn set_light_intensity(&mut self, light: LightKind, intensity: f32);
    /// Runs one synchronous render pass at the current settings.
    fn render(&mut self) -> Result<()>;
    /// Returns the pixels produced by the most recent [`Renderer::render`].
    fn read_pixels(&self) -> Result<PixelBuffer>;
}

type RenderHook = Box<dyn FnMut(&RenderState) -> Result<()> + Send>;

/// Presentation state tracked by [`HeadlessRenderer`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderState {
    pub size: Extent,
    pub background: Color,
    pub post: PostProcess,
    pub dof: DepthOfField,
    pub ambient: f32,
    pub directional: f32,
}

impl Default for RenderState {
    fn default() -> Self {
        Self {
            size: Extent::new(1280, 720),
            background: Color::BLACK,
            post: PostProcess::default(),
            dof: DepthOfField::default(),
            ambient: 1.0,
            directional: 1.0,
        }
    }
}

/// In-memory renderer used by the command line front-end and the tests. It
/// keeps track of the presentation state and "renders" a frame cleared to the
/// background color.
pub struct HeadlessRenderer {
    state: RenderState,
    frame: Option<PixelBuffer>,
    frames_rendered: u64,
    hook: Option<RenderHook>,
}

impl HeadlessRenderer {
    pub fn new(size: Extent) -> Self {
        Self {
            state: RenderState {
                size,
                ..RenderState::default()
            },
            frame: None,
            frames_rendered: 0,
            hook: None,
        }
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Installs a callback that runs inside every render pass, before the
    /// frame is produced. Returning an error fails the pass.
    pub fn set_render_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&RenderState) -> Result<()> + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
    }

    pub fn clear_render_hook(&mut self) {
        self.hook = None;
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(RenderState::default().size)
    }
}

impl std::fmt::Debug for HeadlessRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessRenderer")
            .field("state", &self.state)
            .field("frames_rendered", &self.frames_rendered)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

impl Renderer for HeadlessRenderer {
    fn output_size(&self) -> Extent {
        self.state.size
    }

    fn set_output_size(&mut self, size: Extent) {
        self.state.size = size;
    }

    fn background(&self) -> Color {
        self.state.background
    }

    fn set_background(&mut self, color: Color) {
        self.state.background = color;
    }

    fn post_process(&self) -> PostProcess {
        self.state.post
    }

    fn set_post_process(&mut self, settings: PostProcess) {
        self.state.post = settings;
    }

    fn depth_of_field(&self) -> DepthOfField {
        self.state.dof
    }

    fn set_depth_of_field(&mut self, settings: DepthOfField) {
        self.state.dof = settings;
    }

    fn light_intensity(&self, light: LightKind) -> f32 {
        match light {
            LightKind::Ambient => self.state.ambient,
            LightKind::Directional => self.state.directional,
        }
    }

    fn set_light_intensity(&mut self, light: LightKind, intensity: f32) {
        match light {
            LightKind::Ambient => self.state.ambient = intensity,
            LightKind::Directional => self.state.directional = intensity,
        }
    }

    fn render(&mut self) -> Result<()> {
        if let Some(hook) = self.hook.as_mut() {
            hook(&self.state)?;
        }
        if self.state.size.is_empty() {
            return Err(PreviewError::msg("cannot render into an empty target"));
        }
        self.frame = Some(PixelBuffer::filled(self.state.size, self.state.background));
        self.frames_rendered += 1;
        Ok(())
    }

    fn read_pixels(&self) -> Result<PixelBuffer> {
        self.frame
            .clone()
            .ok_or_else(|| PreviewError::msg("no frame has been rendered yet"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_frame_at_current_size_and_background() {
        let mut renderer = HeadlessRenderer::new(Extent::new(4, 2));
        renderer.set_background(Color::rgb(10, 20, 30));
        renderer.render().unwrap();

        let frame = renderer.read_pixels().unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(&frame.rgba[..4], &[10, 20, 30, 255]);
        assert_eq!(frame.to_rgb().len(), 4 * 2 * 3);
        assert_eq!(renderer.frames_rendered(), 1);
    }

    #[test]
    fn hook_failure_fails_the_pass() {
        let mut renderer = HeadlessRenderer::default();
        renderer.set_render_hook(|_| Err(PreviewError::msg("device lost")));

        assert!(renderer.render().is_err());
        assert!(renderer.read_pixels().is_err());
        assert_eq!(renderer.frames_rendered(), 0);
    }

    #[test]
    fn pixel_buffer_checks_length() {
        assert!(PixelBuffer::new(2, 2, vec![0; 16]).is_ok());
        assert!(PixelBuffer::new(2, 2, vec![0; 15]).is_err());
    }
}
