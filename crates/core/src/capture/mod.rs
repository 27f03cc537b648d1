//! High resolution photo capture.
//!
//! A capture temporarily reconfigures the shared renderer (output size,
//! background, depth of field), renders one frame, reads it back and encodes
//! it. Whatever happens in between, the renderer leaves the transaction in the
//! exact state it entered it. Only one capture runs at a time; a second
//! request is rejected rather than queued.

mod encode;
mod request;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, MutexGuard, PoisonError, TryLockError,
};

use tracing::{debug, info, warn};

pub use encode::{FrameEncoder, JpegEncoder, PngEncoder};
pub use request::{
    CaptureNaming, CaptureRequest, DepthOfFieldRequest, FocusTarget, PresetResolutions, Resolution,
    ResolutionStrategy, ScaledResolutions, MAX_CAPTURE_SIDE,
};

use crate::{
    error::CaptureStage,
    render::{DepthOfField, Extent, PostProcess, Renderer},
    shared::{lock, SharedRenderer, SharedScene},
    Color, PreviewError, Result,
};

/// Renderer presentation state saved at the start of a capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSnapshot {
    pub size: Extent,
    pub background: Color,
    pub post: PostProcess,
    pub dof: DepthOfField,
}

impl CaptureSnapshot {
    pub fn take(renderer: &dyn Renderer) -> Self {
        Self {
            size: renderer.output_size(),
            background: renderer.background(),
            post: renderer.post_process(),
            dof: renderer.depth_of_field(),
        }
    }

    /// Writes every saved value back, in reverse order of capture.
    pub fn restore(&self, renderer: &mut dyn Renderer) {
        renderer.set_depth_of_field(self.dof);
        renderer.set_post_process(self.post);
        renderer.set_background(self.background);
        renderer.set_output_size(self.size);
    }
}

/// Encoded photo handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutput {
    pub name: String,
    pub extent: Extent,
    pub bytes: Vec<u8>,
}

/// Holds the renderer for the duration of a capture and restores the snapshot
/// when dropped, including on early returns and unwinding.
struct Transaction<'a> {
    renderer: MutexGuard<'a, dyn Renderer + 'static>,
    snapshot: CaptureSnapshot,
}

impl<'a> Transaction<'a> {
    fn begin(renderer: MutexGuard<'a, dyn Renderer + 'static>) -> Self {
        let snapshot = CaptureSnapshot::take(&*renderer);
        Self { renderer, snapshot }
    }

    fn renderer(&mut self) -> &mut dyn Renderer {
        &mut *self.renderer
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        self.snapshot.restore(&mut *self.renderer);
        debug!(size = ?self.snapshot.size, "renderer state restored after capture");
    }
}

pub struct CaptureCoordinator {
    renderer: SharedRenderer,
    scene: SharedScene,
    encoder: Box<dyn FrameEncoder>,
    naming: CaptureNaming,
    gate: Mutex<()>,
    sequence: AtomicU64,
}

impl CaptureCoordinator {
    pub fn new(renderer: SharedRenderer, scene: SharedScene) -> Self {
        Self {
            renderer,
            scene,
            encoder: Box::new(JpegEncoder),
            naming: CaptureNaming::default(),
            gate: Mutex::new(()),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn with_encoder(mut self, encoder: impl FrameEncoder + 'static) -> Self {
        self.encoder = Box::new(encoder);
        self
    }

    pub fn with_naming(mut self, naming: CaptureNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn naming(&self) -> &CaptureNaming {
        &self.naming
    }

    /// True while another thread is inside [`CaptureCoordinator::capture`].
    pub fn is_busy(&self) -> bool {
        matches!(self.gate.try_lock(), Err(TryLockError::WouldBlock))
    }

    /// Number of photos produced so far.
    pub fn captured(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Runs one capture transaction.
    ///
    /// Fails with [`PreviewError::CaptureBusy`] while another capture is in
    /// flight and with [`PreviewError::CaptureFailure`] when a stage fails. In
    /// both cases the renderer's state is the same as before the call.
    pub fn capture(&self, request: &CaptureRequest) -> Result<CaptureOutput> {
        let _gate = match self.gate.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                warn!("capture rejected, another capture is in progress");
                return Err(PreviewError::CaptureBusy);
            }
            // A panic in an earlier capture already ran its restore.
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("recovering capture gate after a panicked capture");
                self.gate.clear_poison();
                poisoned.into_inner()
            }
        };
        request.validate()?;

        let mut tx = Transaction::begin(self.lock_renderer());
        let extent = request.extent();

        tx.renderer().set_output_size(extent);
        tx.renderer().set_background(request.background);
        match &request.depth_of_field {
            Some(dof) if dof.enabled => {
                let focus_distance = self
                    .focus_distance(&dof.focus)
                    .map_err(|err| PreviewError::capture(CaptureStage::Override, err))?;
                tx.renderer().set_depth_of_field(DepthOfField {
                    enabled: true,
                    focus_distance,
                    aperture: dof.aperture,
                });
            }
            // focus and aperture stay as the live view had them
            Some(_) => {
                let live = tx.snapshot.dof;
                tx.renderer().set_depth_of_field(DepthOfField {
                    enabled: false,
                    ..live
                });
            }
            None => {}
        }

        tx.renderer()
            .render()
            .map_err(|err| PreviewError::capture(CaptureStage::Render, err))?;
        let frame = tx
            .renderer()
            .read_pixels()
            .map_err(|err| PreviewError::capture(CaptureStage::Readback, err))?;
        let bytes = self
            .encoder
            .encode(&frame, request.quality)
            .map_err(|err| PreviewError::capture(CaptureStage::Encode, err))?;
        drop(tx);

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let name = self
            .naming
            .name(&request.tag, self.encoder.extension(), sequence);
        info!(%name, width = extent.width, height = extent.height, bytes = bytes.len(), "photo captured");

        Ok(CaptureOutput {
            name,
            extent,
            bytes,
        })
    }

    /// Locks the shared renderer, clearing poison left by a capture that
    /// panicked mid-transaction. Its drop guard has already put the renderer
    /// back.
    fn lock_renderer(&self) -> MutexGuard<'_, dyn Renderer + 'static> {
        self.renderer.lock().unwrap_or_else(|poisoned| {
            warn!("recovering renderer after a panicked capture");
            self.renderer.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }

    fn focus_distance(&self, focus: &FocusTarget) -> Result<f32> {
        match focus {
            FocusTarget::Distance(distance) => Ok(*distance),
            FocusTarget::Node { camera, target } => {
                let scene = lock(&self.scene, "scene")?;
                let from = scene
                    .world_position(camera)
                    .ok_or_else(|| PreviewError::UnknownNode(camera.clone()))?;
                let to = scene
                    .world_position(target)
                    .ok_or_else(|| PreviewError::UnknownNode(target.clone()))?;
                Ok(from.distance(to))
            }
        }
    }
}

impl std::fmt::Debug for CaptureCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureCoordinator")
            .field("encoder", &self.encoder.extension())
            .field("naming", &self.naming)
            .field("captured", &self.captured())
            .finish()
    }
}
