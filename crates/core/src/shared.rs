use std::sync::{Arc, Mutex, MutexGuard};

use crate::{bindings::ControlSurface, render::Renderer, scene::Scene, PreviewError, Result};

/// Renderer handle shared between the registry, the coordinator and the host.
pub type SharedRenderer = Arc<Mutex<dyn Renderer>>;
/// Scene handle shared between the registry, the animator and the coordinator.
pub type SharedScene = Arc<Mutex<dyn Scene>>;
/// Control surface owned by the UI layer; the registry only keeps a weak link.
pub type SharedSurface = Arc<Mutex<dyn ControlSurface>>;

pub(crate) fn lock<'a, T: ?Sized>(
    shared: &'a Arc<Mutex<T>>,
    what: &'static str,
) -> Result<MutexGuard<'a, T>> {
    shared.lock().map_err(|_| PreviewError::Poisoned(what))
}
