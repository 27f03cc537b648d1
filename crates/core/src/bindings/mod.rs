//! Two-way synchronisation between the parameter store, the control surface
//! and the renderer.
//!
//! Control edits come in through [`ControlBindingRegistry::handle_event`] and
//! land in the store. [`ControlBindingRegistry::flush`] then drains the store's
//! change notifications, runs the effects registered for each key and pushes
//! display values back out to every output binding.

pub mod surface;

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

pub use surface::{ControlEvent, ControlPanel, ControlSurface};

use crate::{
    params::{format_number, parse_flag, ParamChange, ParamValue, Parameter, ParameterStore},
    shared::lock,
    PreviewError, Result, SharedRenderer, SharedScene, SharedSurface, ToggleAnimator,
};

/// Upper bound on effect-triggered follow-up rounds within one flush.
const MAX_CASCADE_ROUNDS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Control edits update the parameter; the control is never written.
    In,
    /// Parameter changes are displayed; edits are ignored.
    Out,
    Both,
}

impl Direction {
    pub fn accepts_input(self) -> bool {
        matches!(self, Direction::In | Direction::Both)
    }

    pub fn pushes_output(self) -> bool {
        matches!(self, Direction::Out | Direction::Both)
    }
}

pub type EncodeFn = Arc<dyn Fn(&ParamValue) -> String + Send + Sync>;
pub type DecodeFn = Arc<dyn Fn(&str) -> Option<ParamValue> + Send + Sync>;

/// Link between one control and one parameter.
#[derive(Clone)]
pub struct Binding {
    pub control_id: String,
    pub parameter_key: String,
    pub direction: Direction,
    encode: Option<EncodeFn>,
    decode: DecodeFn,
}

impl Binding {
    /// Binding that hands raw control text to the store, which coerces it to
    /// the parameter's kind, and displays values with the parameter's own
    /// display transform.
    pub fn new(
        control_id: impl Into<String>,
        parameter_key: impl Into<String>,
        direction: Direction,
    ) -> Self {
        Self {
            control_id: control_id.into(),
            parameter_key: parameter_key.into(),
            direction,
            encode: None,
            decode: Arc::new(|raw: &str| Some(ParamValue::Text(raw.to_string()))),
        }
    }

    pub fn slider(control_id: impl Into<String>, parameter_key: impl Into<String>) -> Self {
        Self::new(control_id, parameter_key, Direction::Both)
            .with_encode(|value| match value {
                ParamValue::Number(v) => format_number(*v, 3),
                other => crate::params::format_value(other),
            })
            .with_decode(|raw| raw.trim().parse::<f32>().ok().map(ParamValue::Number))
    }

    pub fn checkbox(control_id: impl Into<String>, parameter_key: impl Into<String>) -> Self {
        Self::new(control_id, parameter_key, Direction::Both)
            .with_decode(|raw| parse_flag(raw).map(ParamValue::Flag))
    }

    /// Read-only value display next to a slider.
    pub fn label(control_id: impl Into<String>, parameter_key: impl Into<String>) -> Self {
        Self::new(control_id, parameter_key, Direction::Out)
    }

    pub fn with_encode<F>(mut self, encode: F) -> Self
    where
        F: Fn(&ParamValue) -> String + Send + Sync + 'static,
    {
        self.encode = Some(Arc::new(encode));
        self
    }

    pub fn with_decode<F>(mut self, decode: F) -> Self
    where
        F: Fn(&str) -> Option<ParamValue> + Send + Sync + 'static,
    {
        self.decode = Arc::new(decode);
        self
    }

    pub fn encode(&self, parameter: &Parameter, value: &ParamValue) -> String {
        match &self.encode {
            Some(encode) => encode(value),
            None => parameter.format(value),
        }
    }

    pub fn decode(&self, raw: &str) -> Option<ParamValue> {
        (self.decode)(raw)
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("control_id", &self.control_id)
            .field("parameter_key", &self.parameter_key)
            .field("direction", &self.direction)
            .finish()
    }
}

/// Everything an effect may touch while reacting to a parameter change.
pub struct EffectContext<'a> {
    /// Writes made here are processed before the current flush returns.
    pub store: &'a mut ParameterStore,
    pub renderer: &'a SharedRenderer,
    pub scene: &'a SharedScene,
    pub toggles: &'a mut ToggleAnimator,
    pub now: Duration,
}

pub type Effect = Box<dyn FnMut(&ParamValue, &mut EffectContext<'_>) -> Result<()> + Send>;

#[derive(Default)]
pub struct ControlBindingRegistry {
    bindings: BTreeMap<String, Binding>,
    effects: BTreeMap<String, Vec<Effect>>,
    surface: Option<Weak<Mutex<dyn ControlSurface>>>,
}

impl ControlBindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps a weak link to `surface`; the registry never extends its life.
    pub fn attach_surface(&mut self, surface: &SharedSurface) {
        self.surface = Some(Arc::downgrade(surface));
    }

    pub fn detach_surface(&mut self) {
        self.surface = None;
    }

    /// The attached surface, if the UI layer still holds it.
    pub fn surface(&self) -> Option<SharedSurface> {
        self.surface.as_ref().and_then(Weak::upgrade)
    }

    /// Registers `binding`, replacing any existing binding of the same
    /// control, which is returned.
    pub fn bind(&mut self, store: &ParameterStore, binding: Binding) -> Result<Option<Binding>> {
        if !store.contains(&binding.parameter_key) {
            return Err(PreviewError::UnknownParameter(binding.parameter_key));
        }
        Ok(self.bindings.insert(binding.control_id.clone(), binding))
    }

    pub fn unbind(&mut self, control_id: &str) -> Option<Binding> {
        self.bindings.remove(control_id)
    }

    /// Drops every binding, as when the control surface is torn down.
    pub fn unbind_all(&mut self) {
        self.bindings.clear();
    }

    pub fn binding(&self, control_id: &str) -> Option<&Binding> {
        self.bindings.get(control_id)
    }

    pub fn bindings_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a Binding> + 'a {
        self.bindings
            .values()
            .filter(move |b| b.parameter_key == key)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Registers a renderer-side reaction to changes of `key`.
    pub fn on_change<F>(&mut self, key: impl Into<String>, effect: F)
    where
        F: FnMut(&ParamValue, &mut EffectContext<'_>) -> Result<()> + Send + 'static,
    {
        self.effects
            .entry(key.into())
            .or_default()
            .push(Box::new(effect));
    }

    /// Applies a control edit to the store. Returns `false` when the control
    /// is unbound or output-only.
    pub fn handle_event(&self, store: &mut ParameterStore, event: &ControlEvent) -> Result<bool> {
        let Some(binding) = self.bindings.get(&event.control_id) else {
            tracing::debug!(control = %event.control_id, "event from unbound control ignored");
            return Ok(false);
        };
        if !binding.direction.accepts_input() {
            tracing::debug!(control = %event.control_id, "event from output-only control ignored");
            return Ok(false);
        }

        let value = binding.decode(&event.raw).ok_or_else(|| {
            PreviewError::invalid(
                &binding.parameter_key,
                format!("control `{}` sent `{}`", event.control_id, event.raw),
            )
        })?;
        store.set(&binding.parameter_key, value)?;
        Ok(true)
    }

    /// Runs effects and output bindings for every pending change, including
    /// changes made by the effects themselves. Returns the number of changes
    /// processed.
    ///
    /// A failing effect does not stop the flush: every drained change still
    /// reaches its remaining effects and output bindings, and the first error
    /// is returned once the store has settled.
    pub fn flush(&mut self, ctx: &mut EffectContext<'_>) -> Result<usize> {
        let mut processed = 0;
        let mut first_error: Option<PreviewError> = None;
        for round in 0..MAX_CASCADE_ROUNDS {
            let changes = ctx.store.take_changes();
            if changes.is_empty() {
                return match first_error {
                    Some(err) => Err(err),
                    None => Ok(processed),
                };
            }
            if round > 0 {
                tracing::debug!(round, count = changes.len(), "processing cascaded changes");
            }

            for change in &changes {
                let Some(effects) = self.effects.get_mut(&change.key) else {
                    continue;
                };
                for effect in effects.iter_mut() {
                    if let Err(err) = effect(&change.value, &mut *ctx) {
                        tracing::warn!(key = %change.key, %err, "parameter effect failed");
                        first_error.get_or_insert(err);
                    }
                }
            }
            if let Err(err) = self.push_outputs(&*ctx.store, &changes) {
                tracing::warn!(%err, "output bindings not updated");
                first_error.get_or_insert(err);
            }
            processed += changes.len();
        }

        Err(PreviewError::msg(format!(
            "parameter effects did not settle after {MAX_CASCADE_ROUNDS} rounds"
        )))
    }

    /// Pushes the current value of every output-bound parameter to the
    /// surface, e.g. right after it has been attached.
    pub fn sync_controls(&self, store: &ParameterStore) -> Result<usize> {
        let mut changes: Vec<ParamChange> = Vec::new();
        for binding in self.bindings.values() {
            if !binding.direction.pushes_output()
                || changes.iter().any(|c| c.key == binding.parameter_key)
            {
                continue;
            }
            if let Some(value) = store.get(&binding.parameter_key) {
                changes.push(ParamChange {
                    key: binding.parameter_key.clone(),
                    value: value.clone(),
                });
            }
        }
        self.push_outputs(store, &changes)
    }

    fn push_outputs(&self, store: &ParameterStore, changes: &[ParamChange]) -> Result<usize> {
        let wanted = changes.iter().any(|c| {
            self.bindings_for(&c.key)
                .any(|b| b.direction.pushes_output())
        });
        if !wanted {
            return Ok(0);
        }

        let Some(surface) = self.surface.as_ref().and_then(Weak::upgrade) else {
            tracing::debug!("no live control surface, skipping output bindings");
            return Ok(0);
        };
        let mut surface = lock(&surface, "control surface")?;

        let mut pushed = 0;
        for change in changes {
            let Some(parameter) = store.parameter(&change.key) else {
                continue;
            };
            for binding in self
                .bindings_for(&change.key)
                .filter(|b| b.direction.pushes_output())
            {
                if !surface.has_control(&binding.control_id) {
                    tracing::debug!(
                        control = %binding.control_id,
                        key = %change.key,
                        "bound control not on surface, skipping"
                    );
                    continue;
                }
                let display = binding.encode(parameter, &change.value);
                if surface.write(&binding.control_id, &display) {
                    pushed += 1;
                }
            }
        }
        Ok(pushed)
    }
}

impl std::fmt::Debug for ControlBindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlBindingRegistry")
            .field("bindings", &self.bindings.values().collect::<Vec<_>>())
            .field("effects", &self.effects.keys().collect::<Vec<_>>())
            .field("surface", &self.surface.is_some())
            .finish()
    }
}
