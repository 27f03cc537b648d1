//! Blade toggle animation.
//!
//! Each target node runs a four-state machine (`Off`, `TurningOn`, `On`,
//! `TurningOff`) advanced by the shared frame tick. While transitioning, the
//! node's long-axis scale is interpolated linearly from where it was when the
//! transition started towards the terminal value.

use std::{collections::BTreeMap, time::Duration};

use crate::{shared::lock, Result, SharedScene};

/// Terminal scale of a fully extended node.
pub const ON_SCALE: f32 = 1.0;
/// Terminal scale of a retracted node. Never zero, which would collapse the
/// geometry.
pub const OFF_SCALE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ToggleState {
    Off,
    TurningOn { progress: f32, start: Duration },
    On,
    TurningOff { progress: f32, start: Duration },
}

impl ToggleState {
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            ToggleState::TurningOn { .. } | ToggleState::TurningOff { .. }
        )
    }

    /// Terminal state this state is in or heading towards.
    pub fn target_on(&self) -> bool {
        matches!(self, ToggleState::On | ToggleState::TurningOn { .. })
    }

    fn stable(on: bool) -> Self {
        if on {
            ToggleState::On
        } else {
            ToggleState::Off
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToggleTarget {
    pub node: String,
    pub state: ToggleState,
    pub duration_ms: f32,
    from: f32,
    value: f32,
}

impl ToggleTarget {
    fn new(node: &str, on: bool, duration_ms: f32) -> Self {
        let value = terminal_scale(on);
        Self {
            node: node.to_string(),
            state: ToggleState::stable(on),
            duration_ms: duration_ms.max(0.0),
            from: value,
            value,
        }
    }

    /// Last scale computed for the node.
    pub fn value(&self) -> f32 {
        self.value
    }
}

pub fn terminal_scale(on: bool) -> f32 {
    if on {
        ON_SCALE
    } else {
        OFF_SCALE
    }
}

/// Drives every toggle target from one shared tick.
pub struct ToggleAnimator {
    scene: SharedScene,
    targets: BTreeMap<String, ToggleTarget>,
    default_duration_ms: f32,
}

impl ToggleAnimator {
    pub fn new(scene: SharedScene, default_duration_ms: f32) -> Self {
        Self {
            scene,
            targets: BTreeMap::new(),
            default_duration_ms: default_duration_ms.max(0.0),
        }
    }

    /// Puts `node` in a stable state and snaps the scene to match, without
    /// animating. Replaces any in-flight transition.
    pub fn register(&mut self, node: &str, on: bool, duration_ms: f32) -> Result<()> {
        let target = ToggleTarget::new(node, on, duration_ms);
        {
            let mut scene = lock(&self.scene, "scene")?;
            scene.set_node_scale(node, target.value);
            scene.set_visible(node, on);
        }
        self.targets.insert(node.to_string(), target);
        Ok(())
    }

    pub fn set_default_duration(&mut self, duration_ms: f32) {
        self.default_duration_ms = duration_ms.max(0.0);
    }

    pub fn set_duration(&mut self, node: &str, duration_ms: f32) {
        if let Some(target) = self.targets.get_mut(node) {
            target.duration_ms = duration_ms.max(0.0);
        }
    }

    /// Requests `node` to end up on or off. A request for the stable state the
    /// node is already in does nothing; anything else restarts the transition
    /// from the node's current scale at `now`.
    pub fn set_target(&mut self, node: &str, on: bool, now: Duration) -> Result<()> {
        let mut scene = lock(&self.scene, "scene")?;

        let default_duration = self.default_duration_ms;
        let target = self.targets.entry(node.to_string()).or_insert_with(|| {
            let visible = scene.is_visible(node).unwrap_or(false);
            let mut target = ToggleTarget::new(node, visible, default_duration);
            if let Some(scale) = scene.node_scale(node) {
                target.value = scale;
            }
            target
        });

        if target.state == ToggleState::stable(on) {
            return Ok(());
        }

        target.from = scene.node_scale(node).unwrap_or(target.value);
        target.state = if on {
            ToggleState::TurningOn {
                progress: 0.0,
                start: now,
            }
        } else {
            ToggleState::TurningOff {
                progress: 0.0,
                start: now,
            }
        };

        if on {
            scene.set_visible(node, true);
        }
        tracing::debug!(node, on, from = target.from, "blade transition started");
        Ok(())
    }

    /// Advances every transitioning target to `now`. Returns how many targets
    /// are still transitioning afterwards.
    pub fn tick(&mut self, now: Duration) -> Result<usize> {
        if !self.is_animating() {
            return Ok(0);
        }

        let mut scene = lock(&self.scene, "scene")?;
        let mut active = 0;

        for target in self.targets.values_mut() {
            let (on, start) = match target.state {
                ToggleState::TurningOn { start, .. } => (true, start),
                ToggleState::TurningOff { start, .. } => (false, start),
                ToggleState::On | ToggleState::Off => continue,
            };

            let progress = progress_at(now, start, target.duration_ms);
            let end = terminal_scale(on);

            if progress >= 1.0 {
                target.state = ToggleState::stable(on);
                target.value = end;
                scene.set_node_scale(&target.node, end);
                scene.set_visible(&target.node, on);
                tracing::debug!(node = %target.node, on, "blade transition finished");
                continue;
            }

            target.value = target.from + (end - target.from) * progress;
            target.state = if on {
                ToggleState::TurningOn { progress, start }
            } else {
                ToggleState::TurningOff { progress, start }
            };

            scene.set_node_scale(&target.node, target.value);
            if !on && target.value <= OFF_SCALE {
                scene.set_visible(&target.node, false);
            }
            active += 1;
        }

        Ok(active)
    }

    pub fn state(&self, node: &str) -> Option<ToggleState> {
        self.targets.get(node).map(|t| t.state)
    }

    pub fn target(&self, node: &str) -> Option<&ToggleTarget> {
        self.targets.get(node)
    }

    pub fn is_animating(&self) -> bool {
        self.targets.values().any(|t| t.state.is_transitioning())
    }
}

impl std::fmt::Debug for ToggleAnimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToggleAnimator")
            .field("targets", &self.targets)
            .field("default_duration_ms", &self.default_duration_ms)
            .finish()
    }
}

/// Zero duration completes on the first tick instead of dividing by zero.
fn progress_at(now: Duration, start: Duration, duration_ms: f32) -> f32 {
    if duration_ms <= 0.0 {
        return 1.0;
    }
    let elapsed_ms = now.saturating_sub(start).as_secs_f64() * 1000.0;
    ((elapsed_ms / duration_ms as f64) as f32).clamp(0.0, 1.0)
}
