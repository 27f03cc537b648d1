use std::collections::BTreeMap;

/// Raw value change reported by a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlEvent {
    pub control_id: String,
    pub raw: String,
}

impl ControlEvent {
    pub fn new(control_id: impl Into<String>, raw: impl Into<String>) -> Self {
        Self {
            control_id: control_id.into(),
            raw: raw.into(),
        }
    }
}

/// Control-surface collaborator: anything that can look up a control by id,
/// write its displayed value and report user edits.
pub trait ControlSurface: Send {
    fn has_control(&self, id: &str) -> bool;
    /// Returns `false` when the control does not exist.
    fn write(&mut self, id: &str, display: &str) -> bool;
    /// Hands over the edits made since the last call, oldest first.
    fn drain_events(&mut self) -> Vec<ControlEvent>;
}

/// In-memory control surface. Controls appear as they are added, which lets
/// callers reproduce the progressive assembly of a real UI.
#[derive(Debug, Default, Clone)]
pub struct ControlPanel {
    controls: BTreeMap<String, String>,
    events: Vec<ControlEvent>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_controls<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut panel = Self::new();
        for id in ids {
            panel.add_control(id, "");
        }
        panel
    }

    pub fn add_control(&mut self, id: impl Into<String>, initial: impl Into<String>) {
        self.controls.insert(id.into(), initial.into());
    }

    pub fn remove_control(&mut self, id: &str) -> Option<String> {
        self.controls.remove(id)
    }

    pub fn value(&self, id: &str) -> Option<&str> {
        self.controls.get(id).map(String::as_str)
    }

    /// Simulates the operator editing a control.
    pub fn input(&mut self, id: &str, raw: impl Into<String>) -> bool {
        let raw = raw.into();
        match self.controls.get_mut(id) {
            Some(value) => {
                value.clone_from(&raw);
                self.events.push(ControlEvent::new(id, raw));
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }
}

impl ControlSurface for ControlPanel {
    fn has_control(&self, id: &str) -> bool {
        self.controls.contains_key(id)
    }

    fn write(&mut self, id: &str, display: &str) -> bool {
        match self.controls.get_mut(id) {
            Some(value) => {
                display.clone_into(value);
                true
            }
            None => false,
        }
    }

    fn drain_events(&mut self) -> Vec<ControlEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_updates_value_and_queues_event() {
        let mut panel = ControlPanel::with_controls(["bloom-strength-slider"]);
        assert!(panel.input("bloom-strength-slider", "3.5"));
        assert!(!panel.input("missing", "1"));

        assert_eq!(panel.value("bloom-strength-slider"), Some("3.5"));
        assert_eq!(
            panel.drain_events(),
            vec![ControlEvent::new("bloom-strength-slider", "3.5")]
        );
        assert!(panel.drain_events().is_empty());
    }

    #[test]
    fn programmatic_writes_do_not_raise_events() {
        let mut panel = ControlPanel::with_controls(["a"]);
        assert!(panel.write("a", "x"));
        assert!(!panel.write("b", "x"));
        assert!(panel.drain_events().is_empty());
    }
}
