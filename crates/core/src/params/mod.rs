//! Canonical store of presentation parameters.
//!
//! Every setting the operator can tune lives here under a unique key. Numeric
//! parameters may declare a range; out-of-range writes are clamped rather than
//! rejected. Each successful write queues a [`ParamChange`] which the binding
//! registry drains to drive controls and renderer effects.

pub mod catalog;

use std::collections::{btree_map, BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Color, PreviewError, Result};

/// Value held by a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Number(f32),
    Text(String),
}

impl ParamValue {
    pub fn as_number(&self) -> Option<f32> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ParamValue::Flag(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Number(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Flag(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<Color> for ParamValue {
    fn from(value: Color) -> Self {
        ParamValue::Text(value.to_hex())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Number,
    Flag,
    Text,
    /// Text restricted to hex colors, stored normalised as `#rrggbb`.
    Color,
}

/// One end of a numeric range.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    Fixed(f32),
    /// Follows the current value of another numeric parameter.
    Param(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub min: Bound,
    pub max: Bound,
}

impl Range {
    pub fn fixed(min: f32, max: f32) -> Self {
        Self {
            min: Bound::Fixed(min),
            max: Bound::Fixed(max),
        }
    }

    pub fn linked(min_key: impl Into<String>, max_key: impl Into<String>) -> Self {
        Self {
            min: Bound::Param(min_key.into()),
            max: Bound::Param(max_key.into()),
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.min, Bound::Param(_)) || matches!(self.max, Bound::Param(_))
    }

    fn references(&self, key: &str) -> bool {
        [&self.min, &self.max]
            .into_iter()
            .any(|bound| matches!(bound, Bound::Param(k) if k == key))
    }
}

/// Formats a value for a control or label.
pub type DisplayFn = fn(&ParamValue) -> String;

#[derive(Clone)]
pub struct Parameter {
    pub key: String,
    pub kind: ParamKind,
    pub default: ParamValue,
    pub range: Option<Range>,
    pub display: Option<DisplayFn>,
    value: ParamValue,
}

impl Parameter {
    fn new(key: impl Into<String>, kind: ParamKind, default: ParamValue) -> Self {
        Self {
            key: key.into(),
            kind,
            value: default.clone(),
            default,
            range: None,
            display: None,
        }
    }

    pub fn number(key: impl Into<String>, default: f32) -> Self {
        Self::new(key, ParamKind::Number, ParamValue::Number(default))
    }

    pub fn flag(key: impl Into<String>, default: bool) -> Self {
        Self::new(key, ParamKind::Flag, ParamValue::Flag(default))
    }

    pub fn text(key: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(key, ParamKind::Text, ParamValue::Text(default.into()))
    }

    pub fn color(key: impl Into<String>, default: Color) -> Self {
        Self::new(key, ParamKind::Color, ParamValue::Text(default.to_hex()))
    }

    pub fn with_range(mut self, range: Range) -> Self {
        self.range = Some(range);
        self
    }

    pub fn within(self, min: f32, max: f32) -> Self {
        self.with_range(Range::fixed(min, max))
    }

    pub fn with_display(mut self, display: DisplayFn) -> Self {
        self.display = Some(display);
        self
    }

    pub fn value(&self) -> &ParamValue {
        &self.value
    }

    pub fn format(&self, value: &ParamValue) -> String {
        match self.display {
            Some(display) => display(value),
            None => format_value(value),
        }
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("default", &self.default)
            .field("range", &self.range)
            .field("display", &self.display.is_some())
            .finish()
    }
}

/// Notification queued by every successful write.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamChange {
    pub key: String,
    pub value: ParamValue,
}

/// Flat `key -> value` settings document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsSnapshot(BTreeMap<String, ParamValue>);

impl SettingsSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamValue> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for SettingsSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Default)]
pub struct ParameterStore {
    params: BTreeMap<String, Parameter>,
    pending: Vec<ParamChange>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the viewer's standard parameter set.
    pub fn standard() -> Self {
        let mut store = Self::new();
        for parameter in catalog::standard_parameters() {
            let declared = store.declare(parameter);
            debug_assert!(declared.is_ok(), "duplicate key in the standard catalog: {declared:?}");
        }
        store
    }

    pub fn declare(&mut self, parameter: Parameter) -> Result<()> {
        if self.params.contains_key(&parameter.key) {
            return Err(PreviewError::DuplicateParameter(parameter.key));
        }
        self.params.insert(parameter.key.clone(), parameter);
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    pub fn parameter(&self, key: &str) -> Option<&Parameter> {
        self.params.get(key)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.params.values()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key).map(|p| &p.value)
    }

    pub fn number(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(ParamValue::as_number)
    }

    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ParamValue::as_flag)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ParamValue::as_text)
    }

    pub fn color(&self, key: &str) -> Option<Color> {
        self.text(key).and_then(Color::parse)
    }

    /// Current value formatted with the parameter's display transform.
    pub fn display(&self, key: &str) -> Option<String> {
        self.params.get(key).map(|p| p.format(&p.value))
    }

    /// Range of `key` with linked bounds resolved against current values.
    pub fn resolved_range(&self, key: &str) -> Option<(f32, f32)> {
        let range = self.params.get(key)?.range.as_ref()?;
        Some((
            self.resolve(&range.min).unwrap_or(f32::NEG_INFINITY),
            self.resolve(&range.max).unwrap_or(f32::INFINITY),
        ))
    }

    /// Writes `value`, clamping numbers into the declared range. Always
    /// overwrites and always notifies, even when the value is unchanged.
    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> Result<ParamValue> {
        let kind = self
            .params
            .get(key)
            .map(|p| p.kind)
            .ok_or_else(|| PreviewError::UnknownParameter(key.to_string()))?;

        let mut value = coerce(kind, key, value.into())?;
        if let ParamValue::Number(v) = value {
            value = ParamValue::Number(self.clamp(key, v));
        }

        self.write(key, value.clone());
        self.reclamp_dependents(key);
        Ok(value)
    }

    pub fn reset(&mut self, key: &str) -> Result<ParamValue> {
        let default = self
            .params
            .get(key)
            .map(|p| p.default.clone())
            .ok_or_else(|| PreviewError::UnknownParameter(key.to_string()))?;
        self.set(key, default)
    }

    /// Applies every known key of `snapshot` as one batch.
    ///
    /// All values are validated before anything is written, so a bad value
    /// leaves the store untouched. Values are written first and clamped
    /// afterwards (fixed ranges, then linked ranges), which makes the outcome
    /// depend only on the snapshot and not on the previous state.
    pub fn apply_snapshot(&mut self, snapshot: &SettingsSnapshot) -> Result<usize> {
        let mut staged = Vec::with_capacity(snapshot.len());
        for (key, raw) in snapshot.iter() {
            let Some(param) = self.params.get(key) else {
                tracing::debug!(key = %key, "skipping unknown settings key");
                continue;
            };
            staged.push((key.clone(), coerce(param.kind, key, raw.clone())?));
        }

        let touched: BTreeSet<String> = staged.iter().map(|(k, _)| k.clone()).collect();
        for (key, value) in staged {
            if let Some(param) = self.params.get_mut(&key) {
                param.value = value;
            }
        }

        let (fixed, linked): (Vec<String>, Vec<String>) = self
            .params
            .values()
            .filter(|p| match &p.range {
                Some(range) => touched.contains(&p.key) || touched.iter().any(|k| range.references(k)),
                None => false,
            })
            .map(|p| p.key.clone())
            .partition(|key| {
                self.params[key]
                    .range
                    .as_ref()
                    .map_or(true, |range| !range.is_linked())
            });

        let mut notify = touched;
        for key in fixed.iter().chain(linked.iter()) {
            if let Some(current) = self.number(key) {
                let clamped = self.clamp(key, current);
                if let Some(param) = self.params.get_mut(key) {
                    param.value = ParamValue::Number(clamped);
                }
                notify.insert(key.clone());
            }
        }

        let applied = notify.len();
        for key in notify {
            if let Some(value) = self.get(&key).cloned() {
                self.pending.push(ParamChange { key, value });
            }
        }
        Ok(applied)
    }

    /// Current value of every parameter.
    pub fn snapshot(&self) -> SettingsSnapshot {
        self.params
            .iter()
            .map(|(k, p)| (k.clone(), p.value.clone()))
            .collect()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn take_changes(&mut self) -> Vec<ParamChange> {
        std::mem::take(&mut self.pending)
    }

    fn write(&mut self, key: &str, value: ParamValue) {
        if let Some(param) = self.params.get_mut(key) {
            param.value = value.clone();
            self.pending.push(ParamChange {
                key: key.to_string(),
                value,
            });
        }
    }

    /// Re-clamps parameters whose range follows `changed`. Links are one level
    /// deep: a re-clamped parameter does not cascade further.
    fn reclamp_dependents(&mut self, changed: &str) {
        let dependents: Vec<String> = self
            .params
            .values()
            .filter(|p| p.range.as_ref().is_some_and(|r| r.references(changed)))
            .map(|p| p.key.clone())
            .collect();

        for key in dependents {
            let Some(current) = self.number(&key) else {
                continue;
            };
            let clamped = self.clamp(&key, current);
            if clamped != current {
                tracing::debug!(key = %key, from = current, to = clamped, "range moved, re-clamping");
                self.write(&key, ParamValue::Number(clamped));
            }
        }
    }

    fn resolve(&self, bound: &Bound) -> Option<f32> {
        match bound {
            Bound::Fixed(v) => Some(*v),
            Bound::Param(key) => self.number(key),
        }
    }

    /// Clamps without panicking on inverted bounds; the upper bound wins.
    fn clamp(&self, key: &str, value: f32) -> f32 {
        match self.resolved_range(key) {
            Some((min, max)) => value.max(min).min(max),
            None => value,
        }
    }
}

fn coerce(kind: ParamKind, key: &str, value: ParamValue) -> Result<ParamValue> {
    match (kind, value) {
        (ParamKind::Number, ParamValue::Number(v)) if v.is_finite() => Ok(ParamValue::Number(v)),
        (ParamKind::Number, ParamValue::Number(_)) => {
            Err(PreviewError::invalid(key, "number is not finite"))
        }
        (ParamKind::Number, ParamValue::Text(text)) => match text.trim().parse::<f32>() {
            Ok(v) if v.is_finite() => Ok(ParamValue::Number(v)),
            _ => Err(PreviewError::invalid(key, format!("`{text}` is not a number"))),
        },
        (ParamKind::Flag, ParamValue::Flag(v)) => Ok(ParamValue::Flag(v)),
        (ParamKind::Flag, ParamValue::Text(text)) => parse_flag(&text)
            .map(ParamValue::Flag)
            .ok_or_else(|| PreviewError::invalid(key, format!("`{text}` is not a boolean"))),
        (ParamKind::Text, ParamValue::Text(text)) => Ok(ParamValue::Text(text)),
        (ParamKind::Color, ParamValue::Text(text)) => Color::parse(&text)
            .map(|c| ParamValue::Text(c.to_hex()))
            .ok_or_else(|| PreviewError::invalid(key, format!("`{text}` is not a hex color"))),
        (kind, other) => Err(PreviewError::invalid(
            key,
            format!("expected {kind:?}, got {other:?}"),
        )),
    }
}

pub(crate) fn parse_flag(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Some(true),
        "false" | "off" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Formats with at most `max_decimals` fractional digits and no trailing
/// zeros, so `4.0` becomes `"4"` and `2.20` becomes `"2.2"`.
pub fn format_number(value: f32, max_decimals: usize) -> String {
    let text = format!("{value:.max_decimals$}");
    let text = if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    };
    if text == "-0" {
        "0".to_string()
    } else {
        text
    }
}

pub fn format_value(value: &ParamValue) -> String {
    match value {
        ParamValue::Number(v) => format_number(*v, 3),
        ParamValue::Flag(v) => v.to_string(),
        ParamValue::Text(v) => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::catalog::*;
    use super::*;

    #[test]
    fn clamps_instead_of_rejecting() {
        let mut store = ParameterStore::standard();
        assert_eq!(store.resolved_range(ZOOM_DISTANCE), Some((10.0, 350.0)));

        let stored = store.set(ZOOM_DISTANCE, 10_000.0).unwrap();
        assert_eq!(stored, ParamValue::Number(350.0));
        assert_eq!(store.number(ZOOM_DISTANCE), Some(350.0));

        store.set(BLOOM_STRENGTH, -3.0).unwrap();
        assert_eq!(store.number(BLOOM_STRENGTH), Some(0.0));
    }

    #[test]
    fn set_notifies_even_when_unchanged() {
        let mut store = ParameterStore::standard();
        store.set(BLOOM_STRENGTH, 2.2).unwrap();
        store.set(BLOOM_STRENGTH, 2.2).unwrap();
        let changes = store.take_changes();
        assert_eq!(changes.len(), 2);
        assert!(store.take_changes().is_empty());
    }

    #[test]
    fn rejects_unknown_keys_and_wrong_kinds() {
        let mut store = ParameterStore::standard();
        assert!(matches!(
            store.set("nope", 1.0),
            Err(PreviewError::UnknownParameter(_))
        ));
        assert!(matches!(
            store.set(BLADE_ON, 1.0),
            Err(PreviewError::InvalidValue { .. })
        ));
        assert!(store.set(BLOOM_STRENGTH, f32::NAN).is_err());
        assert!(store.set(PHOTO_BACKGROUND, "teal").is_err());
        assert!(!store.has_pending_changes());
    }

    #[test]
    fn coerces_text_input() {
        let mut store = ParameterStore::standard();
        store.set(BLOOM_RADIUS, " 0.5 ").unwrap();
        store.set(BLADE_ON, "off").unwrap();
        store.set(PHOTO_BACKGROUND, "#ABC").unwrap();

        assert_eq!(store.number(BLOOM_RADIUS), Some(0.5));
        assert_eq!(store.flag(BLADE_ON), Some(false));
        assert_eq!(store.text(PHOTO_BACKGROUND), Some("#aabbcc"));
    }

    #[test]
    fn duplicate_declaration_is_an_error() {
        let mut store = ParameterStore::new();
        store.declare(Parameter::number("a", 1.0)).unwrap();
        assert!(matches!(
            store.declare(Parameter::flag("a", true)),
            Err(PreviewError::DuplicateParameter(_))
        ));
    }

    #[test]
    fn standard_store_declares_the_whole_catalog() {
        let store = ParameterStore::standard();
        let catalog = standard_parameters();
        assert_eq!(store.parameters().count(), catalog.len());
        assert!(catalog.iter().all(|p| store.contains(&p.key)));
    }

    #[test]
    fn moving_a_linked_bound_reclamps_dependents() {
        let mut store = ParameterStore::standard();
        store.set(ZOOM_DISTANCE, 300.0).unwrap();
        store.take_changes();

        store.set(ZOOM_MAX, 200.0).unwrap();
        assert_eq!(store.number(ZOOM_DISTANCE), Some(200.0));

        let keys: Vec<_> = store.take_changes().into_iter().map(|c| c.key).collect();
        assert_eq!(keys, vec![ZOOM_MAX.to_string(), ZOOM_DISTANCE.to_string()]);
    }

    #[test]
    fn inverted_bounds_do_not_panic() {
        let mut store = ParameterStore::standard();
        store.set(ZOOM_MIN, 300.0).unwrap();
        store.set(ZOOM_MAX, 100.0).unwrap();
        store.set(ZOOM_DISTANCE, 50.0).unwrap();
        assert_eq!(store.number(ZOOM_DISTANCE), Some(100.0));
    }

    #[test]
    fn snapshot_application_is_idempotent() {
        let snapshot = SettingsSnapshot::new()
            .with(ZOOM_MAX, 500.0)
            .with(ZOOM_DISTANCE, 400.0)
            .with(BLOOM_STRENGTH, 9.0)
            .with(PHOTO_BACKGROUND, "#FFF");

        let mut store = ParameterStore::standard();
        store.apply_snapshot(&snapshot).unwrap();
        let first = store.snapshot();
        store.apply_snapshot(&snapshot).unwrap();

        assert_eq!(store.snapshot(), first);
        assert_eq!(store.number(ZOOM_DISTANCE), Some(400.0));
        assert_eq!(store.number(BLOOM_STRENGTH), Some(5.0));
        assert_eq!(store.text(PHOTO_BACKGROUND), Some("#ffffff"));
    }

    #[test]
    fn snapshot_notifies_after_all_writes() {
        let mut store = ParameterStore::standard();
        let snapshot = SettingsSnapshot::new()
            .with(BLOOM_STRENGTH, 1.0)
            .with(BLOOM_RADIUS, 0.5)
            .with("somethingElse", 3.0);

        let applied = store.apply_snapshot(&snapshot).unwrap();
        assert_eq!(applied, 2);

        let changes = store.take_changes();
        assert_eq!(changes.len(), 2);
        assert!(changes
            .iter()
            .all(|c| store.get(&c.key) == Some(&c.value)));
    }

    #[test]
    fn invalid_snapshot_leaves_store_untouched() {
        let mut store = ParameterStore::standard();
        let before = store.snapshot();
        let snapshot = SettingsSnapshot::new()
            .with(BLOOM_STRENGTH, 1.0)
            .with(BLADE_ON, "maybe");

        assert!(store.apply_snapshot(&snapshot).is_err());
        assert_eq!(store.snapshot(), before);
        assert!(!store.has_pending_changes());
    }

    #[test]
    fn formats_numbers_without_trailing_zeros() {
        assert_eq!(format_number(4.0, 3), "4");
        assert_eq!(format_number(2.2, 3), "2.2");
        assert_eq!(format_number(0.0101, 3), "0.01");
        assert_eq!(format_number(-0.0001, 2), "0");
        assert_eq!(format_number(350.0, 0), "350");
    }

    #[test]
    fn reset_restores_default() {
        let mut store = ParameterStore::standard();
        store.set(BLOOM_STRENGTH, 4.0).unwrap();
        store.reset(BLOOM_STRENGTH).unwrap();
        assert_eq!(store.number(BLOOM_STRENGTH), Some(2.2));
    }
}
