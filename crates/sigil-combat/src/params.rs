//! Numeric tag parameters
//!
//! Lookups resolve in this order: scoped override (`"burn.duration"`), plain
//! override (`"duration"`), tag default, caller fallback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An ordered key → number map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, f32>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: f32) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or overwrite a value
    pub fn set(&mut self, key: impl Into<String>, value: f32) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<f32> {
        self.0.get(key).copied()
    }

    /// Value for `key`, or `fallback` when absent
    pub fn get_or(&self, key: &str, fallback: f32) -> f32 {
        self.get(key).unwrap_or(fallback)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy every entry of `other` over this map
    pub fn overlay(&mut self, other: &Params) {
        for (k, v) in other.iter() {
            self.set(k, v);
        }
    }

    /// Parameters for a single tag: its defaults, then plain overrides, then
    /// overrides scoped to that tag.
    pub fn resolve_for_tag(defaults: &Params, tag: &str, overrides: &Params) -> Params {
        let mut out = defaults.clone();
        for (k, v) in overrides.iter().filter(|(k, _)| !k.contains('.')) {
            out.set(k, v);
        }
        let prefix = format!("{tag}.");
        for (k, v) in overrides.iter() {
            if let Some(key) = k.strip_prefix(&prefix) {
                out.set(key, v);
            }
        }
        out
    }

    /// Request-wide view: every tag's defaults in order (later tags win on
    /// collisions), then plain overrides, then overrides scoped to a present tag.
    pub fn merged<'a>(
        layers: impl IntoIterator<Item = (&'a str, &'a Params)>,
        overrides: &Params,
    ) -> Params {
        let layers: Vec<(&str, &Params)> = layers.into_iter().collect();
        let mut out = Params::new();
        for (_, defaults) in &layers {
            out.overlay(defaults);
        }
        for (k, v) in overrides.iter().filter(|(k, _)| !k.contains('.')) {
            out.set(k, v);
        }
        for (tag, _) in &layers {
            let prefix = format!("{tag}.");
            for (k, v) in overrides.iter() {
                if let Some(key) = k.strip_prefix(&prefix) {
                    out.set(key, v);
                }
            }
        }
        out
    }
}

impl<K: Into<String>> FromIterator<(K, f32)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, f32)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}
