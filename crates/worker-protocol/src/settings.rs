//! Settings façade (spec.md §6): the core does not own configuration
//! persistence, but depends on a single `get(key, default)` operation over
//! a nested configuration tree. This module defines the trait consumers
//! implement and a small in-memory implementation used by tests and the
//! demo binary.

use std::collections::HashMap;

/// A nested configuration tree exposing a single read operation.
///
/// Keys are dotted paths, e.g. `"transitions.duration_ms"`.
pub trait SettingsFacade {
    /// Reads `key`, returning `default` if absent or of the wrong shape.
    fn get(&self, key: &str, default: toml::Value) -> toml::Value;

    /// Convenience typed accessor for integer settings.
    fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key, toml::Value::Integer(default))
            .as_integer()
            .unwrap_or(default)
    }

    /// Convenience typed accessor for boolean settings.
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key, toml::Value::Boolean(default))
            .as_bool()
            .unwrap_or(default)
    }
}

/// An in-memory [`SettingsFacade`] backed by a flat map of dotted keys.
/// Used by tests and the demo binary; production configuration
/// persistence is out of this crate's scope (spec.md §1 non-goals).
#[derive(Debug, Clone, Default)]
pub struct MapSettings {
    values: HashMap<String, toml::Value>,
}

impl MapSettings {
    /// Creates an empty settings map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, returning `self` for chained construction.
    pub fn with(mut self, key: impl Into<String>, value: toml::Value) -> Self {
        let _ = self.values.insert(key.into(), value);
        self
    }
}

impl SettingsFacade for MapSettings {
    fn get(&self, key: &str, default: toml::Value) -> toml::Value {
        self.values.get(key).cloned().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn falls_back_to_default_when_missing() {
        let settings = MapSettings::new();
        assert_eq!(settings.get_i64("transitions.duration_ms", 1500), 1500);
    }

    #[test]
    fn returns_stored_value() {
        let settings = MapSettings::new().with("display.use_lanczos", toml::Value::Boolean(true));
        assert!(settings.get_bool("display.use_lanczos", false));
    }
}
