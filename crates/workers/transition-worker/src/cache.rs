//! Cache-key hashing and the bounded precompute cache (spec.md §4.I
//! "Transition worker").

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

const MAX_CACHED_ENTRIES: usize = 256;

/// Builds the cache key `hash(transition_type + sorted(params))`, using a
/// stable rendering of `params`'s keys so field order never affects the key.
pub fn cache_key(transition_type: &str, params: &serde_json::Value) -> String {
    let mut pairs: Vec<(String, String)> = params
        .as_object()
        .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.to_string())).collect())
        .unwrap_or_default();
    pairs.sort();

    let mut hasher = DefaultHasher::new();
    transition_type.to_lowercase().hash(&mut hasher);
    for (k, v) in &pairs {
        k.hash(&mut hasher);
        v.hash(&mut hasher);
    }
    format!("{:016x}", hasher.finish())
}

/// FIFO-evicting store of precomputed transition data, keyed by
/// [`cache_key`].
pub struct TransitionCache {
    order: VecDeque<String>,
    entries: HashMap<String, serde_json::Value>,
}

impl TransitionCache {
    pub fn new() -> Self {
        Self { order: VecDeque::new(), entries: HashMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, data: serde_json::Value) {
        if !self.entries.contains_key(&key) {
            self.order.push_back(key.clone());
        }
        self.entries.insert(key, data);
        while self.order.len() > MAX_CACHED_ENTRIES {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }
}

impl Default for TransitionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_is_stable_across_param_field_order() {
        let a = cache_key("Diffuse", &serde_json::json!({"block_size": 20, "seed": 123}));
        let b = cache_key("Diffuse", &serde_json::json!({"seed": 123, "block_size": 20}));
        assert_eq!(a, b);
    }

    #[test]
    fn key_differs_for_different_transition_type() {
        let a = cache_key("Diffuse", &serde_json::json!({"seed": 1}));
        let b = cache_key("Warp", &serde_json::json!({"seed": 1}));
        assert_ne!(a, b);
    }

    #[test]
    fn eviction_drops_oldest_entry_first() {
        let mut cache = TransitionCache::new();
        for i in 0..(MAX_CACHED_ENTRIES + 1) {
            cache.insert(format!("key-{i}"), serde_json::json!(i));
        }
        assert!(cache.get("key-0").is_none());
        assert!(cache.get(&format!("key-{MAX_CACHED_ENTRIES}")).is_some());
    }
}
