//! # Startup flag context.
//!
//! Read-only, typed key/value access to startup configuration. Parsing the command
//! line is someone else's job; the runtime only binds the context so components can
//! read it during registration and boot.

use std::collections::HashMap;
use std::time::Duration;

/// Read-only key/value accessor for startup configuration.
///
/// Only [`get_str`](FlagContext::get_str) is required; typed getters parse on top of it
/// and return `None` for absent or malformed values.
pub trait FlagContext: Send + Sync {
    /// Raw string value of `key`.
    fn get_str(&self, key: &str) -> Option<&str>;

    /// `true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off` (case-insensitive).
    fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get_str(key)?.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    /// Signed integer value.
    fn get_i64(&self, key: &str) -> Option<i64> {
        self.get_str(key)?.trim().parse().ok()
    }

    /// Duration given in milliseconds.
    fn get_duration_ms(&self, key: &str) -> Option<Duration> {
        self.get_str(key)?
            .trim()
            .parse()
            .ok()
            .map(Duration::from_millis)
    }

    /// Returns true when `key` is present.
    fn contains(&self, key: &str) -> bool {
        self.get_str(key).is_some()
    }
}

/// [`FlagContext`] backed by a string map.
#[derive(Clone, Debug, Default)]
pub struct MapFlags {
    values: HashMap<String, String>,
}

impl MapFlags {
    /// Creates an empty flag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapFlags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl FlagContext for MapFlags {
    fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}
