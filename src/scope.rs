//! Per-scenario variables and the `` `##name` `` reference syntax.
//!
//! Values captured in one step can be pasted into a later step's arguments by
//! writing the variable name between a backtick pair with a `##` marker, e.g.
//! `` /users/`##user_id` ``. Only the first reference in a string is expanded.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`##(.*?)`").expect("scope reference pattern is valid"));

/// Name to value store. Values are always strings.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    values: HashMap<String, String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite.
    pub fn store(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Expand the first `` `##key` `` reference in `text`.
    ///
    /// Text without a reference (or with an empty key) comes back unchanged.
    /// An unknown key expands to the empty string.
    pub fn resolve(&self, text: &str) -> String {
        let Some(caps) = REFERENCE.captures(text) else {
            return text.to_string();
        };
        let key = &caps[1];
        if key.is_empty() {
            return text.to_string();
        }
        let value = self.get(key).unwrap_or_default();
        text.replacen(&caps[0], value, 1)
    }
}
