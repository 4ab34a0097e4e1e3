//! Case-insensitive header storage.
//!
//! Requests fold duplicate headers and only ever need lowercase lookups, so they're stored in a
//! plain map keyed by lowercase name. Responses need to emit headers with whatever casing the
//! caller chose (`Content-Type`, not `content-type`), so they keep an ordered list and do
//! case-insensitive lookups over it instead.

use std::collections::HashMap;

/// Request headers, keyed by lowercased, trimmed field name.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    inner: HashMap<String, String>,
}

impl RequestHeaders {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` (lowercased) to `value`, overwriting any previous value. This is also how
    /// duplicate headers are folded per spec: later assignments win.
    pub fn set(&mut self, name: &str, value: String) {
        self.inner.insert(name.to_ascii_lowercase(), value);
    }

    /// Appends `extra` to the existing value for `name` with a single space separator, used for
    /// obs-fold continuation lines. No-op if `name` isn't present.
    pub fn append(&mut self, name: &str, extra: &str) {
        if let Some(value) = self.inner.get_mut(&name.to_ascii_lowercase()) {
            value.push(' ');
            value.push_str(extra);
        }
    }

    /// Looks up a header by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(&name.to_ascii_lowercase()).map(|s| s.as_str())
    }

    /// True if any header equal to `name` (case-insensitively) is present.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(&name.to_ascii_lowercase())
    }
}

/// Response headers, preserving emission casing and insertion order.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    inner: Vec<(String, String)>,
}

impl ResponseHeaders {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `name` to `value`. If a header with the same name (case-insensitively) already
    /// exists, its value is replaced in place; otherwise the header is appended.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self
            .inner
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&name))
        {
            existing.1 = value;
        } else {
            self.inner.push((name, value));
        }
    }

    /// Looks up a header by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// True if a header equal to `name` (case-insensitively) is present.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// Iterates headers in emission order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
