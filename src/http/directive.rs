//! Structured `cdn-cache-control` style directives.
//!
//! A directive is a comma separated list of `name[=value]` items, e.g.
//! `max-age=600, tags=home|plp`. Names and values are trimmed and
//! percent-decoded; an item without `=` gets an empty value.

use std::collections::BTreeMap;
use url::form_urlencoded;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeDirective {
    entries: BTreeMap<String, String>,
}

impl EdgeDirective {
    pub fn parse(raw: &str) -> Self {
        let mut entries = BTreeMap::new();
        for item in raw.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            // A literal '+' is data here, not an encoded space.
            let item = item.replace('+', "%2B");
            for (name, value) in form_urlencoded::parse(item.as_bytes()) {
                entries.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
