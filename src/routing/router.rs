//! Entry routing: bypass straight to origin, or render through the cache.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Explicit `Route` rather than a boolean

use crate::config::BypassConfig;

use super::matcher::{AnyMatcher, LocaleSectionMatcher, Matcher, PathPrefixMatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Forward to origin unmodified, any method.
    Bypass,
    /// Serve through the cache tier chain.
    Render,
}

#[derive(Debug)]
pub struct EntryRouter {
    bypass: AnyMatcher,
}

impl EntryRouter {
    pub fn from_config(config: &BypassConfig) -> Self {
        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if !config.sections.is_empty() {
            matchers.push(Box::new(LocaleSectionMatcher::new(config.sections.clone())));
        }
        for prefix in config.prefixes.iter().filter(|p| !p.is_empty()) {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
        }

        Self {
            bypass: AnyMatcher::new(matchers),
        }
    }

    pub fn route(&self, path: &str) -> Route {
        if self.bypass.matches(path) {
            Route::Bypass
        } else {
            Route::Render
        }
    }
}
