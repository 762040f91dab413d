//! Path matching logic.
//!
//! # Responsibilities
//! - Match locale-prefixed account/checkout sections (`/es/cart`, `/fr/login/...`)
//! - Match configured path prefixes
//! - Combine conditions with OR semantics
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - A locale is exactly two lowercase ASCII letters
//! - No regex to guarantee O(n) matching

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches `/{locale}/{section}...` where `section` starts with one of the configured names.
#[derive(Debug, Clone)]
pub struct LocaleSectionMatcher {
    sections: Vec<String>,
}

impl LocaleSectionMatcher {
    pub fn new(sections: Vec<String>) -> Self {
        Self { sections }
    }
}

impl Matcher for LocaleSectionMatcher {
    fn matches(&self, path: &str) -> bool {
        let mut segments = path.trim_start_matches('/').splitn(2, '/');
        let (Some(locale), Some(rest)) = (segments.next(), segments.next()) else {
            return false;
        };

        let is_locale = locale.len() == 2 && locale.bytes().all(|b| b.is_ascii_lowercase());
        is_locale
            && self
                .sections
                .iter()
                .any(|section| !section.is_empty() && rest.starts_with(section.as_str()))
    }
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Combines multiple matchers with OR semantics. Empty never matches.
#[derive(Debug)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}
