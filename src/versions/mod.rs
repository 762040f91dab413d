//! Tag versioning subsystem.
//!
//! # Data Flow
//! ```text
//! Operator:   /ssr/tags/{tag}/increment → protocol.rs → counter.rs (bump)
//! Render:     response tags "a|b" → live_versions() → {a: 3, b: 1}
//!             compared against the vector persisted with the cached copy
//! ```
//!
//! # Design Decisions
//! - One counter per tag; bumping a tag expires every cached page carrying it
//! - Counter reads happen once per tier result, so they stay cheap

pub mod counter;
pub mod protocol;

pub use counter::{Counter, CounterError, LocalCounter};
pub use protocol::{dispatch, CounterOp};

use std::collections::BTreeMap;

/// Tag name to counter value.
pub type VersionMap = BTreeMap<String, i64>;

/// Read the live version of every tag in a `|`-separated list.
pub async fn live_versions(counter: &dyn Counter, tags: &str) -> Result<VersionMap, CounterError> {
    let mut versions = VersionMap::new();
    for tag in tags.split('|').map(str::trim).filter(|t| !t.is_empty()) {
        let value = counter.get(tag).await?;
        versions.insert(tag.to_string(), value);
    }
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_live_versions() {
        let counter = LocalCounter::new();
        counter.increment("home").await.unwrap();

        let versions = live_versions(&counter, "home|plp||").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions["home"], 1);
        assert_eq!(versions["plp"], 0);
    }
}
