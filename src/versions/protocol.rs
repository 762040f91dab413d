//! Tag operation protocol: `/increment`, `/decrement`, `/current` and `/`.

use super::counter::{Counter, CounterError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterOp {
    Current,
    Increment,
    Decrement,
}

impl CounterOp {
    /// Parse the operation segment. Unknown operations yield `None` (answered with 404).
    pub fn parse(operation: &str) -> Option<Self> {
        match operation.trim_matches('/') {
            "" | "current" => Some(CounterOp::Current),
            "increment" => Some(CounterOp::Increment),
            "decrement" => Some(CounterOp::Decrement),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterOp::Current => "current",
            CounterOp::Increment => "increment",
            CounterOp::Decrement => "decrement",
        }
    }
}

/// Run `op` against the counter for `tag`, returning the resulting value.
pub async fn dispatch(counter: &dyn Counter, tag: &str, op: CounterOp) -> Result<i64, CounterError> {
    let value = match op {
        CounterOp::Current => counter.get(tag).await?,
        CounterOp::Increment => counter.increment(tag).await?,
        CounterOp::Decrement => counter.decrement(tag).await?,
    };

    if op != CounterOp::Current {
        tracing::info!(tag = %tag, operation = op.as_str(), value, "Tag version changed");
    }
    Ok(value)
}
