//! CallRecord — an immutable alert referencing a token at a point in time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a call (assigned by the external call source).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallId(pub String);

impl CallId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single alert: a caller flagging a token mint at a point in time.
///
/// Created by the external call source; never mutated. The simulator
/// re-sorts calls by `created_at` before replay, so source ordering
/// carries no meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: CallId,
    pub mint: String,
    pub caller: String,
    pub created_at: DateTime<Utc>,
}

impl CallRecord {
    /// Alert timestamp in epoch milliseconds (the replay time base).
    pub fn created_at_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }
}
