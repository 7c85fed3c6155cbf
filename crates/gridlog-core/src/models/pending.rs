//! Pending reading model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::reading::Reading;

const TEMP_ID_PREFIX: &str = "temp-";

/// A locally-generated placeholder identifier for a not-yet-synced reading.
///
/// Uses UUID v7 under a `temp-` prefix, so ids are time-sortable and
/// collision-free across the lifetime of the local store. The prefix also
/// makes temp ids distinguishable from server-assigned identifiers when a
/// queued photo is tagged with one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(String);

impl TempId {
    /// Create a new unique temp ID.
    #[must_use]
    pub fn new() -> Self {
        Self(format!("{TEMP_ID_PREFIX}{}", Uuid::now_v7()))
    }

    /// Get the string representation of this ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check whether a reading identifier string is a temp ID.
    #[must_use]
    pub fn is_temp(value: &str) -> bool {
        value.starts_with(TEMP_ID_PREFIX)
    }
}

impl Default for TempId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TempId {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if Self::is_temp(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(crate::Error::InvalidInput(format!(
                "Not a temporary reading id: {s}"
            )))
        }
    }
}

/// A reading awaiting remote creation, keyed by its temp ID.
///
/// Never mutated in place: created when a remote write fails offline,
/// removed once the remote store confirms creation and the photo queue
/// has been reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingReading {
    /// Local placeholder identifier.
    pub temp_id: TempId,
    /// The reading to be created remotely, excluding any server id.
    pub payload: Reading,
    /// Enqueue timestamp (Unix ms).
    pub queued_at: i64,
}

impl PendingReading {
    /// Create a new pending reading with a fresh temp ID.
    #[must_use]
    pub fn new(payload: Reading) -> Self {
        Self {
            temp_id: TempId::new(),
            payload,
            queued_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}
