//! Queued photo model and binary-safe persistence encoding

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Sentinel reading id for photos captured before any reading exists.
pub const PENDING_READING_ID: &str = "PENDING";

/// A photo awaiting upload, tagged with the reading it belongs to.
///
/// `reading_id` is either a temp id, a server-assigned id, or
/// [`PENDING_READING_ID`]. `local_ref` is the stable string the UI uses to
/// display the photo before it syncs; the drain pass find-and-replaces it
/// with the durable locator inside the remote record's photo list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedPhoto {
    pub reading_id: String,
    pub local_ref: String,
    /// Original file name, kept so the upload can be re-materialized.
    pub file_name: String,
    pub mime_type: String,
    /// Re-materialized image bytes. `None` when the persisted encoding
    /// failed to decode or decoded to zero bytes - unrecoverable
    /// corruption, discarded by the drain pass rather than retried.
    pub content: Option<Vec<u8>>,
    /// Enqueue timestamp (Unix ms).
    pub queued_at: i64,
}

impl QueuedPhoto {
    /// Whether this photo has nothing to attach to yet.
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.reading_id == PENDING_READING_ID
    }
}

/// Encode photo bytes for the durable TEXT store.
///
/// The queue persists a self-contained base64 string rather than any
/// transient handle to in-memory data; anything less would not survive
/// process restart and would silently break the at-least-once guarantee.
pub fn encode_photo_content(bytes: &[u8]) -> Result<String> {
    if bytes.is_empty() {
        return Err(Error::InvalidInput(
            "Photo content cannot be empty".to_string(),
        ));
    }
    Ok(BASE64.encode(bytes))
}

/// Decode persisted photo content back into uploadable bytes.
///
/// An undecodable or empty payload is classified as corruption, not a
/// transient failure - retrying cannot fix corrupted bytes.
pub fn decode_photo_content(encoded: &str) -> Result<Vec<u8>> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|error| Error::CorruptContent(format!("invalid base64 payload: {error}")))?;
    if bytes.is_empty() {
        return Err(Error::CorruptContent(
            "decoded photo content is empty".to_string(),
        ));
    }
    Ok(bytes)
}
