//! Local blob queue: captured photos awaiting upload

use libsql::{params, Connection};

use crate::error::{Error, Result};
use crate::models::{decode_photo_content, encode_photo_content, QueuedPhoto};

/// libSQL-backed queue of photos captured while offline.
///
/// Content crosses the durable-storage boundary as base64 TEXT, so every
/// row is a self-contained unit that survives process restart. Rows whose
/// content no longer decodes are surfaced with `content: None` so the
/// drain pass can discard them instead of retrying forever.
pub struct LibSqlPhotoQueue<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPhotoQueue<'a> {
    /// Create a new queue handle with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Persist a captured photo.
    ///
    /// `reading_id` may be a temp id, a server id, or the `PENDING`
    /// sentinel. Empty content is rejected here rather than queued as a
    /// guaranteed future discard.
    pub async fn enqueue(
        &self,
        reading_id: &str,
        content: &[u8],
        local_ref: &str,
        file_name: &str,
        mime_type: &str,
    ) -> Result<()> {
        let reading_id = reading_id.trim();
        let local_ref = local_ref.trim();
        if reading_id.is_empty() {
            return Err(Error::InvalidInput(
                "Photo reading_id cannot be empty".to_string(),
            ));
        }
        if local_ref.is_empty() {
            return Err(Error::InvalidInput(
                "Photo local_ref cannot be empty".to_string(),
            ));
        }

        let encoded = encode_photo_content(content)?;
        let queued_at = chrono::Utc::now().timestamp_millis();

        self.conn
            .execute(
                "INSERT INTO queued_photos
                     (local_ref, reading_id, file_name, mime_type, content_b64, queued_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    local_ref.to_string(),
                    reading_id.to_string(),
                    file_name.to_string(),
                    mime_type.to_string(),
                    encoded,
                    queued_at
                ],
            )
            .await?;

        tracing::debug!(%reading_id, %local_ref, "queued photo upload");
        Ok(())
    }

    /// List every queued photo in insertion order, re-materializing bytes.
    pub async fn list_all(&self) -> Result<Vec<QueuedPhoto>> {
        let mut rows = self
            .conn
            .query(
                "SELECT local_ref, reading_id, file_name, mime_type, content_b64, queued_at
                 FROM queued_photos
                 ORDER BY queued_at ASC, local_ref ASC",
                (),
            )
            .await?;

        let mut photos = Vec::new();
        while let Some(row) = rows.next().await? {
            let local_ref: String = row.get(0)?;
            let encoded: String = row.get(4)?;
            let content = match decode_photo_content(&encoded) {
                Ok(bytes) => Some(bytes),
                Err(error) => {
                    tracing::warn!(%local_ref, %error, "queued photo content is corrupt");
                    None
                }
            };

            photos.push(QueuedPhoto {
                local_ref,
                reading_id: row.get(1)?,
                file_name: row.get(2)?,
                mime_type: row.get(3)?,
                content,
                queued_at: row.get(5)?,
            });
        }

        Ok(photos)
    }

    /// Delete a queued photo by its UI correlation key; idempotent.
    pub async fn remove(&self, local_ref: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM queued_photos WHERE local_ref = ?1",
                params![local_ref.to_string()],
            )
            .await?;
        Ok(())
    }

    /// Rewrite `reading_id` for every queued photo matching `old_reading_id`.
    ///
    /// Single UPDATE statement, so the rewrite is atomic with respect to
    /// concurrent reads on the same connection. Returns the number of
    /// photos reassigned.
    pub async fn reassign(&self, old_reading_id: &str, new_reading_id: &str) -> Result<u64> {
        let updated = self
            .conn
            .execute(
                "UPDATE queued_photos SET reading_id = ?1 WHERE reading_id = ?2",
                params![new_reading_id.to_string(), old_reading_id.to_string()],
            )
            .await?;

        if updated > 0 {
            tracing::debug!(
                from = %old_reading_id,
                to = %new_reading_id,
                count = updated,
                "reassigned queued photos"
            );
        }
        Ok(updated)
    }

    /// Bulk delete every queued photo for a reading.
    ///
    /// Used when a reading itself is deleted before its photos ever synced.
    pub async fn remove_all_for_reading(&self, reading_id: &str) -> Result<u64> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM queued_photos WHERE reading_id = ?1",
                params![reading_id.to_string()],
            )
            .await?;
        Ok(removed)
    }

    /// Number of photos currently queued.
    pub async fn len(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM queued_photos", ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
