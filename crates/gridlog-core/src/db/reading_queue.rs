//! Local record store: pending readings awaiting remote creation

use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{PendingReading, Reading, TempId};

/// libSQL-backed queue of readings captured while offline.
///
/// Rows are only ever inserted whole and removed whole; the drain pass
/// relies on a pending row persisting until both the remote write and the
/// photo-queue reassignment have succeeded.
pub struct LibSqlReadingQueue<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlReadingQueue<'a> {
    /// Create a new queue handle with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append a reading under a freshly generated temp ID.
    ///
    /// Fails only on storage-medium failure, which propagates to the
    /// caller so the UI can report that the capture was not queued.
    pub async fn enqueue(&self, payload: &Reading) -> Result<TempId> {
        let pending = PendingReading::new(payload.clone());
        let serialized = serde_json::to_string(&pending.payload)?;

        self.conn
            .execute(
                "INSERT INTO pending_readings (temp_id, payload, queued_at) VALUES (?1, ?2, ?3)",
                params![
                    pending.temp_id.as_str().to_string(),
                    serialized,
                    pending.queued_at
                ],
            )
            .await?;

        tracing::debug!(temp_id = %pending.temp_id, "queued offline reading");
        Ok(pending.temp_id)
    }

    /// List every pending reading in insertion order.
    pub async fn list_all(&self) -> Result<Vec<PendingReading>> {
        let mut rows = self
            .conn
            .query(
                "SELECT temp_id, payload, queued_at
                 FROM pending_readings
                 ORDER BY queued_at ASC, temp_id ASC",
                (),
            )
            .await?;

        let mut pending = Vec::new();
        while let Some(row) = rows.next().await? {
            let temp_id: String = row.get(0)?;
            let payload: String = row.get(1)?;
            pending.push(PendingReading {
                temp_id: temp_id.parse()?,
                payload: serde_json::from_str(&payload)?,
                queued_at: row.get(2)?,
            });
        }

        Ok(pending)
    }

    /// Delete the pending reading with the given temp ID.
    ///
    /// No-op if absent, so interrupted drains can retry removal safely.
    pub async fn remove(&self, temp_id: &TempId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM pending_readings WHERE temp_id = ?1",
                params![temp_id.as_str().to_string()],
            )
            .await?;
        Ok(())
    }

    /// Whether a reading id still refers to a queued pending reading.
    ///
    /// The photo drain phase uses this to hold back photos whose reading
    /// has not synced yet.
    pub async fn contains(&self, reading_id: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM pending_readings WHERE temp_id = ?1)",
                params![reading_id.to_string()],
            )
            .await?;

        let exists = rows
            .next()
            .await?
            .is_some_and(|row| row.get::<i32>(0).unwrap_or(0) != 0);
        Ok(exists)
    }

    /// Number of readings currently queued.
    pub async fn len(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM pending_readings", ())
            .await?;

        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }
}
