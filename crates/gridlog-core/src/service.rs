//! Shared capture/sync service wrapper used by client shells.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, LibSqlPhotoQueue, LibSqlReadingQueue};
use crate::gateway::{BlobGateway, RecordGateway};
use crate::models::{PendingReading, QueuedPhoto, Reading, TempId};
use crate::sync::{DrainOutcome, SyncNotifier, SyncOrchestrator};
use crate::Result;

/// Thread-safe facade over the offline queues and the sync orchestrator.
///
/// This is the surface the UI (or CLI) talks to: enqueue captures, look
/// at what is still pending, and trigger a drain. All queue mutation goes
/// through the single shared connection, so the enqueue paths and the
/// drain never interleave mid-statement.
pub struct SyncService<R, B, N> {
    db: Arc<Mutex<Database>>,
    orchestrator: Arc<SyncOrchestrator<R, B, N>>,
}

impl<R, B, N> Clone for SyncService<R, B, N> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            orchestrator: Arc::clone(&self.orchestrator),
        }
    }
}

impl<R, B, N> SyncService<R, B, N>
where
    R: RecordGateway,
    B: BlobGateway,
    N: SyncNotifier,
{
    /// Open a service backed by a database file at the given path.
    pub async fn open_path(
        db_path: impl Into<PathBuf>,
        records: R,
        blobs: B,
        notifier: N,
    ) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::open(&db_path).await?;
        Ok(Self::with_database(db, records, blobs, notifier))
    }

    /// Open an in-memory service (primarily for tests).
    pub async fn open_in_memory(records: R, blobs: B, notifier: N) -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self::with_database(db, records, blobs, notifier))
    }

    fn with_database(db: Database, records: R, blobs: B, notifier: N) -> Self {
        let db = Arc::new(Mutex::new(db));
        let orchestrator = Arc::new(SyncOrchestrator::new(
            Arc::clone(&db),
            records,
            blobs,
            notifier,
        ));
        Self { db, orchestrator }
    }

    /// The orchestrator handle, for wiring up a trigger loop.
    pub fn orchestrator(&self) -> Arc<SyncOrchestrator<R, B, N>> {
        Arc::clone(&self.orchestrator)
    }

    /// Queue a reading captured while offline; returns its temp ID.
    ///
    /// Storage failures propagate so the caller can report that the
    /// capture was not queued at all.
    pub async fn enqueue_pending_reading(&self, payload: &Reading) -> Result<TempId> {
        payload.validate()?;
        let db = self.db.lock().await;
        let queue = LibSqlReadingQueue::new(db.connection());
        queue.enqueue(payload).await
    }

    /// Queue a captured photo for upload.
    ///
    /// `reading_id` is a temp ID, a server-assigned ID (photo added to an
    /// already-synced reading), or [`crate::models::PENDING_READING_ID`].
    pub async fn enqueue_pending_photo(
        &self,
        reading_id: &str,
        content: &[u8],
        local_ref: &str,
        file_name: &str,
        mime_type: &str,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let queue = LibSqlPhotoQueue::new(db.connection());
        queue
            .enqueue(reading_id, content, local_ref, file_name, mime_type)
            .await
    }

    /// Drop a not-yet-synced reading along with every photo queued for it.
    pub async fn remove_pending_reading(&self, temp_id: &TempId) -> Result<()> {
        let db = self.db.lock().await;
        let readings = LibSqlReadingQueue::new(db.connection());
        let photos = LibSqlPhotoQueue::new(db.connection());
        readings.remove(temp_id).await?;
        photos.remove_all_for_reading(temp_id.as_str()).await?;
        Ok(())
    }

    /// List readings still waiting to sync, in insertion order.
    pub async fn list_pending_readings(&self) -> Result<Vec<PendingReading>> {
        let db = self.db.lock().await;
        let queue = LibSqlReadingQueue::new(db.connection());
        queue.list_all().await
    }

    /// List photos still waiting to upload, in insertion order.
    pub async fn list_queued_photos(&self) -> Result<Vec<QueuedPhoto>> {
        let db = self.db.lock().await;
        let queue = LibSqlPhotoQueue::new(db.connection());
        queue.list_all().await
    }

    /// Counts of (pending readings, queued photos) for status surfaces.
    pub async fn pending_counts(&self) -> Result<(usize, usize)> {
        let db = self.db.lock().await;
        let readings = LibSqlReadingQueue::new(db.connection());
        let photos = LibSqlPhotoQueue::new(db.connection());
        Ok((readings.len().await?, photos.len().await?))
    }

    /// Manual drain invocation; same semantics as any trigger event.
    pub async fn trigger_sync_now(&self) -> Result<DrainOutcome> {
        self.orchestrator.drain().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::testing::sample_reading;
    use crate::models::PENDING_READING_ID;
    use crate::sync::TracingNotifier;

    struct StubRecords;

    impl RecordGateway for StubRecords {
        async fn create(&self, _payload: &Reading) -> Result<String> {
            Ok("r7".to_string())
        }

        async fn fetch_photos(&self, _reading_id: &str) -> Result<Vec<String>> {
            Ok(vec!["blob:p1".to_string()])
        }

        async fn update_photos(&self, _reading_id: &str, _photos: &[String]) -> Result<()> {
            Ok(())
        }

        async fn delete(&self, _reading_id: &str) -> Result<()> {
            Ok(())
        }
    }

    struct StubBlobs;

    impl BlobGateway for StubBlobs {
        async fn upload(
            &self,
            _content: &[u8],
            name: &str,
            _content_type: &str,
        ) -> Result<String> {
            Ok(format!("https://cdn.example.com/{name}"))
        }
    }

    async fn setup() -> SyncService<StubRecords, StubBlobs, TracingNotifier> {
        SyncService::open_in_memory(StubRecords, StubBlobs, TracingNotifier)
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_and_drain_through_the_facade() {
        let service = setup().await;

        let temp_id = service
            .enqueue_pending_reading(&sample_reading())
            .await
            .unwrap();
        service
            .enqueue_pending_photo(
                temp_id.as_str(),
                &[0xff, 0xd8],
                "blob:p1",
                "meter.jpg",
                "image/jpeg",
            )
            .await
            .unwrap();
        assert_eq!(service.pending_counts().await.unwrap(), (1, 1));

        let outcome = service.trigger_sync_now().await.unwrap();
        assert!(matches!(outcome, DrainOutcome::Completed(_)));
        assert_eq!(service.pending_counts().await.unwrap(), (0, 0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn enqueue_rejects_invalid_reading() {
        let service = setup().await;

        let mut payload = sample_reading();
        payload.meter_no = String::new();
        let err = service.enqueue_pending_reading(&payload).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(service.pending_counts().await.unwrap(), (0, 0));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn remove_pending_reading_drops_its_photos() {
        let service = setup().await;

        let temp_id = service
            .enqueue_pending_reading(&sample_reading())
            .await
            .unwrap();
        service
            .enqueue_pending_photo(
                temp_id.as_str(),
                &[0xff, 0xd8],
                "blob:p1",
                "a.jpg",
                "image/jpeg",
            )
            .await
            .unwrap();
        service
            .enqueue_pending_photo(
                PENDING_READING_ID,
                &[0xff, 0xd8],
                "blob:p2",
                "b.jpg",
                "image/jpeg",
            )
            .await
            .unwrap();

        service.remove_pending_reading(&temp_id).await.unwrap();

        // The unassigned photo is untouched
        assert_eq!(service.pending_counts().await.unwrap(), (0, 1));
        let photos = service.list_queued_photos().await.unwrap();
        assert_eq!(photos[0].local_ref, "blob:p2");
    }
}
