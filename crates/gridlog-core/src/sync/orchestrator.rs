//! Drain state machine for the offline queues.
//!
//! One drain pass moves queued readings record-first, then queued photos,
//! from local-only state to fully-synced state: each pending reading is
//! created remotely, its queued photos are reconciled from the temp id to
//! the server-assigned id, and only then is the pending row removed. A
//! crash anywhere in that window leaves the pending row in place, so the
//! next pass retries the whole step. That makes record-sync + reconcile
//! effectively atomic to an outside observer, at the cost of at-least-once
//! remote creation: interrupting the pass after the remote store confirms
//! creation but before the local remove can produce a duplicate remote
//! record. Accepted trade-off, inherited from the system this replaces.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{Database, LibSqlPhotoQueue, LibSqlReadingQueue};
use crate::error::{Error, Result};
use crate::gateway::{BlobGateway, RecordGateway};
use crate::models::{QueuedPhoto, TempId};
use crate::state::SyncState;

use super::notify::SyncNotifier;

/// Counts from one drain pass. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub records_synced: usize,
    /// Readings left queued for the next trigger.
    pub records_failed: usize,
    pub photos_synced: usize,
    /// Photos left queued for the next trigger.
    pub photos_failed: usize,
    /// Photos permanently dropped as corrupt; never retried.
    pub photos_discarded: usize,
}

impl SyncOutcome {
    /// Whether anything is still waiting for a future drain.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.records_failed > 0 || self.photos_failed > 0
    }
}

/// Result of asking the orchestrator to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The pass ran to completion over both queues.
    Completed(SyncOutcome),
    /// Another drain was already in flight; this trigger was dropped.
    AlreadyRunning,
}

impl DrainOutcome {
    /// Summarize this outcome as a sync state for status surfaces.
    #[must_use]
    pub const fn state(&self) -> SyncState {
        match self {
            Self::Completed(outcome) if outcome.has_pending() => SyncState::Error,
            Self::Completed(_) => SyncState::Synced,
            Self::AlreadyRunning => SyncState::Syncing,
        }
    }
}

/// Drains the local record store and photo queue against the remote
/// gateways.
///
/// Single active drain at a time: a compare-exchange guard drops triggers
/// that arrive mid-pass. The in-flight pass works over a snapshot of each
/// queue, so items enqueued during the pass wait for the next trigger and
/// a pass over N records and M photos performs at most N creations and M
/// uploads.
pub struct SyncOrchestrator<R, B, N> {
    db: Arc<Mutex<Database>>,
    records: R,
    blobs: B,
    notifier: N,
    draining: AtomicBool,
}

impl<R, B, N> SyncOrchestrator<R, B, N>
where
    R: RecordGateway,
    B: BlobGateway,
    N: SyncNotifier,
{
    pub fn new(db: Arc<Mutex<Database>>, records: R, blobs: B, notifier: N) -> Self {
        Self {
            db,
            records,
            blobs,
            notifier,
            draining: AtomicBool::new(false),
        }
    }

    /// Run one drain pass, records first, then photos.
    ///
    /// Per-item remote failures are swallowed into the outcome counts;
    /// only local storage failures abort and surface to the caller.
    pub async fn drain(&self) -> Result<DrainOutcome> {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("drain already in flight; trigger dropped");
            return Ok(DrainOutcome::AlreadyRunning);
        }

        let result = self.run_pass().await;
        self.draining.store(false, Ordering::Release);

        let outcome = result?;
        self.notifier.pass_completed(&outcome);
        Ok(DrainOutcome::Completed(outcome))
    }

    async fn run_pass(&self) -> Result<SyncOutcome> {
        let db = self.db.lock().await;
        let readings = LibSqlReadingQueue::new(db.connection());
        let photos = LibSqlPhotoQueue::new(db.connection());

        let mut outcome = SyncOutcome::default();
        self.drain_records(&readings, &photos, &mut outcome).await?;
        self.drain_photos(&readings, &photos, &mut outcome).await?;
        Ok(outcome)
    }

    async fn drain_records(
        &self,
        readings: &LibSqlReadingQueue<'_>,
        photos: &LibSqlPhotoQueue<'_>,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        for pending in readings.list_all().await? {
            match self.records.create(&pending.payload).await {
                Ok(final_id) => {
                    // Reconcile before removal: queued photos must never be
                    // left tagged with a temp id the store no longer has.
                    photos.reassign(pending.temp_id.as_str(), &final_id).await?;
                    readings.remove(&pending.temp_id).await?;
                    self.notifier.record_synced(&pending.temp_id, &final_id);
                    outcome.records_synced += 1;
                }
                Err(error) if is_local_storage_error(&error) => return Err(error),
                Err(error) => {
                    // One bad record must not block the rest of the pass
                    tracing::warn!(
                        temp_id = %pending.temp_id,
                        %error,
                        transient = error.is_transient(),
                        "reading sync failed"
                    );
                    self.notifier.record_sync_failed(&pending.temp_id);
                    outcome.records_failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn drain_photos(
        &self,
        readings: &LibSqlReadingQueue<'_>,
        photos: &LibSqlPhotoQueue<'_>,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        for photo in photos.list_all().await? {
            if photo.is_unassigned() {
                // Nothing to attach it to yet; stays queued without
                // counting as a failure.
                continue;
            }

            if TempId::is_temp(&photo.reading_id) {
                if !readings.contains(&photo.reading_id).await? {
                    // Should be unreachable: reassignment happens before a
                    // pending reading is removed.
                    tracing::warn!(
                        local_ref = %photo.local_ref,
                        reading_id = %photo.reading_id,
                        "queued photo references an unknown temp id"
                    );
                }
                // The reading has not synced yet; the record phase of a
                // later pass will reassign this photo to a final id.
                continue;
            }

            let Some(content) = photo.content.as_deref() else {
                // Corrupt bytes cannot be fixed by retrying
                photos.remove(&photo.local_ref).await?;
                self.notifier
                    .photo_discarded(&photo.local_ref, "content corrupt or empty");
                outcome.photos_discarded += 1;
                continue;
            };

            match self.sync_photo(&photo, content).await {
                Ok(locator) => {
                    photos.remove(&photo.local_ref).await?;
                    self.notifier.photo_synced(&photo.local_ref, &locator);
                    outcome.photos_synced += 1;
                }
                Err(error) if is_local_storage_error(&error) => return Err(error),
                Err(error) => {
                    tracing::warn!(
                        local_ref = %photo.local_ref,
                        %error,
                        transient = error.is_transient(),
                        "photo sync failed"
                    );
                    self.notifier.photo_sync_failed(&photo.local_ref);
                    outcome.photos_failed += 1;
                }
            }
        }
        Ok(())
    }

    /// Upload one photo and attach the durable locator to the remote
    /// record's photo list.
    ///
    /// The local ref is find-and-replaced when the payload listed it at
    /// capture time; when it is absent (payload queued without the ref,
    /// or photo added to an already-synced reading) the locator is
    /// appended instead. The locator must land in the list either way.
    async fn sync_photo(&self, photo: &QueuedPhoto, content: &[u8]) -> Result<String> {
        let locator = self
            .blobs
            .upload(content, &photo.file_name, &photo.mime_type)
            .await?;

        let current = self.records.fetch_photos(&photo.reading_id).await?;
        let mut replaced = false;
        let mut updated: Vec<String> = current
            .into_iter()
            .map(|entry| {
                if entry == photo.local_ref {
                    replaced = true;
                    locator.clone()
                } else {
                    entry
                }
            })
            .collect();
        if !replaced {
            updated.push(locator.clone());
        }
        self.records
            .update_photos(&photo.reading_id, &updated)
            .await?;

        Ok(locator)
    }
}

/// Local storage failures abort the current drain; everything else is a
/// per-item failure that leaves the item queued.
const fn is_local_storage_error(error: &Error) -> bool {
    matches!(
        error,
        Error::LibSql(_) | Error::Database(_) | Error::Io(_) | Error::Serialization(_)
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::db::Database;
    use crate::models::testing::sample_reading;
    use crate::models::{Reading, PENDING_READING_ID};

    const JPEG_BYTES: &[u8] = &[0xff, 0xd8, 0xff, 0xe0];

    /// In-memory record store fake; assigns `r1`, `r2`, ... on create.
    #[derive(Default)]
    struct FakeRecordGateway {
        inner: StdMutex<FakeRecordState>,
        fail_creates: bool,
        fail_updates: bool,
    }

    #[derive(Default)]
    struct FakeRecordState {
        next_id: usize,
        documents: HashMap<String, Vec<String>>,
        creates_attempted: usize,
    }

    impl FakeRecordGateway {
        fn failing_creates() -> Self {
            Self {
                fail_creates: true,
                ..Self::default()
            }
        }

        fn photos_of(&self, id: &str) -> Option<Vec<String>> {
            self.inner.lock().unwrap().documents.get(id).cloned()
        }

        fn creates_attempted(&self) -> usize {
            self.inner.lock().unwrap().creates_attempted
        }
    }

    impl RecordGateway for FakeRecordGateway {
        async fn create(&self, payload: &Reading) -> Result<String> {
            let mut state = self.inner.lock().unwrap();
            state.creates_attempted += 1;
            if self.fail_creates {
                return Err(Error::Network("simulated offline".to_string()));
            }
            state.next_id += 1;
            let id = format!("r{}", state.next_id);
            state.documents.insert(id.clone(), payload.photos.clone());
            Ok(id)
        }

        async fn fetch_photos(&self, reading_id: &str) -> Result<Vec<String>> {
            self.inner
                .lock()
                .unwrap()
                .documents
                .get(reading_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(reading_id.to_string()))
        }

        async fn update_photos(&self, reading_id: &str, photos: &[String]) -> Result<()> {
            if self.fail_updates {
                return Err(Error::Network("simulated offline".to_string()));
            }
            self.inner
                .lock()
                .unwrap()
                .documents
                .insert(reading_id.to_string(), photos.to_vec());
            Ok(())
        }

        async fn delete(&self, reading_id: &str) -> Result<()> {
            self.inner.lock().unwrap().documents.remove(reading_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeBlobGateway {
        fail_uploads: bool,
        uploads: StdMutex<usize>,
    }

    impl FakeBlobGateway {
        fn uploads(&self) -> usize {
            *self.uploads.lock().unwrap()
        }
    }

    impl BlobGateway for FakeBlobGateway {
        async fn upload(
            &self,
            _content: &[u8],
            suggested_name: &str,
            _content_type: &str,
        ) -> Result<String> {
            *self.uploads.lock().unwrap() += 1;
            if self.fail_uploads {
                return Err(Error::Storage("simulated upload failure".to_string()));
            }
            Ok(format!("https://cdn.example.com/media/{suggested_name}"))
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        RecordSynced(String, String),
        RecordFailed(String),
        PhotoSynced(String, String),
        PhotoFailed(String),
        PhotoDiscarded(String),
        PassCompleted,
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: StdMutex<Vec<Event>>,
    }

    impl RecordingNotifier {
        fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl SyncNotifier for RecordingNotifier {
        fn record_synced(&self, temp_id: &TempId, final_id: &str) {
            self.events.lock().unwrap().push(Event::RecordSynced(
                temp_id.as_str().to_string(),
                final_id.to_string(),
            ));
        }

        fn record_sync_failed(&self, temp_id: &TempId) {
            self.events
                .lock()
                .unwrap()
                .push(Event::RecordFailed(temp_id.as_str().to_string()));
        }

        fn photo_synced(&self, local_ref: &str, locator: &str) {
            self.events.lock().unwrap().push(Event::PhotoSynced(
                local_ref.to_string(),
                locator.to_string(),
            ));
        }

        fn photo_sync_failed(&self, local_ref: &str) {
            self.events
                .lock()
                .unwrap()
                .push(Event::PhotoFailed(local_ref.to_string()));
        }

        fn photo_discarded(&self, local_ref: &str, _reason: &str) {
            self.events
                .lock()
                .unwrap()
                .push(Event::PhotoDiscarded(local_ref.to_string()));
        }

        fn pass_completed(&self, _outcome: &SyncOutcome) {
            self.events.lock().unwrap().push(Event::PassCompleted);
        }
    }

    async fn setup_db() -> Arc<Mutex<Database>> {
        Arc::new(Mutex::new(Database::open_in_memory().await.unwrap()))
    }

    async fn enqueue_reading(db: &Arc<Mutex<Database>>, photos: &[&str]) -> TempId {
        let db = db.lock().await;
        let queue = LibSqlReadingQueue::new(db.connection());
        let mut payload = sample_reading();
        payload.photos = photos.iter().map(ToString::to_string).collect();
        queue.enqueue(&payload).await.unwrap()
    }

    async fn enqueue_photo(db: &Arc<Mutex<Database>>, reading_id: &str, local_ref: &str) {
        let db = db.lock().await;
        let queue = LibSqlPhotoQueue::new(db.connection());
        queue
            .enqueue(reading_id, JPEG_BYTES, local_ref, "meter.jpg", "image/jpeg")
            .await
            .unwrap();
    }

    async fn queue_sizes(db: &Arc<Mutex<Database>>) -> (usize, usize) {
        let db = db.lock().await;
        let readings = LibSqlReadingQueue::new(db.connection());
        let photos = LibSqlPhotoQueue::new(db.connection());
        (
            readings.len().await.unwrap(),
            photos.len().await.unwrap(),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drains_reading_and_photo_end_to_end() {
        let db = setup_db().await;
        let temp_id = enqueue_reading(&db, &["blob:p1"]).await;
        enqueue_photo(&db, temp_id.as_str(), "blob:p1").await;

        let records = FakeRecordGateway::default();
        let notifier = RecordingNotifier::default();
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            &records,
            FakeBlobGateway::default(),
            &notifier,
        );

        let outcome = match orchestrator.drain().await.unwrap() {
            DrainOutcome::Completed(outcome) => outcome,
            DrainOutcome::AlreadyRunning => panic!("drain should have run"),
        };

        assert_eq!(outcome.records_synced, 1);
        assert_eq!(outcome.photos_synced, 1);
        assert!(!outcome.has_pending());

        // Both local queues empty
        assert_eq!(queue_sizes(&db).await, (0, 0));

        // Remote photo list had the local ref find-and-replaced
        let photos = records.photos_of("r1").unwrap();
        assert_eq!(photos, vec!["https://cdn.example.com/media/meter.jpg"]);

        let events = notifier.events();
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::RecordSynced(t, f) if t == temp_id.as_str() && f == "r1")));
        assert!(events
            .iter()
            .any(|e| matches!(e, Event::PhotoSynced(l, _) if l == "blob:p1")));
        assert_eq!(events.last(), Some(&Event::PassCompleted));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn photo_absent_from_payload_list_is_appended() {
        let db = setup_db().await;
        // Payload queued without the local ref in its photo list
        let temp_id = enqueue_reading(&db, &[]).await;
        enqueue_photo(&db, temp_id.as_str(), "blob:p1").await;

        let records = FakeRecordGateway::default();
        let notifier = RecordingNotifier::default();
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            &records,
            FakeBlobGateway::default(),
            &notifier,
        );

        let DrainOutcome::Completed(outcome) = orchestrator.drain().await.unwrap() else {
            panic!("drain should have run");
        };

        assert_eq!(outcome.photos_synced, 1);
        assert_eq!(queue_sizes(&db).await, (0, 0));
        // The locator still lands on the record instead of vanishing
        let photos = records.photos_of("r1").unwrap();
        assert_eq!(photos, vec!["https://cdn.example.com/media/meter.jpg"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn photo_added_to_synced_reading_is_appended() {
        let db = setup_db().await;
        let records = FakeRecordGateway::default();
        let final_id = records.create(&sample_reading()).await.unwrap();
        enqueue_photo(&db, &final_id, "blob:late").await;

        let notifier = RecordingNotifier::default();
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            &records,
            FakeBlobGateway::default(),
            &notifier,
        );

        let DrainOutcome::Completed(outcome) = orchestrator.drain().await.unwrap() else {
            panic!("drain should have run");
        };

        assert_eq!(outcome.photos_synced, 1);
        assert_eq!(queue_sizes(&db).await, (0, 0));
        let photos = records.photos_of(&final_id).unwrap();
        assert_eq!(photos, vec!["https://cdn.example.com/media/meter.jpg"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_sentinel_photo_stays_queued_without_error() {
        let db = setup_db().await;
        enqueue_photo(&db, PENDING_READING_ID, "blob:p1").await;

        let blobs = FakeBlobGateway::default();
        let notifier = RecordingNotifier::default();
        let orchestrator =
            SyncOrchestrator::new(Arc::clone(&db), FakeRecordGateway::default(), &blobs, &notifier);

        let DrainOutcome::Completed(outcome) = orchestrator.drain().await.unwrap() else {
            panic!("drain should have run");
        };

        assert_eq!(outcome, SyncOutcome::default());
        assert_eq!(blobs.uploads(), 0);
        assert_eq!(queue_sizes(&db).await, (0, 1));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_record_leaves_reading_and_its_photos_queued() {
        let db = setup_db().await;
        let temp_id = enqueue_reading(&db, &["blob:p1"]).await;
        enqueue_photo(&db, temp_id.as_str(), "blob:p1").await;

        let blobs = FakeBlobGateway::default();
        let notifier = RecordingNotifier::default();
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            FakeRecordGateway::failing_creates(),
            &blobs,
            &notifier,
        );

        let DrainOutcome::Completed(outcome) = orchestrator.drain().await.unwrap() else {
            panic!("drain should have run");
        };

        assert_eq!(outcome.records_failed, 1);
        assert_eq!(outcome.photos_failed, 0);
        // Photo still tagged with the temp id; no upload was attempted
        assert_eq!(blobs.uploads(), 0);
        assert_eq!(queue_sizes(&db).await, (1, 1));
        assert!(notifier
            .events()
            .iter()
            .any(|e| matches!(e, Event::RecordFailed(t) if t == temp_id.as_str())));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn one_bad_record_does_not_block_others() {
        let db = setup_db().await;
        enqueue_reading(&db, &[]).await;
        enqueue_reading(&db, &[]).await;

        // Gateway fails the first create only
        struct FlakyGateway {
            inner: FakeRecordGateway,
            failed_once: StdMutex<bool>,
        }

        impl RecordGateway for FlakyGateway {
            async fn create(&self, payload: &Reading) -> Result<String> {
                let mut failed = self.failed_once.lock().unwrap();
                if !*failed {
                    *failed = true;
                    return Err(Error::Network("simulated offline".to_string()));
                }
                drop(failed);
                self.inner.create(payload).await
            }

            async fn fetch_photos(&self, reading_id: &str) -> Result<Vec<String>> {
                self.inner.fetch_photos(reading_id).await
            }

            async fn update_photos(&self, reading_id: &str, photos: &[String]) -> Result<()> {
                self.inner.update_photos(reading_id, photos).await
            }

            async fn delete(&self, reading_id: &str) -> Result<()> {
                self.inner.delete(reading_id).await
            }
        }

        let gateway = FlakyGateway {
            inner: FakeRecordGateway::default(),
            failed_once: StdMutex::new(false),
        };
        let notifier = RecordingNotifier::default();
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            gateway,
            FakeBlobGateway::default(),
            &notifier,
        );

        let DrainOutcome::Completed(outcome) = orchestrator.drain().await.unwrap() else {
            panic!("drain should have run");
        };

        assert_eq!(outcome.records_synced, 1);
        assert_eq!(outcome.records_failed, 1);
        assert_eq!(queue_sizes(&db).await.0, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn corrupt_photo_is_discarded_and_never_retried() {
        let db = setup_db().await;
        {
            let db = db.lock().await;
            db.connection()
                .execute(
                    "INSERT INTO queued_photos
                         (local_ref, reading_id, file_name, mime_type, content_b64, queued_at)
                     VALUES ('blob:bad', 'r9', 'bad.jpg', 'image/jpeg', '!!garbage!!', 1)",
                    (),
                )
                .await
                .unwrap();
        }

        let blobs = FakeBlobGateway::default();
        let notifier = RecordingNotifier::default();
        let orchestrator =
            SyncOrchestrator::new(Arc::clone(&db), FakeRecordGateway::default(), &blobs, &notifier);

        let DrainOutcome::Completed(outcome) = orchestrator.drain().await.unwrap() else {
            panic!("drain should have run");
        };

        assert_eq!(outcome.photos_discarded, 1);
        assert_eq!(blobs.uploads(), 0);
        assert_eq!(queue_sizes(&db).await, (0, 0));
        assert!(notifier
            .events()
            .iter()
            .any(|e| matches!(e, Event::PhotoDiscarded(l) if l == "blob:bad")));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_upload_leaves_photo_queued() {
        let db = setup_db().await;
        let temp_id = enqueue_reading(&db, &["blob:p1"]).await;
        enqueue_photo(&db, temp_id.as_str(), "blob:p1").await;

        let blobs = FakeBlobGateway {
            fail_uploads: true,
            ..FakeBlobGateway::default()
        };
        let notifier = RecordingNotifier::default();
        let orchestrator =
            SyncOrchestrator::new(Arc::clone(&db), FakeRecordGateway::default(), &blobs, &notifier);

        let DrainOutcome::Completed(outcome) = orchestrator.drain().await.unwrap() else {
            panic!("drain should have run");
        };

        // Record synced and reconciled; photo failed its upload step
        assert_eq!(outcome.records_synced, 1);
        assert_eq!(outcome.photos_failed, 1);
        assert_eq!(queue_sizes(&db).await, (0, 1));

        // The queued photo now carries the final id, ready for retry
        let db_guard = db.lock().await;
        let photos = LibSqlPhotoQueue::new(db_guard.connection());
        let queued = photos.list_all().await.unwrap();
        assert_eq!(queued[0].reading_id, "r1");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pass_is_bounded_by_snapshot_size() {
        let db = setup_db().await;
        enqueue_reading(&db, &[]).await;
        enqueue_reading(&db, &[]).await;

        let records = FakeRecordGateway::failing_creates();
        let notifier = RecordingNotifier::default();
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            &records,
            FakeBlobGateway::default(),
            &notifier,
        );

        orchestrator.drain().await.unwrap();
        // Exactly one create attempt per queued record, no tight retries
        assert_eq!(records.creates_attempted(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlapping_drain_is_dropped() {
        let db = setup_db().await;
        let notifier = RecordingNotifier::default();
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            FakeRecordGateway::default(),
            FakeBlobGateway::default(),
            &notifier,
        );

        // Simulate an in-flight drain holding the guard
        orchestrator.draining.store(true, Ordering::Release);
        let outcome = orchestrator.drain().await.unwrap();
        assert_eq!(outcome, DrainOutcome::AlreadyRunning);
        assert_eq!(outcome.state(), SyncState::Syncing);

        // Guard released: the next trigger drains normally
        orchestrator.draining.store(false, Ordering::Release);
        let outcome = orchestrator.drain().await.unwrap();
        assert!(matches!(outcome, DrainOutcome::Completed(_)));
        assert_eq!(outcome.state(), SyncState::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interrupted_reconcile_retries_whole_record_step() {
        let db = setup_db().await;
        let temp_id = enqueue_reading(&db, &["blob:p1"]).await;
        enqueue_photo(&db, temp_id.as_str(), "blob:p1").await;

        // Simulate a crash after remote creation but before removal: the
        // pending row and the temp-tagged photo are both still present.
        let records = FakeRecordGateway::default();
        {
            let payload = sample_reading();
            let _ = records.create(&payload).await.unwrap();
        }

        let notifier = RecordingNotifier::default();
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&db),
            &records,
            FakeBlobGateway::default(),
            &notifier,
        );

        let DrainOutcome::Completed(outcome) = orchestrator.drain().await.unwrap() else {
            panic!("drain should have run");
        };

        // The record step ran again (at-least-once: r1 is the duplicate),
        // the photo was reconciled to the fresh id and uploaded.
        assert_eq!(outcome.records_synced, 1);
        assert_eq!(outcome.photos_synced, 1);
        assert_eq!(queue_sizes(&db).await, (0, 0));
        assert!(records.photos_of("r2").is_some());
    }
}
