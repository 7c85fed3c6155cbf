//! User-visible sync notifications.

use crate::models::TempId;

use super::orchestrator::SyncOutcome;

/// Fire-and-forget sink for sync outcomes the UI surfaces to the user.
///
/// Notifications are side effects only; the orchestrator never waits on
/// them and never fails because of them.
pub trait SyncNotifier {
    /// An offline reading was created remotely under `final_id`.
    fn record_synced(&self, temp_id: &TempId, final_id: &str);

    /// An offline reading could not be created; it stays queued.
    fn record_sync_failed(&self, temp_id: &TempId);

    /// A queued photo was uploaded and attached under `locator`.
    fn photo_synced(&self, local_ref: &str, locator: &str);

    /// A queued photo upload failed; it stays queued.
    fn photo_sync_failed(&self, local_ref: &str);

    /// A queued photo was permanently dropped (corrupt or empty content).
    fn photo_discarded(&self, local_ref: &str, reason: &str);

    /// A full drain pass finished; summarizes remaining failures.
    fn pass_completed(&self, outcome: &SyncOutcome);
}

impl<T: SyncNotifier> SyncNotifier for &T {
    fn record_synced(&self, temp_id: &TempId, final_id: &str) {
        (**self).record_synced(temp_id, final_id);
    }

    fn record_sync_failed(&self, temp_id: &TempId) {
        (**self).record_sync_failed(temp_id);
    }

    fn photo_synced(&self, local_ref: &str, locator: &str) {
        (**self).photo_synced(local_ref, locator);
    }

    fn photo_sync_failed(&self, local_ref: &str) {
        (**self).photo_sync_failed(local_ref);
    }

    fn photo_discarded(&self, local_ref: &str, reason: &str) {
        (**self).photo_discarded(local_ref, reason);
    }

    fn pass_completed(&self, outcome: &SyncOutcome) {
        (**self).pass_completed(outcome);
    }
}

/// Notifier that reports through `tracing`, used by headless clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl SyncNotifier for TracingNotifier {
    fn record_synced(&self, temp_id: &TempId, final_id: &str) {
        tracing::info!(%temp_id, %final_id, "offline reading synced");
    }

    fn record_sync_failed(&self, temp_id: &TempId) {
        tracing::warn!(%temp_id, "offline reading could not be synced; will retry");
    }

    fn photo_synced(&self, local_ref: &str, locator: &str) {
        tracing::info!(%local_ref, %locator, "pending photo uploaded");
    }

    fn photo_sync_failed(&self, local_ref: &str) {
        tracing::warn!(%local_ref, "pending photo could not be uploaded; will retry");
    }

    fn photo_discarded(&self, local_ref: &str, reason: &str) {
        tracing::warn!(%local_ref, %reason, "pending photo discarded");
    }

    fn pass_completed(&self, outcome: &SyncOutcome) {
        if outcome.records_failed > 0 || outcome.photos_failed > 0 {
            tracing::warn!(
                records_failed = outcome.records_failed,
                photos_failed = outcome.photos_failed,
                "sync pass completed with items still pending"
            );
        } else {
            tracing::info!(
                records_synced = outcome.records_synced,
                photos_synced = outcome.photos_synced,
                photos_discarded = outcome.photos_discarded,
                "sync pass completed"
            );
        }
    }
}
