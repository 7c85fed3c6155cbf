//! Sync trigger plumbing.
//!
//! Platform shells translate their native signals (connectivity change
//! notifications, visibility/foreground callbacks, process start) into
//! [`SyncTrigger`] events on an mpsc channel; every event causes one
//! drain attempt. Which kind fired does not change the drain semantics,
//! it only shows up in the logs.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::gateway::{BlobGateway, RecordGateway};

use super::notify::SyncNotifier;
use super::orchestrator::SyncOrchestrator;

/// An external signal that causes a drain attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The device regained network connectivity.
    ConnectivityRestored,
    /// The application returned to the foreground.
    AppVisible,
    /// The application process started with the network available.
    AppStarted,
    /// Explicit user-requested sync.
    Manual,
}

/// Drive the orchestrator from a trigger channel until all senders drop.
///
/// Bursts of triggers coalesce: an event arriving mid-drain is dropped by
/// the orchestrator's guard, and the next event through the channel
/// catches any stragglers.
pub async fn run_trigger_loop<R, B, N>(
    orchestrator: Arc<SyncOrchestrator<R, B, N>>,
    mut triggers: mpsc::Receiver<SyncTrigger>,
) where
    R: RecordGateway,
    B: BlobGateway,
    N: SyncNotifier,
{
    while let Some(trigger) = triggers.recv().await {
        tracing::debug!(?trigger, "sync trigger received");
        if let Err(error) = orchestrator.drain().await {
            tracing::error!(%error, ?trigger, "drain aborted on local storage failure");
        }
    }
    tracing::debug!("trigger channel closed; sync loop exiting");
}
