//! Offline-to-remote synchronization: drain state machine, triggers, and
//! user-visible notifications.

mod notify;
mod orchestrator;
mod trigger;

pub use notify::{SyncNotifier, TracingNotifier};
pub use orchestrator::{DrainOutcome, SyncOrchestrator, SyncOutcome};
pub use trigger::{run_trigger_loop, SyncTrigger};
