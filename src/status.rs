//! Status registry shared between the scheduler, the job, and observers.
//!
//! [`StatusRegistry`] holds the lifecycle status plus last-run metadata
//! behind one mutex. Observers (menu bar bridge, doctor tooling) poll
//! [`StatusRegistry::snapshot`] on whatever cadence suits them; there is
//! no push channel. Mutations are short critical sections with no I/O
//! under the lock, so readers never wait on a run in progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Maximum characters of a journal entry kept as the preview.
const PREVIEW_MAX_CHARS: usize = 100;

/// Lifecycle status of the journaling pipeline.
///
/// Transitions are driven by the scheduler (`Stopped` ↔ `Running` on
/// start/stop) and by the job (`Running → Processing` on entry,
/// `Processing → Running` on success, `Processing → Error` on failure).
/// A stop requested while a run is in flight takes effect only after the
/// run's terminal transition, so `Processing` never goes straight to
/// `Stopped`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Periodic execution is disabled.
    #[default]
    Stopped,
    /// Periodic execution is armed; no run is currently executing.
    Running,
    /// A run is currently executing.
    Processing,
    /// The most recent run failed; clears on the next success.
    Error,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Status::Stopped => "Stopped",
            Status::Running => "Running",
            Status::Processing => "Processing",
            Status::Error => "Error",
        };
        f.write_str(label)
    }
}

/// Point-in-time copy of every registry field.
///
/// Taken under a single critical section, so observers never see torn
/// state across fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Current lifecycle status.
    pub status: Status,
    /// When the last run started, if any has.
    pub last_execution_at: Option<DateTime<Utc>>,
    /// Preview of the last recorded entry (≤ 100 characters).
    pub last_entry_preview: Option<String>,
    /// When the last entry was recorded. Set together with the preview.
    pub last_entry_at: Option<DateTime<Utc>>,
    /// Consecutive failures since the last success.
    pub error_count: u32,
    /// When the next timer firing is due, while the scheduler is running.
    pub next_execution_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct RegistryFields {
    status: Status,
    last_execution_at: Option<DateTime<Utc>>,
    last_entry_preview: Option<String>,
    last_entry_at: Option<DateTime<Utc>>,
    error_count: u32,
    next_execution_at: Option<DateTime<Utc>>,
}

/// Thread-safe registry of pipeline status and last-run metadata.
///
/// One instance is created by the application root and shared by
/// reference with the scheduler, the job, and any observers.
#[derive(Debug, Default)]
pub struct StatusRegistry {
    fields: Mutex<RegistryFields>,
}

impl StatusRegistry {
    /// Create a registry in the `Stopped` state with no run metadata.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryFields> {
        // A poisoned lock only means a panic elsewhere; the fields are
        // still sound, and every operation here must stay total.
        self.fields.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite the lifecycle status.
    ///
    /// No transition validation happens here; legality is the caller's
    /// concern (see [`Status`]).
    pub fn set_status(&self, status: Status) {
        self.lock().status = status;
    }

    /// Current lifecycle status.
    pub fn status(&self) -> Status {
        self.lock().status
    }

    /// `true` while periodic execution is armed.
    pub fn is_running(&self) -> bool {
        self.status() == Status::Running
    }

    /// Record a run starting now.
    pub fn record_execution(&self) {
        self.record_execution_at(Utc::now());
    }

    /// Record a run starting at `at`.
    pub fn record_execution_at(&self, at: DateTime<Utc>) {
        self.lock().last_execution_at = Some(at);
    }

    /// When the last run started, if any has.
    pub fn last_execution_at(&self) -> Option<DateTime<Utc>> {
        self.lock().last_execution_at
    }

    /// Record a journal entry produced now.
    ///
    /// Only the first 100 characters are kept as the preview.
    pub fn record_entry(&self, preview: &str) {
        self.record_entry_at(preview, Utc::now());
    }

    /// Record a journal entry produced at `at`.
    pub fn record_entry_at(&self, preview: &str, at: DateTime<Utc>) {
        let preview = truncate_chars(preview, PREVIEW_MAX_CHARS);
        let mut fields = self.lock();
        fields.last_entry_preview = Some(preview);
        fields.last_entry_at = Some(at);
    }

    /// Preview of the last recorded entry, if any.
    pub fn last_entry_preview(&self) -> Option<String> {
        self.lock().last_entry_preview.clone()
    }

    /// When the last entry was recorded, if any.
    pub fn last_entry_at(&self) -> Option<DateTime<Utc>> {
        self.lock().last_entry_at
    }

    /// Count one more consecutive failure.
    pub fn increment_error_count(&self) {
        let mut fields = self.lock();
        fields.error_count = fields.error_count.saturating_add(1);
    }

    /// Clear the failure counter (first success after failures).
    pub fn reset_error_count(&self) {
        self.lock().error_count = 0;
    }

    /// Consecutive failures since the last success.
    pub fn error_count(&self) -> u32 {
        self.lock().error_count
    }

    /// Set or clear the next scheduled firing time.
    pub fn set_next_execution(&self, at: Option<DateTime<Utc>>) {
        self.lock().next_execution_at = at;
    }

    /// Next scheduled firing time, while the scheduler is running.
    pub fn next_execution(&self) -> Option<DateTime<Utc>> {
        self.lock().next_execution_at
    }

    /// Consistent point-in-time copy of all fields.
    pub fn snapshot(&self) -> StatusSnapshot {
        let fields = self.lock();
        StatusSnapshot {
            status: fields.status,
            last_execution_at: fields.last_execution_at,
            last_entry_preview: fields.last_entry_preview.clone(),
            last_entry_at: fields.last_entry_at,
            error_count: fields.error_count,
            next_execution_at: fields.next_execution_at,
        }
    }
}

/// First `max` characters of `s`, never splitting a code point.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
