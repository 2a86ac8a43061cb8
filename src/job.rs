//! Journal job orchestration.
//!
//! One run = capture → describe → record, strictly in sequence, aborting
//! on the first failure. The job owns every status transition tied to a
//! run: `Processing` on entry, `Running` plus counter reset on success,
//! `Error` plus counter increment on failure. The scheduler never touches
//! these; it only reads the returned result for its backstop log line.

use crate::error::Result;
use crate::stages::{Capturer, Describer, Recorder};
use crate::status::{Status, StatusRegistry, truncate_chars};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

/// A single schedulable unit of work.
///
/// Implementations report their outcome through the status registry and
/// return `Err` only as an explicit failure signal for the scheduler's
/// backstop, never by panicking across this boundary.
#[async_trait]
pub trait Job: Send + Sync {
    /// Execute one run.
    async fn run(&self) -> Result<()>;
}

/// The capture → describe → record job.
pub struct JournalJob {
    capturer: Arc<dyn Capturer>,
    describer: Arc<dyn Describer>,
    recorder: Arc<dyn Recorder>,
    status: Arc<StatusRegistry>,
}

impl JournalJob {
    /// Build a job over the three stage collaborators and the shared registry.
    pub fn new(
        capturer: Arc<dyn Capturer>,
        describer: Arc<dyn Describer>,
        recorder: Arc<dyn Recorder>,
        status: Arc<StatusRegistry>,
    ) -> Self {
        Self {
            capturer,
            describer,
            recorder,
            status,
        }
    }

    async fn run_stages(&self) -> Result<String> {
        debug!("capturing");
        let artifact = self.capturer.capture().await?;
        debug!(bytes = artifact.len(), "capture done, describing");
        let entry = self.describer.describe(&artifact).await?;
        debug!("description done, recording entry");
        self.recorder.record(&entry).await?;
        Ok(entry)
    }
}

#[async_trait]
impl Job for JournalJob {
    async fn run(&self) -> Result<()> {
        self.status.set_status(Status::Processing);
        self.status.record_execution();
        info!("journal run started");

        match self.run_stages().await {
            Ok(entry) => {
                self.status.record_entry(&entry);
                self.status.set_status(Status::Running);
                self.status.reset_error_count();
                info!(preview = %truncate_chars(&entry, 100), "journal run completed");
                Ok(())
            }
            Err(e) => {
                self.status.set_status(Status::Error);
                self.status.increment_error_count();
                error!(error = %e, "journal run failed");
                Err(e)
            }
        }
    }
}
