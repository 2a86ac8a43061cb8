//! Glimpse: periodic screen-journaling core.
//!
//! Every interval, one job runs the pipeline:
//! Capture → Describe → Record
//!
//! # Architecture
//!
//! The core is the scheduling and status coordination around that job:
//! - **Status registry**: thread-safe lifecycle status plus last-run
//!   metadata, polled by observers (menu bar bridge, doctor tooling)
//! - **Stages**: the three injected collaborators: a [`Capturer`]
//!   producing an opaque [`Artifact`], a [`Describer`] turning it into
//!   entry text, and a [`Recorder`] persisting the entry
//! - **Job**: one strictly sequential run of the pipeline, reporting its
//!   outcome through the registry
//! - **Scheduler**: the timer chain executing the job with at most one
//!   run in flight, across timer firings and manual triggers alike
//!
//! Concrete capture, inference, and persistence mechanisms, and all
//! presentation, live with the host application.

pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod scheduler;
pub mod stages;
pub mod status;

pub use config::JournalConfig;
pub use error::{JournalError, Result};
pub use job::{Job, JournalJob};
pub use scheduler::Scheduler;
pub use stages::{Artifact, Capturer, Describer, Recorder};
pub use status::{Status, StatusRegistry, StatusSnapshot};
