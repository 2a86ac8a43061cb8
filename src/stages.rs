//! Pipeline stage contracts: capture, describe, record.
//!
//! The core never interprets what a stage produces: the capture payload
//! is opaque bytes and the description is opaque text. Concrete
//! implementations (the platform screen capturer, the vision-model
//! describer, the journal file writer) live with the host application;
//! the core only sees these three seams.

use crate::error::Result;
use async_trait::async_trait;

/// Opaque capture payload handed from a [`Capturer`] to a [`Describer`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    data: Vec<u8>,
}

impl Artifact {
    /// Wrap raw capture output.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Raw payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` when the capture produced no output.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Produces a capture [`Artifact`].
///
/// Implementations may sleep a fixed settle delay before capturing (the
/// screen capturer does, so transient UI has closed by the time the shot
/// is taken). Fails with a `Capture` error when the platform mechanism
/// errors or produces no output.
#[async_trait]
pub trait Capturer: Send + Sync {
    /// Take one capture.
    async fn capture(&self) -> Result<Artifact>;
}

/// Turns an [`Artifact`] into journal entry text.
///
/// Fails with an `Inference` error on model-loading or generation
/// failure; the core does not distinguish the causes.
#[async_trait]
pub trait Describer: Send + Sync {
    /// Describe one capture.
    async fn describe(&self, artifact: &Artifact) -> Result<String>;
}

/// Durably appends an entry to the journal.
///
/// Fails with a `Persist` error when the entry cannot be appended.
#[async_trait]
pub trait Recorder: Send + Sync {
    /// Append one entry.
    async fn record(&self, entry: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn artifact_exposes_its_bytes() {
        let artifact = Artifact::new(vec![1, 2, 3]);
        assert_eq!(artifact.data(), &[1, 2, 3]);
        assert_eq!(artifact.len(), 3);
        assert!(!artifact.is_empty());
    }

    #[test]
    fn empty_artifact_is_empty() {
        let artifact = Artifact::default();
        assert!(artifact.is_empty());
        assert_eq!(artifact.len(), 0);
    }
}
