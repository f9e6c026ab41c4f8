//! Archive packaging collaborator.
//!
//! Zipping the session output is owned by the embedding deployment; the stop
//! pipeline only hands over the session directory and the files that survived
//! retention. Archive failures are logged and never abort the pipeline.

use anyhow::Result;
use std::path::{Path, PathBuf};

#[async_trait::async_trait]
pub trait Archiver: Send + Sync {
    /// Package `files` into an archive under `session_dir`.
    ///
    /// Returns the archive path, or `None` when the archiver chose not to
    /// produce one (e.g. nothing worth packaging).
    async fn archive(&self, session_dir: &Path, files: &[PathBuf]) -> Result<Option<PathBuf>>;
}

/// Archiver that never produces an archive.
pub struct NoopArchiver;

#[async_trait::async_trait]
impl Archiver for NoopArchiver {
    async fn archive(&self, _session_dir: &Path, _files: &[PathBuf]) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}
