//! Job artifact lifecycle
//!
//! Every job gets files named after a fresh UUID inside a shared work
//! directory. The guards returned here own those files and remove them
//! exactly once, either through an explicit `release()` or on drop.
//! Removal is best effort: failures are logged and never reported as job
//! failures.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::Language;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to create work directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Allocator for per-job files in a shared directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Get the work directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn ensure_dir(&self) -> Result<(), ArtifactError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ArtifactError::CreateDir {
                path: self.dir.clone(),
                source,
            })
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<(), ArtifactError> {
        self.ensure_dir().await?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ArtifactError::Write {
                path: path.to_owned(),
                source,
            })
    }

    /// Write submitted source code to `<uuid>.<ext>`
    #[instrument(skip(self, code))]
    pub async fn write_source(
        &self,
        language: Language,
        code: &str,
    ) -> Result<SourceArtifact, ArtifactError> {
        let id = Uuid::new_v4();
        let path = self.dir.join(format!("{id}.{}", language.extension()));
        self.write(&path, code.as_bytes()).await?;
        debug!(?path, len = code.len(), "wrote source file");

        Ok(SourceArtifact {
            path,
            released: false,
        })
    }

    /// Allocate the files of a new job and write its input
    #[instrument(skip(self, input))]
    pub async fn allocate(&self, input: &[u8]) -> Result<JobArtifacts, ArtifactError> {
        let id = Uuid::new_v4();
        let job = JobArtifacts {
            id,
            input_path: self.dir.join(format!("{id}.input")),
            binary_path: self.dir.join(format!("{id}.bin")),
            released: false,
        };
        // Dropping the guard on failure removes anything partially written.
        self.write(&job.input_path, input).await?;
        debug!(job = %id, len = input.len(), "allocated job");

        Ok(job)
    }
}

/// Files owned by one job: its input and the binary the compile step may produce
#[derive(Debug)]
pub struct JobArtifacts {
    id: Uuid,
    input_path: PathBuf,
    binary_path: PathBuf,
    released: bool,
}

impl JobArtifacts {
    /// Get the job identifier
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Remove the job's files.
    ///
    /// Call only once the job's processes have reached a terminal state.
    pub fn release(mut self) {
        self.remove_files();
    }

    fn remove_files(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        remove_artifact(&self.input_path);
        remove_artifact(&self.binary_path);
        debug!(job = %self.id, "released job artifacts");
    }
}

impl Drop for JobArtifacts {
    fn drop(&mut self) {
        self.remove_files();
    }
}

/// A submitted source file, shared by every job of one request
#[derive(Debug)]
pub struct SourceArtifact {
    path: PathBuf,
    released: bool,
}

impl SourceArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the source file
    pub fn release(mut self) {
        self.remove_file();
    }

    fn remove_file(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        remove_artifact(&self.path);
    }
}

impl Drop for SourceArtifact {
    fn drop(&mut self) {
        self.remove_file();
    }
}

/// Remove one file, swallowing errors
fn remove_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove artifact");
        }
    }
}
