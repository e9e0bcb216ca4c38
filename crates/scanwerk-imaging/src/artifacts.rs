// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact store — owns the on-disk image files backing each page.
//
// Every page references at most two files: the original capture and an
// optional cropped derivative. The store performs the filesystem side of
// page mutations (delete, physical rotate) so that a page's files stay in
// sync with its in-memory geometry. Deletes are idempotent: removing an
// already-absent file is not an error, so failed operations can be retried.

use std::path::PathBuf;

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Artifact, Page};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Filesystem manager for page artifacts.
///
/// Cheap to clone conceptually (holds only the work directory path); all
/// methods are synchronous blocking I/O and should be offloaded with
/// `tokio::task::spawn_blocking` in async contexts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Directory where new artifacts are allocated.
    work_dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `work_dir`, creating the directory if needed.
    pub fn new(work_dir: impl Into<PathBuf>) -> Result<Self> {
        let work_dir = work_dir.into();
        std::fs::create_dir_all(&work_dir)?;
        Ok(Self { work_dir })
    }

    /// Mint a fresh artifact path with the given extension.
    ///
    /// The file is not created; the path is unique by construction.
    pub fn allocate(&self, ext: &str) -> Artifact {
        Artifact::new(self.work_dir.join(format!("{}.{ext}", Uuid::new_v4())))
    }

    /// Delete the file backing `artifact`. Missing files are fine.
    #[instrument(skip(self), fields(artifact = %artifact))]
    pub fn remove(&self, artifact: &Artifact) -> Result<()> {
        match std::fs::remove_file(artifact.path()) {
            Ok(()) => {
                debug!("artifact removed");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ScanwerkError::ArtifactIo(format!(
                "delete {}: {err}",
                artifact
            ))),
        }
    }

    /// Release both files owned by `page`: the cropped derivative (if any),
    /// then the original.
    ///
    /// The first failure aborts the operation and is reported, so the caller
    /// can keep the page record and decide whether it is recoverable.
    #[instrument(skip_all, fields(page_id = %page.id))]
    pub fn release_page(&self, page: &Page) -> Result<()> {
        if let Some(cropped) = &page.cropped {
            self.remove(cropped)?;
        }
        self.remove(&page.original)?;
        debug!("page artifacts released");
        Ok(())
    }

    /// Release only the cropped derivative. No-op if the page has none.
    #[instrument(skip_all, fields(page_id = %page.id))]
    pub fn release_cropped(&self, page: &Page) -> Result<()> {
        if let Some(cropped) = &page.cropped {
            self.remove(cropped)?;
        }
        Ok(())
    }

    /// Rewrite both of `page`'s files in place, rotated one quarter-turn
    /// clockwise.
    ///
    /// On failure there is no guarantee which file (if any) was rewritten;
    /// the caller must not update rotation metadata.
    #[instrument(skip_all, fields(page_id = %page.id))]
    pub fn rotate_page(&self, page: &Page) -> Result<()> {
        if let Some(cropped) = &page.cropped {
            rotate_in_place(cropped)?;
        }
        rotate_in_place(&page.original)?;
        debug!("page artifacts rotated 90 degrees");
        Ok(())
    }
}

/// Load, quarter-turn, and save a single artifact file.
fn rotate_in_place(artifact: &Artifact) -> Result<()> {
    let img = image::open(artifact.path())
        .map_err(|err| ScanwerkError::Image(format!("open {artifact}: {err}")))?;
    let rotated = img.rotate90();
    rotated
        .save(artifact.path())
        .map_err(|err| ScanwerkError::Image(format!("save rotated {artifact}: {err}")))?;
    Ok(())
}

/// RAII wrapper for a scanner-produced artifact that has not yet been
/// committed to a page.
///
/// If the owning operation is cancelled or fails between producing the file
/// and committing the page record, dropping the guard deletes the file so no
/// orphan is left behind. `commit` hands the artifact over once the page
/// record references it.
#[derive(Debug)]
pub struct ArtifactGuard {
    artifact: Option<Artifact>,
}

impl ArtifactGuard {
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact: Some(artifact),
        }
    }

    /// The guarded artifact, while still uncommitted.
    pub fn artifact(&self) -> &Artifact {
        self.artifact
            .as_ref()
            .expect("guard accessed after commit")
    }

    /// Take ownership of the artifact; the file will no longer be deleted on
    /// drop.
    pub fn commit(mut self) -> Artifact {
        self.artifact.take().expect("guard committed twice")
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if let Some(artifact) = self.artifact.take()
            && let Err(err) = std::fs::remove_file(artifact.path())
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(%artifact, error = %err, "failed to clean up uncommitted artifact");
        }
    }
}
