// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document controller — sequences every mutating operation on one scan
// session: page add/delete/rotate/recrop, document-level settings, and the
// final rendering dispatch.
//
// All mutating operations are serialized by a single `tokio::sync::Mutex`
// that stays held across gateway calls, so a second operation never begins
// mutating before the first has fully committed or fully failed. Gateway and
// filesystem work is blocking and runs on the tokio blocking pool. Committed
// state is published as immutable snapshots on a watch channel; read-only
// queries work from the latest snapshot without taking the lock.
//
// Failure policy: every operation is atomic with respect to the entity
// model. A failed gateway call leaves pages and settings exactly as before,
// produces no snapshot, and surfaces the error as the return value (plus a
// log line). Nothing here is fatal; callers retry or abandon.

use std::path::PathBuf;
use std::sync::Arc;

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{
    Artifact, DocumentSettings, FileType, Page, PageId, Quad, Quality,
};
use scanwerk_imaging::artifacts::{ArtifactGuard, ArtifactStore};
use scanwerk_imaging::render::DocumentRenderer;
use scanwerk_imaging::scanner::PageScanner;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, instrument};

use crate::store::PageStore;

/// Immutable view of the committed document state.
///
/// A new snapshot (with a bumped `revision`) is published after every
/// successful mutation; presentation layers subscribe and re-render from it.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub revision: u64,
    pub title: String,
    pub quality: Quality,
    pub file_type: FileType,
    pub save_destination: Option<String>,
    pub destinations: Vec<String>,
    pub pages: Vec<Page>,
    pub cursor: usize,
    pub result_document: Option<PathBuf>,
}

impl DocumentSnapshot {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The page at the cursor, if any.
    pub fn current_page(&self) -> Option<&Page> {
        self.pages.get(self.cursor)
    }

    /// One-based cursor position paired with the page count.
    pub fn position(&self) -> (usize, usize) {
        (self.cursor + 1, self.pages.len())
    }

    /// Each destination candidate with its "is selected" flag.
    pub fn destination_flags(&self) -> Vec<(String, bool)> {
        self.destinations
            .iter()
            .map(|d| (d.clone(), self.save_destination.as_deref() == Some(d.as_str())))
            .collect()
    }
}

/// Mutable state guarded by the controller's lock.
struct DocumentState {
    settings: DocumentSettings,
    store: PageStore,
    destinations: Vec<String>,
    result_document: Option<PathBuf>,
    revision: u64,
}

impl DocumentState {
    fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            revision: self.revision,
            title: self.settings.title.clone(),
            quality: self.settings.quality,
            file_type: self.settings.file_type,
            save_destination: self.settings.save_destination.clone(),
            destinations: self.destinations.clone(),
            pages: self.store.pages().to_vec(),
            cursor: self.store.cursor(),
            result_document: self.result_document.clone(),
        }
    }

    /// Single images cannot hold multiple pages: force PDF as soon as a
    /// second page exists. Never reverts.
    fn enforce_file_type(&mut self) {
        if self.store.len() > 1 && self.settings.file_type != FileType::Pdf {
            info!("multiple pages present; forcing PDF output");
            self.settings.file_type = FileType::Pdf;
        }
    }
}

/// Owner of one document's pages, settings, and artifact lifecycle.
pub struct DocumentController {
    state: Mutex<DocumentState>,
    scanner: Arc<dyn PageScanner>,
    artifacts: ArtifactStore,
    renderer: Arc<dyn DocumentRenderer>,
    changes: watch::Sender<DocumentSnapshot>,
}

impl DocumentController {
    pub fn new(
        settings: DocumentSettings,
        scanner: Arc<dyn PageScanner>,
        artifacts: ArtifactStore,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> Self {
        let state = DocumentState {
            settings,
            store: PageStore::new(),
            destinations: Vec::new(),
            result_document: None,
            revision: 0,
        };
        let (changes, _) = watch::channel(state.snapshot());
        Self {
            state: Mutex::new(state),
            scanner,
            artifacts,
            renderer,
            changes,
        }
    }

    // -- Queries (lock-free, from the latest committed snapshot) --------------

    pub fn snapshot(&self) -> DocumentSnapshot {
        self.changes.borrow().clone()
    }

    /// Subscribe to committed-state changes.
    pub fn subscribe(&self) -> watch::Receiver<DocumentSnapshot> {
        self.changes.subscribe()
    }

    pub fn page_count(&self) -> usize {
        self.changes.borrow().page_count()
    }

    pub fn current_page(&self) -> Option<Page> {
        self.changes.borrow().current_page().cloned()
    }

    pub fn page_position(&self) -> (usize, usize) {
        self.changes.borrow().position()
    }

    pub fn destination_flags(&self) -> Vec<(String, bool)> {
        self.changes.borrow().destination_flags()
    }

    // -- Document-level settings ----------------------------------------------

    /// Store a trimmed title. No-op when blank or unchanged.
    pub async fn set_title(&self, title: &str) {
        let mut state = self.state.lock().await;
        let trimmed = title.trim();
        if trimmed.is_empty() || trimmed == state.settings.title {
            return;
        }
        state.settings.title = trimmed.to_owned();
        self.publish(&mut state);
    }

    pub async fn set_quality(&self, quality: Quality) {
        let mut state = self.state.lock().await;
        if state.settings.quality == quality {
            return;
        }
        state.settings.quality = quality;
        self.publish(&mut state);
    }

    pub async fn set_file_type(&self, file_type: FileType) {
        let mut state = self.state.lock().await;
        if state.settings.file_type == file_type {
            return;
        }
        state.settings.file_type = file_type;
        self.publish(&mut state);
    }

    pub async fn set_save_destination(&self, destination: &str) {
        let mut state = self.state.lock().await;
        if state.settings.save_destination.as_deref() == Some(destination) {
            return;
        }
        state.settings.save_destination = Some(destination.to_owned());
        self.publish(&mut state);
    }

    /// Replace the offered destination set. When nothing was previously
    /// chosen, the first candidate becomes the selection.
    pub async fn set_save_destinations(&self, destinations: Vec<String>) {
        let mut state = self.state.lock().await;
        if state.settings.save_destination.is_none() {
            state.settings.save_destination = destinations.first().cloned();
        }
        state.destinations = destinations;
        self.publish(&mut state);
    }

    /// Move the cursor (clamped). Publishes only on an actual move.
    pub async fn set_cursor(&self, position: usize) {
        let mut state = self.state.lock().await;
        let before = state.store.cursor();
        state.store.set_cursor(position);
        if state.store.cursor() != before {
            self.publish(&mut state);
        }
    }

    // -- Page mutations -------------------------------------------------------

    /// Scan `source` with automatic quadrilateral detection and append the
    /// resulting page.
    ///
    /// Ownership of the source artifact passes to the new page. On failure
    /// the page list is unchanged and no partial page exists.
    #[instrument(skip(self), fields(source = %source))]
    pub async fn add_page(&self, source: Artifact) -> Result<PageId> {
        let mut state = self.state.lock().await;

        let scanner = Arc::clone(&self.scanner);
        let scan_source = source.clone();
        let (guard, outcome) = self
            .run_blocking(move || {
                let outcome = scanner.detect(&scan_source, None)?;
                // The cropped file is deleted on drop until the page record
                // commits, so a cancelled or failed add leaves no orphan.
                let guard = ArtifactGuard::new(outcome.artifact.clone());
                Ok((guard, outcome))
            })
            .await
            .inspect_err(|err| error!(error = %err, "add_page failed; page list unchanged"))?;

        let page = Page::new(
            source,
            outcome.width,
            outcome.height,
            Some(guard.commit()),
            Some(outcome.points),
        );
        let id = page.id;
        state.store.push(page);
        state.enforce_file_type();
        self.publish(&mut state);

        info!(page_id = %id, pages = state.store.len(), "page added");
        Ok(id)
    }

    /// Release both artifacts of the page at the cursor, then remove it.
    ///
    /// Deletion is atomic: if releasing either file fails, the page stays in
    /// the document and the error is reported.
    #[instrument(skip(self))]
    pub async fn delete_current_page(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let page = state.store.current()?.clone();

        let artifacts = self.artifacts.clone();
        let victim = page.clone();
        self.run_blocking(move || artifacts.release_page(&victim))
            .await
            .inspect_err(
                |err| error!(page_id = %page.id, error = %err, "release failed; page kept"),
            )?;

        state.store.remove_current()?;
        state.enforce_file_type();
        self.publish(&mut state);

        info!(page_id = %page.id, pages = state.store.len(), "page deleted");
        Ok(())
    }

    /// Physically rotate both of the current page's files one quarter-turn
    /// clockwise, then advance the page's rotation metadata.
    ///
    /// Any physical-rotation failure leaves the page record unchanged.
    #[instrument(skip(self))]
    pub async fn rotate_current_page(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let page = state.store.current()?.clone();

        let artifacts = self.artifacts.clone();
        let target = page.clone();
        self.run_blocking(move || artifacts.rotate_page(&target))
            .await
            .inspect_err(
                |err| error!(page_id = %page.id, error = %err, "rotate failed; page unchanged"),
            )?;

        let rotated = page.rotated();
        debug!(page_id = %page.id, rotation = rotated.rotation.degrees(), "page rotated");
        state.store.replace_current(rotated)?;
        self.publish(&mut state);
        Ok(())
    }

    /// Re-crop the current page with caller-supplied points.
    ///
    /// The superseded cropped artifact is released up front and never
    /// resurrected: if the re-scan fails, the page is committed with no crop
    /// (so the model never pairs stale points with a missing image) and the
    /// error is returned.
    #[instrument(skip(self, points))]
    pub async fn crop_current_page(&self, points: Quad) -> Result<()> {
        let mut state = self.state.lock().await;
        let page = state.store.current()?.clone();

        let artifacts = self.artifacts.clone();
        let target = page.clone();
        self.run_blocking(move || artifacts.release_cropped(&target))
            .await?;
        state.store.replace_current(page.without_crop())?;

        let scanner = Arc::clone(&self.scanner);
        let original = page.original.clone();
        let scan = self
            .run_blocking(move || {
                let outcome = scanner.detect(&original, Some(points))?;
                let guard = ArtifactGuard::new(outcome.artifact.clone());
                Ok((guard, outcome))
            })
            .await;

        match scan {
            Ok((guard, outcome)) => {
                let updated = page.with_crop(guard.commit(), outcome.points);
                state.store.replace_current(updated)?;
                self.publish(&mut state);
                info!(page_id = %page.id, "page re-cropped");
                Ok(())
            }
            Err(err) => {
                error!(page_id = %page.id, error = %err, "re-crop failed; page left uncropped");
                self.publish(&mut state);
                Err(err)
            }
        }
    }

    /// Release every page's artifacts and drop the records.
    ///
    /// Pages whose files could not be released stay in the document; the
    /// first failure is reported after the sweep.
    #[instrument(skip(self))]
    pub async fn discard_all_pages(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.store.is_empty() {
            return Ok(());
        }

        let pages = state.store.pages().to_vec();
        let artifacts = self.artifacts.clone();
        let (released, first_err) = self
            .run_blocking(move || {
                let mut released = Vec::new();
                let mut first_err = None;
                for page in &pages {
                    match artifacts.release_page(page) {
                        Ok(()) => released.push(page.id),
                        Err(err) => {
                            first_err.get_or_insert(err);
                        }
                    };
                }
                Ok((released, first_err))
            })
            .await?;

        if !released.is_empty() {
            state.store.remove_ids(&released);
            self.publish(&mut state);
        }

        match first_err {
            None => {
                info!(released = released.len(), "all pages discarded");
                Ok(())
            }
            Some(err) => {
                error!(error = %err, kept = state.store.len(), "discard incomplete");
                Err(err)
            }
        }
    }

    // -- Rendering ------------------------------------------------------------

    /// Render the document to its configured output format.
    ///
    /// `Jpg` renders the sole page's best artifact; `Pdf` renders every
    /// page's best artifact in document order. The output location is
    /// recorded in the snapshot and returned.
    #[instrument(skip(self))]
    pub async fn generate(&self) -> Result<PathBuf> {
        let mut state = self.state.lock().await;
        if state.store.is_empty() {
            return Err(ScanwerkError::EmptyDocument);
        }

        let quality = state.settings.quality;
        let title = state.settings.title.clone();
        let renderer = Arc::clone(&self.renderer);

        let path = match state.settings.file_type {
            FileType::Jpg => {
                let artifact = state.store.pages()[0].best_artifact().clone();
                self.run_blocking(move || renderer.render_image(&artifact, quality, &title))
                    .await
            }
            FileType::Pdf => {
                let artifacts: Vec<Artifact> = state
                    .store
                    .pages()
                    .iter()
                    .map(|page| page.best_artifact().clone())
                    .collect();
                self.run_blocking(move || {
                    renderer.render_paginated(&artifacts, quality, &title)
                })
                .await
            }
        }
        .inspect_err(|err| error!(error = %err, "generate failed"))?;

        state.result_document = Some(path.clone());
        self.publish(&mut state);

        info!(path = %path.display(), "document generated");
        Ok(path)
    }

    // -- Internals ------------------------------------------------------------

    /// Commit: bump the revision and publish a fresh snapshot.
    fn publish(&self, state: &mut DocumentState) {
        state.revision += 1;
        self.changes.send_replace(state.snapshot());
    }

    /// Run blocking gateway/filesystem work on the blocking pool while the
    /// document lock stays held by the calling operation.
    async fn run_blocking<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(work)
            .await
            .map_err(|err| ScanwerkError::TaskJoin(err.to_string()))?
    }
}
