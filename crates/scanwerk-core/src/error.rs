// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanwerk.

use thiserror::Error;

/// Top-level error type for all Scanwerk operations.
///
/// Every variant is per-operation and recoverable — nothing here is fatal to
/// the process. Callers decide whether to retry or abandon the operation.
#[derive(Debug, Error)]
pub enum ScanwerkError {
    // -- Scanner gateway --
    #[error("quadrilateral detection failed: {0}")]
    Detection(String),

    // -- Artifact lifecycle --
    #[error("artifact I/O failed: {0}")]
    ArtifactIo(String),

    #[error("image processing failed: {0}")]
    Image(String),

    // -- Renderer gateway --
    #[error("render failed: {0}")]
    Render(String),

    // -- Page store --
    #[error("page cursor {index} out of range for {len} pages")]
    CursorOutOfRange { index: usize, len: usize },

    #[error("document has no pages")]
    EmptyDocument,

    // -- Infrastructure --
    #[error("background task failed: {0}")]
    TaskJoin(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanwerkError>;
