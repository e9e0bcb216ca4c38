// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-imaging — Filesystem artifact lifecycle, quadrilateral detection
// and rectification, and final JPEG/PDF rendering. This crate bridges
// between the core domain types in `scanwerk-core` and the image files on
// disk.

pub mod artifacts;
pub mod render;
pub mod scanner;

pub use artifacts::{ArtifactGuard, ArtifactStore};
pub use render::{DocumentRenderer, FileRenderer};
pub use scanner::{PageScanner, RectifyScanner, ScanOutcome};
