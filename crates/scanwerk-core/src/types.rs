// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanwerk scan assembly engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique identifier for a scanned page.
///
/// Assigned once at page creation and preserved across every content
/// mutation (crop, rotate), so list-diffing sees "same item, different
/// content".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A planar point in image-space coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropPoint {
    pub x: f32,
    pub y: f32,
}

impl CropPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The quadrilateral delimiting the region of the original image that was
/// rectified into the cropped artifact.
///
/// Point order: top-left, top-right, bottom-left, bottom-right.
pub type Quad = [CropPoint; 4];

/// Cumulative logical rotation of a page, in clockwise quarter-turns.
///
/// This is display metadata: the backing artifact files are physically
/// rewritten on every rotate, so renderers must never re-apply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// One clockwise quarter-turn further, wrapping 270 back to 0.
    pub fn advanced(self) -> Self {
        match self {
            Self::R0 => Self::R90,
            Self::R90 => Self::R180,
            Self::R180 => Self::R270,
            Self::R270 => Self::R0,
        }
    }

    /// Rotation in degrees, for display.
    pub fn degrees(self) -> u32 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }
}

/// Output quality selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Low,
    Medium,
    High,
}

impl Quality {
    /// JPEG encode quality (1-100) for this setting.
    pub fn jpeg_quality(self) -> u8 {
        match self {
            Self::Low => 50,
            Self::Medium => 75,
            Self::High => 100,
        }
    }
}

/// Output container for the assembled document.
///
/// A single JPEG can only hold one page; the controller forces `Pdf` as soon
/// as a second page exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    Jpg,
    Pdf,
}

impl FileType {
    /// File extension for the rendered output.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Pdf => "pdf",
        }
    }
}

/// Reference to an on-disk encoded image file.
///
/// Each artifact is exclusively owned by one page; releasing the page
/// releases the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact(pub PathBuf);

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A single scanned page.
///
/// Pages are immutable values: crop and rotate produce a replacement `Page`
/// with updated fields and the same `id`. The page exclusively owns its
/// `original` artifact and, once a crop pass has succeeded, its `cropped`
/// artifact. An absent `cropped` means "use the full frame".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub original: Artifact,
    /// Pixel width of the original artifact as it exists on disk.
    pub width: u32,
    /// Pixel height of the original artifact as it exists on disk.
    pub height: u32,
    pub cropped: Option<Artifact>,
    pub crop_points: Option<Quad>,
    pub rotation: Rotation,
    pub created_at: DateTime<Utc>,
}

impl Page {
    pub fn new(
        original: Artifact,
        width: u32,
        height: u32,
        cropped: Option<Artifact>,
        crop_points: Option<Quad>,
    ) -> Self {
        Self {
            id: PageId::new(),
            original,
            width,
            height,
            cropped,
            crop_points,
            rotation: Rotation::default(),
            created_at: Utc::now(),
        }
    }

    /// The trivial full-frame quadrilateral for this page's dimensions.
    ///
    /// Used when no crop has been applied yet and as the starting geometry
    /// for interactive crop adjustment.
    pub fn full_frame_quad(&self) -> Quad {
        [
            CropPoint::new(0.0, 0.0),
            CropPoint::new(self.width as f32, 0.0),
            CropPoint::new(0.0, self.height as f32),
            CropPoint::new(self.width as f32, self.height as f32),
        ]
    }

    /// The artifact to render: the cropped one when present, otherwise the
    /// original.
    pub fn best_artifact(&self) -> &Artifact {
        self.cropped.as_ref().unwrap_or(&self.original)
    }

    /// Replacement page after one successful physical quarter-turn.
    ///
    /// Width and height swap because the files on disk were rewritten
    /// rotated; `rotation` advances as display metadata only.
    pub fn rotated(&self) -> Self {
        Self {
            rotation: self.rotation.advanced(),
            width: self.height,
            height: self.width,
            ..self.clone()
        }
    }

    /// Replacement page carrying a freshly produced cropped artifact.
    pub fn with_crop(&self, cropped: Artifact, crop_points: Quad) -> Self {
        Self {
            cropped: Some(cropped),
            crop_points: Some(crop_points),
            ..self.clone()
        }
    }

    /// Replacement page with no cropped artifact.
    ///
    /// Committed after the superseded crop file is released, so the entity
    /// model never references a deleted file.
    pub fn without_crop(&self) -> Self {
        Self {
            cropped: None,
            crop_points: None,
            ..self.clone()
        }
    }
}

/// Document-level settings owned by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSettings {
    /// Trimmed, non-empty once set.
    pub title: String,
    pub quality: Quality,
    pub file_type: FileType,
    /// Chosen from the externally supplied destination candidates.
    pub save_destination: Option<String>,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            title: String::new(),
            quality: Quality::High,
            file_type: FileType::Jpg,
            save_destination: None,
        }
    }
}
