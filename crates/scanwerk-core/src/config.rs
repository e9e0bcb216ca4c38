// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{FileType, Quality};

const CONFIG_FILE: &str = "config.json";

/// Settings for a scan session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory for intermediate page artifacts (originals and crops).
    pub work_dir: PathBuf,
    /// Directory for rendered output documents.
    pub output_dir: PathBuf,
    /// Quality preselected for new documents.
    pub default_quality: Quality,
    /// File type preselected for new documents.
    pub default_file_type: FileType,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("scanwerk"),
            output_dir: std::env::temp_dir().join("scanwerk").join("out"),
            default_quality: Quality::High,
            default_file_type: FileType::Jpg,
        }
    }
}

impl SessionConfig {
    /// Load a persisted config from `dir`, or `None` if absent or unreadable.
    pub fn load(dir: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(dir.join(CONFIG_FILE)).ok()?;
        serde_json::from_str(&data).ok()
    }

    /// Persist this config as pretty-printed JSON in `dir`.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILE), json)?;
        Ok(())
    }
}
