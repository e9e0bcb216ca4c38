// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page store — ordered arena of pages plus the "current page" cursor.
//
// Insertion order is document page order and therefore rendering order. The
// cursor is re-clamped after every mutation, and reads at the cursor return
// an error instead of silently defaulting to index 0.

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Page, PageId};

/// Ordered collection of pages with a clamped cursor.
#[derive(Debug, Default)]
pub struct PageStore {
    pages: Vec<Page>,
    cursor: usize,
}

impl PageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// All pages in document order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Move the cursor, clamping it into the valid range.
    pub fn set_cursor(&mut self, index: usize) {
        self.cursor = index.min(self.pages.len().saturating_sub(1));
    }

    /// One-based cursor position paired with the page count, for display.
    pub fn position(&self) -> (usize, usize) {
        (self.cursor + 1, self.pages.len())
    }

    /// The page at the cursor.
    ///
    /// Fails when the store is empty; with the clamping invariant the cursor
    /// is otherwise always valid.
    pub fn current(&self) -> Result<&Page> {
        self.pages
            .get(self.cursor)
            .ok_or(ScanwerkError::CursorOutOfRange {
                index: self.cursor,
                len: self.pages.len(),
            })
    }

    /// Append a page at the end of the document.
    pub fn push(&mut self, page: Page) {
        self.pages.push(page);
        self.clamp();
    }

    /// Swap the page at the cursor for its replacement value.
    pub fn replace_current(&mut self, page: Page) -> Result<()> {
        let index = self.cursor;
        let len = self.pages.len();
        match self.pages.get_mut(index) {
            Some(slot) => {
                *slot = page;
                Ok(())
            }
            None => Err(ScanwerkError::CursorOutOfRange { index, len }),
        }
    }

    /// Remove and return the page at the cursor, re-clamping afterwards.
    pub fn remove_current(&mut self) -> Result<Page> {
        if self.cursor >= self.pages.len() {
            return Err(ScanwerkError::CursorOutOfRange {
                index: self.cursor,
                len: self.pages.len(),
            });
        }
        let page = self.pages.remove(self.cursor);
        self.clamp();
        Ok(page)
    }

    /// Drop every page whose id is in `ids`, re-clamping the cursor.
    pub fn remove_ids(&mut self, ids: &[PageId]) {
        self.pages.retain(|page| !ids.contains(&page.id));
        self.clamp();
    }

    fn clamp(&mut self) {
        self.cursor = self.cursor.min(self.pages.len().saturating_sub(1));
    }
}
