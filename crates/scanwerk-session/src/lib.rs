// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanwerk-session — the async session layer: a page store with a current
// cursor and the document controller that serializes every mutation and
// publishes committed snapshots.

pub mod controller;
pub mod store;

pub use controller::{DocumentController, DocumentSnapshot};
pub use store::PageStore;
