// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end session flow against the real scanner and renderer gateways:
// capture pages, re-crop, rotate, render, and tear the session down.

use std::sync::Arc;

use image::{Rgb, RgbImage};
use scanwerk_core::config::SessionConfig;
use scanwerk_core::types::{Artifact, CropPoint, DocumentSettings, FileType, Rotation};
use scanwerk_imaging::artifacts::ArtifactStore;
use scanwerk_imaging::render::{DocumentRenderer, FileRenderer};
use scanwerk_imaging::scanner::{PageScanner, RectifyScanner};
use scanwerk_session::DocumentController;
use tempfile::TempDir;

struct Session {
    _dir: TempDir,
    store: ArtifactStore,
    controller: DocumentController,
}

fn session() -> Session {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("scanwerk_session=debug,scanwerk_imaging=debug")
        .try_init();

    let dir = tempfile::tempdir().expect("tempdir");
    let config = SessionConfig {
        work_dir: dir.path().join("work"),
        output_dir: dir.path().join("out"),
        ..SessionConfig::default()
    };
    config.persist(dir.path()).expect("persist config");
    let config = SessionConfig::load(dir.path()).expect("reload config");

    let store = ArtifactStore::new(&config.work_dir).expect("artifact store");
    let scanner = Arc::new(RectifyScanner::new(store.clone())) as Arc<dyn PageScanner>;
    let renderer = Arc::new(FileRenderer::new(&config.output_dir).expect("renderer"))
        as Arc<dyn DocumentRenderer>;
    let settings = DocumentSettings {
        quality: config.default_quality,
        file_type: config.default_file_type,
        ..DocumentSettings::default()
    };
    let controller = DocumentController::new(settings, scanner, store.clone(), renderer);
    Session {
        _dir: dir,
        store,
        controller,
    }
}

/// Write a plain capture the detector finds no outline in, so the scan falls
/// back to the full frame.
fn capture(store: &ArtifactStore, width: u32, height: u32) -> Artifact {
    let artifact = store.allocate("png");
    RgbImage::from_pixel(width, height, Rgb([235u8, 235, 235]))
        .save(artifact.path())
        .expect("write capture");
    artifact
}

#[tokio::test]
async fn capture_edit_render_and_teardown() {
    let s = session();

    // First capture: blank image, full-frame fallback.
    s.controller
        .add_page(capture(&s.store, 200, 280))
        .await
        .expect("add first page");

    let snapshot = s.controller.snapshot();
    assert_eq!(snapshot.page_count(), 1);
    assert_eq!(snapshot.file_type, FileType::Jpg);
    let page = snapshot.current_page().expect("current page").clone();
    assert_eq!((page.width, page.height), (200, 280));
    let cropped = page.cropped.clone().expect("cropped artifact");
    assert!(cropped.path().exists());

    // Re-crop with an explicit sub-quadrilateral.
    let quad = [
        CropPoint::new(20.0, 20.0),
        CropPoint::new(180.0, 20.0),
        CropPoint::new(20.0, 260.0),
        CropPoint::new(180.0, 260.0),
    ];
    s.controller.crop_current_page(quad).await.expect("re-crop");

    let page = s.controller.current_page().expect("current page");
    assert_eq!(page.crop_points, Some(quad));
    assert!(!cropped.path().exists(), "superseded crop released");
    let recropped = image::open(page.cropped.as_ref().expect("cropped").path())
        .expect("open re-cropped artifact");
    assert_eq!((recropped.width(), recropped.height()), (160, 240));

    // One quarter-turn: metadata advances, the files are physically turned.
    s.controller.rotate_current_page().await.expect("rotate");
    let page = s.controller.current_page().expect("current page");
    assert_eq!(page.rotation, Rotation::R90);
    assert_eq!((page.width, page.height), (280, 200));
    let turned = image::open(page.original.path()).expect("open rotated original");
    assert_eq!((turned.width(), turned.height()), (280, 200));

    // Second capture forces PDF output.
    s.controller
        .add_page(capture(&s.store, 120, 160))
        .await
        .expect("add second page");
    let snapshot = s.controller.snapshot();
    assert_eq!(snapshot.page_count(), 2);
    assert_eq!(snapshot.file_type, FileType::Pdf);

    // Render: the output is a real PDF recorded in the snapshot.
    s.controller.set_title("Field Notes").await;
    let path = s.controller.generate().await.expect("generate");
    let bytes = std::fs::read(&path).expect("read rendered document");
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(
        path.file_name().and_then(|n| n.to_str()),
        Some("Field Notes.pdf")
    );
    assert_eq!(s.controller.snapshot().result_document, Some(path));

    // Delete the page at the cursor, then discard the rest.
    s.controller.set_cursor(1).await;
    s.controller.delete_current_page().await.expect("delete");
    assert_eq!(s.controller.page_count(), 1);

    let remaining = s.controller.current_page().expect("remaining page");
    s.controller
        .discard_all_pages()
        .await
        .expect("discard all pages");
    assert_eq!(s.controller.page_count(), 0);
    assert!(!remaining.original.path().exists());
    assert!(
        remaining
            .cropped
            .map(|c| !c.path().exists())
            .unwrap_or(true)
    );
}

#[tokio::test]
async fn snapshot_subscribers_see_each_commit() {
    let s = session();
    let mut changes = s.controller.subscribe();
    let start = changes.borrow().revision;

    s.controller
        .add_page(capture(&s.store, 80, 100))
        .await
        .expect("add page");

    changes.changed().await.expect("change notification");
    let snapshot = changes.borrow_and_update().clone();
    assert_eq!(snapshot.revision, start + 1);
    assert_eq!(snapshot.page_count(), 1);
}
