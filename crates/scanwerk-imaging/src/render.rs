// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Renderer gateway — turns the ordered artifact list into one output file.
//
// Single-page documents can be rendered as a plain JPEG; multi-page
// documents become a PDF with one page per artifact. Uses `printpdf` 0.8's
// data-oriented API: pages are `PdfPage` structs with `Vec<Op>` operation
// lists, serialised via `PdfDocument::save()`.

use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Artifact, Quality};
use tracing::{debug, info, instrument};

/// A4 page dimensions in millimetres.
const PAGE_W_MM: f32 = 210.0;
const PAGE_H_MM: f32 = 297.0;
const MARGIN_MM: f32 = 15.0;
const IMAGE_DPI: f32 = 150.0;

/// External contract for final document rendering.
///
/// Both calls are synchronous-equivalent: one result, no partial output.
/// `quality` maps to the lossy-compression level; `title` names the output
/// file and the PDF metadata.
pub trait DocumentRenderer: Send + Sync {
    /// Render a single artifact as a JPEG image.
    fn render_image(&self, artifact: &Artifact, quality: Quality, title: &str)
        -> Result<PathBuf>;

    /// Render the ordered artifact list as a multi-page PDF.
    fn render_paginated(
        &self,
        artifacts: &[Artifact],
        quality: Quality,
        title: &str,
    ) -> Result<PathBuf>;
}

/// Default renderer writing into a fixed output directory.
pub struct FileRenderer {
    output_dir: PathBuf,
}

impl FileRenderer {
    /// Create a renderer targeting `output_dir`, creating it if needed.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    fn output_path(&self, title: &str, ext: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{ext}", sanitize_title(title)))
    }
}

impl DocumentRenderer for FileRenderer {
    #[instrument(skip(self), fields(artifact = %artifact, ?quality))]
    fn render_image(
        &self,
        artifact: &Artifact,
        quality: Quality,
        title: &str,
    ) -> Result<PathBuf> {
        let img = image::open(artifact.path())
            .map_err(|err| ScanwerkError::Render(format!("open {artifact}: {err}")))?;

        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.jpeg_quality());
        img.to_rgb8()
            .write_with_encoder(encoder)
            .map_err(|err| ScanwerkError::Render(format!("JPEG encoding failed: {err}")))?;

        let path = self.output_path(title, "jpg");
        std::fs::write(&path, &buffer)?;

        info!(path = %path.display(), bytes = buffer.len(), "image rendered");
        Ok(path)
    }

    #[instrument(skip(self, artifacts), fields(pages = artifacts.len(), ?quality))]
    fn render_paginated(
        &self,
        artifacts: &[Artifact],
        quality: Quality,
        title: &str,
    ) -> Result<PathBuf> {
        if artifacts.is_empty() {
            return Err(ScanwerkError::Render("no artifacts to render".into()));
        }

        let doc_title = if title.is_empty() { "Scanwerk Document" } else { title };
        let mut doc = PdfDocument::new(doc_title);
        let mut pages: Vec<PdfPage> = Vec::with_capacity(artifacts.len());

        for artifact in artifacts {
            let ops = place_artifact(&mut doc, artifact, quality)?;
            pages.push(PdfPage::new(Mm(PAGE_W_MM), Mm(PAGE_H_MM), ops));
        }

        doc.with_pages(pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let bytes = doc.save(&PdfSaveOptions::default(), &mut warnings);

        let path = self.output_path(title, "pdf");
        std::fs::write(&path, &bytes)?;

        info!(path = %path.display(), bytes = bytes.len(), "PDF rendered");
        Ok(path)
    }
}

/// Register one artifact as an image XObject and compute the operations that
/// place it centred on an A4 page, scaled to fit within the margins.
fn place_artifact(
    doc: &mut PdfDocument,
    artifact: &Artifact,
    quality: Quality,
) -> Result<Vec<Op>> {
    let dynamic_image = image::open(artifact.path())
        .map_err(|err| ScanwerkError::Render(format!("open {artifact}: {err}")))?;

    let img_width = dynamic_image.width() as usize;
    let img_height = dynamic_image.height() as usize;

    // Re-encode at the selected quality before embedding, so the PDF carries
    // the compression level the user chose.
    let mut jpeg_bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg_bytes, quality.jpeg_quality());
    let rgb_image = dynamic_image.to_rgb8();
    rgb_image
        .write_with_encoder(encoder)
        .map_err(|err| ScanwerkError::Render(format!("JPEG encoding failed: {err}")))?;
    let recompressed = image::load_from_memory(&jpeg_bytes)
        .map_err(|err| ScanwerkError::Render(format!("re-decode failed: {err}")))?;

    let raw = RawImage {
        pixels: RawImageData::U8(recompressed.to_rgb8().into_raw()),
        width: img_width,
        height: img_height,
        data_format: RawImageFormat::RGB8,
        tag: Vec::new(),
    };
    let xobject_id = doc.add_image(&raw);

    // Scale to fit inside the margins while preserving aspect ratio; do not
    // upscale.
    let usable_w_pt = Mm(PAGE_W_MM - 2.0 * MARGIN_MM).into_pt().0;
    let usable_h_pt = Mm(PAGE_H_MM - 2.0 * MARGIN_MM).into_pt().0;

    let img_w_pt = img_width as f32 / IMAGE_DPI * 72.0;
    let img_h_pt = img_height as f32 / IMAGE_DPI * 72.0;

    let scale = (usable_w_pt / img_w_pt)
        .min(usable_h_pt / img_h_pt)
        .min(1.0);

    let rendered_w_pt = img_w_pt * scale;
    let rendered_h_pt = img_h_pt * scale;

    // Centre the image on the page.
    let margin_pt = Mm(MARGIN_MM).into_pt().0;
    let x_offset = margin_pt + (usable_w_pt - rendered_w_pt) / 2.0;
    let y_offset = margin_pt + (usable_h_pt - rendered_h_pt) / 2.0;

    debug!(rendered_w_pt, rendered_h_pt, scale, "image placed on page");

    Ok(vec![Op::UseXobject {
        id: xobject_id,
        transform: XObjectTransform {
            translate_x: Some(Pt(x_offset)),
            translate_y: Some(Pt(y_offset)),
            scale_x: Some(scale),
            scale_y: Some(scale),
            dpi: Some(IMAGE_DPI),
            rotate: None,
        },
    }])
}

/// Make a document title safe for use as a filename.
///
/// Path separators and control characters become dashes; a blank title falls
/// back to "scan".
fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .trim()
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '-'
            } else {
                c
            }
        })
        .collect();

    if cleaned.is_empty() {
        "scan".into()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::path::Path;

    fn write_test_artifact(dir: &Path, name: &str, width: u32, height: u32) -> Artifact {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb([90u8, 120, 150]))
            .save(&path)
            .expect("write artifact");
        Artifact::new(path)
    }

    #[test]
    fn render_image_writes_decodable_jpeg() {
        let dir = tempfile::tempdir().expect("tempdir");
        let artifact = write_test_artifact(dir.path(), "page.png", 100, 80);
        let renderer = FileRenderer::new(dir.path().join("out")).expect("renderer");

        let path = renderer
            .render_image(&artifact, Quality::Low, "Invoice")
            .expect("render");

        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("Invoice.jpg"));
        let out = image::open(&path).expect("reopen output");
        assert_eq!((out.width(), out.height()), (100, 80));
    }

    #[test]
    fn render_paginated_produces_pdf_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = write_test_artifact(dir.path(), "p1.png", 60, 90);
        let b = write_test_artifact(dir.path(), "p2.png", 90, 60);
        let renderer = FileRenderer::new(dir.path().join("out")).expect("renderer");

        let path = renderer
            .render_paginated(&[a, b], Quality::Medium, "Report")
            .expect("render");

        let bytes = std::fs::read(&path).expect("read output");
        assert!(bytes.starts_with(b"%PDF"), "output must be a PDF");
    }

    #[test]
    fn render_paginated_empty_list_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let renderer = FileRenderer::new(dir.path().join("out")).expect("renderer");
        assert!(renderer
            .render_paginated(&[], Quality::High, "Empty")
            .is_err());
    }

    #[test]
    fn missing_artifact_reports_render_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let renderer = FileRenderer::new(dir.path().join("out")).expect("renderer");
        let missing = Artifact::new(dir.path().join("gone.png"));
        let result = renderer.render_image(&missing, Quality::High, "x");
        assert!(matches!(result, Err(ScanwerkError::Render(_))));
    }

    #[test]
    fn sanitize_title_cases() {
        assert_eq!(sanitize_title("  Invoice "), "Invoice");
        assert_eq!(sanitize_title("a/b\\c"), "a-b-c");
        assert_eq!(sanitize_title("   "), "scan");
    }
}
