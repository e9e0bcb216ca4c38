// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner gateway — quadrilateral detection and perspective rectification.
//
// The controller talks to the scanner through the `PageScanner` trait:
// given a source image and (optionally) an explicit quadrilateral, produce a
// rectified cropped artifact plus the geometry that was used. The default
// implementation detects the document outline with edge detection and the
// Hough line transform, falling back to the full frame when no plausible
// quadrilateral is found.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{Artifact, CropPoint, Quad};
use tracing::{debug, info, instrument, warn};

use crate::artifacts::ArtifactStore;

/// Result of a successful scan pass.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// The freshly written cropped artifact. Ownership passes to the caller,
    /// who must release it if the page record is never committed.
    pub artifact: Artifact,
    /// The quadrilateral that was rectified (detected or caller-supplied).
    pub points: Quad,
    /// Pixel width of the source image.
    pub width: u32,
    /// Pixel height of the source image.
    pub height: u32,
}

/// External contract for quadrilateral detection and rectification.
///
/// `points = None` requests automatic detection; `Some` rectifies exactly
/// those points. Implementations perform blocking compute and file I/O.
pub trait PageScanner: Send + Sync {
    fn detect(&self, source: &Artifact, points: Option<Quad>) -> Result<ScanOutcome>;
}

/// Default scanner: Hough-based outline detection plus projective warp.
pub struct RectifyScanner {
    /// Store used to allocate output artifacts.
    artifacts: ArtifactStore,
}

impl RectifyScanner {
    pub fn new(artifacts: ArtifactStore) -> Self {
        Self { artifacts }
    }
}

impl PageScanner for RectifyScanner {
    #[instrument(skip(self, points), fields(source = %source, explicit = points.is_some()))]
    fn detect(&self, source: &Artifact, points: Option<Quad>) -> Result<ScanOutcome> {
        let image = image::open(source.path())
            .map_err(|err| ScanwerkError::Detection(format!("open {source}: {err}")))?;
        let (width, height) = (image.width(), image.height());

        let quad = match points {
            Some(explicit) => explicit,
            None => detect_quad(&image).unwrap_or_else(|| {
                debug!("no plausible quadrilateral; using full frame");
                full_frame(width, height)
            }),
        };

        let rectified = rectify(&image, &quad)?;

        let artifact = self.artifacts.allocate("jpg");
        rectified
            .save(artifact.path())
            .map_err(|err| ScanwerkError::Detection(format!("save {artifact}: {err}")))?;

        info!(
            out_w = rectified.width(),
            out_h = rectified.height(),
            "page rectified"
        );

        Ok(ScanOutcome {
            artifact,
            points: quad,
            width,
            height,
        })
    }
}

/// The trivial quadrilateral covering the whole image.
fn full_frame(width: u32, height: u32) -> Quad {
    [
        CropPoint::new(0.0, 0.0),
        CropPoint::new(width as f32, 0.0),
        CropPoint::new(0.0, height as f32),
        CropPoint::new(width as f32, height as f32),
    ]
}

/// Warp the quadrilateral region of `image` to an upright rectangle.
///
/// The target dimensions are taken from the longer of each opposing edge
/// pair, so the rectified page keeps the document's own aspect ratio.
fn rectify(image: &DynamicImage, quad: &Quad) -> Result<RgbImage> {
    let [tl, tr, bl, br] = *quad;

    let out_w = edge_length(tl, tr).max(edge_length(bl, br)).round().max(1.0) as u32;
    let out_h = edge_length(tl, bl).max(edge_length(tr, br)).round().max(1.0) as u32;

    let src: [(f32, f32); 4] = [(tl.x, tl.y), (tr.x, tr.y), (br.x, br.y), (bl.x, bl.y)];
    let dest: [(f32, f32); 4] = [
        (0.0, 0.0),
        (out_w as f32, 0.0),
        (out_w as f32, out_h as f32),
        (0.0, out_h as f32),
    ];

    // from_control_points computes the mapping from `src` to `dest`.
    let projection = Projection::from_control_points(src, dest)
        .ok_or_else(|| ScanwerkError::Detection("degenerate quadrilateral".into()))?;

    let rgb_input = image.to_rgb8();
    let default_pixel = Rgb([255u8, 255, 255]);
    let mut output = RgbImage::new(out_w, out_h);

    warp_into(
        &rgb_input,
        &projection,
        Interpolation::Bilinear,
        default_pixel,
        &mut output,
    );

    Ok(output)
}

fn edge_length(a: CropPoint, b: CropPoint) -> f32 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

// -- Automatic outline detection ----------------------------------------------

/// Detect the document quadrilateral in an image.
///
/// Pipeline: grayscale → Gaussian blur (sigma 2.0) → Canny edges → Hough
/// line detection → classify lines as horizontal/vertical → pick the four
/// dominant edges → intersect them into corners. Returns `None` when the
/// image yields no clean quadrilateral (caller falls back to the full
/// frame).
fn detect_quad(image: &DynamicImage) -> Option<Quad> {
    let (width, height) = (image.width(), image.height());

    let gray = image.to_luma8();
    let blurred = gaussian_blur_f32(&gray, 2.0);
    let edges = canny(&blurred, 50.0, 150.0);

    // Vote threshold proportional to the image diagonal so detection scales
    // with resolution; the suppression radius prevents near-duplicate lines.
    let diagonal = ((width as f64).powi(2) + (height as f64).powi(2)).sqrt();
    let vote_threshold = (diagonal * 0.25).max(80.0) as u32;
    let lines = detect_lines(
        &edges,
        LineDetectionOptions {
            vote_threshold,
            suppression_radius: 8,
        },
    );
    debug!(line_count = lines.len(), vote_threshold, "Hough lines detected");

    if lines.len() < 4 {
        return None;
    }

    let (horizontal, vertical) = classify_lines(&lines);
    if horizontal.len() < 2 || vertical.len() < 2 {
        warn!(
            horizontal = horizontal.len(),
            vertical = vertical.len(),
            "insufficient horizontal/vertical lines"
        );
        return None;
    }

    // For horizontals, smallest r is the top edge and largest the bottom;
    // for verticals, left and right respectively.
    let top = extreme_line(&horizontal, Extreme::Min);
    let bottom = extreme_line(&horizontal, Extreme::Max);
    let left = extreme_line(&vertical, Extreme::Min);
    let right = extreme_line(&vertical, Extreme::Max);

    let tl = intersect_polar_lines(&top, &left)?;
    let tr = intersect_polar_lines(&top, &right)?;
    let bl = intersect_polar_lines(&bottom, &left)?;
    let br = intersect_polar_lines(&bottom, &right)?;

    // The detected quad must cover a meaningful share of the image to rule
    // out spurious micro-rectangles.
    let area = shoelace_area(&[tl, tr, br, bl]);
    let img_area = width as f32 * height as f32;
    if area < img_area * 0.10 {
        warn!(area, min_area = img_area * 0.10, "detected quadrilateral too small");
        return None;
    }

    Some([
        CropPoint::new(tl.0, tl.1),
        CropPoint::new(tr.0, tr.1),
        CropPoint::new(bl.0, bl.1),
        CropPoint::new(br.0, br.1),
    ])
}

/// Classify Hough lines as roughly horizontal or roughly vertical.
///
/// `angle_in_degrees` is 0..180: values near 0 or 180 are horizontal, near
/// 90 vertical. Ambiguous diagonals are discarded.
fn classify_lines(lines: &[PolarLine]) -> (Vec<PolarLine>, Vec<PolarLine>) {
    let mut horizontal = Vec::new();
    let mut vertical = Vec::new();

    for line in lines {
        let angle = line.angle_in_degrees;
        if angle <= 30 || angle >= 150 {
            horizontal.push(*line);
        } else if (60..=120).contains(&angle) {
            vertical.push(*line);
        }
    }

    (horizontal, vertical)
}

#[derive(Clone, Copy)]
enum Extreme {
    Min,
    Max,
}

/// Select the line with the smallest or largest signed distance `r`.
fn extreme_line(lines: &[PolarLine], extreme: Extreme) -> PolarLine {
    let cmp = |a: &&PolarLine, b: &&PolarLine| {
        a.r.partial_cmp(&b.r).unwrap_or(std::cmp::Ordering::Equal)
    };
    match extreme {
        Extreme::Min => *lines.iter().min_by(cmp).expect("non-empty line set"),
        Extreme::Max => *lines.iter().max_by(cmp).expect("non-empty line set"),
    }
}

/// Intersect two lines given in polar (Hough) form.
///
/// A `PolarLine` `(r, theta)` represents `x*cos(theta) + y*sin(theta) = r`.
/// Returns `None` for (nearly) parallel lines.
fn intersect_polar_lines(a: &PolarLine, b: &PolarLine) -> Option<(f32, f32)> {
    let theta_a = (a.angle_in_degrees as f64).to_radians();
    let theta_b = (b.angle_in_degrees as f64).to_radians();

    let (cos_a, sin_a) = (theta_a.cos(), theta_a.sin());
    let (cos_b, sin_b) = (theta_b.cos(), theta_b.sin());

    let denom = cos_a * sin_b - sin_a * cos_b;
    if denom.abs() < 1e-6 {
        return None;
    }

    let (r_a, r_b) = (a.r as f64, b.r as f64);
    let x = (r_a * sin_b - r_b * sin_a) / denom;
    let y = (r_b * cos_a - r_a * cos_b) / denom;

    Some((x as f32, y as f32))
}

/// Quadrilateral area via the shoelace formula. Vertices in CW or CCW order.
fn shoelace_area(corners: &[(f32, f32); 4]) -> f32 {
    let mut area = 0.0f32;
    for i in 0..4 {
        let j = (i + 1) % 4;
        area += corners[i].0 * corners[j].1;
        area -= corners[j].0 * corners[i].1;
    }
    area.abs() / 2.0
}
