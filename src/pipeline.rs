use image::{DynamicImage, RgbaImage};
use log::{debug, warn};

use crate::cluster::KMeansCriteria;
use crate::detection::{detect_regions, Detection};
use crate::error::{Result, TrimError};
use crate::geometry::{extreme_corners, Point, RotatedRect};
use crate::transform::{
    output_dimensions, perspective_crop_to_quad, rotate_crop_to_rect, warp, CropTransform,
};

/// How a detected region is mapped onto the output image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformKind {
    /// Rotate and crop the bounding rectangle
    #[default]
    Affine,
    /// Map the page's four extreme corners, correcting keystone distortion
    Perspective,
}

/// Settings for one trimming run.
#[derive(Debug, Clone)]
pub struct TrimOptions {
    /// Detection runs on the image shrunk by this integer factor
    pub process_scale: u32,
    /// Number of documents to look for
    pub num_splits: usize,
    /// Contours no longer than this (in full-size pixels) are ignored
    pub min_contour_length: f64,
    pub canny_low: f32,
    pub canny_high: f32,
    pub transform: TransformKind,
    pub kmeans: KMeansCriteria,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            process_scale: 1,
            num_splits: 1,
            min_contour_length: 200.0,
            canny_low: 100.0,
            canny_high: 200.0,
            transform: TransformKind::Affine,
            kmeans: KMeansCriteria::default(),
        }
    }
}

/// One upright, cropped document.
#[derive(Debug)]
pub struct TrimmedRegion {
    /// Index of the point set this region came from
    pub index: usize,
    /// Bounding rectangle in processing coordinates
    pub rect: RotatedRect,
    pub transform: CropTransform,
    pub image: RgbaImage,
}

fn region_transform(
    rect: &RotatedRect,
    points: &[Point],
    scale: f64,
    kind: TransformKind,
) -> Result<CropTransform> {
    match kind {
        TransformKind::Affine => rotate_crop_to_rect(rect, scale),
        TransformKind::Perspective => {
            let (width, height) = output_dimensions(rect, scale)?;
            let scaled: Vec<Point> = points
                .iter()
                .map(|p| Point::new(p.x * scale, p.y * scale))
                .collect();
            let quad = extreme_corners(&scaled).ok_or(TrimError::SingularTransform)?;
            perspective_crop_to_quad(&quad, width, height)
        }
    }
}

/// Warp every detected region out of the full-resolution image.
pub fn trim_regions(
    img: &DynamicImage,
    detection: &Detection,
    options: &TrimOptions,
) -> Result<Vec<TrimmedRegion>> {
    let rgba = img.to_rgba8();
    let scale = detection.scale as f64;
    let mut regions = Vec::with_capacity(detection.rects.len());

    for (index, (rect, points)) in detection
        .rects
        .iter()
        .zip(&detection.partition.sets)
        .enumerate()
    {
        let Some(rect) = rect else {
            warn!("Region {} has no points, skipping", index);
            continue;
        };

        let transform = region_transform(rect, points, scale, options.transform)?;
        debug!("Region {} transform: {:?}", index, transform.matrix);

        let image = warp(&rgba, &transform)?;
        regions.push(TrimmedRegion {
            index,
            rect: *rect,
            transform,
            image,
        });
    }

    Ok(regions)
}

/// Detect and straighten every document in `img`.
pub fn trim_image(img: &DynamicImage, options: &TrimOptions) -> Result<Vec<TrimmedRegion>> {
    let detection = detect_regions(img, options)?;
    trim_regions(img, &detection, options)
}

/// Convert a warped region for saving, dropping alpha unless the source had it.
pub fn to_output_image(image: RgbaImage, keep_alpha: bool) -> DynamicImage {
    let rgba = DynamicImage::ImageRgba8(image);
    if keep_alpha {
        rgba
    } else {
        DynamicImage::ImageRgb8(rgba.to_rgb8())
    }
}
