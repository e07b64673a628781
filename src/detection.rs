use std::borrow::Cow;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage};
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use log::{debug, info};

use crate::cluster::{partition_points, Partition};
use crate::error::{Result, TrimError};
use crate::geometry::{arc_length, min_area_rect, Point, RotatedRect};
use crate::pipeline::TrimOptions;

/// Everything found while locating documents, in processing coordinates
/// (the input image divided by `scale`).
#[derive(Debug)]
pub struct Detection {
    pub scale: u32,
    pub edges: GrayImage,
    /// Every contour traced from the edge map
    pub contours: Vec<Vec<Point>>,
    /// Contours long enough to belong to a document
    pub document_contours: Vec<Vec<Point>>,
    pub partition: Partition,
    /// Bounding rectangle per point set; `None` when a set ended up empty
    pub rects: Vec<Option<RotatedRect>>,
}

/// Shrink by an integer factor so edge detection sees a smaller image.
pub fn downscale(img: &DynamicImage, scale: u32) -> Cow<'_, DynamicImage> {
    if scale <= 1 {
        return Cow::Borrowed(img);
    }
    let width = (img.width() / scale).max(1);
    let height = (img.height() / scale).max(1);
    Cow::Owned(img.resize_exact(width, height, FilterType::Triangle))
}

/// Apply Canny edge detection to the luma channel
pub fn detect_edges(img: &DynamicImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny(&img.to_luma8(), low_threshold, high_threshold)
}

/// Trace the borders of every edge blob.
pub fn trace_contours(edges: &GrayImage) -> Vec<Vec<Point>> {
    find_contours::<i32>(edges)
        .into_iter()
        .map(|contour| {
            contour
                .points
                .iter()
                .map(|p| Point::new(p.x as f64, p.y as f64))
                .collect()
        })
        .collect()
}

/// Keep contours whose open length exceeds `min_length`; shorter ones are
/// most likely dust or texture.
pub fn document_contours(contours: &[Vec<Point>], min_length: f64) -> Vec<Vec<Point>> {
    contours
        .iter()
        .filter(|c| arc_length(c, false) > min_length)
        .cloned()
        .collect()
}

/// Locate one bounding rectangle per requested document.
pub fn detect_regions(img: &DynamicImage, options: &TrimOptions) -> Result<Detection> {
    let scale = options.process_scale.max(1);
    let working = downscale(img, scale);
    if scale > 1 {
        debug!(
            "Processing at 1/{}: {}x{} -> {}x{}",
            scale,
            img.width(),
            img.height(),
            working.width(),
            working.height()
        );
    }

    let edges = detect_edges(&working, options.canny_low, options.canny_high);
    let contours = trace_contours(&edges);

    let min_length = options.min_contour_length / scale as f64;
    let kept = document_contours(&contours, min_length);
    debug!(
        "Traced {} contours, {} longer than {:.1}px",
        contours.len(),
        kept.len(),
        min_length
    );

    if kept.is_empty() {
        return Err(TrimError::NoDocumentFound { min_length });
    }

    let points: Vec<Point> = kept.iter().flatten().copied().collect();
    let partition = partition_points(&points, options.num_splits, &options.kmeans)?;

    let rects: Vec<Option<RotatedRect>> = partition
        .sets
        .iter()
        .map(|set| min_area_rect(set))
        .collect();

    for (i, rect) in rects.iter().enumerate() {
        if let Some(rect) = rect {
            info!(
                "Region {}: center ({:.1}, {:.1}), size {:.1}x{:.1}, angle {:.2}°",
                i, rect.center.x, rect.center.y, rect.width, rect.height, rect.angle
            );
        }
    }

    Ok(Detection {
        scale,
        edges,
        contours,
        document_contours: kept,
        partition,
        rects,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb, RgbImage};

    fn page_on_desk(width: u32, height: u32, page: (u32, u32, u32, u32)) -> DynamicImage {
        let (x0, y0, x1, y1) = page;
        let mut img = RgbImage::from_pixel(width, height, Rgb([20, 20, 20]));
        for y in y0..y1 {
            for x in x0..x1 {
                img.put_pixel(x, y, Rgb([240, 240, 230]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_short_contours_are_dropped() {
        let contours = vec![
            vec![Point::new(0.0, 0.0), Point::new(3.0, 0.0)],
            vec![Point::new(0.0, 0.0), Point::new(300.0, 0.0)],
        ];
        let kept = document_contours(&contours, 200.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0][1], Point::new(300.0, 0.0));
    }

    #[test]
    fn test_downscale_by_one_borrows() {
        let img = page_on_desk(20, 10, (2, 2, 8, 8));
        assert!(matches!(downscale(&img, 1), Cow::Borrowed(_)));
        let small = downscale(&img, 3);
        assert_eq!((small.width(), small.height()), (6, 3));
    }

    #[test]
    fn test_edges_follow_page_border() {
        let img = page_on_desk(120, 100, (30, 20, 90, 80));
        let edges = detect_edges(&img, 100.0, 200.0);
        assert!(edges.get_pixel(60, 50)[0] == 0);
        let border_hits = (20..80)
            .filter(|&y| (28..33).any(|x| edges.get_pixel(x, y)[0] > 0))
            .count();
        assert!(border_hits > 40);
    }

    #[test]
    fn test_detects_upright_page() {
        let img = page_on_desk(200, 150, (40, 30, 160, 120));
        let detection = detect_regions(&img, &TrimOptions::default()).unwrap();

        assert_eq!(detection.rects.len(), 1);
        let rect = detection.rects[0].unwrap();
        assert!((rect.center.x - 99.5).abs() < 3.0);
        assert!((rect.center.y - 74.5).abs() < 3.0);

        let (long, short) = (rect.width.max(rect.height), rect.width.min(rect.height));
        assert!((long - 120.0).abs() < 5.0, "long side {}", long);
        assert!((short - 90.0).abs() < 5.0, "short side {}", short);
    }

    #[test]
    fn test_blank_image_has_no_document() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([128])));
        assert!(matches!(
            detect_regions(&img, &TrimOptions::default()),
            Err(TrimError::NoDocumentFound { .. })
        ));
    }
}
