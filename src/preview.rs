//! Debug renderings of each detection stage, written as PNG files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use log::info;

use crate::detection::Detection;
use crate::geometry::{Point, RotatedRect};

const PALETTE: [Rgb<u8>; 8] = [
    Rgb([230, 25, 75]),
    Rgb([60, 180, 75]),
    Rgb([255, 225, 25]),
    Rgb([0, 130, 200]),
    Rgb([245, 130, 48]),
    Rgb([145, 30, 180]),
    Rgb([70, 240, 240]),
    Rgb([240, 50, 230]),
];

fn colour(index: usize) -> Rgb<u8> {
    PALETTE[index % PALETTE.len()]
}

fn plot(canvas: &mut RgbImage, points: &[Point], colour: Rgb<u8>) {
    for p in points {
        if p.x >= 0.0 && p.y >= 0.0 && (p.x as u32) < canvas.width() && (p.y as u32) < canvas.height()
        {
            canvas.put_pixel(p.x as u32, p.y as u32, colour);
        }
    }
}

/// Draw each contour in its own colour on a black canvas.
pub fn render_contours(width: u32, height: u32, contours: &[Vec<Point>]) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);
    for (i, contour) in contours.iter().enumerate() {
        plot(&mut canvas, contour, colour(i));
    }
    canvas
}

/// Draw each point set in its own colour, with its bounding box in white.
pub fn render_clusters(
    width: u32,
    height: u32,
    sets: &[Vec<Point>],
    rects: &[Option<RotatedRect>],
) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);
    for (i, set) in sets.iter().enumerate() {
        plot(&mut canvas, set, colour(i));
    }

    for rect in rects.iter().flatten() {
        let corners = rect.box_points();
        for i in 0..4 {
            let (a, b) = (corners[i], corners[(i + 1) % 4]);
            draw_line_segment_mut(
                &mut canvas,
                (a.x as f32, a.y as f32),
                (b.x as f32, b.y as f32),
                Rgb([255, 255, 255]),
            );
        }
    }
    canvas
}

/// Write `edges.png`, `contours.png`, `cleaned_contours.png` and
/// `clusters.png` into `dir`.
pub fn write_previews(dir: &Path, detection: &Detection) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create preview directory: {:?}", dir))?;

    let (width, height) = detection.edges.dimensions();

    let edges_path = dir.join("edges.png");
    detection
        .edges
        .save(&edges_path)
        .with_context(|| format!("Failed to save preview: {:?}", edges_path))?;

    let renders = [
        (
            "contours.png",
            render_contours(width, height, &detection.contours),
        ),
        (
            "cleaned_contours.png",
            render_contours(width, height, &detection.document_contours),
        ),
        (
            "clusters.png",
            render_clusters(
                width,
                height,
                &detection.partition.sets,
                &detection.rects,
            ),
        ),
    ];

    for (name, render) in renders {
        let path = dir.join(name);
        render
            .save(&path)
            .with_context(|| format!("Failed to save preview: {:?}", path))?;
    }

    info!("Wrote previews to {:?}", dir);
    Ok(())
}
