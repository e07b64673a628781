use image::{Rgba, RgbaImage};
use log::debug;
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::error::{Result, TrimError};
use crate::geometry::{order_corners, transform_point, Corners, Point, RotatedRect};

/// A forward mapping from source pixel coordinates onto an upright output
/// image of `width` x `height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropTransform {
    pub matrix: Matrix3<f64>,
    pub width: u32,
    pub height: u32,
}

/// Output size for a region: the rectangle's sides scaled and truncated,
/// swapped when the rectangle is closer to upright than to its reported side.
pub fn output_dimensions(rect: &RotatedRect, scale: f64) -> Result<(u32, u32)> {
    let mut width = (rect.width * scale) as u32;
    let mut height = (rect.height * scale) as u32;
    if rect.angle > 80.0 {
        std::mem::swap(&mut width, &mut height);
    }

    if width == 0 || height == 0 {
        return Err(TrimError::DegenerateRegion { width, height });
    }
    Ok((width, height))
}

/// Compute the affine transform that extracts `rect` from the image it was
/// detected in, rotated upright and cropped.
///
/// `rect` is in detection coordinates; `scale` maps it back onto the image the
/// transform will be applied to. The top-left, top-right and bottom-left
/// corners land exactly on `(0, 0)`, `(width - 1, 0)` and `(0, height - 1)`.
pub fn rotate_crop_to_rect(rect: &RotatedRect, scale: f64) -> Result<CropTransform> {
    let corners = order_corners(rect.box_points());
    let src = [corners.top_left, corners.top_right, corners.bottom_left]
        .map(|p| Point::new(p.x * scale, p.y * scale));

    let (width, height) = output_dimensions(rect, scale)?;
    let (right, bottom) = ((width - 1) as f64, (height - 1) as f64);
    let dst = [
        Point::new(0.0, 0.0),
        Point::new(right, 0.0),
        Point::new(0.0, bottom),
    ];

    let matrix = affine_from_points(&src, &dst).ok_or(TrimError::SingularTransform)?;
    Ok(CropTransform {
        matrix,
        width,
        height,
    })
}

/// Compute the homography mapping `quad` onto a `width` x `height` output,
/// corner for corner.
pub fn perspective_crop_to_quad(quad: &Corners, width: u32, height: u32) -> Result<CropTransform> {
    if width == 0 || height == 0 {
        return Err(TrimError::DegenerateRegion { width, height });
    }

    let (right, bottom) = ((width - 1) as f64, (height - 1) as f64);
    let src = [
        quad.top_left,
        quad.top_right,
        quad.bottom_right,
        quad.bottom_left,
    ];
    let dst = [
        Point::new(0.0, 0.0),
        Point::new(right, 0.0),
        Point::new(right, bottom),
        Point::new(0.0, bottom),
    ];

    let matrix = perspective_from_points(&src, &dst).ok_or(TrimError::SingularTransform)?;
    Ok(CropTransform {
        matrix,
        width,
        height,
    })
}

/// Solve the affine transform taking three source points onto three
/// destination points. `None` if the source points are collinear.
pub fn affine_from_points(src: &[Point; 3], dst: &[Point; 3]) -> Option<Matrix3<f64>> {
    #[rustfmt::skip]
    let basis = Matrix3::new(
        src[0].x, src[0].y, 1.0,
        src[1].x, src[1].y, 1.0,
        src[2].x, src[2].y, 1.0,
    );
    if basis.determinant().abs() < f64::EPSILON {
        return None;
    }
    let inverse = basis.try_inverse()?;

    let row_x = inverse * Vector3::new(dst[0].x, dst[1].x, dst[2].x);
    let row_y = inverse * Vector3::new(dst[0].y, dst[1].y, dst[2].y);

    #[rustfmt::skip]
    let matrix = Matrix3::new(
        row_x[0], row_x[1], row_x[2],
        row_y[0], row_y[1], row_y[2],
        0.0, 0.0, 1.0,
    );
    Some(matrix)
}

/// Solve the perspective transform taking four source points onto four
/// destination points, with the bottom-right matrix entry fixed to 1.
pub fn perspective_from_points(src: &[Point; 4], dst: &[Point; 4]) -> Option<Matrix3<f64>> {
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
        let (r, q) = (2 * i, 2 * i + 1);
        a[(r, 0)] = s.x;
        a[(r, 1)] = s.y;
        a[(r, 2)] = 1.0;
        a[(r, 6)] = -d.x * s.x;
        a[(r, 7)] = -d.x * s.y;
        b[r] = d.x;

        a[(q, 3)] = s.x;
        a[(q, 4)] = s.y;
        a[(q, 5)] = 1.0;
        a[(q, 6)] = -d.y * s.x;
        a[(q, 7)] = -d.y * s.y;
        b[q] = d.y;
    }

    let h = a.lu().solve(&b)?;
    if h.iter().any(|v| !v.is_finite()) {
        return None;
    }

    #[rustfmt::skip]
    let matrix = Matrix3::new(
        h[0], h[1], h[2],
        h[3], h[4], h[5],
        h[6], h[7], 1.0,
    );
    Some(matrix)
}

/// Premultiply alpha: RGB values are multiplied by alpha
fn premultiply_alpha(img: &RgbaImage) -> Vec<[f64; 4]> {
    img.pixels()
        .map(|pixel| {
            let alpha = pixel[3] as f64 / 255.0;
            [
                pixel[0] as f64 * alpha,
                pixel[1] as f64 * alpha,
                pixel[2] as f64 * alpha,
                pixel[3] as f64,
            ]
        })
        .collect()
}

fn unpremultiply_alpha(premultiplied: [f64; 4]) -> Rgba<u8> {
    let alpha = premultiplied[3];
    if alpha < 1.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let alpha_norm = alpha / 255.0;
    let r = (premultiplied[0] / alpha_norm).round().clamp(0.0, 255.0) as u8;
    let g = (premultiplied[1] / alpha_norm).round().clamp(0.0, 255.0) as u8;
    let b = (premultiplied[2] / alpha_norm).round().clamp(0.0, 255.0) as u8;
    let a = alpha.round().clamp(0.0, 255.0) as u8;

    Rgba([r, g, b, a])
}

/// Cubic interpolation kernel (Catmull-Rom)
fn cubic_weight(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;

    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

fn bicubic_interpolate(
    premultiplied: &[[f64; 4]],
    width: u32,
    height: u32,
    x: f64,
    y: f64,
) -> [f64; 4] {
    let x_floor = x.floor() as i32;
    let y_floor = y.floor() as i32;

    let wx = cubic_weight(x - x.floor());
    let wy = cubic_weight(y - y.floor());

    let mut result = [0.0; 4];

    for (j, weight_y) in wy.iter().enumerate() {
        let py = (y_floor + j as i32 - 1).clamp(0, height as i32 - 1) as u32;
        for (i, weight_x) in wx.iter().enumerate() {
            let px = (x_floor + i as i32 - 1).clamp(0, width as i32 - 1) as u32;
            let sample = premultiplied[(py * width + px) as usize];

            let weight = weight_x * weight_y;
            for c in 0..4 {
                result[c] += sample[c] * weight;
            }
        }
    }

    result
}

/// Apply a crop transform by inverse mapping every output pixel into the
/// source. Pixels that fall outside the source are transparent black.
pub fn warp(img: &RgbaImage, transform: &CropTransform) -> Result<RgbaImage> {
    let (src_width, src_height) = img.dimensions();
    let inverse = transform
        .matrix
        .try_inverse()
        .ok_or(TrimError::SingularTransform)?;

    debug!(
        "Warping {}x{} -> {}x{}",
        src_width, src_height, transform.width, transform.height
    );

    let premultiplied = premultiply_alpha(img);
    let mut output = RgbaImage::new(transform.width, transform.height);

    let max_x = src_width as f64 - 0.5;
    let max_y = src_height as f64 - 0.5;

    for (out_x, out_y, pixel) in output.enumerate_pixels_mut() {
        let (src_x, src_y) = transform_point(&inverse, out_x as f64, out_y as f64);

        *pixel = if src_x >= -0.5 && src_x <= max_x && src_y >= -0.5 && src_y <= max_y {
            let interpolated =
                bicubic_interpolate(&premultiplied, src_width, src_height, src_x, src_y);
            unpremultiply_alpha(interpolated)
        } else {
            Rgba([0, 0, 0, 0])
        };
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_maps(matrix: &Matrix3<f64>, from: Point, to: (f64, f64)) {
        let (x, y) = transform_point(matrix, from.x, from.y);
        assert!(
            (x - to.0).abs() < 1e-6 && (y - to.1).abs() < 1e-6,
            "{:?} mapped to ({}, {}), expected {:?}",
            from,
            x,
            y,
            to
        );
    }

    #[test]
    fn test_premultiply_unpremultiply() {
        let pixel = Rgba([200, 100, 50, 128]);
        let img = RgbaImage::from_pixel(1, 1, pixel);
        let premul = premultiply_alpha(&img);

        let unpremul = unpremultiply_alpha(premul[0]);
        assert!((unpremul[0] as i32 - pixel[0] as i32).abs() <= 1);
        assert!((unpremul[1] as i32 - pixel[1] as i32).abs() <= 1);
        assert!((unpremul[2] as i32 - pixel[2] as i32).abs() <= 1);
        assert_eq!(unpremul[3], pixel[3]);
    }

    #[test]
    fn test_slightly_rotated_rect_maps_reference_corners() {
        let rect = RotatedRect::new(Point::new(300.0, 200.0), 100.0, 50.0, 10.0).unwrap();
        let scale = 2.0;
        let crop = rotate_crop_to_rect(&rect, scale).unwrap();

        assert_eq!((crop.width, crop.height), (200, 100));

        let corners = order_corners(rect.box_points());
        let tl = corners.top_left * scale;
        let tr = corners.top_right * scale;
        let bl = corners.bottom_left * scale;

        assert_maps(&crop.matrix, tl, (0.0, 0.0));
        assert_maps(&crop.matrix, tr, (199.0, 0.0));
        assert_maps(&crop.matrix, bl, (0.0, 99.0));
        assert!(((tr - tl).norm() - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_steep_angle_swaps_dimensions() {
        // Document tilted a few degrees the other way: reported near 90°.
        let rect = RotatedRect::new(Point::new(120.0, 90.0), 60.0, 100.0, 85.0).unwrap();
        let crop = rotate_crop_to_rect(&rect, 1.0).unwrap();

        assert_eq!((crop.width, crop.height), (100, 60));

        let corners = order_corners(rect.box_points());
        assert_maps(&crop.matrix, corners.top_left, (0.0, 0.0));
        assert_maps(&crop.matrix, corners.top_right, (99.0, 0.0));
        assert_maps(&crop.matrix, corners.bottom_left, (0.0, 59.0));
    }

    #[test]
    fn test_upright_rect_is_a_pure_translation() {
        let rect = RotatedRect::new(Point::new(60.0, 50.0), 100.0, 60.0, 0.0).unwrap();
        let crop = rotate_crop_to_rect(&rect, 1.0).unwrap();

        assert_eq!((crop.width, crop.height), (100, 60));
        assert_maps(&crop.matrix, Point::new(10.0, 20.0), (0.0, 0.0));
        assert_maps(&crop.matrix, Point::new(110.0, 20.0), (99.0, 0.0));
        assert_maps(&crop.matrix, Point::new(10.0, 80.0), (0.0, 59.0));
    }

    #[test]
    fn test_width_truncates_after_scaling() {
        let rect = RotatedRect::new(Point::new(50.0, 50.0), 10.7, 20.4, 30.0).unwrap();
        assert_eq!(output_dimensions(&rect, 3.0).unwrap(), (32, 61));
    }

    #[test]
    fn test_reference_corners_land_exactly_across_angles_and_scales() {
        let angles = [0.5, 3.0, 7.25, 10.0, 80.0, 80.0001, 83.5, 89.9, 90.0];
        let sizes = [(100.0, 60.0), (60.0, 100.0), (37.3, 81.9), (120.4, 119.6)];

        for &angle in &angles {
            for &(w, h) in &sizes {
                for scale in 1..=4 {
                    let scale = scale as f64;
                    let rect = RotatedRect::new(Point::new(400.0, 300.0), w, h, angle).unwrap();
                    assert_eq!(rect.angle, angle);

                    let scaled = ((w * scale) as u32, (h * scale) as u32);
                    let expected = if angle > 80.0 {
                        (scaled.1, scaled.0)
                    } else {
                        scaled
                    };

                    let crop = rotate_crop_to_rect(&rect, scale).unwrap();
                    assert_eq!(
                        (crop.width, crop.height),
                        expected,
                        "angle {} size {}x{} scale {}",
                        angle,
                        w,
                        h,
                        scale
                    );

                    let right = (expected.0 - 1) as f64;
                    let bottom = (expected.1 - 1) as f64;
                    let corners = order_corners(rect.box_points());
                    assert_maps(&crop.matrix, corners.top_left * scale, (0.0, 0.0));
                    assert_maps(&crop.matrix, corners.top_right * scale, (right, 0.0));
                    assert_maps(&crop.matrix, corners.bottom_left * scale, (0.0, bottom));
                }
            }
        }
    }

    #[test]
    fn test_eighty_degrees_is_the_last_unswapped_angle() {
        let at = RotatedRect::new(Point::new(100.0, 100.0), 50.0, 30.0, 80.0).unwrap();
        let past = RotatedRect::new(Point::new(100.0, 100.0), 50.0, 30.0, 80.0001).unwrap();
        assert_eq!(output_dimensions(&at, 1.0).unwrap(), (50, 30));
        assert_eq!(output_dimensions(&past, 1.0).unwrap(), (30, 50));
    }

    #[test]
    fn test_degenerate_rect_is_rejected() {
        let rect = RotatedRect::new(Point::new(5.0, 5.0), 0.0, 40.0, 45.0).unwrap();
        assert!(matches!(
            rotate_crop_to_rect(&rect, 1.0),
            Err(TrimError::DegenerateRegion { .. })
        ));
    }

    #[test]
    fn test_collinear_points_have_no_affine() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(2.0, 2.0),
        ];
        let dst = [
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
        ];
        assert!(affine_from_points(&src, &dst).is_none());
    }

    #[test]
    fn test_perspective_maps_all_four_corners() {
        let quad = Corners {
            top_left: Point::new(12.0, 8.0),
            top_right: Point::new(95.0, 2.0),
            bottom_right: Point::new(104.0, 70.0),
            bottom_left: Point::new(5.0, 66.0),
        };
        let crop = perspective_crop_to_quad(&quad, 90, 60).unwrap();

        assert_maps(&crop.matrix, quad.top_left, (0.0, 0.0));
        assert_maps(&crop.matrix, quad.top_right, (89.0, 0.0));
        assert_maps(&crop.matrix, quad.bottom_right, (89.0, 59.0));
        assert_maps(&crop.matrix, quad.bottom_left, (0.0, 59.0));
    }

    #[test]
    fn test_warp_extracts_upright_region() {
        let mut img = RgbaImage::from_pixel(40, 30, Rgba([0, 0, 255, 255]));
        for y in 10..20 {
            for x in 5..25 {
                img.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }

        let rect = RotatedRect::new(Point::new(14.5, 14.5), 20.0, 10.0, 0.0).unwrap();
        let crop = rotate_crop_to_rect(&rect, 1.0).unwrap();
        let result = warp(&img, &crop).unwrap();

        assert_eq!(result.dimensions(), (20, 10));
        assert_eq!(*result.get_pixel(10, 5), Rgba([255, 0, 0, 255]));
        assert_eq!(*result.get_pixel(2, 2), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_warp_outside_source_is_transparent() {
        let img = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        #[rustfmt::skip]
        let shift = Matrix3::new(
            1.0, 0.0, 50.0,
            0.0, 1.0, 50.0,
            0.0, 0.0, 1.0,
        );
        let crop = CropTransform {
            matrix: shift,
            width: 10,
            height: 10,
        };
        let result = warp(&img, &crop).unwrap();
        assert_eq!(*result.get_pixel(5, 5), Rgba([0, 0, 0, 0]));
    }
}
