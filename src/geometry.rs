use nalgebra::{Matrix3, Point2, Vector3};

pub type Point = Point2<f64>;

/// A rotated rectangle, as produced by [`min_area_rect`].
///
/// `angle` is in degrees and always lies in (0, 90]. `width` is measured along
/// the direction `(cos angle, sin angle)` and `height` along its perpendicular,
/// so an upright rectangle reports `angle == 90` with `width` equal to its
/// vertical extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl RotatedRect {
    /// Build a rectangle from an arbitrary side direction, normalizing the
    /// angle into (0, 90] and swapping the sides once per odd quarter turn.
    /// Returns `None` for a non-finite angle.
    pub fn new(center: Point, width: f64, height: f64, angle: f64) -> Option<Self> {
        if !angle.is_finite() {
            return None;
        }

        let rem = angle.rem_euclid(90.0);
        let whole = ((angle - rem) / 90.0).round();
        let (angle, quarter_turns) = if rem == 0.0 {
            (90.0, whole - 1.0)
        } else if rem >= 90.0 {
            // rem_euclid rounded a tiny negative remainder up to 90
            (90.0, whole)
        } else {
            (rem, whole)
        };

        let (width, height) = if quarter_turns.rem_euclid(2.0) == 1.0 {
            (height, width)
        } else {
            (width, height)
        };

        Some(Self {
            center,
            width,
            height,
            angle,
        })
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// The four corners, walking around the rectangle.
    pub fn box_points(&self) -> [Point; 4] {
        let rad = self.angle.to_radians();
        let b = rad.cos() * 0.5;
        let a = rad.sin() * 0.5;
        let (cx, cy) = (self.center.x, self.center.y);

        let p0 = Point::new(
            cx - a * self.height - b * self.width,
            cy + b * self.height - a * self.width,
        );
        let p1 = Point::new(
            cx + a * self.height - b * self.width,
            cy - b * self.height - a * self.width,
        );
        let p2 = Point::new(2.0 * cx - p0.x, 2.0 * cy - p0.y);
        let p3 = Point::new(2.0 * cx - p1.x, 2.0 * cy - p1.y);

        [p0, p1, p2, p3]
    }
}

/// Corners of a quadrilateral in reading order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corners {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

/// Label four corners: smallest `x + y` is top-left, largest is bottom-right,
/// and of the remaining two the higher one (smaller `y`) is top-right.
pub fn order_corners(points: [Point; 4]) -> Corners {
    let mut sorted = points;
    sorted.sort_by(|p, q| (p.x + p.y).total_cmp(&(q.x + q.y)));

    let (top_right, bottom_left) = if sorted[2].y < sorted[1].y {
        (sorted[2], sorted[1])
    } else {
        (sorted[1], sorted[2])
    };

    Corners {
        top_left: sorted[0],
        top_right,
        bottom_right: sorted[3],
        bottom_left,
    }
}

/// Extreme points of a point set along the two diagonals, giving the
/// quadrilateral a photographed page actually occupies.
pub fn extreme_corners(points: &[Point]) -> Option<Corners> {
    let sum = |p: &&Point| p.x + p.y;
    let diff = |p: &&Point| p.x - p.y;

    let top_left = points.iter().min_by(|p, q| sum(p).total_cmp(&sum(q)))?;
    let bottom_right = points.iter().max_by(|p, q| sum(p).total_cmp(&sum(q)))?;
    let top_right = points.iter().max_by(|p, q| diff(p).total_cmp(&diff(q)))?;
    let bottom_left = points.iter().min_by(|p, q| diff(p).total_cmp(&diff(q)))?;

    Some(Corners {
        top_left: *top_left,
        top_right: *top_right,
        bottom_right: *bottom_right,
        bottom_left: *bottom_left,
    })
}

fn cross(o: &Point, a: &Point, b: &Point) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull by Andrew's monotone chain. Collinear points are dropped.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut sorted = points.to_vec();
    sorted.sort_by(|p, q| p.x.total_cmp(&q.x).then(p.y.total_cmp(&q.y)));
    sorted.dedup();

    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(sorted.len());
    for p in &sorted {
        while lower.len() >= 2 && cross(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= 0.0
        {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point> = Vec::with_capacity(sorted.len());
    for p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= 0.0
        {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Smallest rotated rectangle enclosing `points`, by rotating calipers over
/// the convex hull. Returns `None` for an empty slice.
pub fn min_area_rect(points: &[Point]) -> Option<RotatedRect> {
    if points.is_empty() {
        return None;
    }

    let hull = convex_hull(points);
    if hull.len() < 3 {
        return extent_rect(points);
    }

    let n = hull.len();
    let mut best: Option<RotatedRect> = None;

    for i in 0..n {
        let origin = hull[i];
        let edge = hull[(i + 1) % n] - origin;
        let length = edge.norm();
        if length < f64::EPSILON {
            continue;
        }

        let (nx, ny) = (edge.x / length, edge.y / length);
        let (px, py) = (-ny, nx);

        let mut min_n = f64::MAX;
        let mut max_n = f64::MIN;
        let mut min_p = f64::MAX;
        let mut max_p = f64::MIN;
        for point in &hull {
            let d = *point - origin;
            let proj_n = nx * d.x + ny * d.y;
            let proj_p = px * d.x + py * d.y;
            min_n = min_n.min(proj_n);
            max_n = max_n.max(proj_n);
            min_p = min_p.min(proj_p);
            max_p = max_p.max(proj_p);
        }

        let width = max_n - min_n;
        let height = max_p - min_p;
        if best.map_or(true, |b| width * height < b.area()) {
            let cn = (min_n + max_n) / 2.0;
            let cp = (min_p + max_p) / 2.0;
            let center = Point::new(
                origin.x + cn * nx + cp * px,
                origin.y + cn * ny + cp * py,
            );
            if let Some(rect) =
                RotatedRect::new(center, width, height, ny.atan2(nx).to_degrees())
            {
                best = Some(rect);
            }
        }
    }

    best.or_else(|| extent_rect(points))
}

/// Axis-aligned rectangle of the point extent, for sets with no area.
fn extent_rect(points: &[Point]) -> Option<RotatedRect> {
    let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

    let center = Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);
    RotatedRect::new(center, max_x - min_x, max_y - min_y, 0.0)
}

/// Length of a polyline, optionally closing it back to the first point.
pub fn arc_length(points: &[Point], closed: bool) -> f64 {
    let open: f64 = points.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
    match (closed, points.first(), points.last()) {
        (true, Some(first), Some(last)) if points.len() > 1 => open + (*first - *last).norm(),
        _ => open,
    }
}

/// Transform a point using a 3x3 homogeneous matrix
pub fn transform_point(matrix: &Matrix3<f64>, x: f64, y: f64) -> (f64, f64) {
    let p = matrix * Vector3::new(x, y, 1.0);
    (p.x / p.z, p.y / p.z)
}
