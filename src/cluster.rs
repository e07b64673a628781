use log::info;

use crate::error::{Result, TrimError};
use crate::geometry::Point;

/// Termination settings for k-means.
#[derive(Debug, Clone, Copy)]
pub struct KMeansCriteria {
    /// Maximum refinement iterations per attempt
    pub max_iter: usize,
    /// Stop once no center moves further than this
    pub epsilon: f64,
    /// Independent runs from different seeds; the most compact wins
    pub attempts: usize,
}

impl Default for KMeansCriteria {
    fn default() -> Self {
        Self {
            max_iter: 20,
            epsilon: 0.5,
            attempts: 10,
        }
    }
}

/// Points grouped into disjoint sets.
#[derive(Debug, Clone)]
pub struct Partition {
    pub sets: Vec<Vec<Point>>,
    pub centers: Vec<Point>,
    /// Sum of squared distances from each point to its set's center
    pub compactness: f64,
}

fn distance_squared(a: &Point, b: &Point) -> f64 {
    (*a - *b).norm_squared()
}

fn centroid(points: &[Point]) -> Point {
    let n = points.len().max(1) as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point::new(sx / n, sy / n)
}

fn nearest_center(point: &Point, centers: &[Point]) -> usize {
    centers
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            distance_squared(point, a).total_cmp(&distance_squared(point, b))
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Farthest-point seeding: start at `first`, then repeatedly take the point
/// furthest from every center chosen so far.
fn seed_centers(points: &[Point], k: usize, first: usize) -> Vec<Point> {
    let mut centers = vec![points[first]];
    let mut nearest: Vec<f64> = points
        .iter()
        .map(|p| distance_squared(p, &centers[0]))
        .collect();

    while centers.len() < k {
        let next = nearest
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let center = points[next];
        centers.push(center);
        for (d, p) in nearest.iter_mut().zip(points) {
            *d = d.min(distance_squared(p, &center));
        }
    }

    centers
}

/// Lloyd refinement. Returns labels, final centers and compactness.
fn refine(
    points: &[Point],
    mut centers: Vec<Point>,
    criteria: &KMeansCriteria,
) -> (Vec<usize>, Vec<Point>, f64) {
    let mut labels = vec![0; points.len()];

    for _ in 0..criteria.max_iter.max(1) {
        for (label, point) in labels.iter_mut().zip(points) {
            *label = nearest_center(point, &centers);
        }

        let mut sums = vec![(0.0, 0.0, 0usize); centers.len()];
        for (label, point) in labels.iter().zip(points) {
            let entry = &mut sums[*label];
            entry.0 += point.x;
            entry.1 += point.y;
            entry.2 += 1;
        }

        let mut shift: f64 = 0.0;
        for (center, (sx, sy, count)) in centers.iter_mut().zip(sums) {
            // Empty clusters keep their previous center
            if count == 0 {
                continue;
            }
            let moved = Point::new(sx / count as f64, sy / count as f64);
            shift = shift.max((moved - *center).norm());
            *center = moved;
        }

        if shift <= criteria.epsilon {
            break;
        }
    }

    for (label, point) in labels.iter_mut().zip(points) {
        *label = nearest_center(point, &centers);
    }
    let compactness = labels
        .iter()
        .zip(points)
        .map(|(label, point)| distance_squared(point, &centers[*label]))
        .sum();

    (labels, centers, compactness)
}

/// Split `points` into `k` sets by k-means, ignoring which contour each
/// point came from. `k == 1` returns every point as a single set.
pub fn partition_points(
    points: &[Point],
    k: usize,
    criteria: &KMeansCriteria,
) -> Result<Partition> {
    if k == 0 || k > points.len() {
        return Err(TrimError::InvalidPartition {
            requested: k,
            points: points.len(),
        });
    }

    if k == 1 {
        let center = centroid(points);
        let compactness = points.iter().map(|p| distance_squared(p, &center)).sum();
        return Ok(Partition {
            sets: vec![points.to_vec()],
            centers: vec![center],
            compactness,
        });
    }

    let attempts = criteria.attempts.max(1);
    let mut best: Option<(Vec<usize>, Vec<Point>, f64)> = None;

    for attempt in 0..attempts {
        let first = attempt * points.len() / attempts;
        let seeds = seed_centers(points, k, first);
        let candidate = refine(points, seeds, criteria);
        if best.as_ref().map_or(true, |b| candidate.2 < b.2) {
            best = Some(candidate);
        }
    }

    let (labels, centers, compactness) = best.ok_or(TrimError::InvalidPartition {
        requested: k,
        points: points.len(),
    })?;

    let mut sets = vec![Vec::new(); k];
    for (label, point) in labels.iter().zip(points) {
        sets[*label].push(*point);
    }

    info!(
        "Finished clustering, compactness {:.1}. Cluster centres at {:?}",
        compactness,
        centers.iter().map(|c| (c.x, c.y)).collect::<Vec<_>>()
    );

    Ok(Partition {
        sets,
        centers,
        compactness,
    })
}
