//! Planar geometry primitives shared by mount detection, splitting and
//! alignment.
//!
//! All coordinates are continuous pixel coordinates: pixel `(i, j)` covers
//! `[i, i+1) × [j, j+1)` and its center sits at `(i + 0.5, j + 0.5)`.
//! Quadrilaterals are stored as `[top-left, top-right, bottom-right, bottom-left]`.

use crate::error::QuadDefect;

/// A 2D point `[x, y]` in pixel coordinates (y grows downwards).
pub type Point = [f64; 2];

#[inline]
pub(crate) fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1]]
}

#[inline]
pub(crate) fn dot(a: Point, b: Point) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

#[inline]
pub(crate) fn norm(a: Point) -> f64 {
    dot(a, a).sqrt()
}

#[inline]
pub(crate) fn distance(a: Point, b: Point) -> f64 {
    norm(sub(a, b))
}

/// Z component of `(a - o) × (b - o)`.
#[inline]
pub(crate) fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Arithmetic mean of the quad corners.
pub(crate) fn quad_centroid(q: &[Point; 4]) -> Point {
    let x = q.iter().map(|p| p[0]).sum::<f64>() / 4.0;
    let y = q.iter().map(|p| p[1]).sum::<f64>() / 4.0;
    [x, y]
}

/// Unsigned polygon area (shoelace).
pub(crate) fn polygon_area(poly: &[Point]) -> f64 {
    if poly.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..poly.len() {
        let a = poly[i];
        let b = poly[(i + 1) % poly.len()];
        acc += a[0] * b[1] - b[0] * a[1];
    }
    0.5 * acc.abs()
}

/// Interior angles of a quad in degrees, one per corner.
pub(crate) fn quad_corner_angles_deg(q: &[Point; 4]) -> [f64; 4] {
    let mut out = [0.0; 4];
    for (i, angle) in out.iter_mut().enumerate() {
        let prev = q[(i + 3) % 4];
        let cur = q[i];
        let next = q[(i + 1) % 4];
        let a = sub(prev, cur);
        let b = sub(next, cur);
        let denom = norm(a) * norm(b);
        *angle = if denom > 1e-12 {
            (dot(a, b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
        } else {
            0.0
        };
    }
    out
}

/// Validate that four ordered corners form a usable convex quadrilateral.
///
/// `min_corner_sine` bounds how close any corner may come to a straight or
/// folded angle (collinear neighbours).
pub(crate) fn check_quad(
    q: &[Point; 4],
    min_area: f64,
    min_corner_sine: f64,
) -> Result<(), QuadDefect> {
    if q.iter().any(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return Err(QuadDefect::NonFinite);
    }

    let mut sign = 0.0f64;
    for i in 0..4 {
        let prev = q[(i + 3) % 4];
        let cur = q[i];
        let next = q[(i + 1) % 4];
        let a = sub(prev, cur);
        let b = sub(next, cur);
        let denom = norm(a) * norm(b);
        if denom < 1e-12 {
            return Err(QuadDefect::CollinearCorners);
        }
        let c = cross(prev, cur, next);
        if (c.abs() / denom) < min_corner_sine {
            return Err(QuadDefect::CollinearCorners);
        }
        if sign == 0.0 {
            sign = c.signum();
        } else if c.signum() != sign {
            return Err(QuadDefect::NonConvex);
        }
    }

    if polygon_area(q) < min_area {
        return Err(QuadDefect::TooSmall);
    }
    Ok(())
}

/// Convex hull via Andrew's monotone chain. Collinear points are dropped.
pub(crate) fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points
        .iter()
        .copied()
        .filter(|p| p[0].is_finite() && p[1].is_finite())
        .collect();
    pts.sort_by(|a, b| {
        a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1]))
    });
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let mut lower: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }
    let mut upper: Vec<Point> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Oriented bounding rectangle.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OrientedRect {
    /// Corners in traversal order; edge 0→1 runs along `axis`.
    pub corners: [Point; 4],
    /// Length along `axis`.
    pub extent_u: f64,
    /// Length perpendicular to `axis`.
    pub extent_v: f64,
}

impl OrientedRect {
    pub(crate) fn area(&self) -> f64 {
        self.extent_u * self.extent_v
    }

    /// Smallest rotation (radians) taking the rectangle onto the image axes,
    /// in (-π/4, π/4]. Landscape, portrait and square rectangles alike read
    /// near zero when they sit almost upright.
    pub(crate) fn skew_angle(&self) -> f64 {
        let e = sub(self.corners[1], self.corners[0]);
        fold_quarter_turn(e[1].atan2(e[0]))
    }
}

/// Fold an angle into (-π/4, π/4].
pub(crate) fn fold_quarter_turn(mut a: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
    while a > FRAC_PI_4 {
        a -= FRAC_PI_2;
    }
    while a <= -FRAC_PI_4 {
        a += FRAC_PI_2;
    }
    a
}

/// Minimum-area enclosing rectangle of a convex hull (rotating calipers).
///
/// The optimal rectangle has one side collinear with a hull edge, so it is
/// enough to test each edge direction.
pub(crate) fn min_area_rect(hull: &[Point]) -> Option<OrientedRect> {
    if hull.len() < 3 {
        return None;
    }
    let mut best: Option<(f64, [f64; 6])> = None;
    for i in 0..hull.len() {
        let e = sub(hull[(i + 1) % hull.len()], hull[i]);
        let len = norm(e);
        if len < 1e-9 {
            continue;
        }
        let u = [e[0] / len, e[1] / len];
        let v = [-u[1], u[0]];
        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for &p in hull {
            let pu = dot(p, u);
            let pv = dot(p, v);
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }
        let area = (max_u - min_u) * (max_v - min_v);
        if best.map_or(true, |(a, _)| area < a) {
            best = Some((area, [u[0], u[1], min_u, max_u, min_v, max_v]));
        }
    }

    let (_, [ux, uy, min_u, max_u, min_v, max_v]) = best?;
    let u = [ux, uy];
    let v = [-uy, ux];
    let at = |a: f64, b: f64| -> Point { [u[0] * a + v[0] * b, u[1] * a + v[1] * b] };
    Some(OrientedRect {
        corners: [
            at(min_u, min_v),
            at(max_u, min_v),
            at(max_u, max_v),
            at(min_u, max_v),
        ],
        extent_u: max_u - min_u,
        extent_v: max_v - min_v,
    })
}

/// Order four corners as top-left, top-right, bottom-right, bottom-left in a
/// frame whose x-axis is rotated by `angle` radians.
pub(crate) fn order_corners(corners: &[Point; 4], angle: f64) -> [Point; 4] {
    let c = quad_centroid(corners);
    let u = [angle.cos(), angle.sin()];
    let v = [-u[1], u[0]];
    let local: Vec<(f64, f64)> = corners
        .iter()
        .map(|&p| {
            let d = sub(p, c);
            (dot(d, u), dot(d, v))
        })
        .collect();

    let pick = |key: &dyn Fn(f64, f64) -> f64| -> Point {
        let mut best = 0;
        for i in 1..4 {
            if key(local[i].0, local[i].1) > key(local[best].0, local[best].1) {
                best = i;
            }
        }
        corners[best]
    };
    [
        pick(&|x, y| -(x + y)),
        pick(&|x, y| x - y),
        pick(&|x, y| x + y),
        pick(&|x, y| y - x),
    ]
}

/// Axis-aligned rectangle `[x0, y0, x1, y1]` as a quad.
pub(crate) fn rect_corners(r: [f64; 4]) -> [Point; 4] {
    [[r[0], r[1]], [r[2], r[1]], [r[2], r[3]], [r[0], r[3]]]
}
