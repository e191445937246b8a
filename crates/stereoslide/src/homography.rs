//! Rectangle-to-quad homographies.
//!
//! The split and align stages only ever map an upright `[0, w] × [0, h]`
//! rectangle onto four ordered corners, so the map is solved in closed form:
//! unit square to quad, preceded by a scale.

use nalgebra::{Matrix3, Vector2, Vector3};

use crate::geometry::Point;

/// Homography taking the unit square `(0,0) (1,0) (1,1) (0,1)` onto
/// `[q0, q1, q2, q3]`. `None` when three corners are collinear.
fn unit_square_to_quad(q: &[Point; 4]) -> Option<Matrix3<f64>> {
    let [[x0, y0], [x1, y1], [x2, y2], [x3, y3]] = *q;
    let (sx, sy) = (x0 - x1 + x2 - x3, y0 - y1 + y2 - y3);
    let (dx1, dy1) = (x1 - x2, y1 - y2);
    let (dx2, dy2) = (x3 - x2, y3 - y2);

    let den = dx1 * dy2 - dx2 * dy1;
    if !den.is_finite() || den.abs() < 1e-12 {
        return None;
    }
    // Perspective terms; both vanish for a parallelogram.
    let g = (sx * dy2 - dx2 * sy) / den;
    let h = (dx1 * sy - sx * dy1) / den;

    #[rustfmt::skip]
    let m = Matrix3::new(
        x1 - x0 + g * x1, x3 - x0 + h * x3, x0,
        y1 - y0 + g * y1, y3 - y0 + h * y3, y0,
        g,                h,                1.0,
    );
    m.iter().all(|v| v.is_finite()).then_some(m)
}

/// Homography taking the corners of `[0, size[0]] × [0, size[1]]`
/// (`[TL, TR, BR, BL]`) onto `quad`.
pub(crate) fn rect_to_quad(size: [f64; 2], quad: &[Point; 4]) -> Option<Matrix3<f64>> {
    let [w, h] = size;
    if !(w > 0.0 && h > 0.0) {
        return None;
    }
    let unit = unit_square_to_quad(quad)?;
    Some(unit * Matrix3::new_nonuniform_scaling(&Vector2::new(1.0 / w, 1.0 / h)))
}

/// Project a point, returning `None` when the result is at infinity or non-finite.
pub(crate) fn try_project(h: &Matrix3<f64>, x: f64, y: f64) -> Option<Point> {
    let v = h * Vector3::new(x, y, 1.0);
    let w = v[2];
    if !w.is_finite() || w.abs() < 1e-12 {
        return None;
    }
    let p = [v[0] / w, v[1] / w];
    (p[0].is_finite() && p[1].is_finite()).then_some(p)
}

/// Invert a homography and renormalize so that `h[(2, 2)] == 1` when possible.
pub(crate) fn invert_homography(h: &Matrix3<f64>) -> Option<Matrix3<f64>> {
    let inv = h.try_inverse()?;
    let scale = inv[(2, 2)];
    let inv = if scale.abs() < 1e-15 { inv } else { inv / scale };
    inv.iter().all(|v| v.is_finite()).then_some(inv)
}

pub(crate) fn matrix3_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rect_corners;
    use approx::assert_relative_eq;

    fn assert_maps_corners(size: [f64; 2], quad: &[Point; 4]) -> Matrix3<f64> {
        let h = rect_to_quad(size, quad).expect("homography");
        let src = rect_corners([0.0, 0.0, size[0], size[1]]);
        for (s, d) in src.iter().zip(quad.iter()) {
            let p = try_project(&h, s[0], s[1]).unwrap();
            assert_relative_eq!(p[0], d[0], epsilon = 1e-9);
            assert_relative_eq!(p[1], d[1], epsilon = 1e-9);
        }
        h
    }

    #[test]
    fn rectangle_onto_itself_is_identity() {
        let size = [640.0, 480.0];
        let h = assert_maps_corners(size, &rect_corners([0.0, 0.0, 640.0, 480.0]));
        assert_relative_eq!(h, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn parallelogram_map_is_affine() {
        let quad = [[10.0, 20.0], [410.0, 50.0], [390.0, 350.0], [-10.0, 320.0]];
        let h = assert_maps_corners([200.0, 150.0], &quad);
        assert_relative_eq!(h[(2, 0)], 0.0, epsilon = 1e-12);
        assert_relative_eq!(h[(2, 1)], 0.0, epsilon = 1e-12);
        let c = try_project(&h, 100.0, 75.0).unwrap();
        assert_relative_eq!(c[0], 200.0, epsilon = 1e-9);
        assert_relative_eq!(c[1], 185.0, epsilon = 1e-9);
    }

    #[test]
    fn keystone_quad_maps_diagonals_to_diagonals() {
        let quad = [[100.0, 100.0], [500.0, 120.0], [560.0, 420.0], [60.0, 400.0]];
        let h = assert_maps_corners([1024.0, 1024.0], &quad);
        // The rectangle center lands on the quad's diagonal intersection.
        let c = try_project(&h, 512.0, 512.0).unwrap();
        let on_diag = |a: Point, b: Point| {
            ((b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])).abs()
        };
        assert!(on_diag(quad[0], quad[2]) < 1e-6);
        assert!(on_diag(quad[1], quad[3]) < 1e-6);

        let inv = invert_homography(&h).unwrap();
        let back = try_project(&inv, quad[2][0], quad[2][1]).unwrap();
        assert_relative_eq!(back[0], 1024.0, epsilon = 1e-9);
        assert_relative_eq!(back[1], 1024.0, epsilon = 1e-9);
    }

    #[test]
    fn collinear_or_empty_input_has_no_homography() {
        let collinear = [[0.0, 0.0], [10.0, 0.0], [20.0, 0.0], [30.0, 0.0]];
        assert!(rect_to_quad([10.0, 10.0], &collinear).is_none());
        let square = rect_corners([0.0, 0.0, 10.0, 10.0]);
        assert!(rect_to_quad([0.0, 10.0], &square).is_none());
        let nan = [[f64::NAN, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        assert!(rect_to_quad([1.0, 1.0], &nan).is_none());
    }

    #[test]
    fn projection_at_infinity_is_none() {
        let h = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0);
        assert!(try_project(&h, 0.0, 3.0).is_none());
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let h = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        assert!(invert_homography(&h).is_none());
    }
}
