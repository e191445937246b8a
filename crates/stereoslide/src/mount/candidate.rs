//! Connected edge components and their quadrilateral fits.

use std::collections::HashMap;

use image::{ImageBuffer, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::geometry::{
    convex_hull, distance, min_area_rect, order_corners, quad_corner_angles_deg, Point,
};

use super::edges::EdgeMap;
use super::MountDetectConfig;

/// Pixel statistics of one labelled edge component.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Component {
    pub label: u32,
    pub pixel_count: usize,
    /// `[min_x, min_y, max_x, max_y]`, inclusive.
    pub bbox: [u32; 4],
}

impl Component {
    fn bbox_area(&self) -> f64 {
        let w = (self.bbox[2] - self.bbox[0] + 1) as f64;
        let h = (self.bbox[3] - self.bbox[1] + 1) as f64;
        w * h
    }
}

/// A component reduced to a quadrilateral, in working-resolution pixels.
#[derive(Debug, Clone)]
pub(crate) struct QuadFit {
    pub corners: [Point; 4],
    pub rect_area: f64,
    pub skew_rad: f64,
}

type LabelImage = ImageBuffer<Luma<u32>, Vec<u32>>;

/// Label the edge mask and return components that could still reach
/// `a_min`, largest first, capped at `max_candidates`.
pub(crate) fn ranked_components(
    edges: &EdgeMap,
    config: &MountDetectConfig,
) -> (LabelImage, Vec<Component>) {
    let labels = connected_components(&edges.mask, Connectivity::Eight, Luma([0u8]));
    let (w, h) = labels.dimensions();

    let max_label = labels.as_raw().iter().copied().max().unwrap_or(0) as usize;
    let mut stats: Vec<Option<Component>> = vec![None; max_label + 1];
    for (x, y, px) in labels.enumerate_pixels() {
        let label = px[0];
        if label == 0 {
            continue;
        }
        let entry = stats[label as usize].get_or_insert(Component {
            label,
            pixel_count: 0,
            bbox: [x, y, x, y],
        });
        entry.pixel_count += 1;
        entry.bbox[0] = entry.bbox[0].min(x);
        entry.bbox[1] = entry.bbox[1].min(y);
        entry.bbox[2] = entry.bbox[2].max(x);
        entry.bbox[3] = entry.bbox[3].max(y);
    }

    let image_area = (w as f64) * (h as f64);
    let min_area = config.area_ratio_range[0] * image_area;
    let mut comps: Vec<Component> = stats
        .into_iter()
        .flatten()
        .filter(|c| c.bbox_area() >= min_area)
        .collect();
    comps.sort_by(|a, b| b.pixel_count.cmp(&a.pixel_count).then(a.label.cmp(&b.label)));
    comps.truncate(config.max_candidates);
    (labels, comps)
}

/// Outer-boundary points of each requested component: the leftmost and
/// rightmost pixel edges of every row it touches.
pub(crate) fn boundary_points(labels: &LabelImage, wanted: &[Component]) -> Vec<Vec<Point>> {
    let index: HashMap<u32, usize> = wanted
        .iter()
        .enumerate()
        .map(|(i, c)| (c.label, i))
        .collect();
    let h = labels.height() as usize;
    let mut extremes: Vec<Vec<Option<(u32, u32)>>> = vec![vec![None; h]; wanted.len()];

    for (x, y, px) in labels.enumerate_pixels() {
        let Some(&i) = index.get(&px[0]) else {
            continue;
        };
        let slot = &mut extremes[i][y as usize];
        *slot = Some(match *slot {
            Some((lo, hi)) => (lo.min(x), hi.max(x)),
            None => (x, x),
        });
    }

    extremes
        .into_iter()
        .map(|rows| {
            let mut pts = Vec::new();
            for (y, row) in rows.into_iter().enumerate() {
                if let Some((lo, hi)) = row {
                    let (y0, y1) = (y as f64, y as f64 + 1.0);
                    let (x0, x1) = (lo as f64, hi as f64 + 1.0);
                    pts.extend_from_slice(&[[x0, y0], [x0, y1], [x1, y0], [x1, y1]]);
                }
            }
            pts
        })
        .collect()
}

/// Fit the minimum-area rectangle and snap its corners to the hull.
pub(crate) fn fit_quad(points: &[Point]) -> Option<QuadFit> {
    let hull = convex_hull(points);
    let rect = min_area_rect(&hull)?;
    let skew_rad = rect.skew_angle();
    let ordered = order_corners(&rect.corners, skew_rad);

    let mut corners = [[0.0; 2]; 4];
    for (dst, &target) in corners.iter_mut().zip(ordered.iter()) {
        *dst = hull
            .iter()
            .copied()
            .min_by(|a, b| distance(*a, target).total_cmp(&distance(*b, target)))?;
    }
    Some(QuadFit {
        corners,
        rect_area: rect.area(),
        skew_rad,
    })
}

/// Fraction of perimeter samples that have an edge pixel within `tolerance_px`.
pub(crate) fn edge_support(edges: &EdgeMap, quad: &[Point; 4], tolerance_px: u32) -> f32 {
    let t = tolerance_px as i64;
    let mut total = 0usize;
    let mut hit = 0usize;
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let n = (distance(a, b).ceil() as usize).max(8);
        for k in 0..n {
            let s = (k as f64 + 0.5) / n as f64;
            let x = (a[0] + (b[0] - a[0]) * s).floor() as i64;
            let y = (a[1] + (b[1] - a[1]) * s).floor() as i64;
            total += 1;
            let found = (-t..=t).any(|dy| (-t..=t).any(|dx| edges.is_edge(x + dx, y + dy)));
            if found {
                hit += 1;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        hit as f32 / total as f32
    }
}

/// 1 for a perfect rectangle, falling linearly to 0 at a mean corner
/// deviation of 45°.
pub(crate) fn rectangularity(quad: &[Point; 4]) -> f32 {
    let angles = quad_corner_angles_deg(quad);
    let mean_dev = angles.iter().map(|a| (a - 90.0).abs()).sum::<f64>() / 4.0;
    (1.0 - mean_dev / 45.0).clamp(0.0, 1.0) as f32
}

/// Scale working-resolution corners back to scan pixels.
pub(crate) fn to_scan(corners: &[Point; 4], scale: [f64; 2]) -> [Point; 4] {
    corners.map(|p| [p[0] * scale[0], p[1] * scale[1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::GrayImage;

    fn mask_with_frame(w: u32, h: u32, r: [u32; 4], thickness: u32) -> EdgeMap {
        let mut mask = GrayImage::new(w, h);
        for y in r[1]..=r[3] {
            for x in r[0]..=r[2] {
                let inside = x >= r[0] + thickness
                    && x + thickness <= r[2]
                    && y >= r[1] + thickness
                    && y + thickness <= r[3];
                if !inside {
                    mask.put_pixel(x, y, Luma([255]));
                }
            }
        }
        EdgeMap {
            mask,
            max_magnitude: 1.0,
            threshold: 0.5,
            scale: [1.0, 1.0],
        }
    }

    #[test]
    fn ring_component_fits_its_rectangle() {
        let edges = mask_with_frame(200, 120, [20, 10, 179, 109], 2);
        let config = MountDetectConfig::default();
        let (labels, comps) = ranked_components(&edges, &config);
        assert_eq!(comps.len(), 1);
        let pts = boundary_points(&labels, &comps);
        let fit = fit_quad(&pts[0]).unwrap();
        assert_relative_eq!(fit.rect_area, 160.0 * 100.0, epsilon = 1e-6);
        assert_relative_eq!(fit.skew_rad, 0.0, epsilon = 1e-9);
        assert_eq!(fit.corners[0], [20.0, 10.0]);
        assert_eq!(fit.corners[2], [180.0, 110.0]);
        assert!(edge_support(&edges, &fit.corners, 2) > 0.95);
        assert_relative_eq!(rectangularity(&fit.corners), 1.0);
    }

    #[test]
    fn small_components_are_not_ranked() {
        let edges = mask_with_frame(200, 120, [5, 5, 20, 20], 1);
        let (_, comps) = ranked_components(&edges, &MountDetectConfig::default());
        assert!(comps.is_empty());
    }

    #[test]
    fn skewed_quad_scores_lower_rectangularity() {
        let q = [[0.0, 0.0], [100.0, 0.0], [130.0, 50.0], [30.0, 50.0]];
        assert!(rectangularity(&q) < 0.6);
    }
}
