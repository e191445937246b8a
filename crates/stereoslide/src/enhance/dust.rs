//! Small high-contrast speck removal.

use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};

use super::DustParams;

/// Find isolated outlier blobs against the local luma median and fill them
/// from the surrounding clean pixels. `None` when nothing qualifies as dust.
pub(crate) fn remove_dust(img: &RgbImage, params: &DustParams) -> Option<RgbImage> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let mask = dust_mask(img, params)?;

    let mut out = img.clone();
    let r_max = params.fill_radius as i64;
    let mut filled = 0usize;
    for (x, y, m) in mask.enumerate_pixels() {
        if m[0] == 0 {
            continue;
        }
        for r in 1..=r_max {
            let mut acc = [0u32; 3];
            let mut n = 0u32;
            for yy in (y as i64 - r).max(0)..=(y as i64 + r).min(h as i64 - 1) {
                for xx in (x as i64 - r).max(0)..=(x as i64 + r).min(w as i64 - 1) {
                    let (xx, yy) = (xx as u32, yy as u32);
                    if mask.get_pixel(xx, yy)[0] != 0 {
                        continue;
                    }
                    let p = img.get_pixel(xx, yy);
                    for c in 0..3 {
                        acc[c] += p[c] as u32;
                    }
                    n += 1;
                }
            }
            if n > 0 {
                let px = out.get_pixel_mut(x, y);
                for c in 0..3 {
                    px[c] = ((acc[c] + n / 2) / n) as u8;
                }
                filled += 1;
                break;
            }
        }
    }
    tracing::debug!("dust removal filled {} px", filled);
    (filled > 0).then_some(out)
}

/// Ring pixels resembling the blob above this fraction mark it as the tip of
/// larger content rather than an isolated speck.
const MAX_RING_CONTINUATION: f64 = 0.25;

/// Smallest median radius whose window is more than half clean around any
/// blob of `max_blob_area` pixels.
fn median_radius_for(max_blob_area: usize) -> u32 {
    let side = (2.0 * max_blob_area as f64).sqrt();
    ((side - 1.0) / 2.0).ceil().max(1.0) as u32
}

/// 255 on pixels belonging to dust blobs.
fn dust_mask(img: &RgbImage, params: &DustParams) -> Option<GrayImage> {
    let luma = image::imageops::grayscale(img);
    let (w, h) = luma.dimensions();
    let radius = params
        .median_radius
        .max(median_radius_for(params.max_blob_area));
    let median = imageproc::filter::median_filter(&luma, radius, radius);
    let threshold = params.contrast_threshold as i16;

    let mut outliers = GrayImage::new(w, h);
    let mut any = false;
    for ((o, l), m) in outliers.pixels_mut().zip(luma.pixels()).zip(median.pixels()) {
        if (l[0] as i16 - m[0] as i16).abs() > threshold {
            *o = Luma([255]);
            any = true;
        }
    }
    if !any {
        return None;
    }

    let labels = connected_components(&outliers, Connectivity::Eight, Luma([0u8]));
    let n_labels = labels.as_raw().iter().copied().max().unwrap_or(0) as usize + 1;
    let mut area = vec![0usize; n_labels];
    let mut luma_sum = vec![0u64; n_labels];
    for (l, v) in labels.as_raw().iter().zip(luma.as_raw()) {
        area[*l as usize] += 1;
        luma_sum[*l as usize] += *v as u64;
    }

    // Clean pixels bordering each blob, and how many of them look like the blob.
    let mut ring = vec![0usize; n_labels];
    let mut alike = vec![0usize; n_labels];
    for (x, y, l) in labels.enumerate_pixels() {
        if l[0] != 0 {
            continue;
        }
        let v = luma.get_pixel(x, y)[0] as f64;
        let mut seen = [0u32; 8];
        let mut n_seen = 0;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let (nx, ny) = (x as i64 + dx, y as i64 + dy);
                if (dx, dy) == (0, 0) || nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let nl = labels.get_pixel(nx as u32, ny as u32)[0];
                if nl == 0 || seen[..n_seen].contains(&nl) {
                    continue;
                }
                seen[n_seen] = nl;
                n_seen += 1;

                let i = nl as usize;
                ring[i] += 1;
                let blob_mean = luma_sum[i] as f64 / area[i] as f64;
                if (v - blob_mean).abs() <= threshold as f64 {
                    alike[i] += 1;
                }
            }
        }
    }

    let is_dust: Vec<bool> = (0..n_labels)
        .map(|i| {
            i != 0
                && area[i] <= params.max_blob_area
                && ring[i] > 0
                && (alike[i] as f64) <= MAX_RING_CONTINUATION * ring[i] as f64
        })
        .collect();

    let mut mask = GrayImage::new(w, h);
    let mut any_dust = false;
    for (m, l) in mask.pixels_mut().zip(labels.pixels()) {
        if is_dust[l[0] as usize] {
            *m = Luma([255]);
            any_dust = true;
        }
    }
    any_dust.then_some(mask)
}
