//! Noise reduction: one entry point, three smoothing strategies.

use image::RgbImage;
use rayon::prelude::*;

use super::{NoiseMethod, NoiseStrength};

const BILATERAL_RADIUS: i64 = 4;
const BILATERAL_SIGMA_SPACE: f32 = 3.0;
const NLM_PATCH_RADIUS: i64 = 1;
const NLM_SEARCH_RADIUS: i64 = 5;

fn bilateral_sigma_color(strength: NoiseStrength) -> f32 {
    match strength {
        NoiseStrength::Low => 50.0,
        NoiseStrength::Medium => 75.0,
        NoiseStrength::High => 100.0,
    }
}

fn nlm_h(strength: NoiseStrength) -> f32 {
    match strength {
        NoiseStrength::Low => 5.0,
        NoiseStrength::Medium => 10.0,
        NoiseStrength::High => 15.0,
    }
}

fn gaussian_sigma(strength: NoiseStrength) -> f32 {
    match strength {
        NoiseStrength::Low => 0.8,
        NoiseStrength::Medium => 1.1,
        NoiseStrength::High => 1.4,
    }
}

/// Smooth `image` with `method` at `strength`. `None` for an empty image.
pub fn denoise(image: &RgbImage, method: NoiseMethod, strength: NoiseStrength) -> Option<RgbImage> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let out = match method {
        NoiseMethod::Gaussian => {
            imageproc::filter::gaussian_blur_f32(image, gaussian_sigma(strength))
        }
        NoiseMethod::Bilateral => bilateral(image, bilateral_sigma_color(strength)),
        NoiseMethod::Nlm => non_local_means(image, nlm_h(strength)),
    };
    tracing::debug!("denoise {:?}/{:?} on {}x{}", method, strength, w, h);
    Some(out)
}

#[inline]
fn clamp_index(v: i64, len: u32) -> u32 {
    v.clamp(0, len as i64 - 1) as u32
}

#[inline]
fn rgb_at(raw: &[u8], w: u32, x: u32, y: u32) -> [f32; 3] {
    let i = (y as usize * w as usize + x as usize) * 3;
    [raw[i] as f32, raw[i + 1] as f32, raw[i + 2] as f32]
}

/// Edge-preserving average: spatial Gaussian times a range Gaussian on the
/// RGB distance to the center pixel.
fn bilateral(image: &RgbImage, sigma_color: f32) -> RgbImage {
    let (w, h) = image.dimensions();
    let raw = image.as_raw();
    let r = BILATERAL_RADIUS;
    let space_den = 2.0 * BILATERAL_SIGMA_SPACE * BILATERAL_SIGMA_SPACE;
    let color_den = 2.0 * sigma_color * sigma_color;
    let spatial: Vec<f32> = (-r..=r)
        .flat_map(|dy| (-r..=r).map(move |dx| (-((dx * dx + dy * dy) as f32) / space_den).exp()))
        .collect();

    let mut out = RgbImage::new(w, h);
    out.par_chunks_mut(w as usize * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let center = rgb_at(raw, w, x as u32, y as u32);
                let mut acc = [0.0f32; 3];
                let mut wsum = 0.0f32;
                let mut k = 0usize;
                for dy in -r..=r {
                    let yy = clamp_index(y as i64 + dy, h);
                    for dx in -r..=r {
                        let xx = clamp_index(x as i64 + dx, w);
                        let p = rgb_at(raw, w, xx, yy);
                        let d2 = (p[0] - center[0]).powi(2)
                            + (p[1] - center[1]).powi(2)
                            + (p[2] - center[2]).powi(2);
                        let wt = spatial[k] * (-d2 / color_den).exp();
                        k += 1;
                        for c in 0..3 {
                            acc[c] += wt * p[c];
                        }
                        wsum += wt;
                    }
                }
                for c in 0..3 {
                    px[c] = (acc[c] / wsum).round().clamp(0.0, 255.0) as u8;
                }
            }
        });
    out
}

/// Patch-similarity weighted average over a local search window.
fn non_local_means(image: &RgbImage, h_param: f32) -> RgbImage {
    let (w, h) = image.dimensions();
    let raw = image.as_raw();
    let h2 = h_param * h_param;
    let patch_len = ((2 * NLM_PATCH_RADIUS + 1) * (2 * NLM_PATCH_RADIUS + 1) * 3) as f32;

    let patch_dist = |ax: i64, ay: i64, bx: i64, by: i64| -> f32 {
        let mut d = 0.0f32;
        for py in -NLM_PATCH_RADIUS..=NLM_PATCH_RADIUS {
            for px in -NLM_PATCH_RADIUS..=NLM_PATCH_RADIUS {
                let a = rgb_at(raw, w, clamp_index(ax + px, w), clamp_index(ay + py, h));
                let b = rgb_at(raw, w, clamp_index(bx + px, w), clamp_index(by + py, h));
                for c in 0..3 {
                    d += (a[c] - b[c]) * (a[c] - b[c]);
                }
            }
        }
        d / patch_len
    };

    let mut out = RgbImage::new(w, h);
    out.par_chunks_mut(w as usize * 3)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let x = x as i64;
                let mut acc = [0.0f32; 3];
                let mut wsum = 0.0f32;
                for sy in -NLM_SEARCH_RADIUS..=NLM_SEARCH_RADIUS {
                    let qy = y + sy;
                    if qy < 0 || qy >= h as i64 {
                        continue;
                    }
                    for sx in -NLM_SEARCH_RADIUS..=NLM_SEARCH_RADIUS {
                        let qx = x + sx;
                        if qx < 0 || qx >= w as i64 {
                            continue;
                        }
                        let wt = (-patch_dist(x, y, qx, qy) / h2).exp();
                        let p = rgb_at(raw, w, qx as u32, qy as u32);
                        for c in 0..3 {
                            acc[c] += wt * p[c];
                        }
                        wsum += wt;
                    }
                }
                for c in 0..3 {
                    px[c] = (acc[c] / wsum).round().clamp(0.0, 255.0) as u8;
                }
            }
        });
    out
}
