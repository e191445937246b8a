//! Per-channel histogram stretch countering faded, color-cast film.

use image::RgbImage;

use super::AgingParams;

/// `[low, high]` levels of one channel after clipping `clip` of the pixels at each end.
fn channel_levels(hist: &[u32; 256], total: u64, clip: f64) -> (u8, u8) {
    let limit = (clip * total as f64).floor() as u64;

    let mut acc = 0u64;
    let mut low = 0u8;
    for (i, &c) in hist.iter().enumerate() {
        acc += c as u64;
        if acc > limit {
            low = i as u8;
            break;
        }
    }

    acc = 0;
    let mut high = 255u8;
    for (i, &c) in hist.iter().enumerate().rev() {
        acc += c as u64;
        if acc > limit {
            high = i as u8;
            break;
        }
    }
    (low, high)
}

/// Stretch each channel's clipped range to 0..=255. `None` when no channel
/// has enough spread to be stretched.
pub(crate) fn correct_aging(img: &RgbImage, params: &AgingParams) -> Option<RgbImage> {
    let total = img.width() as u64 * img.height() as u64;
    if total == 0 {
        return None;
    }

    let mut hist = [[0u32; 256]; 3];
    for p in img.pixels() {
        for c in 0..3 {
            hist[c][p[c] as usize] += 1;
        }
    }

    let clip = (params.clip_percentile as f64 / 100.0).clamp(0.0, 0.49);
    let mut luts: [Option<[u8; 256]>; 3] = [None; 3];
    for c in 0..3 {
        let (low, high) = channel_levels(&hist[c], total, clip);
        let span = high.saturating_sub(low);
        if span < params.min_span {
            tracing::debug!("aging: channel {} span {} too small, kept", c, span);
            continue;
        }
        let mut lut = [0u8; 256];
        for (v, out) in lut.iter_mut().enumerate() {
            let t = (v as f32 - low as f32) / span as f32;
            *out = (t * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        tracing::debug!("aging: channel {} levels [{}, {}]", c, low, high);
        luts[c] = Some(lut);
    }
    if luts.iter().all(Option::is_none) {
        return None;
    }

    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in 0..3 {
            if let Some(lut) = &luts[c] {
                p[c] = lut[p[c] as usize];
            }
        }
    }
    Some(out)
}
