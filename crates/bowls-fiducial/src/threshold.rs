//! Global thresholding for marker segmentation and bit decoding.

/// 256-bin intensity histogram.
pub(crate) fn histogram(samples: &[u8]) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &v in samples {
        hist[v as usize] += 1;
    }
    hist
}

/// Otsu threshold of a set of intensities; pixels `< t` are dark.
pub(crate) fn otsu_threshold_from_samples(samples: &[u8]) -> u8 {
    if samples.is_empty() {
        return 127;
    }
    otsu_threshold(&histogram(samples))
}

/// Otsu threshold from a histogram.
///
/// Flat histograms return their single level; two-level histograms split
/// halfway so both levels classify the way a human would expect.
pub(crate) fn otsu_threshold(hist: &[u32; 256]) -> u8 {
    let occupied: Vec<usize> = (0..256).filter(|&i| hist[i] > 0).collect();
    let (Some(&min_v), Some(&max_v)) = (occupied.first(), occupied.last()) else {
        return 127;
    };
    if min_v == max_v {
        return min_v as u8;
    }
    if occupied.len() <= 2 {
        return ((min_v + max_v + 1) / 2) as u8;
    }

    let total: f64 = hist.iter().map(|&h| h as f64).sum();
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &h)| i as f64 * h as f64)
        .sum();

    let mut sum_b = 0f64;
    let mut w_b = 0f64;
    let mut best_var = -1f64;
    let mut best_t = 127u8;

    for (t, &h) in hist.iter().enumerate() {
        w_b += h as f64;
        if w_b < 1.0 {
            continue;
        }
        let w_f = total - w_b;
        if w_f < 1.0 {
            break;
        }

        sum_b += t as f64 * h as f64;
        let m_b = sum_b / w_b;
        let m_f = (sum_total - sum_b) / w_f;

        let var_between = w_b * w_f * (m_b - m_f) * (m_b - m_f);
        if var_between > best_var {
            best_var = var_between;
            // dark class is [0, t], so the cut sits one above
            best_t = (t + 1).min(255) as u8;
        }
    }

    best_t
}
