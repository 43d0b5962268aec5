//! Trajectory conditioning primitives shared by the segmenter and the scorers.

use ndarray::{Array1, ArrayView1};
use ordered_float::OrderedFloat;

/// Fill NaN samples: leading/trailing runs are held at the nearest known value,
/// interior gaps are linearly interpolated. An all-NaN input yields zeros.
pub fn interpolate_nans(y: &[f64]) -> Vec<f64> {
    if !y.iter().any(|v| v.is_nan()) {
        return y.to_vec();
    }
    let known: Vec<usize> = y
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_nan())
        .map(|(i, _)| i)
        .collect();
    let (first, last) = match (known.first(), known.last()) {
        (Some(&first), Some(&last)) => (first, last),
        _ => return vec![0.0; y.len()],
    };

    let mut out = y.to_vec();
    out[..first].fill(y[first]);
    out[last + 1..].fill(y[last]);
    for pair in known.windows(2) {
        let (l, r) = (pair[0], pair[1]);
        if r - l < 2 {
            continue;
        }
        let span = (r - l) as f64;
        for (i, slot) in out.iter_mut().enumerate().take(r).skip(l + 1) {
            let frac = (i - l) as f64 / span;
            *slot = y[l] + (y[r] - y[l]) * frac;
        }
    }
    out
}

/// Centered moving average with edge replication; output length equals input length.
///
/// Odd windows are symmetric. Even windows reach `window / 2` samples back and
/// one fewer forward.
pub fn moving_average(x: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || x.is_empty() {
        return x.to_vec();
    }
    let back = window / 2;
    let forward = window - 1 - back;
    let first = x[0];
    let last = x[x.len() - 1];
    let padded: Array1<f64> = std::iter::repeat(first)
        .take(back)
        .chain(x.iter().copied())
        .chain(std::iter::repeat(last).take(forward))
        .collect();
    let scale = window as f64;
    padded
        .windows(window)
        .into_iter()
        .map(|w| w.sum() / scale)
        .collect()
}

/// Discrete derivative: central differences inside, one-sided at both ends.
pub fn gradient(y: &[f64]) -> Vec<f64> {
    let n = y.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let mut out = Vec::with_capacity(n);
            out.push(y[1] - y[0]);
            for i in 1..n - 1 {
                out.push((y[i + 1] - y[i - 1]) / 2.0);
            }
            out.push(y[n - 1] - y[n - 2]);
            out
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by_key(|&v| OrderedFloat(v));
    let rank = (pct.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Population standard deviation; zero for an empty slice.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    ArrayView1::from(values).std(0.0)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    ArrayView1::from(values).mean()
}

/// Index of the first minimum.
pub fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .min_by_key(|&(_, &v)| OrderedFloat(v))
        .map(|(i, _)| i)
}

/// Index of the first maximum.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .rev()
        .max_by_key(|&(_, &v)| OrderedFloat(v))
        .map(|(i, _)| i)
}

/// Backward scan for a low-variance plateau ending at `end_idx`.
///
/// Every start within `max_window` frames is tested; a qualifying window
/// replaces the previous one and the scan keeps going, so the earliest
/// (longest) qualifying window is returned. Start index 0 is never tested.
pub fn find_flat_window(
    y: &[f64],
    end_idx: usize,
    max_window: usize,
    min_len: usize,
    max_std: f64,
) -> Option<(usize, usize)> {
    let end = end_idx.min(y.len());
    if end == 0 {
        return None;
    }
    let mut best = None;
    let mut j = end - 1;
    while j > 0 && end - j <= max_window {
        let seg = &y[j..end];
        if seg.len() >= min_len && std_dev(seg) <= max_std {
            best = Some((j, end));
        }
        j -= 1;
    }
    best
}
