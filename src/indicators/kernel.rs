// =============================================================================
// Nadaraya–Watson Kernel Envelope
// =============================================================================
//
// Non-parametric regression envelope.  For a target index i the midline is a
// Gaussian-weighted average of the trailing closes,
//
//   w(i, j) = exp(-(i - j)^2 / (2 * bandwidth^2))
//   mid_i   = sum(w * close_j) / sum(w)
//
// and the band half-width is the weighted mean absolute deviation around the
// midline: upper/lower = mid +/- multiplier * mae.  The trailing window is
// capped at `window` samples, which bounds the work per point.
//
// The first KERNEL_EDGE_BARS indices short-circuit to close +/- 1% instead of
// running a near-degenerate regression on a handful of points.
//
// This is the one indicator whose incremental form (`kernel_point`) matches
// the batch path exactly: the new bar enters the same sums as a sample at
// distance 0 with weight 1, so no truncation drift exists between the paths
// as long as both use the same window cap.

/// Bars at the start of a series that bypass the weighted estimator.
pub const KERNEL_EDGE_BARS: usize = 10;

/// Half-band applied during the edge region, as a fraction of the close.
const EDGE_BAND_PCT: f64 = 0.01;

/// One envelope estimate: midline and the surrounding band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelEstimate {
    pub mid: f64,
    pub upper: f64,
    pub lower: f64,
}

fn gaussian_weight(distance: f64, bandwidth: f64) -> f64 {
    (-(distance * distance) / (2.0 * bandwidth * bandwidth)).exp()
}

fn edge_estimate(close: f64) -> KernelEstimate {
    let band = close.abs() * EDGE_BAND_PCT;
    KernelEstimate {
        mid: close,
        upper: close + band,
        lower: close - band,
    }
}

/// Weighted estimate over `window`, whose LAST element is the target sample.
///
/// A zero weight sum (possible only with a degenerate bandwidth) falls back
/// to the raw close with an empty band.
fn estimate_over(window: &[f64], target_close: f64, bandwidth: f64, multiplier: f64) -> KernelEstimate {
    let last = window.len().saturating_sub(1);

    let mut sum_w = 0.0;
    let mut sum_wc = 0.0;
    for (j, &close) in window.iter().enumerate() {
        let w = gaussian_weight((last - j) as f64, bandwidth);
        sum_w += w;
        sum_wc += w * close;
    }

    if sum_w <= 0.0 {
        return KernelEstimate {
            mid: target_close,
            upper: target_close,
            lower: target_close,
        };
    }

    let mid = sum_wc / sum_w;

    let mut sum_wd = 0.0;
    for (j, &close) in window.iter().enumerate() {
        let w = gaussian_weight((last - j) as f64, bandwidth);
        sum_wd += w * (close - mid).abs();
    }
    let mae = sum_wd / sum_w;

    KernelEstimate {
        mid,
        upper: mid + multiplier * mae,
        lower: mid - multiplier * mae,
    }
}

/// Compute the envelope for every index of `closes`.
///
/// O(n * window) overall; the per-point window is
/// `min(window, available history)` ending at the point itself.
pub fn kernel_series(closes: &[f64], bandwidth: f64, multiplier: f64, window: usize) -> Vec<KernelEstimate> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            if i < KERNEL_EDGE_BARS {
                edge_estimate(close)
            } else {
                let start = (i + 1).saturating_sub(window);
                estimate_over(&closes[start..=i], close, bandwidth, multiplier)
            }
        })
        .collect()
}

/// Single-point incremental form: the envelope for one new bar given the
/// trailing `history` of closes (oldest first).
///
/// The new bar is a sample at distance 0 (weight 1) combined with the last
/// `window - 1` historical closes — term for term the same sums the batch
/// path computes for that index, so the two agree exactly.
pub fn kernel_point(
    history: &[f64],
    new_close: f64,
    bandwidth: f64,
    multiplier: f64,
    window: usize,
) -> KernelEstimate {
    if history.len() < KERNEL_EDGE_BARS {
        return edge_estimate(new_close);
    }

    let take = window.saturating_sub(1).min(history.len());
    let mut buf = Vec::with_capacity(take + 1);
    buf.extend_from_slice(&history[history.len() - take..]);
    buf.push(new_close);

    estimate_over(&buf, new_close, bandwidth, multiplier)
}
