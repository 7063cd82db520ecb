// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing
// =============================================================================
//
// ATR measures volatility by decomposing the entire range of a bar:
//
//   TR_0 = high_0 - low_0                      (no previous close yet)
//   TR_t = max(H - L, |H - prevClose|, |L - prevClose|)
//
//   ATR at index period-1 = SMA of TR[0..period]
//   ATR_t = (ATR_{t-1} * (period - 1) + TR_t) / period
//
// The recurrence state is exactly (previous ATR, previous close), so the
// incremental form is exact — no windowing approximation.

use crate::indicators::{true_range, wilder_step};
use crate::market_data::Candle;

/// Compute the full ATR series for `bars`.
///
/// Same length as the input; indices before `period - 1` are `None`.
pub fn atr_series(bars: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 {
        return out;
    }

    let mut tr_sum = 0.0;
    let mut prev_atr: Option<f64> = None;
    let mut prev_close: Option<f64> = None;

    for (i, bar) in bars.iter().enumerate() {
        let tr = true_range(bar.high, bar.low, prev_close);

        if i < period - 1 {
            tr_sum += tr;
        } else if i == period - 1 {
            // Seed with the SMA of the first `period` True Ranges.
            tr_sum += tr;
            prev_atr = Some(tr_sum / period as f64);
            out[i] = prev_atr;
        } else {
            let next = match prev_atr {
                Some(p) => wilder_step(p, tr, period),
                None => tr,
            };
            prev_atr = Some(next);
            out[i] = prev_atr;
        }

        prev_close = Some(bar.close);
    }

    out
}

/// Advance the ATR by one bar from the caller-held recurrence state.
///
/// Cold-start recovery: with no previous ATR the bar's own True Range is the
/// best available estimate.
pub fn atr_next(prev_atr: Option<f64>, bar: &Candle, prev_close: Option<f64>, period: usize) -> f64 {
    let tr = true_range(bar.high, bar.low, prev_close);
    match prev_atr {
        Some(p) => wilder_step(p, tr, period),
        None => tr,
    }
}
