// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators maintained by the
// analysis engine.  Every series function returns a `Vec<Option<f64>>` of the
// SAME length as its input: `None` means "not yet determinable" (insufficient
// history), never a sentinel number.
//
// The single-step recurrence primitives live here, in one place, and are
// called identically by the batch series functions and the incremental
// updater.  Keeping the formulas in one spot is what guarantees the two
// computation paths cannot drift apart.

pub mod adx;
pub mod atr;
pub mod ema;
pub mod kernel;
pub mod rsi;

// -----------------------------------------------------------------------------
// Recurrence primitives
// -----------------------------------------------------------------------------

/// One EMA step: `close * k + prev * (1 - k)` with `k = 2 / (period + 1)`.
pub fn ema_step(prev: f64, close: f64, period: usize) -> f64 {
    let k = 2.0 / (period as f64 + 1.0);
    close * k + prev * (1.0 - k)
}

/// One step of Wilder's smoothing: `(prev * (period - 1) + value) / period`.
///
/// Shared by ATR, the RSI gain/loss averages, and every smoothed series in
/// the ADX pipeline.
pub fn wilder_step(prev: f64, value: f64, period: usize) -> f64 {
    let period_f = period as f64;
    (prev * (period_f - 1.0) + value) / period_f
}

/// True Range of a bar given the previous close.
///
/// With no previous close (the very first bar of a series) the True Range
/// degenerates to the bar's own high-low span.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        Some(pc) => (high - low).max((high - pc).abs()).max((low - pc).abs()),
        None => high - low,
    }
}

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// Zero average loss is the defined boundary (all gains): RSI = 100.  The
/// division can never produce a non-finite value past that guard.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

/// DX from the smoothed +DM / -DM / TR values.
///
/// Both degenerate denominators (zero smoothed TR, zero DI sum) yield the
/// defined boundary value 0 rather than NaN.
pub fn dx_from_smoothed(plus_dm: f64, minus_dm: f64, tr: f64) -> f64 {
    if tr == 0.0 {
        return 0.0;
    }

    let plus_di = (plus_dm / tr) * 100.0;
    let minus_di = (minus_dm / tr) * 100.0;

    let di_sum = plus_di + minus_di;
    if di_sum == 0.0 {
        return 0.0;
    }

    ((plus_di - minus_di).abs() / di_sum) * 100.0
}
