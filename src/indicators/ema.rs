// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average.
//
//   multiplier = 2 / (period + 1)
//   EMA_t      = close_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The value at index `period - 1` is seeded with the SMA of the first
// `period` closes; earlier indices are not determinable.

use crate::indicators::ema_step;

/// Compute the full EMA series for `closes`.
///
/// The returned vector has the same length as `closes`; indices before
/// `period - 1` are `None`.  A zero period makes every index undeterminable.
pub fn ema_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 {
        return out;
    }

    let mut sum = 0.0;
    let mut prev: Option<f64> = None;

    for (i, &close) in closes.iter().enumerate() {
        if i < period - 1 {
            sum += close;
        } else if i == period - 1 {
            // Seed with the SMA of the first `period` closes.
            sum += close;
            prev = Some(sum / period as f64);
            out[i] = prev;
        } else {
            let next = ema_next(prev, close, period);
            prev = Some(next);
            out[i] = prev;
        }
    }

    out
}

/// Advance the EMA by one bar from the caller-held recurrence state.
///
/// Cold-start recovery: with no previous value the current close is the best
/// available estimate, so the recurrence restarts from it.
pub fn ema_next(prev: Option<f64>, close: f64, period: usize) -> f64 {
    match prev {
        Some(p) => ema_step(p, close, period),
        None => close,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_empty_input() {
        assert!(ema_series(&[], 5).is_empty());
    }

    #[test]
    fn ema_period_zero() {
        let out = ema_series(&[1.0, 2.0, 3.0], 0);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(Option::is_none));
    }

    #[test]
    fn ema_warmup_is_undeterminable() {
        let out = ema_series(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_none());
        assert!(out[1].is_none());
        assert!(out[2].is_some());
        assert!(out[4].is_some());
    }

    #[test]
    fn ema_seed_is_sma() {
        let out = ema_series(&[2.0, 4.0, 6.0], 3);
        let seed = out[2].unwrap();
        assert!((seed - 4.0).abs() < 1e-12);
    }

    #[test]
    fn ema_known_values() {
        // 5-period EMA of [1..10]: SMA of first 5 = 3.0, multiplier = 1/3.
        let closes: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        let out = ema_series(&closes, 5);

        let mult = 2.0 / 6.0;
        let mut expected = 3.0;
        assert!((out[4].unwrap() - expected).abs() < 1e-12);
        for (i, &c) in closes.iter().enumerate().skip(5) {
            expected = c * mult + expected * (1.0 - mult);
            assert!((out[i].unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn ema_flat_series_stays_flat() {
        let out = ema_series(&[100.0; 50], 14);
        for v in out.iter().skip(13) {
            assert!((v.unwrap() - 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn ema_next_matches_series() {
        // Folding ema_next bar-by-bar from the seed reproduces the series.
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
        let series = ema_series(&closes, 9);

        let mut prev = series[8];
        for i in 9..closes.len() {
            let next = ema_next(prev, closes[i], 9);
            let batch = series[i].unwrap();
            assert!(
                ((next - batch) / batch).abs() < 1e-9,
                "index {i}: fold {next} vs batch {batch}"
            );
            prev = Some(next);
        }
    }

    #[test]
    fn ema_next_cold_start_returns_close() {
        assert!((ema_next(None, 42.5, 14) - 42.5).abs() < 1e-12);
    }
}
