// =============================================================================
// Average Directional Index (ADX)
// =============================================================================
//
// ADX quantifies trend strength regardless of direction:
//
//   1. +DM = up-move   (high_t - high_{t-1})  when it is the larger, positive move
//      -DM = down-move (low_{t-1} - low_t)    symmetric gate
//   2. True Range per bar.
//   3. Wilder-smooth +DM, -DM, TR over `period` (SMA seed, then the shared
//      wilder_step — identical to the ATR recurrence).
//   4. +DI / -DI = 100 * smoothed(DM) / smoothed(TR), DX from the DI spread.
//   5. ADX = Wilder smoothing of DX, seeded as the SMA of the first `period`
//      DX values — so at least 2 * period bars are needed before ADX exists.
//
// Same full-history caveat as RSI: the smoothing never forgets, so a
// truncated trailing window carries a geometrically decaying seeding error.

use crate::indicators::{dx_from_smoothed, true_range, wilder_step};
use crate::market_data::Candle;

/// Compute the full ADX series for `bars`.
///
/// Same length as the input; indices before `2 * period - 1` are `None`.
pub fn adx_series(bars: &[Candle], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < 2 * period {
        return out;
    }

    let period_f = period as f64;

    // Accumulators for the DM/TR smoothing seed, then the running averages.
    let mut tr_sum = 0.0;
    let mut pdm_sum = 0.0;
    let mut mdm_sum = 0.0;
    let mut sm_tr = 0.0;
    let mut sm_pdm = 0.0;
    let mut sm_mdm = 0.0;

    // Accumulators for the ADX seed over the first `period` DX values.
    let mut dx_sum = 0.0;
    let mut dx_count = 0usize;
    let mut adx = 0.0;

    for i in 1..bars.len() {
        let tr = true_range(bars[i].high, bars[i].low, Some(bars[i - 1].close));

        let up = bars[i].high - bars[i - 1].high;
        let down = bars[i - 1].low - bars[i].low;
        let pdm = if up > down && up > 0.0 { up } else { 0.0 };
        let mdm = if down > up && down > 0.0 { down } else { 0.0 };

        let dx = if i < period {
            tr_sum += tr;
            pdm_sum += pdm;
            mdm_sum += mdm;
            continue;
        } else if i == period {
            tr_sum += tr;
            pdm_sum += pdm;
            mdm_sum += mdm;
            sm_tr = tr_sum / period_f;
            sm_pdm = pdm_sum / period_f;
            sm_mdm = mdm_sum / period_f;
            dx_from_smoothed(sm_pdm, sm_mdm, sm_tr)
        } else {
            sm_tr = wilder_step(sm_tr, tr, period);
            sm_pdm = wilder_step(sm_pdm, pdm, period);
            sm_mdm = wilder_step(sm_mdm, mdm, period);
            dx_from_smoothed(sm_pdm, sm_mdm, sm_tr)
        };

        if dx_count < period {
            dx_sum += dx;
            dx_count += 1;
            if dx_count == period {
                adx = dx_sum / period_f;
                out[i] = Some(adx);
            }
        } else {
            adx = wilder_step(adx, dx, period);
            out[i] = Some(adx);
        }
    }

    out
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::test_candle;

    #[test]
    fn adx_period_zero() {
        let bars = vec![test_candle(0, 1.0, 2.0, 0.5, 1.5); 50];
        assert!(adx_series(&bars, 0).iter().all(Option::is_none));
    }

    #[test]
    fn adx_first_value_at_two_periods() {
        let period = 5;
        let bars: Vec<Candle> = (0..20)
            .map(|i| {
                let base = 100.0 + i as f64;
                test_candle(i, base, base + 1.0, base - 0.5, base + 0.5)
            })
            .collect();
        let out = adx_series(&bars, period);
        for v in &out[..2 * period - 1] {
            assert!(v.is_none());
        }
        for v in &out[2 * period - 1..] {
            assert!(v.is_some());
        }
    }

    #[test]
    fn adx_insufficient_data() {
        // 2 * period - 1 bars is one short of the minimum.
        let bars: Vec<Candle> = (0..9)
            .map(|i| test_candle(i, 100.0 + i as f64, 101.0 + i as f64, 99.0 + i as f64, 100.5 + i as f64))
            .collect();
        assert!(adx_series(&bars, 5).iter().all(Option::is_none));
    }

    #[test]
    fn adx_strong_uptrend() {
        // Consecutive higher highs and higher lows — a strong trend.
        let bars: Vec<Candle> = (0..60)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                test_candle(i, base, base + 1.5, base - 0.5, base + 1.0)
            })
            .collect();
        let adx = adx_series(&bars, 14).last().copied().flatten().unwrap();
        assert!(adx > 25.0, "expected ADX > 25 for strong trend, got {adx}");
    }

    #[test]
    fn adx_flat_market_goes_to_zero() {
        // Identical bars: no directional movement, DX = 0 every bar.
        let bars = vec![test_candle(0, 100.0, 101.0, 99.0, 100.0); 60];
        let adx = adx_series(&bars, 14).last().copied().flatten().unwrap();
        assert!(adx < 1e-9, "expected ADX 0 for flat market, got {adx}");
    }

    #[test]
    fn adx_zero_span_bars_are_defined() {
        // Degenerate bars with zero range: smoothed TR is 0, which must hit
        // the defined DX = 0 branch instead of producing NaN.
        let bars = vec![test_candle(0, 100.0, 100.0, 100.0, 100.0); 40];
        let adx = adx_series(&bars, 14).last().copied().flatten().unwrap();
        assert!(adx.abs() < 1e-12);
    }

    #[test]
    fn adx_always_in_range() {
        let bars: Vec<Candle> = (0..150)
            .map(|i| {
                let base = 50.0 + (i as f64 * 0.3).sin() * 10.0;
                test_candle(i, base - 0.5, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        for v in adx_series(&bars, 14).iter().flatten() {
            assert!((0.0..=100.0).contains(v), "ADX {v} out of range");
        }
    }
}
