// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — price deltas from consecutive closes.
// Step 2 — seed average gain / loss with the SMA of the first `period` deltas.
// Step 3 — Wilder smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + gain) / period
// Step 4 — RS = avg_gain / avg_loss, RSI = 100 - 100 / (1 + RS), with the
//          zero-loss boundary pinned to 100.
//
// Wilder smoothing has no forgetting boundary, so this recurrence is exact
// only when fed the entire history from the series start.  Re-running it over
// a truncated trailing window introduces a seeding error that decays
// geometrically with the number of bars inside the window — the incremental
// updater deliberately accepts that trade (see analysis::incremental).

use crate::indicators::{rsi_from_averages, wilder_step};

/// Compute the full RSI series for `closes`.
///
/// Same length as the input; indices before `period` are `None` (the first
/// `period` deltas are consumed by the seed).
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    let mut sum_gain = 0.0;
    let mut sum_loss = 0.0;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..closes.len() {
        let delta = closes[i] - closes[i - 1];
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };

        if i < period {
            sum_gain += gain;
            sum_loss += loss;
        } else if i == period {
            // Seed: simple averages over the first `period` deltas.
            sum_gain += gain;
            sum_loss += loss;
            avg_gain = sum_gain / period as f64;
            avg_loss = sum_loss / period as f64;
            out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
        } else {
            avg_gain = wilder_step(avg_gain, gain, period);
            avg_loss = wilder_step(avg_loss, loss, period);
            out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
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

    #[test]
    fn rsi_empty_input() {
        assert!(rsi_series(&[], 14).is_empty());
    }

    #[test]
    fn rsi_period_zero() {
        assert!(rsi_series(&[1.0, 2.0, 3.0], 0).iter().all(Option::is_none));
    }

    #[test]
    fn rsi_insufficient_data() {
        // 14 closes give only 13 deltas — not enough for a period-14 seed.
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(rsi_series(&closes, 14).iter().all(Option::is_none));
    }

    #[test]
    fn rsi_first_value_at_period_index() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let out = rsi_series(&closes, 14);
        for v in &out[..14] {
            assert!(v.is_none());
        }
        assert!(out[14].is_some());
    }

    #[test]
    fn rsi_all_gains_pins_to_100() {
        // 20 strictly increasing closes, period 14: zero average loss from
        // the seed onward, so every determinable value sits on the boundary.
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi_series(&closes, 14);
        for v in out.iter().skip(14) {
            assert!((v.unwrap() - 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn rsi_all_losses_pins_to_zero() {
        let closes: Vec<f64> = (0..30).map(|i| 200.0 - i as f64).collect();
        let out = rsi_series(&closes, 14);
        for v in out.iter().skip(14) {
            assert!(v.unwrap().abs() < 1e-12);
        }
    }

    #[test]
    fn rsi_always_in_range() {
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13, 44.01, 44.80,
        ];
        for v in rsi_series(&closes, 14).iter().flatten() {
            assert!((0.0..=100.0).contains(v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_truncated_window_error_decays() {
        // Seeding error from a truncated start decays as the window grows:
        // the value computed over the last `cap` closes approaches the
        // full-history value monotonically in cap.
        let closes: Vec<f64> = (0..600)
            .map(|i| 100.0 + (i as f64 * 0.11).sin() * 4.0 + (i as f64 * 0.031).cos() * 2.5)
            .collect();
        let full = rsi_series(&closes, 14).last().copied().flatten().unwrap();

        let mut prev_err = f64::INFINITY;
        for cap in [50usize, 150, 300] {
            let tail = &closes[closes.len() - cap..];
            let windowed = rsi_series(tail, 14).last().copied().flatten().unwrap();
            let err = (windowed - full).abs();
            assert!(err <= prev_err + 1e-9, "error grew at cap {cap}");
            prev_err = err;
        }
        assert!(prev_err < 0.5, "cap-300 error {prev_err} above bound");
    }
}
