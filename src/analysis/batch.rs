// =============================================================================
// Batch Processor — full-sequence indicator computation
// =============================================================================
//
// Cold-start path: every configured indicator is computed independently over
// the whole bar sequence, then the per-index values are zipped positionally
// into `IndicatorRecord`s.  Deterministic, side-effect-free, reentrant; used
// for initialisation, source changes, and replays.

use anyhow::{ensure, Result};

use crate::analysis::{sanitize_candle, AnalysisConfig, IndicatorRecord};
use crate::indicators::adx::adx_series;
use crate::indicators::atr::atr_series;
use crate::indicators::ema::ema_series;
use crate::indicators::kernel::kernel_series;
use crate::indicators::rsi::rsi_series;
use crate::market_data::Candle;

/// Compute indicator records for the whole of `bars`.
///
/// Empty input yields empty output.  Fatal conditions are caller misuse
/// only: an invalid config or a time-descending bar pair.  Non-finite OHLCV
/// fields are sanitised to 0.0 (lossy, logged) rather than rejected.
pub fn process_all(bars: &[Candle], config: &AnalysisConfig) -> Result<Vec<IndicatorRecord>> {
    config.validate()?;

    if bars.is_empty() {
        return Ok(Vec::new());
    }

    for pair in bars.windows(2) {
        ensure!(
            pair[1].open_time >= pair[0].open_time,
            "bar sequence is not time-ascending: open_time {} follows {}",
            pair[1].open_time,
            pair[0].open_time
        );
    }

    let bars: Vec<Candle> = bars.iter().map(sanitize_candle).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let rsi = rsi_series(&closes, config.rsi_period);
    let atr = atr_series(&bars, config.atr_period);
    let adx = adx_series(&bars, config.adx_period);
    let ema_stacks: Vec<Vec<Option<f64>>> = config
        .ema_periods
        .iter()
        .map(|&period| ema_series(&closes, period))
        .collect();
    let kernel = kernel_series(
        &closes,
        config.kernel_bandwidth,
        config.kernel_multiplier,
        config.kernel_window,
    );

    let records = bars
        .into_iter()
        .enumerate()
        .map(|(i, candle)| IndicatorRecord {
            rsi: rsi[i],
            atr: atr[i],
            adx: adx[i],
            emas: ema_stacks.iter().map(|stack| stack[i]).collect(),
            kernel_mid: Some(kernel[i].mid),
            kernel_upper: Some(kernel[i].upper),
            kernel_lower: Some(kernel[i].lower),
            candle,
        })
        .collect();

    Ok(records)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::test_candle;

    fn synthetic_bars(n: usize) -> Vec<Candle> {
        (0..n as i64)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.23).sin() * 7.0 + (i as f64 * 0.05).cos() * 3.0;
                test_candle(i, base - 0.4, base + 1.8, base - 1.6, base + 0.3)
            })
            .collect()
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let out = process_all(&[], &AnalysisConfig::default()).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn invalid_config_is_fatal() {
        let bars = synthetic_bars(50);
        let config = AnalysisConfig {
            ema_periods: Vec::new(),
            ..AnalysisConfig::default()
        };
        assert!(process_all(&bars, &config).is_err());
    }

    #[test]
    fn descending_timestamps_are_fatal() {
        let mut bars = synthetic_bars(10);
        bars[5].open_time = bars[4].open_time - 1;
        assert!(process_all(&bars, &AnalysisConfig::default()).is_err());
    }

    #[test]
    fn records_are_positionally_aligned() {
        let bars = synthetic_bars(120);
        let config = AnalysisConfig::default();
        let records = process_all(&bars, &config).unwrap();

        assert_eq!(records.len(), bars.len());
        for (record, bar) in records.iter().zip(&bars) {
            assert_eq!(record.candle.open_time, bar.open_time);
            assert_eq!(record.emas.len(), config.ema_periods.len());
        }
    }

    #[test]
    fn warmup_boundaries_per_indicator() {
        let config = AnalysisConfig::default();
        let records = process_all(&synthetic_bars(120), &config).unwrap();

        // RSI: first value at index `period`.
        assert!(records[13].rsi.is_none());
        assert!(records[14].rsi.is_some());
        // ATR: first value at `period - 1`.
        assert!(records[12].atr.is_none());
        assert!(records[13].atr.is_some());
        // ADX: first value at `2 * period - 1`.
        assert!(records[26].adx.is_none());
        assert!(records[27].adx.is_some());
        // EMA stack: per-period seeds.
        assert!(records[7].emas[0].is_none());
        assert!(records[8].emas[0].is_some());
        assert!(records[54].emas[2].is_some());
        // Kernel: always determinable (edge policy covers the start).
        assert!(records[0].kernel_mid.is_some());
    }

    #[test]
    fn process_all_is_idempotent() {
        let bars = synthetic_bars(150);
        let config = AnalysisConfig::default();
        let a = process_all(&bars, &config).unwrap();
        let b = process_all(&bars, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_finite_bars_are_sanitised_not_fatal() {
        let mut bars = synthetic_bars(60);
        bars[20].close = f64::NAN;
        bars[21].high = f64::INFINITY;

        let records = process_all(&bars, &AnalysisConfig::default()).unwrap();
        assert_eq!(records.len(), 60);
        // The malformed fields were substituted, not propagated.
        assert!(records[20].candle.close.abs() < 1e-12);
        assert!(records[21].candle.high.abs() < 1e-12);
        // Downstream state stays finite.
        for r in &records {
            for v in [r.rsi, r.atr, r.adx, r.kernel_mid].into_iter().flatten() {
                assert!(v.is_finite());
            }
        }
    }

    #[test]
    fn flat_series_scenario() {
        // All closes equal: ATR collapses to 0 after seeding, the kernel
        // midline equals the close, and the band width vanishes.
        let bars: Vec<Candle> = (0..60)
            .map(|i| test_candle(i, 100.0, 100.0, 100.0, 100.0))
            .collect();
        let records = process_all(&bars, &AnalysisConfig::default()).unwrap();

        for r in records.iter().skip(13) {
            assert!(r.atr.unwrap().abs() < 1e-12);
        }
        for r in records.iter().skip(10) {
            assert!((r.kernel_mid.unwrap() - 100.0).abs() < 1e-12);
            assert!((r.kernel_upper.unwrap() - 100.0).abs() < 1e-12);
            assert!((r.kernel_lower.unwrap() - 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn rising_closes_pin_rsi_to_100() {
        // 20 strictly increasing closes, period 14 — the zero-average-loss
        // boundary branch.
        let bars: Vec<Candle> = (0..20)
            .map(|i| {
                let c = 100.0 + i as f64;
                test_candle(i, c - 0.5, c + 0.5, c - 1.0, c)
            })
            .collect();
        let records = process_all(&bars, &AnalysisConfig::default()).unwrap();
        for r in records.iter().skip(14) {
            assert!((r.rsi.unwrap() - 100.0).abs() < 1e-12);
        }
    }

    #[test]
    fn range_invariants_hold() {
        let records = process_all(&synthetic_bars(250), &AnalysisConfig::default()).unwrap();
        for r in &records {
            if let Some(rsi) = r.rsi {
                assert!((0.0..=100.0).contains(&rsi));
            }
            if let Some(adx) = r.adx {
                assert!((0.0..=100.0).contains(&adx));
            }
            if let (Some(lower), Some(mid), Some(upper)) =
                (r.kernel_lower, r.kernel_mid, r.kernel_upper)
            {
                assert!(lower <= mid && mid <= upper);
            }
        }
    }
}
