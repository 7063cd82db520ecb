// =============================================================================
// Incremental Updater — one new bar onto existing records
// =============================================================================
//
// The live path.  Given the records computed so far and one new bar, produce
// the record for that bar alone:
//
//   EMA / ATR  — exact O(1) recurrence from the last record's state; during
//                warm-up (previous value still `None`) the value is
//                re-derived from the short trailing history so the result
//                matches the batch path from the seed index onward.
//   RSI / ADX  — re-run the batch recurrence over the last `history_cap`
//                bars plus the new one.  Wilder smoothing has no forgetting
//                boundary, so this truncation carries a seeding error that
//                decays geometrically with the window length, in exchange
//                for O(window) instead of O(n) cost per update.
//   Kernel     — O(window) single-point form, exactly equal to batch.
//
// `prior_records` is read-only input; the caller owns appending the result.

use anyhow::{ensure, Context, Result};

use crate::analysis::{process_all, sanitize_candle, AnalysisConfig, IndicatorRecord};
use crate::indicators::adx::adx_series;
use crate::indicators::atr::{atr_next, atr_series};
use crate::indicators::ema::{ema_next, ema_series};
use crate::indicators::kernel::kernel_point;
use crate::indicators::rsi::rsi_series;
use crate::market_data::Candle;

/// Compute the indicator record for `new_bar` given everything before it.
///
/// With no prior records this delegates to the batch path on a singleton
/// sequence (approximate by nature — one bar determines almost nothing).
pub fn update_one(
    prior_records: &[IndicatorRecord],
    new_bar: &Candle,
    config: &AnalysisConfig,
) -> Result<IndicatorRecord> {
    config.validate()?;

    let Some(last) = prior_records.last() else {
        let mut records = process_all(std::slice::from_ref(new_bar), config)?;
        return records.pop().context("singleton batch produced no record");
    };

    ensure!(
        new_bar.open_time >= last.candle.open_time,
        "new bar open_time {} precedes the last record's {}",
        new_bar.open_time,
        last.candle.open_time
    );

    let bar = sanitize_candle(new_bar);

    // Bounded trailing context for the Wilder recurrences.
    let start = prior_records.len().saturating_sub(config.history_cap);
    let mut ctx_bars: Vec<Candle> = prior_records[start..]
        .iter()
        .map(|r| r.candle.clone())
        .collect();
    ctx_bars.push(bar.clone());
    let ctx_closes: Vec<f64> = ctx_bars.iter().map(|b| b.close).collect();

    // --- EMA stack: exact recurrence once seeded --------------------------
    let emas: Vec<Option<f64>> = config
        .ema_periods
        .iter()
        .enumerate()
        .map(|(slot, &period)| {
            let prev = last.emas.get(slot).copied().flatten();
            if prev.is_some() {
                Some(ema_next(prev, bar.close, period))
            } else {
                ema_series(&ctx_closes, period).last().copied().flatten()
            }
        })
        .collect();

    // --- ATR: exact recurrence once seeded --------------------------------
    let atr = match last.atr {
        Some(prev) => Some(atr_next(
            Some(prev),
            &bar,
            Some(last.candle.close),
            config.atr_period,
        )),
        None => atr_series(&ctx_bars, config.atr_period)
            .last()
            .copied()
            .flatten(),
    };

    // --- RSI / ADX: capped trailing re-derivation -------------------------
    let rsi = rsi_series(&ctx_closes, config.rsi_period)
        .last()
        .copied()
        .flatten();
    let adx = adx_series(&ctx_bars, config.adx_period)
        .last()
        .copied()
        .flatten();

    // --- Kernel envelope: exact single-point form -------------------------
    let kstart = prior_records
        .len()
        .saturating_sub(config.kernel_window.saturating_sub(1));
    let kernel_history: Vec<f64> = prior_records[kstart..]
        .iter()
        .map(|r| r.candle.close)
        .collect();
    let kernel = kernel_point(
        &kernel_history,
        bar.close,
        config.kernel_bandwidth,
        config.kernel_multiplier,
        config.kernel_window,
    );

    Ok(IndicatorRecord {
        candle: bar,
        rsi,
        atr,
        adx,
        emas,
        kernel_mid: Some(kernel.mid),
        kernel_upper: Some(kernel.upper),
        kernel_lower: Some(kernel.lower),
    })
}
