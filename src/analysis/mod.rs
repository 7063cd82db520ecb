// =============================================================================
// Analysis Engine — Indicator records over a bar sequence
// =============================================================================
//
// Two computation paths over the same recurrence math:
//
//   batch::process_all     — cold start over a full bar sequence
//   incremental::update_one — one new bar folded onto existing records
//
// The contract between them: EMA and ATR agree to floating-point rounding at
// every determinable index; RSI and ADX agree up to a bounded, geometrically
// decaying seeding error (the incremental path re-derives them from a capped
// trailing window); the kernel envelope agrees exactly.
//
// "Not yet determinable" is always `Option::None` inside records — default
// substitution for display happens only at the snapshot boundary.

pub mod batch;
pub mod incremental;

pub use batch::process_all;
pub use incremental::update_one;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::indicators::kernel::KERNEL_EDGE_BARS;
use crate::market_data::Candle;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_rsi_period() -> usize {
    14
}

fn default_atr_period() -> usize {
    14
}

fn default_adx_period() -> usize {
    14
}

fn default_ema_periods() -> Vec<usize> {
    vec![9, 21, 55]
}

fn default_kernel_bandwidth() -> f64 {
    8.0
}

fn default_kernel_multiplier() -> f64 {
    3.0
}

fn default_kernel_window() -> usize {
    500
}

fn default_history_cap() -> usize {
    300
}

// =============================================================================
// AnalysisConfig
// =============================================================================

/// Indicator parameters shared by both computation paths.
///
/// Every field has a serde default so older config files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// RSI look-back period (Wilder smoothing).
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    /// ATR look-back period (Wilder smoothing).
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,

    /// ADX look-back period; ADX needs 2x this many bars to seed.
    #[serde(default = "default_adx_period")]
    pub adx_period: usize,

    /// EMA stack, one series per period. Record `emas` fields are parallel
    /// to this list.
    #[serde(default = "default_ema_periods")]
    pub ema_periods: Vec<usize>,

    /// Gaussian kernel bandwidth for the regression envelope.
    #[serde(default = "default_kernel_bandwidth")]
    pub kernel_bandwidth: f64,

    /// Band half-width multiplier applied to the weighted MAE.
    #[serde(default = "default_kernel_multiplier")]
    pub kernel_multiplier: f64,

    /// Trailing-window cap for the kernel regression. Must be identical in
    /// both paths for their values to agree.
    #[serde(default = "default_kernel_window")]
    pub kernel_window: usize,

    /// Trailing-context cap for the incremental RSI/ADX re-derivation.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            rsi_period: default_rsi_period(),
            atr_period: default_atr_period(),
            adx_period: default_adx_period(),
            ema_periods: default_ema_periods(),
            kernel_bandwidth: default_kernel_bandwidth(),
            kernel_multiplier: default_kernel_multiplier(),
            kernel_window: default_kernel_window(),
            history_cap: default_history_cap(),
        }
    }
}

impl AnalysisConfig {
    /// Reject caller misuse before any math runs.  An invalid config is the
    /// one fatal condition besides non-monotonic timestamps.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.rsi_period >= 1, "rsi_period must be >= 1");
        ensure!(self.atr_period >= 1, "atr_period must be >= 1");
        ensure!(self.adx_period >= 1, "adx_period must be >= 1");
        ensure!(!self.ema_periods.is_empty(), "ema_periods must not be empty");
        ensure!(
            self.ema_periods.iter().all(|&p| p >= 1),
            "ema_periods must all be >= 1"
        );
        ensure!(
            self.kernel_bandwidth.is_finite() && self.kernel_bandwidth > 0.0,
            "kernel_bandwidth must be a positive finite number"
        );
        ensure!(
            self.kernel_multiplier.is_finite() && self.kernel_multiplier >= 0.0,
            "kernel_multiplier must be a non-negative finite number"
        );
        ensure!(
            self.kernel_window > KERNEL_EDGE_BARS,
            "kernel_window must exceed the {KERNEL_EDGE_BARS}-bar edge region"
        );
        ensure!(self.history_cap >= 1, "history_cap must be >= 1");
        Ok(())
    }
}

// =============================================================================
// IndicatorRecord
// =============================================================================

/// One bar plus every indicator value determinable at that bar.
///
/// `None` means the value does not exist yet (insufficient history) — it is
/// never encoded as a sentinel number inside the record.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRecord {
    pub candle: Candle,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub adx: Option<f64>,
    /// Parallel to `AnalysisConfig::ema_periods`.
    pub emas: Vec<Option<f64>>,
    pub kernel_mid: Option<f64>,
    pub kernel_upper: Option<f64>,
    pub kernel_lower: Option<f64>,
}

impl IndicatorRecord {
    /// Boundary conversion for display and serialisation.
    ///
    /// Substitutes domain-meaningful defaults for undeterminable fields:
    /// midpoint 50 for RSI, 0 for ATR and ADX, the bar's own close for EMA
    /// and kernel fields.  The substitution lives here, at the edge, and
    /// never feeds back into the recurrence math.
    pub fn snapshot(&self) -> RecordSnapshot {
        let close = self.candle.close;
        RecordSnapshot {
            open_time: self.candle.open_time,
            close,
            rsi: self.rsi.unwrap_or(50.0),
            atr: self.atr.unwrap_or(0.0),
            adx: self.adx.unwrap_or(0.0),
            emas: self.emas.iter().map(|e| e.unwrap_or(close)).collect(),
            kernel_mid: self.kernel_mid.unwrap_or(close),
            kernel_upper: self.kernel_upper.unwrap_or(close),
            kernel_lower: self.kernel_lower.unwrap_or(close),
        }
    }
}

/// Display-robust view of a record with defaults substituted.
#[derive(Debug, Clone, Serialize)]
pub struct RecordSnapshot {
    pub open_time: i64,
    pub close: f64,
    pub rsi: f64,
    pub atr: f64,
    pub adx: f64,
    pub emas: Vec<f64>,
    pub kernel_mid: f64,
    pub kernel_upper: f64,
    pub kernel_lower: f64,
}

// =============================================================================
// Bar sanitisation
// =============================================================================

/// Replace non-finite bar fields with 0.0.
///
/// Lossy: a malformed bar degrades that bar's indicators instead of aborting
/// the series.  Logged so the data producer can be fixed.
pub(crate) fn sanitize_candle(candle: &Candle) -> Candle {
    let open_time = candle.open_time;
    let scrub = |name: &str, value: &mut f64| {
        if !value.is_finite() {
            warn!(open_time, field = name, "non-finite bar field sanitised to 0.0");
            *value = 0.0;
        }
    };

    let mut out = candle.clone();
    scrub("open", &mut out.open);
    scrub("high", &mut out.high);
    scrub("low", &mut out.low);
    scrub("close", &mut out.close);
    scrub("volume", &mut out.volume);
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
    fn config_default_is_valid() {
        assert!(AnalysisConfig::default().validate().is_ok());
    }

    #[test]
    fn config_rejects_empty_ema_stack() {
        let config = AnalysisConfig {
            ema_periods: Vec::new(),
            ..AnalysisConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_rejects_zero_periods() {
        for field in 0..4 {
            let mut config = AnalysisConfig::default();
            match field {
                0 => config.rsi_period = 0,
                1 => config.atr_period = 0,
                2 => config.adx_period = 0,
                _ => config.ema_periods = vec![9, 0],
            }
            assert!(config.validate().is_err(), "field {field} accepted zero");
        }
    }

    #[test]
    fn config_rejects_degenerate_kernel() {
        let mut config = AnalysisConfig::default();
        config.kernel_bandwidth = 0.0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.kernel_bandwidth = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.kernel_window = KERNEL_EDGE_BARS;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_serde_defaults_from_empty_json() {
        let config: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.rsi_period, 14);
        assert_eq!(config.ema_periods, vec![9, 21, 55]);
        assert_eq!(config.kernel_window, 500);
        assert_eq!(config.history_cap, 300);
    }

    #[test]
    fn snapshot_substitutes_defaults() {
        let record = IndicatorRecord {
            candle: test_candle(0, 100.0, 101.0, 99.0, 100.5),
            rsi: None,
            atr: None,
            adx: None,
            emas: vec![None, Some(99.0)],
            kernel_mid: None,
            kernel_upper: None,
            kernel_lower: None,
        };
        let snap = record.snapshot();
        assert!((snap.rsi - 50.0).abs() < 1e-12);
        assert!(snap.atr.abs() < 1e-12);
        assert!(snap.adx.abs() < 1e-12);
        assert!((snap.emas[0] - 100.5).abs() < 1e-12);
        assert!((snap.emas[1] - 99.0).abs() < 1e-12);
        assert!((snap.kernel_mid - 100.5).abs() < 1e-12);
    }

    #[test]
    fn snapshot_passes_through_determinable_values() {
        let record = IndicatorRecord {
            candle: test_candle(3, 100.0, 101.0, 99.0, 100.5),
            rsi: Some(61.2),
            atr: Some(1.7),
            adx: Some(24.0),
            emas: vec![Some(100.1)],
            kernel_mid: Some(100.4),
            kernel_upper: Some(101.0),
            kernel_lower: Some(99.8),
        };
        let snap = record.snapshot();
        assert!((snap.rsi - 61.2).abs() < 1e-12);
        assert!((snap.kernel_upper - 101.0).abs() < 1e-12);
    }

    #[test]
    fn sanitize_replaces_non_finite_fields() {
        let mut candle = test_candle(0, 100.0, 101.0, 99.0, 100.5);
        candle.high = f64::NAN;
        candle.volume = f64::INFINITY;
        let clean = sanitize_candle(&candle);
        assert!(clean.high.abs() < 1e-12);
        assert!(clean.volume.abs() < 1e-12);
        // Untouched fields survive.
        assert!((clean.close - 100.5).abs() < 1e-12);
    }
}
