// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Central configuration for the Meridian engine.  Persistence uses an atomic
// tmp + rename pattern to prevent corruption on crash.  All fields carry
// `#[serde(default)]` so that adding new fields never breaks loading an
// older config file.
//
// The summary API key deliberately has no field here: it is read from the
// environment only and never persisted.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::AnalysisConfig;
use crate::types::Timeframe;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_symbols() -> Vec<String> {
    vec![
        "BTCUSDT".to_string(),
        "ETHUSDT".to_string(),
        "BNBUSDT".to_string(),
        "XRPUSDT".to_string(),
        "SOLUSDT".to_string(),
    ]
}

fn default_candle_budget() -> usize {
    1000
}

fn default_analysis_interval_secs() -> u64 {
    5
}

fn default_summary_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_summary_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_summary_interval_secs() -> u64 {
    900
}

// =============================================================================
// SummaryConfig
// =============================================================================

/// Settings for the optional AI market-summary collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Chat-completions endpoint the summary request is posted to.
    #[serde(default = "default_summary_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with the request.
    #[serde(default = "default_summary_model")]
    pub model: String,

    /// Seconds between summaries per symbol.
    #[serde(default = "default_summary_interval_secs")]
    pub interval_secs: u64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            endpoint: default_summary_endpoint(),
            model: default_summary_model(),
            interval_secs: default_summary_interval_secs(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the Meridian engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Symbols the engine watches and analyses.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<String>,

    /// Candle timeframe driving the analysis.
    #[serde(default)]
    pub timeframe: Timeframe,

    /// Closed candles retained per symbol, for both the raw candle ring and
    /// the indicator record history.
    #[serde(default = "default_candle_budget")]
    pub candle_budget: usize,

    /// Seconds between analysis-loop passes.
    #[serde(default = "default_analysis_interval_secs")]
    pub analysis_interval_secs: u64,

    /// Indicator parameters shared by the batch and incremental paths.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// AI summary collaborator settings.
    #[serde(default)]
    pub summary: SummaryConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            timeframe: Timeframe::default(),
            candle_budget: default_candle_budget(),
            analysis_interval_secs: default_analysis_interval_secs(),
            analysis: AnalysisConfig::default(),
            summary: SummaryConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// A missing file is an error so the caller can fall back to defaults
    /// with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(path = %path.display(), symbols = ?config.symbols, "runtime config loaded");
        Ok(config)
    }

    /// Persist the configuration atomically (write tmp, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let json =
            serde_json::to_string_pretty(self).context("failed to serialise runtime config")?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to move {} into place", tmp.display()))?;

        info!(path = %path.display(), "runtime config saved");
        Ok(())
    }
}
