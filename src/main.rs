// =============================================================================
// Meridian Market Analytics — Main Entry Point
// =============================================================================
//
// Startup order matters: history is backfilled over REST and batch-processed
// first, so the live stream only ever has to fold one new bar at a time.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod binance;
mod engine;
mod indicators;
mod market_data;
mod runtime_config;
mod summary;
mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::binance::BinanceClient;
use crate::engine::EngineState;
use crate::runtime_config::RuntimeConfig;
use crate::summary::Summarizer;

/// Default path of the persisted runtime configuration.
const CONFIG_PATH: &str = "runtime_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Meridian Market Analytics — Starting Up          ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // Override symbols from env if available.
    if let Ok(syms) = std::env::var("MERIDIAN_SYMBOLS") {
        config.symbols = syms
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if config.symbols.is_empty() {
        config.symbols = RuntimeConfig::default().symbols;
    }

    // An unusable indicator config is fatal at startup, not mid-stream.
    config.analysis.validate()?;

    info!(
        symbols = ?config.symbols,
        timeframe = %config.timeframe,
        "Configured analysis universe"
    );

    // ── 2. Build shared state & collaborators ────────────────────────────
    let summarizer = Arc::new(Summarizer::from_env(&config.summary));
    let state = Arc::new(EngineState::new(config));
    let client = BinanceClient::new();

    if let Err(e) = client.ping().await {
        warn!(error = %e, "Exchange ping failed — continuing, backfill may also fail");
    }

    // ── 3. Backfill history & seed record histories ──────────────────────
    let (symbols, timeframe, budget) = {
        let cfg = state.runtime_config.read();
        (cfg.symbols.clone(), cfg.timeframe, cfg.candle_budget)
    };

    for symbol in &symbols {
        match client.get_klines(symbol, timeframe, budget).await {
            Ok(candles) => {
                let key = market_data::CandleKey {
                    symbol: symbol.clone(),
                    timeframe,
                };
                for candle in candles.into_iter().filter(|c| c.is_closed) {
                    state.candle_buffer.update(key.clone(), candle);
                }
                match state.absorb_closed_candles(symbol) {
                    Ok(count) => info!(symbol = %symbol, records = count, "History backfilled"),
                    Err(e) => error!(symbol = %symbol, error = %e, "Backfill processing failed"),
                }
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Backfill failed — will seed from the live stream");
            }
        }
    }

    // ── 4. Spawn kline streams ───────────────────────────────────────────
    for symbol in &symbols {
        let buffer = state.candle_buffer.clone();
        let sym = symbol.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = market_data::run_kline_stream(&sym, timeframe, &buffer).await {
                    error!(symbol = %sym, error = %e, "Kline stream error — reconnecting in 5s");
                }
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        });
    }
    info!(count = symbols.len(), "Market data streams launched");

    // ── 5. Analysis loop ─────────────────────────────────────────────────
    let (interval_secs, summary_interval) = {
        let cfg = state.runtime_config.read();
        (cfg.analysis_interval_secs.max(1), cfg.summary.interval_secs)
    };

    let mut last_summary: HashMap<String, Instant> = HashMap::new();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;

        let symbols = state.runtime_config.read().symbols.clone();
        for symbol in &symbols {
            let appended = match state.absorb_closed_candles(symbol) {
                Ok(n) => n,
                Err(e) => {
                    error!(symbol = %symbol, error = %e, "Incremental update failed");
                    continue;
                }
            };
            if appended == 0 {
                continue;
            }

            let Some(snapshot) = state.last_snapshot(symbol) else {
                continue;
            };
            info!(
                symbol = %symbol,
                appended,
                close = snapshot.close,
                rsi = format!("{:.1}", snapshot.rsi),
                atr = format!("{:.4}", snapshot.atr),
                adx = format!("{:.1}", snapshot.adx),
                kernel_mid = format!("{:.4}", snapshot.kernel_mid),
                "Records updated"
            );

            // Summaries run on their own cadence, off the hot path.
            let due = last_summary
                .get(symbol)
                .map_or(true, |t| t.elapsed().as_secs() >= summary_interval);
            if due && summarizer.is_configured() {
                last_summary.insert(symbol.clone(), Instant::now());
                let summarizer = summarizer.clone();
                let sym = symbol.clone();
                tokio::spawn(async move {
                    match summarizer.summarize(&sym, &snapshot).await {
                        Ok(Some(text)) => info!(symbol = %sym, summary = %text, "Market summary"),
                        Ok(None) => {}
                        Err(e) => warn!(symbol = %sym, error = %e, "Summary request failed"),
                    }
                });
            }
        }
    }
}
