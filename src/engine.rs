// =============================================================================
// Engine State — shared record histories per symbol
// =============================================================================
//
// Ties the candle buffer and the per-symbol indicator record histories
// together behind one `Arc`.  The analysis loop is the single writer of each
// record history (incremental updates read the immediately preceding record,
// so concurrent writers would race); readers take cheap snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::analysis::{process_all, update_one, IndicatorRecord, RecordSnapshot};
use crate::market_data::{CandleBuffer, CandleKey};
use crate::runtime_config::RuntimeConfig;

/// Central engine state shared across async tasks via `Arc<EngineState>`.
pub struct EngineState {
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,
    pub candle_buffer: Arc<CandleBuffer>,
    records: RwLock<HashMap<String, Vec<IndicatorRecord>>>,
}

impl EngineState {
    pub fn new(config: RuntimeConfig) -> Self {
        let candle_buffer = Arc::new(CandleBuffer::new(config.candle_budget));
        Self {
            runtime_config: Arc::new(RwLock::new(config)),
            candle_buffer,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Fold every newly closed candle for `symbol` into its record history.
    ///
    /// The first pass over a symbol batch-computes the whole buffered history
    /// (`process_all`); later passes advance one bar at a time
    /// (`update_one`).  Returns the number of records appended.
    pub fn absorb_closed_candles(&self, symbol: &str) -> Result<usize> {
        let (timeframe, analysis, budget) = {
            let config = self.runtime_config.read();
            (
                config.timeframe,
                config.analysis.clone(),
                config.candle_budget,
            )
        };

        let key = CandleKey {
            symbol: symbol.to_string(),
            timeframe,
        };
        let candles = self.candle_buffer.closed(&key, budget);
        if candles.is_empty() {
            return Ok(0);
        }

        let mut map = self.records.write();
        let records = map.entry(symbol.to_string()).or_default();

        if records.is_empty() {
            *records = process_all(&candles, &analysis)?;
            info!(symbol = %symbol, records = records.len(), "record history seeded from batch");
            return Ok(records.len());
        }

        let last_time = records
            .last()
            .map_or(i64::MIN, |r| r.candle.open_time);

        let mut appended = 0;
        for candle in candles.iter().filter(|c| c.open_time > last_time) {
            let next = update_one(records, candle, &analysis)?;
            debug!(symbol = %symbol, open_time = candle.open_time, "record appended");
            records.push(next);
            appended += 1;
        }

        if records.len() > budget {
            let excess = records.len() - budget;
            records.drain(..excess);
        }

        Ok(appended)
    }

    /// Snapshot of the most recent record for `symbol`, if any.
    pub fn last_snapshot(&self, symbol: &str) -> Option<RecordSnapshot> {
        let map = self.records.read();
        map.get(symbol)
            .and_then(|records| records.last())
            .map(IndicatorRecord::snapshot)
    }

    /// Number of records held for `symbol`.
    pub fn record_count(&self, symbol: &str) -> usize {
        let map = self.records.read();
        map.get(symbol).map_or(0, Vec::len)
    }
}
