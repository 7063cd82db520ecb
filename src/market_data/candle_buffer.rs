// =============================================================================
// Candle storage and kline WebSocket ingestion
// =============================================================================
//
// The engine consumes one ordered OHLCV bar sequence per (symbol, timeframe).
// A `CandleBuffer` keeps the most recent bars per key; the live (unclosed)
// candle is updated in place and becomes permanent once the exchange marks it
// closed.  `run_kline_stream` feeds a buffer from the exchange WebSocket and
// returns on disconnect so the caller can reconnect with backoff.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};

use crate::types::Timeframe;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLCV bar.
///
/// `open_time` is monotonically non-decreasing within a series and strictly
/// increasing across distinct bars.  Field values are expected to be finite;
/// malformed bars are sanitised at the analysis boundary, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: i64,
    pub close_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_closed: bool,
}

/// Composite key identifying one candle series.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CandleKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl std::fmt::Display for CandleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.timeframe)
    }
}

// ---------------------------------------------------------------------------
// CandleBuffer — thread-safe ring buffer per (symbol, timeframe)
// ---------------------------------------------------------------------------

/// Thread-safe ring buffer of recent candles per key.  Retains at most
/// `budget` closed candles plus one in-progress candle.
pub struct CandleBuffer {
    rings: RwLock<HashMap<CandleKey, VecDeque<Candle>>>,
    budget: usize,
}

impl CandleBuffer {
    pub fn new(budget: usize) -> Self {
        Self {
            rings: RwLock::new(HashMap::new()),
            budget,
        }
    }

    /// Insert or replace the latest candle for `key`.
    ///
    /// An in-progress candle replaces the previous in-progress version of the
    /// same bar (matched by `open_time`); a closed candle finalises it and
    /// trims the ring to the budget.
    pub fn update(&self, key: CandleKey, candle: Candle) {
        let mut map = self.rings.write();
        let ring = map
            .entry(key)
            .or_insert_with(|| VecDeque::with_capacity(self.budget + 1));

        if let Some(last) = ring.back() {
            if !last.is_closed && last.open_time == candle.open_time {
                ring.pop_back();
            }
        }

        let trim = candle.is_closed;
        ring.push_back(candle);

        // Only closed candles count against the budget; the single
        // in-progress candle rides along untrimmed.
        if trim {
            while ring.len() > self.budget {
                ring.pop_front();
            }
        }
    }

    /// The most recent `count` closed candles, oldest first.
    pub fn closed(&self, key: &CandleKey, count: usize) -> Vec<Candle> {
        let map = self.rings.read();
        let Some(ring) = map.get(key) else {
            return Vec::new();
        };
        let closed: Vec<&Candle> = ring.iter().filter(|c| c.is_closed).collect();
        let skip = closed.len().saturating_sub(count);
        closed.into_iter().skip(skip).cloned().collect()
    }

    /// Close price of the most recent closed candle, if any.
    pub fn last_close(&self, key: &CandleKey) -> Option<f64> {
        let map = self.rings.read();
        map.get(key)
            .and_then(|ring| ring.iter().rev().find(|c| c.is_closed).map(|c| c.close))
    }

    /// Total candles stored for `key`, including any in-progress candle.
    pub fn count(&self, key: &CandleKey) -> usize {
        let map = self.rings.read();
        map.get(key).map_or(0, VecDeque::len)
    }
}

// ---------------------------------------------------------------------------
// Kline WebSocket stream
// ---------------------------------------------------------------------------

const STREAM_BASE: &str = "wss://stream.binance.com:9443/ws";

/// Connect to the kline stream for one (symbol, timeframe) pair and feed
/// candles into `buffer` until the stream ends or errors.
pub async fn run_kline_stream(
    symbol: &str,
    timeframe: Timeframe,
    buffer: &Arc<CandleBuffer>,
) -> Result<()> {
    let url = format!(
        "{STREAM_BASE}/{}@kline_{}",
        symbol.to_lowercase(),
        timeframe.code()
    );
    info!(url = %url, symbol = %symbol, timeframe = %timeframe, "connecting to kline WebSocket");

    let (ws_stream, _response) = connect_async(&url)
        .await
        .context("failed to connect to kline WebSocket")?;

    info!(symbol = %symbol, timeframe = %timeframe, "kline WebSocket connected");
    let (_write, mut read) = ws_stream.split();

    loop {
        let Some(frame) = read.next().await else {
            warn!(symbol = %symbol, timeframe = %timeframe, "kline WebSocket stream ended");
            return Ok(());
        };
        let msg = frame.context("kline WebSocket read failed")?;

        // Ping/Pong/Binary/Close frames are handled by tungstenite.
        let tokio_tungstenite::tungstenite::Message::Text(text) = msg else {
            continue;
        };

        match parse_kline_message(&text) {
            Ok((key, candle)) => {
                debug!(
                    key = %key,
                    close = candle.close,
                    closed = candle.is_closed,
                    "candle update"
                );
                buffer.update(key, candle);
            }
            Err(e) => warn!(error = %e, "failed to parse kline message"),
        }
    }
}

/// Parse a kline event payload into a `(key, candle)` pair.
///
/// Accepts both the combined-stream envelope (`{"stream": ..., "data": ...}`)
/// and the direct single-stream shape (`{"e": "kline", "s": ..., "k": ...}`).
fn parse_kline_message(text: &str) -> Result<(CandleKey, Candle)> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse kline JSON")?;

    let data = if root.get("data").is_some() {
        &root["data"]
    } else {
        &root
    };

    let symbol = data["s"]
        .as_str()
        .context("missing field s")?
        .to_uppercase();

    let k = &data["k"];

    let timeframe: Timeframe = k["i"]
        .as_str()
        .context("missing field k.i")?
        .parse()?;

    let open_time = k["t"].as_i64().context("missing field k.t")?;
    let close_time = k["T"].as_i64().context("missing field k.T")?;
    let is_closed = k["x"].as_bool().context("missing field k.x")?;

    let candle = Candle {
        open_time,
        close_time,
        open: numeric_field(&k["o"], "k.o")?,
        high: numeric_field(&k["h"], "k.h")?,
        low: numeric_field(&k["l"], "k.l")?,
        close: numeric_field(&k["c"], "k.c")?,
        volume: numeric_field(&k["v"], "k.v")?,
        is_closed,
    };

    Ok((CandleKey { symbol, timeframe }, candle))
}

/// The exchange sends numeric kline fields as JSON strings.
fn numeric_field(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Build a closed candle for tests; `seq` spaces open times one minute apart.
#[cfg(test)]
pub fn test_candle(seq: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        open_time: seq * 60_000,
        close_time: seq * 60_000 + 59_999,
        open,
        high,
        low,
        close,
        volume: 100.0,
        is_closed: true,
    }
}
