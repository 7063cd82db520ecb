// =============================================================================
// Binance REST API Client — public market-data endpoints
// =============================================================================
//
// Only unsigned endpoints are used: history backfill (`/api/v3/klines`) and a
// connectivity check (`/api/v3/ping`).  The engine neither reads accounts nor
// places orders, so no credentials or request signing exist here.

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, instrument};

use crate::market_data::Candle;
use crate::types::Timeframe;

/// Maximum klines Binance returns per request.
const MAX_KLINE_LIMIT: usize = 1000;

/// REST client for public Binance market data.
#[derive(Clone)]
pub struct BinanceClient {
    base_url: String,
    client: reqwest::Client,
}

impl Default for BinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BinanceClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        debug!("BinanceClient initialised (base_url=https://api.binance.com)");

        Self {
            base_url: "https://api.binance.com".to_string(),
            client,
        }
    }

    /// GET /api/v3/ping — connectivity check before streams are launched.
    #[instrument(skip(self), name = "binance::ping")]
    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/api/v3/ping", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/ping request failed")?;

        let status = resp.status();
        anyhow::ensure!(status.is_success(), "ping returned HTTP {status}");
        Ok(())
    }

    /// GET /api/v3/klines — fetch up to `limit` recent candles, oldest first.
    ///
    /// The final row may be the still-forming candle; it is returned with
    /// `is_closed == false` so the analysis seed only consumes closed bars.
    #[instrument(skip(self), name = "binance::get_klines")]
    pub async fn get_klines(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let limit = limit.min(MAX_KLINE_LIMIT);
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol.to_uppercase(),
            timeframe.code(),
            limit
        );

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /api/v3/klines request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .context("failed to decode klines response body")?;

        anyhow::ensure!(
            status.is_success(),
            "klines returned HTTP {status}: {body}"
        );

        let candles = parse_kline_rows(&body, Utc::now().timestamp_millis())?;
        debug!(symbol = %symbol, timeframe = %timeframe, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

/// Parse the positional kline rows Binance returns:
/// `[open_time, open, high, low, close, volume, close_time, ...]` with the
/// numeric price fields encoded as strings.
fn parse_kline_rows(body: &serde_json::Value, now_ms: i64) -> Result<Vec<Candle>> {
    let rows = body.as_array().context("klines body is not an array")?;

    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let fields = row
            .as_array()
            .with_context(|| format!("kline row {i} is not an array"))?;
        anyhow::ensure!(fields.len() >= 7, "kline row {i} has {} fields", fields.len());

        let open_time = fields[0]
            .as_i64()
            .with_context(|| format!("kline row {i}: bad open_time"))?;
        let close_time = fields[6]
            .as_i64()
            .with_context(|| format!("kline row {i}: bad close_time"))?;

        out.push(Candle {
            open_time,
            close_time,
            open: string_price(&fields[1], i, "open")?,
            high: string_price(&fields[2], i, "high")?,
            low: string_price(&fields[3], i, "low")?,
            close: string_price(&fields[4], i, "close")?,
            volume: string_price(&fields[5], i, "volume")?,
            is_closed: close_time <= now_ms,
        });
    }

    Ok(out)
}

fn string_price(val: &serde_json::Value, row: usize, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("kline row {row}: failed to parse {name}: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("kline row {row}: {name} is not a valid f64")),
        _ => anyhow::bail!("kline row {row}: {name} has unexpected JSON type"),
    }
}
