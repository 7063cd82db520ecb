// =============================================================================
// AI Market Summary — optional text-summary collaborator
// =============================================================================
//
// Posts a compact indicator snapshot to a chat-completions endpoint and
// returns the model's one-paragraph read of the market.  The client handle is
// constructor-injected with an explicit `Unconfigured` variant — there is no
// module-level singleton, and an unconfigured engine runs normally with
// summaries disabled.
//
// The API key comes from the environment only (`MERIDIAN_SUMMARY_API_KEY`)
// and is never logged or persisted.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::analysis::RecordSnapshot;
use crate::runtime_config::SummaryConfig;

/// Environment variable holding the summary API key.
pub const SUMMARY_API_KEY_ENV: &str = "MERIDIAN_SUMMARY_API_KEY";

/// Handle to the summary collaborator.
pub enum Summarizer {
    /// No API key available; every call short-circuits to `Ok(None)`.
    Unconfigured,
    Configured {
        client: reqwest::Client,
        api_key: String,
        config: SummaryConfig,
    },
}

impl Summarizer {
    /// Build from an optional API key.
    pub fn new(api_key: Option<String>, config: SummaryConfig) -> Self {
        match api_key {
            Some(key) if !key.trim().is_empty() => {
                let client = reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(30))
                    .build()
                    .expect("failed to build reqwest client");
                info!(endpoint = %config.endpoint, model = %config.model, "summary collaborator configured");
                Self::Configured {
                    client,
                    api_key: key,
                    config,
                }
            }
            _ => {
                info!("summary collaborator unconfigured ({SUMMARY_API_KEY_ENV} not set)");
                Self::Unconfigured
            }
        }
    }

    /// Build from the environment.
    pub fn from_env(config: &SummaryConfig) -> Self {
        Self::new(std::env::var(SUMMARY_API_KEY_ENV).ok(), config.clone())
    }

    pub fn is_configured(&self) -> bool {
        matches!(self, Self::Configured { .. })
    }

    /// Request a summary for `symbol`'s latest snapshot.
    ///
    /// Returns `Ok(None)` when unconfigured; errors only on transport or
    /// response-shape failures from a configured endpoint.
    #[instrument(skip(self, snapshot), fields(symbol = %symbol))]
    pub async fn summarize(&self, symbol: &str, snapshot: &RecordSnapshot) -> Result<Option<String>> {
        let Self::Configured {
            client,
            api_key,
            config,
        } = self
        else {
            debug!("summary skipped: collaborator unconfigured");
            return Ok(None);
        };

        let body = serde_json::json!({
            "model": config.model,
            "max_tokens": 200,
            "messages": [{ "role": "user", "content": build_prompt(symbol, snapshot) }],
        });

        let resp = client
            .post(&config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("summary request failed")?;

        let status = resp.status();
        let payload: serde_json::Value = resp
            .json()
            .await
            .context("failed to decode summary response body")?;
        anyhow::ensure!(status.is_success(), "summary endpoint returned HTTP {status}: {payload}");

        let text = payload["choices"][0]["message"]["content"]
            .as_str()
            .context("summary response missing choices[0].message.content")?
            .trim()
            .to_string();

        Ok(Some(text))
    }
}

/// Render the snapshot as a compact prompt the model can read at a glance.
fn build_prompt(symbol: &str, snapshot: &RecordSnapshot) -> String {
    let at = chrono::DateTime::from_timestamp_millis(snapshot.open_time)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| snapshot.open_time.to_string());

    let emas = snapshot
        .emas
        .iter()
        .map(|v| format!("{v:.4}"))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Summarise the technical picture for {symbol} as of {at} in 2-3 sentences \
         for a trading dashboard. close={:.4}, RSI={:.1}, ATR={:.4}, ADX={:.1}, \
         EMAs=[{emas}], kernel mid={:.4} upper={:.4} lower={:.4}.",
        snapshot.close,
        snapshot.rsi,
        snapshot.atr,
        snapshot.adx,
        snapshot.kernel_mid,
        snapshot.kernel_upper,
        snapshot.kernel_lower,
    )
}
