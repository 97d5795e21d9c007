//! Wire types for `GET /api/simulation_status`.
//!
//! Every numeric field is optional on the wire; absent and `null` both
//! decode to zero so a partially-populated stats record never fails the
//! whole tick.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Per-bot counters as reported by the simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotStats {
    #[serde(default, deserialize_with = "null_default")]
    pub total_trades: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub total_input_traded: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub total_output_received: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub average_slippage: f64,
    /// Only the smart bot reports this.
    #[serde(default, deserialize_with = "null_default")]
    pub execution_rate: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub successful_trades: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub failed_trades: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub trades_skipped: u64,
}

/// One status payload describing the simulation at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default, deserialize_with = "null_default")]
    pub running: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub elapsed_minutes: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub progress_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twap_stats: Option<BotStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_stats: Option<BotStats>,
}

impl StatusSnapshot {
    /// Progress clamped into [0, 100] for display and the stop decision.
    pub fn clamped_progress(&self) -> f64 {
        if self.progress_percent.is_nan() {
            return 0.0;
        }
        self.progress_percent.clamp(0.0, 100.0)
    }

    /// Terminal signal: not running and progress at or above 100.
    pub fn is_complete(&self) -> bool {
        !self.running && self.clamped_progress() >= 100.0
    }
}

/// Decoded response body: a snapshot, or the server's `error` string.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusReply {
    Snapshot(StatusSnapshot),
    Error(String),
}

impl StatusReply {
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        if let Some(err) = value.get("error").and_then(Value::as_str) {
            return Ok(StatusReply::Error(err.to_string()));
        }
        Ok(StatusReply::Snapshot(serde_json::from_value(value)?))
    }
}
