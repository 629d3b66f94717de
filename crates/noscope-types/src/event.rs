use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single append-only entry in a run's event log.
///
/// `seq` is strictly monotonic and gap-free within a run; events are
/// never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: DateTime<Utc>,
    pub run_id: String,
    pub phase: String,
    pub seq: u64,
    #[serde(rename = "type")]
    pub event_type: String,
    pub summary: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}
