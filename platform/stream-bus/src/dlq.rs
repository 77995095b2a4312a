use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A dead-lettered handler failure, as appended to `dlq.{stream}`.
///
/// Mirrors the fields the teacher's per-module DLQ writers
/// (`modules/gl/src/dlq.rs`) attach to a failure row: enough to replay or
/// triage the entry without needing the original producer's context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DlqEntry {
    pub stream: String,
    pub entry_id: String,
    pub payload: String,
    pub error: String,
    pub ts: DateTime<Utc>,
}
