use serde::{Deserialize, Serialize};

/// A job as stored in the queue, wire-identical across both backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayedJob {
    pub id: String,
    pub payload: Vec<u8>,
    pub unique_id: Option<String>,
}
