use domain::{Tier, ValidatedGlitch};
use serde::{Deserialize, Serialize};

/// The payload carried through the Delay Queue for one tier group
/// (§9 "store snapshots by value at emission time" — the glitch is
/// embedded whole so the per-job consumer never re-resolves it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJobPayload {
    pub glitch: ValidatedGlitch,
    pub target_tiers: Vec<Tier>,
}
