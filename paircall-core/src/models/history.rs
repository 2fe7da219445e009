use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{generate_id, UserId};

/// A completed call's audit record.
///
/// Written exactly once at call termination, owned by the ending party's
/// account, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistoryEntry {
    pub id: String,
    pub owner_id: UserId,
    pub partner_id: UserId,
    pub partner_name: String,
    /// Wall-clock span between join and disconnect, in seconds.
    pub duration_seconds: u64,
    pub timestamp: DateTime<Utc>,
    /// Fee charged for the call, in minor currency units.
    pub fee: i64,
    /// Whether a recording artifact was produced for this session.
    pub recorded: bool,
}

impl SessionHistoryEntry {
    pub fn new(
        owner_id: UserId,
        partner_id: UserId,
        partner_name: String,
        duration_seconds: u64,
        fee: i64,
        recorded: bool,
    ) -> Self {
        Self {
            id: generate_id(),
            owner_id,
            partner_id,
            partner_name,
            duration_seconds,
            timestamp: Utc::now(),
            fee,
            recorded,
        }
    }
}
