use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{RecordingId, UserId};

/// A captured and uploaded session recording.
///
/// Created only when a stopped recording uploads successfully. Not listed
/// publicly until `published` is set; view/earnings accounting mutates the
/// counters later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingArtifact {
    pub id: RecordingId,
    pub owner_id: UserId,
    pub partner_id: UserId,
    pub partner_name: String,
    pub title: String,
    pub duration_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub views: u64,
    pub earnings: i64,
    pub published: bool,
    /// Listing price in minor currency units, never below the configured
    /// minimum.
    pub price: i64,
    pub thumbnail_ref: Option<String>,
    pub storage_ref: String,
}

/// Caller-supplied metadata for finalizing a recording.
#[derive(Debug, Clone)]
pub struct RecordingMetadata {
    pub owner_id: UserId,
    pub partner_id: UserId,
    pub partner_name: String,
    /// Falls back to "Session with {partner_name}" when absent.
    pub title: Option<String>,
    /// Falls back to the configured minimum price when absent.
    pub price: Option<i64>,
    pub duration_seconds: u64,
}

impl RecordingMetadata {
    /// Resolve the artifact title, generating the default when none was
    /// supplied.
    pub fn resolved_title(&self) -> String {
        match &self.title {
            Some(title) if !title.is_empty() => title.clone(),
            _ => format!("Session with {}", self.partner_name),
        }
    }
}
