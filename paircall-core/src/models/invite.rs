use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::id::{CallId, UserId};
use crate::Error;

/// Call invite status.
///
/// Transitions only move forward: `ringing -> accepted -> ended`, with
/// `ringing -> ended` covering rejection and timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum CallStatus {
    #[default]
    Ringing,
    Accepted,
    Ended,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ringing => "ringing",
            Self::Accepted => "accepted",
            Self::Ended => "ended",
        }
    }

    pub fn is_ringing(&self) -> bool {
        matches!(self, Self::Ringing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Ringing, Self::Accepted)
                | (Self::Ringing, Self::Ended)
                | (Self::Accepted, Self::Ended)
        )
    }
}

impl Display for CallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CallStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ringing" => Ok(Self::Ringing),
            "accepted" => Ok(Self::Accepted),
            "ended" => Ok(Self::Ended),
            _ => Err(Error::InvalidInput(format!("Invalid CallStatus: {s}"))),
        }
    }
}

/// A proposed or in-progress call between two identified participants.
///
/// Jointly referenced by both parties but mutated only through the
/// signaling service's transition operations. Never deleted; `ended` is
/// the terminal state and the record is retained as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallInvite {
    pub id: CallId,
    pub room_id: String,
    pub caller_id: UserId,
    pub caller_name: String,
    pub callee_id: UserId,
    pub callee_name: String,
    pub status: CallStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CallInvite {
    pub fn new(
        room_id: String,
        caller_id: UserId,
        caller_name: String,
        callee_id: UserId,
        callee_name: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: CallId::new(),
            room_id,
            caller_id,
            caller_name,
            callee_id,
            callee_name,
            status: CallStatus::Ringing,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        assert!(CallStatus::Ringing.can_transition_to(CallStatus::Accepted));
        assert!(CallStatus::Ringing.can_transition_to(CallStatus::Ended));
        assert!(CallStatus::Accepted.can_transition_to(CallStatus::Ended));
    }

    #[test]
    fn test_no_backward_transitions() {
        assert!(!CallStatus::Accepted.can_transition_to(CallStatus::Ringing));
        assert!(!CallStatus::Ended.can_transition_to(CallStatus::Ringing));
        assert!(!CallStatus::Ended.can_transition_to(CallStatus::Accepted));
        assert!(!CallStatus::Ended.can_transition_to(CallStatus::Ended));
        assert!(!CallStatus::Ringing.can_transition_to(CallStatus::Ringing));
    }

    #[test]
    fn test_new_invite_is_ringing() {
        let invite = CallInvite::new(
            "u1_u2".to_string(),
            UserId::from("u1"),
            "Alice".to_string(),
            UserId::from("u2"),
            "Bob".to_string(),
        );
        assert!(invite.status.is_ringing());
        assert!(invite.updated_at >= invite.created_at);
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&CallStatus::Accepted).unwrap();
        assert_eq!(json, "\"accepted\"");
        let status: CallStatus = serde_json::from_str("\"ended\"").unwrap();
        assert_eq!(status, CallStatus::Ended);
    }
}
