//! Test helpers and fixtures for paircall-core tests

use crate::models::{CallInvite, UserId};

/// Create a test user ID
pub fn test_user_id(id: &str) -> UserId {
    UserId::from_string(id.to_string())
}

/// Test fixture builder for call invites
pub struct InviteFixture {
    room_id: String,
    caller_id: UserId,
    caller_name: String,
    callee_id: UserId,
    callee_name: String,
}

impl InviteFixture {
    pub fn new() -> Self {
        Self {
            room_id: "u1_u2".to_string(),
            caller_id: test_user_id("u1"),
            caller_name: "Alice".to_string(),
            callee_id: test_user_id("u2"),
            callee_name: "Bob".to_string(),
        }
    }

    pub fn with_caller(mut self, id: &str, name: &str) -> Self {
        self.caller_id = test_user_id(id);
        self.caller_name = name.to_string();
        self
    }

    pub fn with_callee(mut self, id: &str, name: &str) -> Self {
        self.callee_id = test_user_id(id);
        self.callee_name = name.to_string();
        self
    }

    pub fn with_room(mut self, room_id: &str) -> Self {
        self.room_id = room_id.to_string();
        self
    }

    pub fn build(self) -> CallInvite {
        CallInvite::new(
            self.room_id,
            self.caller_id,
            self.caller_name,
            self.callee_id,
            self.callee_name,
        )
    }
}

impl Default for InviteFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Async test wrapper with timeout
///
/// Use this to prevent tests from hanging indefinitely.
pub async fn with_timeout<F>(duration: std::time::Duration, future: F) -> F::Output
where
    F: std::future::Future,
{
    tokio::select! {
        result = future => result,
        _ = tokio::time::sleep(duration) => {
            panic!("Test timed out after {:?}", duration);
        }
    }
}
