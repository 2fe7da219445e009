pub mod history;
pub mod id;
pub mod invite;
pub mod recording;

pub use history::SessionHistoryEntry;
pub use id::{generate_id, CallId, RecordingId, UserId};
pub use invite::{CallInvite, CallStatus};
pub use recording::{RecordingArtifact, RecordingMetadata};
