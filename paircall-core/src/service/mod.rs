pub mod credential;
pub mod history;
pub mod recording;
pub mod room_name;
pub mod session;
pub mod signaling;

pub use credential::{JoinClaims, JoinCredentialService};
pub use history::HistoryService;
pub use recording::{MediaSource, PipelineState, RecordingPipeline};
pub use room_name::{room_name, validate_identity};
pub use session::{SessionContext, SessionEvent, SessionOrchestrator};
pub use signaling::{CallSignalingService, IncomingCallListener};
