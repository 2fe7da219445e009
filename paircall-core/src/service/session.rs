//! Per-call session orchestration
//!
//! One orchestrator instance per call. It acquires the join credential,
//! enters the media room, tracks elapsed time, drives the recording
//! pipeline, and on termination persists exactly one history entry.
//! All per-call state lives here; concurrent calls cannot interfere.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{CallConfig, RecordingConfig};
use crate::models::{CallId, RecordingArtifact, RecordingMetadata, SessionHistoryEntry, UserId};
use crate::service::history::HistoryService;
use crate::service::recording::{MediaSource, RecordingPipeline};
use crate::service::room_name::room_name;
use crate::service::signaling::CallSignalingService;
use crate::storage::ObjectStorage;
use crate::store::DocumentStore;
use crate::transport::{MediaTransport, RoomConnection, TransportEvent};
use crate::{Error, Result};

/// Typed events emitted by a session to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The call ended; exactly one per session.
    Ended { duration_seconds: u64 },
    /// Recording finalization failed during termination. The history
    /// entry is still written.
    RecordingFailed { reason: String },
}

/// Shared collaborators handed to each session.
#[derive(Clone)]
pub struct SessionContext {
    pub store: Arc<dyn DocumentStore>,
    pub transport: Arc<dyn MediaTransport>,
    pub signaling: CallSignalingService,
    pub storage: Arc<dyn ObjectStorage>,
    pub call: CallConfig,
    pub recording: RecordingConfig,
}

pub struct SessionOrchestrator {
    call_id: CallId,
    room_id: String,
    local_id: UserId,
    partner_id: UserId,
    partner_name: String,
    signaling: CallSignalingService,
    transport: Arc<dyn MediaTransport>,
    history: HistoryService,
    recording: RecordingPipeline,
    fee_per_minute: i64,
    started_at: Instant,
    elapsed_tx: watch::Sender<u64>,
    events_tx: broadcast::Sender<SessionEvent>,
    terminated: tokio::sync::Mutex<bool>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for SessionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOrchestrator")
            .field("call_id", &self.call_id)
            .field("room_id", &self.room_id)
            .finish()
    }
}

impl SessionOrchestrator {
    /// Join the call's media room and start tracking the session.
    ///
    /// Fails with `CredentialAcquisition` when the credential cannot be
    /// obtained or the room cannot be joined; nothing is left half-joined
    /// in that case.
    pub async fn start(
        ctx: &SessionContext,
        call_id: CallId,
        local_id: UserId,
        local_name: String,
        partner_id: UserId,
        partner_name: String,
    ) -> Result<Arc<Self>> {
        let room_id = room_name(local_id.as_str(), partner_id.as_str());

        let credential = ctx
            .transport
            .request_join_credential(&room_id, local_id.as_str(), &local_name)
            .await
            .map_err(fatal_setup_error)?;

        let connection = ctx
            .transport
            .join_room(&credential)
            .await
            .map_err(fatal_setup_error)?;

        let (elapsed_tx, _) = watch::channel(0u64);
        let (events_tx, _) = broadcast::channel(16);

        let orchestrator = Arc::new(Self {
            call_id,
            room_id,
            local_id,
            partner_id,
            partner_name,
            signaling: ctx.signaling.clone(),
            transport: ctx.transport.clone(),
            history: HistoryService::new(ctx.store.clone()),
            recording: RecordingPipeline::new(
                ctx.store.clone(),
                ctx.storage.clone(),
                ctx.recording.min_price,
            ),
            fee_per_minute: ctx.call.fee_per_minute,
            started_at: Instant::now(),
            elapsed_tx,
            events_tx,
            terminated: tokio::sync::Mutex::new(false),
            ticker: Mutex::new(None),
        });

        orchestrator.spawn_ticker();
        orchestrator.spawn_event_loop(connection);

        tracing::info!(
            call_id = %orchestrator.call_id,
            room_id = %orchestrator.room_id,
            local = %orchestrator.local_id,
            partner = %orchestrator.partner_id,
            "session started"
        );
        Ok(orchestrator)
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Watch channel carrying elapsed whole seconds, updated at ~1s
    /// granularity for display. The persisted duration is computed from
    /// the join instant instead, so tick drift never reaches history.
    pub fn elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed_tx.subscribe()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        *self.elapsed_tx.borrow()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    pub fn recording(&self) -> &RecordingPipeline {
        &self.recording
    }

    /// Begin recording the local media source for this call.
    pub fn start_recording(&self, source: Option<MediaSource>) -> Result<()> {
        self.recording.start(source)
    }

    /// Stop an in-progress recording mid-call and finalize it.
    pub async fn stop_recording(
        &self,
        title: Option<String>,
        price: Option<i64>,
    ) -> Result<RecordingArtifact> {
        let duration_seconds = self.started_at.elapsed().as_secs();
        self.recording
            .stop(self.recording_metadata(title, price, duration_seconds))
            .await
    }

    /// Local hang-up.
    pub async fn hang_up(&self) -> Result<()> {
        self.terminate("local hang-up").await
    }

    pub async fn is_terminated(&self) -> bool {
        *self.terminated.lock().await
    }

    fn spawn_ticker(&self) {
        let elapsed_tx = self.elapsed_tx.clone();
        let started_at = self.started_at;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                elapsed_tx.send_replace(started_at.elapsed().as_secs());
            }
        });
        *self.ticker.lock() = Some(handle);
    }

    fn spawn_event_loop(self: &Arc<Self>, mut connection: RoomConnection) {
        let orchestrator = Arc::clone(self);
        let mut session_events = self.events_tx.subscribe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = connection.next_event() => match event {
                        Some(TransportEvent::ParticipantLeft { identity })
                            if identity == orchestrator.partner_id.as_str() =>
                        {
                            let _ = orchestrator.terminate("remote disconnect").await;
                            break;
                        }
                        Some(TransportEvent::Disconnected) | None => {
                            let _ = orchestrator.terminate("transport disconnect").await;
                            break;
                        }
                        Some(event) => {
                            tracing::trace!(?event, "transport event");
                        }
                    },
                    result = session_events.recv() => match result {
                        Ok(SessionEvent::Ended { .. }) | Err(_) => break,
                        Ok(_) => {}
                    },
                }
            }
        });
    }

    /// Tear the session down. Idempotent: concurrent or repeated triggers
    /// (hang-up plus a transport disconnect callback) produce one history
    /// entry and one `Ended` event.
    async fn terminate(&self, reason: &str) -> Result<()> {
        let mut terminated = self.terminated.lock().await;
        if *terminated {
            return Ok(());
        }

        let duration_seconds = self.started_at.elapsed().as_secs();
        tracing::info!(
            call_id = %self.call_id,
            reason,
            duration_seconds,
            "terminating session"
        );

        // Recording finalization (upload included) must complete before
        // the history write.
        let mut recorded = false;
        if self.recording.is_recording() {
            match self
                .recording
                .stop(self.recording_metadata(None, None, duration_seconds))
                .await
            {
                Ok(artifact) => {
                    recorded = true;
                    tracing::info!(recording_id = %artifact.id, "recording finalized on hang-up");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "recording finalization failed; history is still written");
                    let _ = self.events_tx.send(SessionEvent::RecordingFailed {
                        reason: e.to_string(),
                    });
                }
            }
        }

        let entry = SessionHistoryEntry::new(
            self.local_id.clone(),
            self.partner_id.clone(),
            self.partner_name.clone(),
            duration_seconds,
            self.fee_for(duration_seconds),
            recorded,
        );
        self.history.record(&entry).await?;

        if let Err(e) = self.signaling.end_call(&self.call_id).await {
            tracing::warn!(call_id = %self.call_id, error = %e, "failed to end invite");
        }
        if let Err(e) = self
            .transport
            .leave_room(&self.room_id, self.local_id.as_str())
            .await
        {
            tracing::debug!(room_id = %self.room_id, error = %e, "failed to leave media room");
        }

        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
        let _ = self.events_tx.send(SessionEvent::Ended { duration_seconds });

        *terminated = true;
        Ok(())
    }

    fn recording_metadata(
        &self,
        title: Option<String>,
        price: Option<i64>,
        duration_seconds: u64,
    ) -> RecordingMetadata {
        RecordingMetadata {
            owner_id: self.local_id.clone(),
            partner_id: self.partner_id.clone(),
            partner_name: self.partner_name.clone(),
            title,
            price,
            duration_seconds,
        }
    }

    /// Fee for the call: per-started-minute rate.
    fn fee_for(&self, duration_seconds: u64) -> i64 {
        let minutes = duration_seconds.div_ceil(60);
        self.fee_per_minute.saturating_mul(minutes as i64)
    }
}

fn fatal_setup_error(e: Error) -> Error {
    match e {
        Error::CredentialAcquisition(_) => e,
        other => Error::CredentialAcquisition(other.to_string()),
    }
}
