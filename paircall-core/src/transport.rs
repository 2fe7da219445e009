//! Media transport collaborator interface
//!
//! The actual audio/video stack lives outside this crate. The orchestrator
//! consumes it through this seam: request a join credential for a room,
//! join, and react to typed connection events.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::service::JoinCredentialService;
use crate::{Error, Result};

/// Events surfaced by a live room connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ParticipantJoined { identity: String },
    ParticipantLeft { identity: String },
    /// Transport-level disconnect of the local participant.
    Disconnected,
}

/// Short-lived authorization to enter a media room.
#[derive(Debug, Clone)]
pub struct JoinCredential {
    pub token: String,
    pub room_id: String,
    pub identity: String,
    pub display_name: String,
}

/// Live connection to a media room. Events arrive in the order the
/// transport reports them.
#[derive(Debug)]
pub struct RoomConnection {
    room_id: String,
    identity: String,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl RoomConnection {
    pub fn new(
        room_id: String,
        identity: String,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self {
            room_id,
            identity,
            events,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Next transport event; `None` once the transport closes the feed.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Acquire a join credential for (room, identity, name). Failure is
    /// fatal to call setup.
    async fn request_join_credential(
        &self,
        room_id: &str,
        identity: &str,
        display_name: &str,
    ) -> Result<JoinCredential>;

    /// Enter the room the credential grants.
    async fn join_room(&self, credential: &JoinCredential) -> Result<RoomConnection>;

    /// Leave a previously joined room. Best-effort; idempotent.
    async fn leave_room(&self, room_id: &str, identity: &str) -> Result<()>;
}

type RoomMembers = Vec<(String, mpsc::UnboundedSender<TransportEvent>)>;

/// In-process transport that mints its own credentials and relays
/// join/leave events between participants of a room. Stands in for the
/// managed transport in single-node deployments and tests.
pub struct TokenMediaTransport {
    credentials: JoinCredentialService,
    rooms: DashMap<String, RoomMembers>,
}

impl TokenMediaTransport {
    pub fn new(credentials: JoinCredentialService) -> Arc<Self> {
        Arc::new(Self {
            credentials,
            rooms: DashMap::new(),
        })
    }
}

#[async_trait]
impl MediaTransport for TokenMediaTransport {
    async fn request_join_credential(
        &self,
        room_id: &str,
        identity: &str,
        display_name: &str,
    ) -> Result<JoinCredential> {
        let token = self.credentials.mint(room_id, identity, display_name)?;
        Ok(JoinCredential {
            token,
            room_id: room_id.to_string(),
            identity: identity.to_string(),
            display_name: display_name.to_string(),
        })
    }

    async fn join_room(&self, credential: &JoinCredential) -> Result<RoomConnection> {
        let claims = self.credentials.verify(&credential.token)?;
        if claims.room != credential.room_id || claims.sub != credential.identity {
            return Err(Error::CredentialAcquisition(
                "join token does not match the requested room".to_string(),
            ));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut members = self.rooms.entry(credential.room_id.clone()).or_default();

        // Tell existing members about the newcomer.
        for (_, sender) in members.iter() {
            let _ = sender.send(TransportEvent::ParticipantJoined {
                identity: credential.identity.clone(),
            });
        }
        // Tell the newcomer who is already there.
        for (identity, _) in members.iter() {
            let _ = tx.send(TransportEvent::ParticipantJoined {
                identity: identity.clone(),
            });
        }

        members.push((credential.identity.clone(), tx));
        drop(members);

        tracing::debug!(room_id = %credential.room_id, identity = %credential.identity, "joined room");

        Ok(RoomConnection::new(
            credential.room_id.clone(),
            credential.identity.clone(),
            rx,
        ))
    }

    async fn leave_room(&self, room_id: &str, identity: &str) -> Result<()> {
        if let Some(mut members) = self.rooms.get_mut(room_id) {
            members.retain(|(member, _)| member != identity);
            for (_, sender) in members.iter() {
                let _ = sender.send(TransportEvent::ParticipantLeft {
                    identity: identity.to_string(),
                });
            }
            tracing::debug!(room_id, identity, "left room");
        }
        Ok(())
    }
}
