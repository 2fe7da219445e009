//! Call signaling service
//!
//! Owns the call-invite state machine. Invites are only ever mutated
//! through the transition operations here, so the two participants cannot
//! race each other with direct field writes.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::models::{CallId, CallInvite, CallStatus, UserId};
use crate::service::room_name::{room_name, validate_identity};
use crate::store::{collections, ChangeEvent, DocumentStore};
use crate::{Error, Result};

/// Callback invoked once per newly observed incoming invite. Errors are
/// logged and never terminate the subscription.
pub type OnInvite = dyn Fn(CallInvite) -> Result<()> + Send + Sync;

/// Cancellation handle for a live incoming-call subscription.
///
/// After `unsubscribe` returns, the callback is never invoked again;
/// notifications already in flight are dropped.
pub struct IncomingCallListener {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl IncomingCallListener {
    pub fn unsubscribe(self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

impl Drop for IncomingCallListener {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.handle.abort();
    }
}

#[derive(Clone)]
pub struct CallSignalingService {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for CallSignalingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallSignalingService").finish()
    }
}

impl CallSignalingService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Create a `ringing` invite from caller to callee and persist it.
    /// Returns the invite id and the deterministic room id both parties
    /// will rendezvous in.
    pub async fn create_call(
        &self,
        caller_id: &UserId,
        caller_name: &str,
        callee_id: &UserId,
        callee_name: &str,
    ) -> Result<(CallId, String)> {
        validate_identity(caller_id.as_str())?;
        validate_identity(callee_id.as_str())?;
        if caller_id == callee_id {
            return Err(Error::InvalidInput(
                "caller and callee must be distinct".to_string(),
            ));
        }

        let room_id = room_name(caller_id.as_str(), callee_id.as_str());
        let invite = CallInvite::new(
            room_id.clone(),
            caller_id.clone(),
            caller_name.to_string(),
            callee_id.clone(),
            callee_name.to_string(),
        );
        let call_id = invite.id.clone();

        self.store
            .insert(collections::CALLS, serde_json::to_value(&invite)?)
            .await
            .map_err(|e| match e {
                Error::NotFound(_) | Error::Persistence(_) | Error::Internal(_) => {
                    Error::Persistence(format!("failed to persist invite: {e}"))
                }
                other => other,
            })?;

        tracing::info!(call_id = %call_id, room_id = %room_id, caller = %caller_id, callee = %callee_id, "call created");
        Ok((call_id, room_id))
    }

    /// Live subscription to incoming invites for `user_id`.
    ///
    /// Fires `on_invite` once per invite that is `ringing` with this user
    /// as callee: invites already ringing when the listener starts, then
    /// every new one as the store reports it, deduplicated by call id.
    pub fn listen_incoming<F>(&self, user_id: UserId, on_invite: F) -> IncomingCallListener
    where
        F: Fn(CallInvite) -> Result<()> + Send + Sync + 'static,
    {
        // Subscribe before the initial replay so nothing slips between.
        let mut rx = self.store.subscribe(collections::CALLS);
        let store = self.store.clone();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let callback: Arc<OnInvite> = Arc::new(on_invite);

        let handle = tokio::spawn(async move {
            let mut seen: HashSet<String> = HashSet::new();

            match store.list(collections::CALLS).await {
                Ok(docs) => {
                    for doc in docs {
                        deliver(&doc, &user_id, &mut seen, &flag, callback.as_ref());
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to replay existing invites");
                }
            }

            loop {
                if flag.load(Ordering::SeqCst) {
                    break;
                }
                match rx.recv().await {
                    Ok(ChangeEvent::Added { doc, .. }) => {
                        deliver(&doc, &user_id, &mut seen, &flag, callback.as_ref());
                    }
                    // Status changes only ever move an invite off
                    // `ringing`; nothing new to deliver.
                    Ok(ChangeEvent::Modified { .. }) => {}
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "incoming-call listener lagged, resyncing");
                        if let Ok(docs) = store.list(collections::CALLS).await {
                            for doc in docs {
                                deliver(&doc, &user_id, &mut seen, &flag, callback.as_ref());
                            }
                        }
                    }
                }
            }
        });

        IncomingCallListener { cancelled, handle }
    }

    /// Move a ringing invite to `accepted`.
    ///
    /// A missing invite or an invite that already left `ringing` is
    /// reported as `InvalidTransition`; the invite is left unchanged.
    pub async fn accept_call(&self, call_id: &CallId) -> Result<CallInvite> {
        self.transition(call_id, CallStatus::Accepted).await
    }

    /// Move an invite to `ended`. Idempotent: ending an already-ended
    /// invite is a no-op success.
    pub async fn end_call(&self, call_id: &CallId) -> Result<CallInvite> {
        self.transition(call_id, CallStatus::Ended).await
    }

    /// Fetch an invite by id.
    pub async fn get_call(&self, call_id: &CallId) -> Result<CallInvite> {
        let doc = self
            .store
            .get(collections::CALLS, call_id.as_str())
            .await?
            .ok_or_else(|| Error::NotFound(format!("call {call_id}")))?;
        Ok(serde_json::from_value(doc)?)
    }

    async fn transition(&self, call_id: &CallId, next: CallStatus) -> Result<CallInvite> {
        let doc = self
            .store
            .get(collections::CALLS, call_id.as_str())
            .await?
            .ok_or_else(|| {
                Error::InvalidTransition(format!("call {call_id} no longer exists"))
            })?;
        let mut invite: CallInvite = serde_json::from_value(doc)?;

        if next == CallStatus::Ended && invite.status == CallStatus::Ended {
            return Ok(invite);
        }

        if !invite.status.can_transition_to(next) {
            return Err(Error::InvalidTransition(format!(
                "call {call_id}: {} -> {next}",
                invite.status
            )));
        }

        let updated_at = chrono::Utc::now();
        self.store
            .update(
                collections::CALLS,
                call_id.as_str(),
                json!({ "status": next, "updated_at": updated_at }),
            )
            .await?;

        invite.status = next;
        invite.updated_at = updated_at;
        tracing::info!(call_id = %call_id, status = %next, "call transitioned");
        Ok(invite)
    }
}

fn deliver(
    doc: &JsonValue,
    user_id: &UserId,
    seen: &mut HashSet<String>,
    cancelled: &AtomicBool,
    callback: &OnInvite,
) {
    let invite: CallInvite = match serde_json::from_value(doc.clone()) {
        Ok(invite) => invite,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring malformed invite document");
            return;
        }
    };

    if invite.callee_id != *user_id || !invite.status.is_ringing() {
        return;
    }
    if !seen.insert(invite.id.as_str().to_string()) {
        return;
    }
    if cancelled.load(Ordering::SeqCst) {
        return;
    }

    let call_id = invite.id.clone();
    if let Err(e) = callback(invite) {
        tracing::warn!(call_id = %call_id, error = %e, "incoming-call callback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_helpers::with_timeout;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn service() -> CallSignalingService {
        CallSignalingService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_call_room_id() {
        let service = service();
        let (_, room_id) = service
            .create_call(&UserId::from("u2"), "Bob", &UserId::from("u1"), "Alice")
            .await
            .unwrap();
        assert_eq!(room_id, "u1_u2");
    }

    #[tokio::test]
    async fn test_create_call_rejects_self_call() {
        let service = service();
        let err = service
            .create_call(&UserId::from("u1"), "Alice", &UserId::from("u1"), "Alice")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_accept_then_end() {
        let service = service();
        let (call_id, _) = service
            .create_call(&UserId::from("u1"), "Alice", &UserId::from("u2"), "Bob")
            .await
            .unwrap();

        let invite = service.accept_call(&call_id).await.unwrap();
        assert_eq!(invite.status, CallStatus::Accepted);

        let invite = service.end_call(&call_id).await.unwrap();
        assert_eq!(invite.status, CallStatus::Ended);
    }

    #[tokio::test]
    async fn test_accept_after_end_reports_invalid_transition() {
        let service = service();
        let (call_id, _) = service
            .create_call(&UserId::from("u1"), "Alice", &UserId::from("u2"), "Bob")
            .await
            .unwrap();

        service.end_call(&call_id).await.unwrap();
        let err = service.accept_call(&call_id).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));

        // Invite unchanged by the rejected transition.
        let invite = service.get_call(&call_id).await.unwrap();
        assert_eq!(invite.status, CallStatus::Ended);
    }

    #[tokio::test]
    async fn test_accept_missing_call_reports_invalid_transition() {
        let service = service();
        let err = service.accept_call(&CallId::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_end_call_is_idempotent() {
        let service = service();
        let (call_id, _) = service
            .create_call(&UserId::from("u1"), "Alice", &UserId::from("u2"), "Bob")
            .await
            .unwrap();

        let first = service.end_call(&call_id).await.unwrap();
        let second = service.end_call(&call_id).await.unwrap();
        assert_eq!(first.status, CallStatus::Ended);
        assert_eq!(second.status, CallStatus::Ended);
    }

    #[tokio::test]
    async fn test_listener_receives_new_invite_once() {
        let service = service();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let listener = service.listen_incoming(UserId::from("u2"), move |invite| {
            tx.send(invite)
                .map_err(|e| Error::Internal(e.to_string()))
        });

        let (call_id, _) = service
            .create_call(&UserId::from("u1"), "Alice", &UserId::from("u2"), "Bob")
            .await
            .unwrap();

        let invite = with_timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("invite delivered");
        assert_eq!(invite.id, call_id);
        assert_eq!(invite.status, CallStatus::Ringing);

        // Accepting mutates the document; no second delivery.
        service.accept_call(&call_id).await.unwrap();
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        listener.unsubscribe();
    }

    #[tokio::test]
    async fn test_listener_replays_already_ringing_invites() {
        let service = service();
        let (call_id, _) = service
            .create_call(&UserId::from("u1"), "Alice", &UserId::from("u2"), "Bob")
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let listener = service.listen_incoming(UserId::from("u2"), move |invite| {
            tx.send(invite)
                .map_err(|e| Error::Internal(e.to_string()))
        });

        let invite = with_timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("replayed invite");
        assert_eq!(invite.id, call_id);

        listener.unsubscribe();
    }

    #[tokio::test]
    async fn test_listener_ignores_other_callees() {
        let service = service();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let listener = service.listen_incoming(UserId::from("u3"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        service
            .create_call(&UserId::from("u1"), "Alice", &UserId::from("u2"), "Bob")
            .await
            .unwrap();

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        listener.unsubscribe();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_stops_delivery() {
        let service = service();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let listener = service.listen_incoming(UserId::from("u2"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        service
            .create_call(&UserId::from("u1"), "Alice", &UserId::from("u2"), "Bob")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        listener.unsubscribe();

        // Inject a matching event after unsubscribe; count must not move.
        service
            .create_call(&UserId::from("u4"), "Cara", &UserId::from("u2"), "Bob")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_callback_error_does_not_kill_subscription() {
        let service = service();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let listener = service.listen_incoming(UserId::from("u2"), move |invite| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(invite);
            if n == 0 {
                Err(Error::Internal("callback exploded".to_string()))
            } else {
                Ok(())
            }
        });

        service
            .create_call(&UserId::from("u1"), "Alice", &UserId::from("u2"), "Bob")
            .await
            .unwrap();
        with_timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("first invite");

        // The failed callback must not have torn the listener down.
        service
            .create_call(&UserId::from("u3"), "Cara", &UserId::from("u2"), "Bob")
            .await
            .unwrap();
        with_timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("second invite");
        assert_eq!(count.load(Ordering::SeqCst), 2);

        listener.unsubscribe();
    }
}
