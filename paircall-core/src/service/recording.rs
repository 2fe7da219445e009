//! Recording capture/upload pipeline
//!
//! Captures local media into timestamped chunks, assembles them into a
//! single artifact on stop, uploads it, and registers the artifact
//! metadata for later retrieval. One pipeline instance per call; the
//! media source is exclusively owned by the pipeline while recording.

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{RecordingArtifact, RecordingId, RecordingMetadata};
use crate::storage::ObjectStorage;
use crate::store::{collections, DocumentStore};
use crate::{Error, Result};

const ARTIFACT_CONTENT_TYPE: &str = "video/webm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Recording,
    Finalizing,
}

/// Handle to the local media source being captured. Opaque to the
/// pipeline; the transport layer owns the actual tracks.
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub track_id: String,
}

pub struct RecordingPipeline {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn ObjectStorage>,
    min_price: i64,
    state: Mutex<PipelineState>,
    chunks: Mutex<Vec<Bytes>>,
    source: Mutex<Option<MediaSource>>,
}

impl std::fmt::Debug for RecordingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingPipeline")
            .field("state", &self.state())
            .finish()
    }
}

impl RecordingPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn ObjectStorage>,
        min_price: i64,
    ) -> Self {
        Self {
            store,
            storage,
            min_price,
            state: Mutex::new(PipelineState::Idle),
            chunks: Mutex::new(Vec::new()),
            source: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == PipelineState::Recording
    }

    /// Number of buffered chunks (retained across a failed upload).
    pub fn buffered_chunks(&self) -> usize {
        self.chunks.lock().len()
    }

    /// Begin capturing from `source`.
    ///
    /// `NoMediaSource` when no local stream is available;
    /// `AlreadyRecording` (state unchanged) when a capture is active.
    pub fn start(&self, source: Option<MediaSource>) -> Result<()> {
        let source = source.ok_or(Error::NoMediaSource)?;

        let mut state = self.state.lock();
        if *state != PipelineState::Idle {
            return Err(Error::AlreadyRecording);
        }
        *state = PipelineState::Recording;
        drop(state);

        self.chunks.lock().clear();
        *self.source.lock() = Some(source.clone());

        tracing::info!(track_id = %source.track_id, "recording started");
        Ok(())
    }

    /// Append a produced chunk in capture order. Zero-length chunks are
    /// discarded; chunks arriving outside `recording` (e.g. a flush
    /// racing a stop) are dropped.
    pub fn push_chunk(&self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        if self.state() != PipelineState::Recording {
            tracing::trace!(size = chunk.len(), "dropping chunk outside recording state");
            return;
        }
        self.chunks.lock().push(chunk);
    }

    /// Stop capturing, assemble the buffered chunks into one artifact,
    /// upload it, and register the artifact metadata.
    ///
    /// On upload failure the buffered chunks are retained for
    /// [`retry_upload`](Self::retry_upload); no automatic retry happens.
    pub async fn stop(&self, metadata: RecordingMetadata) -> Result<RecordingArtifact> {
        {
            let mut state = self.state.lock();
            if *state != PipelineState::Recording {
                return Err(Error::InvalidInput(
                    "no active recording to stop".to_string(),
                ));
            }
            *state = PipelineState::Finalizing;
        }

        // The media source is released as soon as capture ends.
        *self.source.lock() = None;

        self.finalize(metadata).await
    }

    /// Re-attempt assembly and upload of the retained chunk buffer after
    /// a failed `stop`.
    pub async fn retry_upload(&self, metadata: RecordingMetadata) -> Result<RecordingArtifact> {
        {
            let mut state = self.state.lock();
            if *state != PipelineState::Idle {
                return Err(Error::InvalidInput(
                    "pipeline is busy, cannot retry upload".to_string(),
                ));
            }
            *state = PipelineState::Finalizing;
        }

        self.finalize(metadata).await
    }

    /// Drop the retained chunk buffer after a failed upload.
    pub fn discard_buffered(&self) {
        let dropped = {
            let mut chunks = self.chunks.lock();
            let n = chunks.len();
            chunks.clear();
            n
        };
        if dropped > 0 {
            tracing::info!(chunks = dropped, "buffered recording chunks discarded");
        }
    }

    async fn finalize(&self, metadata: RecordingMetadata) -> Result<RecordingArtifact> {
        // Snapshot the buffer; it is only cleared once the artifact is
        // fully registered.
        let chunks: Vec<Bytes> = self.chunks.lock().clone();
        let mut assembled = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in &chunks {
            assembled.extend_from_slice(chunk);
        }
        let payload = assembled.freeze();

        let recording_id = RecordingId::new();
        let key = format!("{}/{}", metadata.owner_id, recording_id);

        let uploaded = match self
            .storage
            .upload(&key, payload.clone(), ARTIFACT_CONTENT_TYPE)
            .await
        {
            Ok(uploaded) => uploaded,
            Err(e) => {
                *self.state.lock() = PipelineState::Idle;
                tracing::warn!(
                    error = %e,
                    buffered = chunks.len(),
                    "artifact upload failed; chunks retained for manual retry"
                );
                return Err(Error::Upload(e.to_string()));
            }
        };

        let artifact = RecordingArtifact {
            id: recording_id,
            owner_id: metadata.owner_id.clone(),
            partner_id: metadata.partner_id.clone(),
            partner_name: metadata.partner_name.clone(),
            title: metadata.resolved_title(),
            duration_seconds: metadata.duration_seconds,
            created_at: chrono::Utc::now(),
            views: 0,
            earnings: 0,
            published: false,
            price: metadata.price.unwrap_or(self.min_price).max(self.min_price),
            thumbnail_ref: uploaded.thumbnail_ref,
            storage_ref: uploaded.storage_ref,
        };

        if let Err(e) = self
            .store
            .insert(collections::RECORDINGS, serde_json::to_value(&artifact)?)
            .await
        {
            // Uploaded but not registered: keep the buffer so the caller
            // can retry the whole finalization.
            *self.state.lock() = PipelineState::Idle;
            tracing::warn!(error = %e, "artifact registration failed; chunks retained");
            return Err(e);
        }

        self.chunks.lock().clear();
        *self.state.lock() = PipelineState::Idle;

        tracing::info!(
            recording_id = %artifact.id,
            title = %artifact.title,
            size = payload.len(),
            duration_seconds = artifact.duration_seconds,
            "recording finalized"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use crate::storage::UploadedArtifact;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct CapturingStorage {
        uploads: Mutex<Vec<Bytes>>,
    }

    #[async_trait]
    impl ObjectStorage for CapturingStorage {
        async fn upload(
            &self,
            key: &str,
            data: Bytes,
            _content_type: &str,
        ) -> Result<UploadedArtifact> {
            self.uploads.lock().push(data);
            Ok(UploadedArtifact {
                storage_ref: format!("mem://{key}"),
                thumbnail_ref: None,
            })
        }
    }

    struct FailingStorage;

    #[async_trait]
    impl ObjectStorage for FailingStorage {
        async fn upload(&self, _: &str, _: Bytes, _: &str) -> Result<UploadedArtifact> {
            Err(Error::Upload("bucket unreachable".to_string()))
        }
    }

    fn metadata() -> RecordingMetadata {
        RecordingMetadata {
            owner_id: UserId::from("u1"),
            partner_id: UserId::from("u2"),
            partner_name: "Bob".to_string(),
            title: None,
            price: None,
            duration_seconds: 42,
        }
    }

    fn source() -> Option<MediaSource> {
        Some(MediaSource {
            track_id: "track-1".to_string(),
        })
    }

    #[tokio::test]
    async fn test_chunks_assembled_in_capture_order() {
        let storage = Arc::new(CapturingStorage {
            uploads: Mutex::new(Vec::new()),
        });
        let pipeline = RecordingPipeline::new(Arc::new(MemoryStore::new()), storage.clone(), 0);

        pipeline.start(source()).unwrap();
        pipeline.push_chunk(Bytes::from_static(b"aa"));
        pipeline.push_chunk(Bytes::from_static(b""));
        pipeline.push_chunk(Bytes::from_static(b"bb"));
        pipeline.push_chunk(Bytes::from_static(b"cc"));
        assert_eq!(pipeline.buffered_chunks(), 3);

        let artifact = pipeline.stop(metadata()).await.unwrap();

        let uploads = storage.uploads.lock();
        assert_eq!(uploads.len(), 1);
        assert_eq!(&uploads[0][..], b"aabbcc");
        assert_eq!(artifact.title, "Session with Bob");
        assert_eq!(artifact.duration_seconds, 42);
        assert!(!artifact.published);
        assert_eq!(artifact.views, 0);
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.buffered_chunks(), 0);
    }

    #[tokio::test]
    async fn test_artifact_registered_in_store() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = RecordingPipeline::new(
            store.clone(),
            Arc::new(CapturingStorage {
                uploads: Mutex::new(Vec::new()),
            }),
            0,
        );

        pipeline.start(source()).unwrap();
        pipeline.push_chunk(Bytes::from_static(b"xy"));
        let artifact = pipeline.stop(metadata()).await.unwrap();

        let doc = store
            .get(collections::RECORDINGS, artifact.id.as_str())
            .await
            .unwrap()
            .expect("artifact registered");
        assert_eq!(doc["title"], "Session with Bob");
    }

    #[tokio::test]
    async fn test_start_without_source() {
        let pipeline = RecordingPipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FailingStorage),
            0,
        );
        let err = pipeline.start(None).unwrap_err();
        assert!(matches!(err, Error::NoMediaSource));
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_double_start_reports_already_recording() {
        let pipeline = RecordingPipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FailingStorage),
            0,
        );
        pipeline.start(source()).unwrap();
        let err = pipeline.start(source()).unwrap_err();
        assert!(matches!(err, Error::AlreadyRecording));
        assert_eq!(pipeline.state(), PipelineState::Recording);
    }

    #[tokio::test]
    async fn test_upload_failure_retains_chunks() {
        let pipeline = RecordingPipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FailingStorage),
            0,
        );
        pipeline.start(source()).unwrap();
        pipeline.push_chunk(Bytes::from_static(b"data"));

        let err = pipeline.stop(metadata()).await.unwrap_err();
        assert!(matches!(err, Error::Upload(_)));
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert_eq!(pipeline.buffered_chunks(), 1);

        pipeline.discard_buffered();
        assert_eq!(pipeline.buffered_chunks(), 0);
    }

    #[tokio::test]
    async fn test_retry_upload_after_failure() {
        let store = Arc::new(MemoryStore::new());
        let failing = RecordingPipeline::new(store.clone(), Arc::new(FailingStorage), 0);
        failing.start(source()).unwrap();
        failing.push_chunk(Bytes::from_static(b"data"));
        failing.stop(metadata()).await.unwrap_err();

        // Retrying against the same pipeline with working storage is not
        // possible here, so assert the retry path guards and re-runs.
        let err = failing.retry_upload(metadata()).await.unwrap_err();
        assert!(matches!(err, Error::Upload(_)));
        assert_eq!(failing.buffered_chunks(), 1);
    }

    #[tokio::test]
    async fn test_stop_with_no_chunks_uploads_empty_artifact() {
        let storage = Arc::new(CapturingStorage {
            uploads: Mutex::new(Vec::new()),
        });
        let pipeline = RecordingPipeline::new(Arc::new(MemoryStore::new()), storage.clone(), 0);

        pipeline.start(source()).unwrap();
        let artifact = pipeline.stop(metadata()).await.unwrap();

        assert!(storage.uploads.lock()[0].is_empty());
        assert_eq!(artifact.title, "Session with Bob");
    }

    #[tokio::test]
    async fn test_stop_while_idle_rejected() {
        let pipeline = RecordingPipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FailingStorage),
            0,
        );
        let err = pipeline.stop(metadata()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_price_floor_applied() {
        let pipeline = RecordingPipeline::new(
            Arc::new(MemoryStore::new()),
            Arc::new(CapturingStorage {
                uploads: Mutex::new(Vec::new()),
            }),
            500,
        );

        pipeline.start(source()).unwrap();
        let mut meta = metadata();
        meta.price = Some(100);
        let artifact = pipeline.stop(meta).await.unwrap();
        assert_eq!(artifact.price, 500);

        // Absent price also lands on the floor.
        pipeline.start(source()).unwrap();
        let artifact = pipeline.stop(metadata()).await.unwrap();
        assert_eq!(artifact.price, 500);
    }
}
