use std::sync::Mutex;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,
    #[error("camera stream has been released")]
    Released,
    #[error("no frame received yet")]
    NoFrame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraStream {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub mime_type: String,
    pub data: Bytes,
}

impl Frame {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, BASE64.encode(&self.data))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Camera: Send + Sync {
    async fn acquire(&self) -> Result<CameraStream, CameraError>;
    async fn capture_frame(&self, stream: &CameraStream) -> Result<Frame, CameraError>;
    async fn release(&self, stream: CameraStream);
}

#[derive(Default)]
struct RelayState {
    denied: bool,
    stream: Option<Uuid>,
    latest: Option<(Frame, DateTime<Utc>)>,
}

/// Camera fed by still frames that the examinee's browser uploads.
#[derive(Default)]
pub struct SnapshotCamera {
    state: Mutex<RelayState>,
}

impl SnapshotCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_frame(&self, frame: Frame) -> Result<(), CameraError> {
        let mut state = self.state.lock().expect("camera mutex poisoned");
        if state.denied {
            return Err(CameraError::PermissionDenied);
        }
        if state.stream.is_none() {
            return Err(CameraError::Released);
        }
        state.latest = Some((frame, Utc::now()));
        Ok(())
    }

    /// Most recent frame and when it arrived. Cleared when the stream is released.
    pub fn latest_frame(&self) -> Option<(Frame, DateTime<Utc>)> {
        self.state.lock().expect("camera mutex poisoned").latest.clone()
    }

    /// Browser reported that webcam permission was refused or revoked.
    pub fn deny(&self) {
        let mut state = self.state.lock().expect("camera mutex poisoned");
        state.denied = true;
        state.latest = None;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().expect("camera mutex poisoned").stream.is_some()
    }
}

#[async_trait]
impl Camera for SnapshotCamera {
    async fn acquire(&self) -> Result<CameraStream, CameraError> {
        let mut state = self.state.lock().expect("camera mutex poisoned");
        if state.denied {
            return Err(CameraError::PermissionDenied);
        }
        let id = Uuid::new_v4();
        state.stream = Some(id);
        state.latest = None;
        Ok(CameraStream { id })
    }

    async fn capture_frame(&self, stream: &CameraStream) -> Result<Frame, CameraError> {
        let state = self.state.lock().expect("camera mutex poisoned");
        if state.denied {
            return Err(CameraError::PermissionDenied);
        }
        if state.stream != Some(stream.id) {
            return Err(CameraError::Released);
        }
        state
            .latest
            .as_ref()
            .map(|(frame, _)| frame.clone())
            .ok_or(CameraError::NoFrame)
    }

    async fn release(&self, stream: CameraStream) {
        let mut state = self.state.lock().expect("camera mutex poisoned");
        if state.stream == Some(stream.id) {
            state.stream = None;
            state.latest = None;
        }
    }
}
