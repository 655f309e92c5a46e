use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use crate::dto::admin_dto::LiveSnapshot;
use crate::error::{Error, Result};
use crate::models::exam_session::SessionState;
use crate::session::camera::SnapshotCamera;
use crate::session::runner::SessionRunner;

#[derive(Clone)]
pub struct ActiveSession {
    pub runner: Arc<SessionRunner>,
    pub camera: Arc<SnapshotCamera>,
    pub exam_name: String,
    pub admin_id: Option<String>,
}

/// Live sessions keyed by `user:exam`.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, ActiveSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<ActiveSession> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Stores `session`, returning whatever it displaced.
    pub async fn insert(&self, session_id: String, session: ActiveSession) -> Option<ActiveSession> {
        self.sessions.write().await.insert(session_id, session)
    }

    /// Stores `session` unless the slot holds a session that is starting or running.
    /// The check and the insert happen under one write lock, so concurrent starts
    /// for the same slot cannot both succeed. Returns the finished session it replaced.
    pub async fn insert_if_startable(
        &self,
        session_id: String,
        session: ActiveSession,
    ) -> Result<Option<ActiveSession>> {
        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(&session_id) {
            if !existing.runner.state().await.is_terminal() {
                return Err(Error::Conflict("An exam session is already in progress".to_string()));
            }
        }
        Ok(sessions.insert(session_id, session))
    }

    pub async fn remove(&self, session_id: &str) -> Option<ActiveSession> {
        self.sessions.write().await.remove(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Latest frames of running sessions on exams owned by `admin_id`.
    pub async fn live_snapshots(&self, admin_id: &str) -> Vec<LiveSnapshot> {
        let entries: Vec<(String, ActiveSession)> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(_, v)| v.admin_id.as_deref() == Some(admin_id))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut out = Vec::new();
        for (session_id, active) in entries {
            let session = active.runner.session().await;
            if session.state != SessionState::InProgress {
                continue;
            }
            let Some((frame, updated_at)) = active.camera.latest_frame() else {
                continue;
            };
            out.push(LiveSnapshot {
                session_id,
                user_id: session.user_id,
                user_email: session.user_email,
                exam_id: session.exam_id,
                exam_name: active.exam_name.clone(),
                snapshot_data_uri: frame.to_data_uri(),
                updated_at,
            });
        }
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        out
    }

    /// Drops sessions that ended more than `older_than` ago.
    pub async fn prune_finished(&self, older_than: Duration) -> usize {
        let cutoff = Utc::now() - older_than;
        let entries: Vec<(String, ActiveSession)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut stale = Vec::new();
        for (key, session) in entries {
            if matches!(session.runner.ended_at().await, Some(ended) if ended <= cutoff) {
                stale.push(key);
            }
        }

        if stale.is_empty() {
            return 0;
        }
        let mut sessions = self.sessions.write().await;
        for key in &stale {
            sessions.remove(key);
        }
        tracing::debug!(pruned = stale.len(), "Pruned finished exam sessions");
        stale.len()
    }
}
