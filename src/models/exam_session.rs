use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::answer::Answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Disqualified,
    Submitted,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Disqualified | SessionState::Submitted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "not_started",
            SessionState::InProgress => "in_progress",
            SessionState::Disqualified => "disqualified",
            SessionState::Submitted => "submitted",
        }
    }
}

/// One user's attempt at one exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSession {
    pub session_id: String,
    pub exam_id: Uuid,
    pub user_id: String,
    pub user_email: Option<String>,
    pub state: SessionState,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub time_remaining_seconds: u32,
    pub total_time_spent_seconds: u32,
    pub violation_count: u32,
    pub disqualification_reason: Option<String>,
    pub current_question_index: usize,
    pub answers: Vec<Answer>,
    pub score: Option<Score>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
}

impl ExamSession {
    pub fn new(exam_id: Uuid, user_id: impl Into<String>, user_email: Option<String>) -> Self {
        let user_id = user_id.into();
        Self {
            session_id: session_id_for(&user_id, exam_id),
            exam_id,
            user_id,
            user_email,
            state: SessionState::NotStarted,
            started_at: None,
            ended_at: None,
            time_remaining_seconds: 0,
            total_time_spent_seconds: 0,
            violation_count: 0,
            disqualification_reason: None,
            current_question_index: 0,
            answers: Vec::new(),
            score: None,
        }
    }
}

pub fn session_id_for(user_id: &str, exam_id: Uuid) -> String {
    format!("{}:{}", user_id, exam_id)
}
