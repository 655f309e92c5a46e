use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::exam_session::{Score, SessionState};
use crate::models::question::Question;
use crate::models::scheduled_exam::ScheduledExam;
use crate::models::violation::ViolationType;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            question: q.question.clone(),
            options: q.options.clone(),
            image: q.image.clone(),
        }
    }
}

/// Exam listing entry for examinees. Questions stay server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSummary {
    pub id: uuid::Uuid,
    pub name: String,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
}

impl From<&ScheduledExam> for ExamSummary {
    fn from(e: &ScheduledExam) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            scheduled_time: e.scheduled_time,
            duration_minutes: e.duration_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub exam_id: uuid::Uuid,
    pub state: SessionState,
    pub started_at: Option<DateTime<Utc>>,
    pub time_remaining_seconds: u32,
    pub total_time_spent_seconds: u32,
    pub violation_count: u32,
    pub max_violations: u32,
    pub disqualification_reason: Option<String>,
    pub current_question_index: usize,
    pub score: Option<Score>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionResponse {
    pub session: SessionSnapshot,
    pub questions: Vec<PublicQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SignalRequest {
    #[serde(rename = "type")]
    pub signal_type: ViolationType,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(min = 1))]
    pub question_id: String,
    pub selected_answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub saved: bool,
    pub current_question_index: usize,
}
