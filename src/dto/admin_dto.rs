use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::question::Question;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateExamPayload {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub scheduled_time: DateTime<Utc>,
    #[validate(range(min = 1, max = 1440))]
    pub duration_minutes: i32,
    pub questions: Option<Vec<Question>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddWhitelistPayload {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityLogQuery {
    pub aggregate: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideResponse {
    pub overridden: bool,
    pub user_id: String,
    pub exam_id: uuid::Uuid,
    pub rewhitelisted: bool,
}

/// Latest webcam frame of an examinee whose exam is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub session_id: String,
    pub user_id: String,
    pub user_email: Option<String>,
    pub exam_id: uuid::Uuid,
    pub exam_name: String,
    pub snapshot_data_uri: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamParticipant {
    pub user_id: String,
    pub user_email: Option<String>,
    pub first_started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExamHistoryEntry {
    #[serde(flatten)]
    pub exam: crate::models::scheduled_exam::ScheduledExam,
    pub participant_count: usize,
    pub participants: Vec<ExamParticipant>,
}
