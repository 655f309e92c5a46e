use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityType {
    TabSwitch,
    CopyPaste,
    AiWarning,
    ClassifierError,
    Disqualification,
    ExamStart,
    ExamSubmit,
    ManualOverride,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::TabSwitch => "tab-switch",
            ActivityType::CopyPaste => "copy-paste",
            ActivityType::AiWarning => "ai-warning",
            ActivityType::ClassifierError => "classifier-error",
            ActivityType::Disqualification => "disqualification",
            ActivityType::ExamStart => "exam-start",
            ActivityType::ExamSubmit => "exam-submit",
            ActivityType::ManualOverride => "manual-override",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLog {
    pub id: Uuid,
    pub session_id: Option<String>,
    pub user_id: String,
    pub user_email: Option<String>,
    pub exam_id: Uuid,
    pub activity_type: String,
    pub details: String,
    pub admin_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub session_id: Option<String>,
    pub user_id: String,
    pub user_email: Option<String>,
    pub exam_id: Uuid,
    pub activity_type: ActivityType,
    pub details: String,
    pub admin_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}
