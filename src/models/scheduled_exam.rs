use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledExam {
    pub id: Uuid,
    pub name: String,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: Option<i32>,
    pub questions: Option<JsonValue>,
    pub admin_id: Option<String>,
    pub created_at: DateTime<Utc>,
}
