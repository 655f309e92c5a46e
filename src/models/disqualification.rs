use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Disqualification {
    pub id: Uuid,
    pub user_id: String,
    pub user_email: Option<String>,
    pub exam_id: Uuid,
    pub reason: String,
    pub disqualified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDisqualification {
    pub user_id: String,
    pub user_email: Option<String>,
    pub exam_id: Uuid,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}
