use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WhitelistedUser {
    pub id: Uuid,
    pub email: String,
    pub admin_id: Option<String>,
    pub added_at: DateTime<Utc>,
}
