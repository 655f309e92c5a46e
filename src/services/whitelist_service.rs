use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::whitelisted_user::WhitelistedUser;

#[async_trait]
pub trait WhitelistLookup: Send + Sync {
    /// Whether `admin_id` has whitelisted `email`.
    async fn is_whitelisted(&self, email: &str, admin_id: &str) -> Result<bool>;
    /// Admins whose exams `email` may take.
    async fn whitelisting_admins(&self, email: &str) -> Result<Vec<String>>;
}

#[derive(Clone)]
pub struct WhitelistService {
    pool: PgPool,
}

impl WhitelistService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_admin(&self, admin_id: &str) -> Result<Vec<WhitelistedUser>> {
        let rows = sqlx::query_as::<_, WhitelistedUser>(
            r#"SELECT * FROM whitelisted_users WHERE admin_id = $1 ORDER BY added_at DESC"#,
        )
        .bind(admin_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn add(&self, email: &str, admin_id: &str) -> Result<WhitelistedUser> {
        let row = sqlx::query_as::<_, WhitelistedUser>(
            r#"
            INSERT INTO whitelisted_users (email, admin_id, added_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email, admin_id) DO UPDATE SET email = EXCLUDED.email
            RETURNING *
            "#,
        )
        .bind(normalize_email(email))
        .bind(admin_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Adds the email for `admin_id` unless already present. Returns whether a row was inserted.
    pub async fn ensure(&self, email: &str, admin_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO whitelisted_users (email, admin_id, added_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (email, admin_id) DO NOTHING
            "#,
        )
        .bind(normalize_email(email))
        .bind(admin_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn remove(&self, id: Uuid, admin_id: &str) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM whitelisted_users WHERE id = $1 AND admin_id = $2"#)
            .bind(id)
            .bind(admin_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(crate::error::Error::NotFound("Whitelist entry not found".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl WhitelistLookup for WhitelistService {
    async fn is_whitelisted(&self, email: &str, admin_id: &str) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM whitelisted_users WHERE email = $1 AND admin_id = $2)"#,
        )
        .bind(normalize_email(email))
        .bind(admin_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn whitelisting_admins(&self, email: &str) -> Result<Vec<String>> {
        let admins: Vec<String> = sqlx::query_scalar(
            r#"SELECT DISTINCT admin_id FROM whitelisted_users WHERE email = $1"#,
        )
        .bind(normalize_email(email))
        .fetch_all(&self.pool)
        .await?;
        Ok(admins)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
