use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::models::disqualification::{Disqualification, NewDisqualification};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DisqualificationStore: Send + Sync {
    async fn exists(&self, user_id: &str, exam_id: Uuid) -> Result<bool>;
    async fn create(&self, record: NewDisqualification) -> Result<()>;
    async fn exam_ids_for_user(&self, user_id: &str) -> Result<Vec<Uuid>>;
}

#[derive(Clone)]
pub struct DisqualificationService {
    pool: PgPool,
}

impl DisqualificationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_for_admin(&self, admin_id: &str) -> Result<Vec<Disqualification>> {
        let rows = sqlx::query_as::<_, Disqualification>(
            r#"
            SELECT d.*
            FROM disqualified_users d
            JOIN scheduled_exams e ON e.id = d.exam_id
            WHERE e.admin_id = $1
            ORDER BY d.disqualified_at DESC
            "#,
        )
        .bind(admin_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<Disqualification> {
        let row = sqlx::query_as::<_, Disqualification>(
            r#"SELECT * FROM disqualified_users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query(r#"DELETE FROM disqualified_users WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DisqualificationStore for DisqualificationService {
    async fn exists(&self, user_id: &str, exam_id: Uuid) -> Result<bool> {
        let found: bool = sqlx::query_scalar(
            r#"SELECT EXISTS(SELECT 1 FROM disqualified_users WHERE user_id = $1 AND exam_id = $2)"#,
        )
        .bind(user_id)
        .bind(exam_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn create(&self, record: NewDisqualification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO disqualified_users (user_id, user_email, exam_id, reason, disqualified_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, exam_id) DO NOTHING
            "#,
        )
        .bind(record.user_id)
        .bind(record.user_email)
        .bind(record.exam_id)
        .bind(record.reason)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exam_ids_for_user(&self, user_id: &str) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(r#"SELECT exam_id FROM disqualified_users WHERE user_id = $1"#)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
