use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::admin_dto::CreateExamPayload;
use crate::error::Result;
use crate::models::scheduled_exam::ScheduledExam;

/// Read access to exam records for session start.
#[async_trait]
pub trait ExamCatalog: Send + Sync {
    async fn find_exam(&self, exam_id: Uuid) -> Result<Option<ScheduledExam>>;
    async fn list_exams(&self) -> Result<Vec<ScheduledExam>>;
}

#[derive(Clone)]
pub struct ExamService {
    pool: PgPool,
}

impl ExamService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_exam(&self, payload: CreateExamPayload, admin_id: &str) -> Result<ScheduledExam> {
        let questions = match payload.questions {
            Some(q) if !q.is_empty() => Some(serde_json::to_value(q)?),
            _ => None,
        };

        let exam = sqlx::query_as::<_, ScheduledExam>(
            r#"
            INSERT INTO scheduled_exams (name, scheduled_time, duration_minutes, questions, admin_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(payload.name.trim())
        .bind(payload.scheduled_time)
        .bind(payload.duration_minutes)
        .bind(questions)
        .bind(admin_id)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(exam)
    }

    pub async fn list_for_admin(&self, admin_id: &str) -> Result<Vec<ScheduledExam>> {
        let rows = sqlx::query_as::<_, ScheduledExam>(
            r#"SELECT * FROM scheduled_exams WHERE admin_id = $1 ORDER BY scheduled_time DESC"#,
        )
        .bind(admin_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn delete_exam(&self, exam_id: Uuid, admin_id: &str) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM scheduled_exams WHERE id = $1 AND admin_id = $2"#)
            .bind(exam_id)
            .bind(admin_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(crate::error::Error::NotFound("Exam not found".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ExamCatalog for ExamService {
    async fn find_exam(&self, exam_id: Uuid) -> Result<Option<ScheduledExam>> {
        let exam = sqlx::query_as::<_, ScheduledExam>(r#"SELECT * FROM scheduled_exams WHERE id = $1"#)
            .bind(exam_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(exam)
    }

    async fn list_exams(&self) -> Result<Vec<ScheduledExam>> {
        let rows = sqlx::query_as::<_, ScheduledExam>(
            r#"SELECT * FROM scheduled_exams ORDER BY scheduled_time ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
