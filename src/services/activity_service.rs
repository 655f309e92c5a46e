use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::dto::admin_dto::{ExamHistoryEntry, ExamParticipant};
use crate::error::Result;
use crate::models::activity_log::{ActivityLog, ActivityType, NewActivity};
use crate::models::scheduled_exam::ScheduledExam;

/// Write side of the audit trail. Callers treat failures as advisory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn append(&self, activity: NewActivity) -> Result<()>;
}

#[derive(Clone)]
pub struct ActivityService {
    pool: PgPool,
}

impl ActivityService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Entries for exams owned by `admin_id`, newest first.
    pub async fn list_for_admin(&self, admin_id: &str, limit: i64) -> Result<Vec<ActivityLog>> {
        let rows = sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT a.*
            FROM activity_logs a
            JOIN scheduled_exams e ON e.id = a.exam_id
            WHERE e.admin_id = $1
            ORDER BY a.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(admin_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// One row per user who started an exam owned by `admin_id`.
    pub async fn participants_for_admin(&self, admin_id: &str) -> Result<Vec<ParticipantRow>> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT a.exam_id, a.user_id, MAX(a.user_email) AS user_email, MIN(a.created_at) AS first_started_at
            FROM activity_logs a
            JOIN scheduled_exams e ON e.id = a.exam_id
            WHERE e.admin_id = $1 AND a.activity_type = $2
            GROUP BY a.exam_id, a.user_id
            ORDER BY first_started_at ASC
            "#,
        )
        .bind(admin_id)
        .bind(ActivityType::ExamStart.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ParticipantRow {
    pub exam_id: Uuid,
    pub user_id: String,
    pub user_email: Option<String>,
    pub first_started_at: DateTime<Utc>,
}

/// Pairs every exam with the users who started it. Exams keep their order;
/// exams nobody started get an empty participant list.
pub fn build_history(exams: Vec<ScheduledExam>, participants: &[ParticipantRow]) -> Vec<ExamHistoryEntry> {
    exams
        .into_iter()
        .map(|exam| {
            let mut seen: Vec<ExamParticipant> = Vec::new();
            for row in participants.iter().filter(|p| p.exam_id == exam.id) {
                if seen.iter().any(|p| p.user_id == row.user_id) {
                    continue;
                }
                seen.push(ExamParticipant {
                    user_id: row.user_id.clone(),
                    user_email: row.user_email.clone(),
                    first_started_at: row.first_started_at,
                });
            }
            ExamHistoryEntry {
                exam,
                participant_count: seen.len(),
                participants: seen,
            }
        })
        .collect()
}

#[async_trait]
impl ActivitySink for ActivityService {
    async fn append(&self, activity: NewActivity) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activity_logs (session_id, user_id, user_email, exam_id, activity_type, details, admin_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(activity.session_id)
        .bind(activity.user_id)
        .bind(activity.user_email)
        .bind(activity.exam_id)
        .bind(activity.activity_type.as_str())
        .bind(activity.details)
        .bind(activity.admin_id)
        .bind(activity.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedLog {
    pub id: Uuid,
    pub user_id: String,
    pub user_email: Option<String>,
    pub exam_id: Uuid,
    pub activity_type: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
    pub count: u32,
}

/// Collapses runs of consecutive entries with the same user, type and details.
/// The first entry of a run is kept.
pub fn aggregate(logs: &[ActivityLog]) -> Vec<AggregatedLog> {
    let mut out: Vec<AggregatedLog> = Vec::new();
    for log in logs {
        if let Some(last) = out.last_mut() {
            if last.user_id == log.user_id
                && last.activity_type == log.activity_type
                && last.details == log.details
            {
                last.count += 1;
                continue;
            }
        }
        out.push(AggregatedLog {
            id: log.id,
            user_id: log.user_id.clone(),
            user_email: log.user_email.clone(),
            exam_id: log.exam_id,
            activity_type: log.activity_type.clone(),
            details: log.details.clone(),
            created_at: log.created_at,
            count: 1,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(user: &str, kind: &str, details: &str) -> ActivityLog {
        ActivityLog {
            id: Uuid::new_v4(),
            session_id: None,
            user_id: user.to_string(),
            user_email: None,
            exam_id: Uuid::nil(),
            activity_type: kind.to_string(),
            details: details.to_string(),
            admin_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn consecutive_duplicates_collapse() {
        let logs = vec![
            log("a", "tab-switch", "hidden"),
            log("a", "tab-switch", "hidden"),
            log("a", "tab-switch", "hidden"),
            log("b", "tab-switch", "hidden"),
        ];
        let out = aggregate(&logs);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].count, 3);
        assert_eq!(out[0].id, logs[0].id);
        assert_eq!(out[1].count, 1);
    }

    #[test]
    fn interleaved_entries_stay_separate() {
        let logs = vec![
            log("a", "ai-warning", "talking"),
            log("a", "copy-paste", "copy"),
            log("a", "ai-warning", "talking"),
        ];
        assert_eq!(aggregate(&logs).len(), 3);
    }

    #[test]
    fn empty_input_yields_nothing() {
        assert!(aggregate(&[]).is_empty());
    }

    fn exam(name: &str) -> ScheduledExam {
        ScheduledExam {
            id: Uuid::new_v4(),
            name: name.to_string(),
            scheduled_time: Utc::now(),
            duration_minutes: Some(30),
            questions: None,
            admin_id: Some("admin-1".into()),
            created_at: Utc::now(),
        }
    }

    fn started(exam_id: Uuid, user: &str) -> ParticipantRow {
        ParticipantRow {
            exam_id,
            user_id: user.to_string(),
            user_email: Some(format!("{user}@example.com")),
            first_started_at: Utc::now(),
        }
    }

    #[test]
    fn history_groups_unique_participants_per_exam() {
        let midterm = exam("Midterm");
        let finals = exam("Finals");
        let rows = vec![
            started(midterm.id, "ana"),
            started(midterm.id, "ben"),
            started(midterm.id, "ana"),
            started(Uuid::new_v4(), "zed"),
        ];

        let history = build_history(vec![finals.clone(), midterm.clone()], &rows);

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].exam.id, finals.id);
        assert_eq!(history[0].participant_count, 0);
        assert_eq!(history[1].exam.id, midterm.id);
        assert_eq!(history[1].participant_count, 2);
        let users: Vec<&str> = history[1].participants.iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(users, vec!["ana", "ben"]);
        assert_eq!(history[1].participants[1].user_email.as_deref(), Some("ben@example.com"));
    }
}
