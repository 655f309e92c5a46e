use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::dto::admin_dto::{
    ActivityLogQuery, AddWhitelistPayload, CreateExamPayload, ExamHistoryEntry, LiveSnapshot, OverrideResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::activity_log::{ActivityType, NewActivity};
use crate::models::disqualification::Disqualification;
use crate::models::scheduled_exam::ScheduledExam;
use crate::models::whitelisted_user::WhitelistedUser;
use crate::services::activity_service::{aggregate, build_history, ActivityService};
use crate::services::disqualification_service::DisqualificationService;
use crate::services::exam_service::ExamService;
use crate::services::whitelist_service::WhitelistService;
use crate::AppState;

const DEFAULT_LOG_LIMIT: i64 = 200;
const MAX_LOG_LIMIT: i64 = 1000;

#[axum::debug_handler]
pub async fn list_exams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ScheduledExam>>> {
    let svc = ExamService::new(state.pool.clone());
    Ok(Json(svc.list_for_admin(&claims.sub).await?))
}

/// Every exam the admin owns with the users who started it.
#[axum::debug_handler]
pub async fn exam_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ExamHistoryEntry>>> {
    let exams = ExamService::new(state.pool.clone())
        .list_for_admin(&claims.sub)
        .await?;
    let participants = ActivityService::new(state.pool.clone())
        .participants_for_admin(&claims.sub)
        .await?;
    Ok(Json(build_history(exams, &participants)))
}

#[axum::debug_handler]
pub async fn create_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamPayload>,
) -> Result<(StatusCode, Json<ScheduledExam>)> {
    payload.validate()?;
    if payload.name.trim().is_empty() {
        return Err(Error::BadRequest("Exam name must not be blank".to_string()));
    }
    let svc = ExamService::new(state.pool.clone());
    let exam = svc.create_exam(payload, &claims.sub).await?;
    tracing::info!(exam_id = %exam.id, admin_id = %claims.sub, "Exam scheduled");
    Ok((StatusCode::CREATED, Json(exam)))
}

#[axum::debug_handler]
pub async fn delete_exam(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    ExamService::new(state.pool.clone())
        .delete_exam(id, &claims.sub)
        .await?;
    tracing::info!(exam_id = %id, admin_id = %claims.sub, "Exam deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_whitelist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<WhitelistedUser>>> {
    let svc = WhitelistService::new(state.pool.clone());
    Ok(Json(svc.list_for_admin(&claims.sub).await?))
}

#[axum::debug_handler]
pub async fn add_whitelist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AddWhitelistPayload>,
) -> Result<(StatusCode, Json<WhitelistedUser>)> {
    payload.validate()?;
    let svc = WhitelistService::new(state.pool.clone());
    let entry = svc.add(&payload.email, &claims.sub).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[axum::debug_handler]
pub async fn remove_whitelist(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    WhitelistService::new(state.pool.clone())
        .remove(id, &claims.sub)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
pub async fn list_disqualifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Disqualification>>> {
    let svc = DisqualificationService::new(state.pool.clone());
    Ok(Json(svc.list_for_admin(&claims.sub).await?))
}

#[axum::debug_handler]
pub async fn override_disqualification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<OverrideResponse>> {
    let svc = DisqualificationService::new(state.pool.clone());
    let record = svc.get(id).await?;

    let exam = state
        .exams
        .find_exam(record.exam_id)
        .await?
        .filter(|e| e.admin_id.as_deref() == Some(claims.sub.as_str()))
        .ok_or_else(|| Error::NotFound("Disqualification not found".to_string()))?;

    svc.delete(id).await?;

    let rewhitelisted = match &record.user_email {
        Some(email) => {
            WhitelistService::new(state.pool.clone())
                .ensure(email, &claims.sub)
                .await?
        }
        None => false,
    };

    let admin_label = claims.email.clone().unwrap_or_else(|| claims.sub.clone());
    let subject = record.user_email.clone().unwrap_or_else(|| record.user_id.clone());
    let entry = NewActivity {
        session_id: None,
        user_id: record.user_id.clone(),
        user_email: record.user_email.clone(),
        exam_id: record.exam_id,
        activity_type: ActivityType::ManualOverride,
        details: format!(
            "Admin ({}) overrode disqualification for user {} for exam {}.",
            admin_label, subject, exam.name
        ),
        admin_id: Some(claims.sub.clone()),
        timestamp: Utc::now(),
    };
    if let Err(e) = state.activity.append(entry).await {
        tracing::warn!(error = ?e, disqualification_id = %id, "Failed to log manual override");
    }

    tracing::info!(
        disqualification_id = %id,
        admin_id = %claims.sub,
        rewhitelisted,
        "Disqualification overridden"
    );
    Ok(Json(OverrideResponse {
        overridden: true,
        user_id: record.user_id,
        exam_id: record.exam_id,
        rewhitelisted,
    }))
}

#[axum::debug_handler]
pub async fn list_activity_logs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ActivityLogQuery>,
) -> Result<Response> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let logs = ActivityService::new(state.pool.clone())
        .list_for_admin(&claims.sub, limit)
        .await?;

    if query.aggregate.unwrap_or(false) {
        Ok(Json(aggregate(&logs)).into_response())
    } else {
        Ok(Json(logs).into_response())
    }
}

#[axum::debug_handler]
pub async fn live_snapshots(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Json<Vec<LiveSnapshot>> {
    Json(state.sessions.live_snapshots(&claims.sub).await)
}
