use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::session_dto::{
    AnswerRequest, AnswerResponse, ExamSummary, PublicQuestion, SessionSnapshot, SignalRequest,
    StartSessionResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::exam_session::{session_id_for, SessionState};
use crate::models::violation::ViolationType;
use crate::session::{
    ActiveSession, CameraError, ExamDescriptor, Frame, SessionMachine, SessionRunner, SnapshotCamera,
};
use crate::AppState;

const TAB_SWITCH_REASON: &str = "Tab switched or window minimized.";
const CLIPBOARD_REASON: &str = "Clipboard event detected.";

async fn active_session(state: &AppState, claims: &Claims, exam_id: Uuid) -> Result<ActiveSession> {
    state
        .sessions
        .get(&session_id_for(&claims.sub, exam_id))
        .await
        .ok_or_else(|| Error::NotFound("No exam session for this exam".to_string()))
}

fn claimed_email(claims: &Claims) -> Result<String> {
    claims
        .email
        .clone()
        .ok_or_else(|| Error::Forbidden("Token does not carry an email address".to_string()))
}

/// Exams from admins who whitelisted the caller, minus those the caller was disqualified from.
#[axum::debug_handler]
pub async fn list_exams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<ExamSummary>>> {
    let email = claimed_email(&claims)?;
    let admins = state.whitelist.whitelisting_admins(&email).await?;
    let disqualified = state.disqualifications.exam_ids_for_user(&claims.sub).await?;

    let exams = state.exams.list_exams().await?;
    Ok(Json(
        exams
            .iter()
            .filter(|e| e.admin_id.as_ref().is_some_and(|a| admins.contains(a)))
            .filter(|e| !disqualified.contains(&e.id))
            .map(ExamSummary::from)
            .collect(),
    ))
}

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<(StatusCode, Json<StartSessionResponse>)> {
    let exam = state
        .exams
        .find_exam(exam_id)
        .await?
        .ok_or_else(|| Error::NotFound("Exam not found".to_string()))?;

    let email = claimed_email(&claims)?;
    let whitelisted = match exam.admin_id.as_deref() {
        Some(admin_id) => state.whitelist.is_whitelisted(&email, admin_id).await?,
        None => false,
    };
    if !whitelisted {
        tracing::warn!(user_id = %claims.sub, %exam_id, "Start refused: not whitelisted");
        return Err(Error::Forbidden("You are not whitelisted to take this exam".to_string()));
    }
    if state.disqualifications.exists(&claims.sub, exam_id).await? {
        tracing::warn!(user_id = %claims.sub, %exam_id, "Start refused: already disqualified");
        return Err(Error::Forbidden("You have been disqualified from this exam".to_string()));
    }

    let session_id = session_id_for(&claims.sub, exam_id);
    let camera = Arc::new(SnapshotCamera::new());
    let runner = SessionRunner::new(
        SessionMachine::new(exam_id, claims.sub.clone(), Some(email)),
        camera.clone(),
        state.collaborators(),
    );
    let displaced = state
        .sessions
        .insert_if_startable(
            session_id.clone(),
            ActiveSession {
                runner: runner.clone(),
                camera,
                exam_name: exam.name.clone(),
                admin_id: exam.admin_id.clone(),
            },
        )
        .await?;
    if let Some(old) = displaced {
        old.runner.teardown().await;
    }

    let outcome = runner.start(&ExamDescriptor::from_scheduled(&exam)).await;
    tracing::info!(%session_id, exam = %exam.name, state = outcome.as_str(), "Exam session created");

    let questions = runner.questions().await.iter().map(PublicQuestion::from).collect();
    Ok((
        StatusCode::CREATED,
        Json(StartSessionResponse {
            session: runner.snapshot().await,
            questions,
        }),
    ))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>> {
    let active = active_session(&state, &claims, exam_id).await?;
    Ok(Json(active.runner.snapshot().await))
}

#[axum::debug_handler]
pub async fn push_snapshot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !mime_type.starts_with("image/") {
        return Err(Error::BadRequest("Snapshot must be an image".to_string()));
    }
    if body.is_empty() {
        return Err(Error::BadRequest("Snapshot body is empty".to_string()));
    }

    let active = active_session(&state, &claims, exam_id).await?;
    match active.camera.push_frame(Frame::new(mime_type, body)) {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(CameraError::PermissionDenied) => {
            Err(Error::Forbidden("Camera access was denied for this session".to_string()))
        }
        Err(_) => Err(Error::Conflict("Session camera is not active".to_string())),
    }
}

#[axum::debug_handler]
pub async fn camera_denied(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>> {
    let active = active_session(&state, &claims, exam_id).await?;
    active.camera.deny();
    active.runner.camera_denied().await;
    Ok(Json(active.runner.snapshot().await))
}

#[axum::debug_handler]
pub async fn report_signal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    Json(req): Json<SignalRequest>,
) -> Result<Json<SessionSnapshot>> {
    req.validate()?;
    let default_reason = match req.signal_type {
        ViolationType::Visibility => TAB_SWITCH_REASON,
        ViolationType::Clipboard => CLIPBOARD_REASON,
        ViolationType::Behavior => {
            return Err(Error::BadRequest(
                "Behavior violations come from the classifier only".to_string(),
            ))
        }
    };
    let reason = req
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(default_reason);

    let active = active_session(&state, &claims, exam_id).await?;
    active.runner.record_violation(reason, req.signal_type).await;
    Ok(Json(active.runner.snapshot().await))
}

#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>> {
    req.validate()?;
    let active = active_session(&state, &claims, exam_id).await?;
    if active.runner.state().await != SessionState::InProgress {
        return Err(Error::Conflict("Exam session is not in progress".to_string()));
    }
    match active.runner.answer(&req.question_id, &req.selected_answer).await {
        Some(current_question_index) => Ok(Json(AnswerResponse {
            saved: true,
            current_question_index,
        })),
        None => Err(Error::BadRequest("Unknown question".to_string())),
    }
}

#[axum::debug_handler]
pub async fn submit_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>> {
    let active = active_session(&state, &claims, exam_id).await?;
    active.runner.submit().await;
    Ok(Json(active.runner.snapshot().await))
}

#[axum::debug_handler]
pub async fn leave_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<StatusCode> {
    let session_id = session_id_for(&claims.sub, exam_id);
    let active = state
        .sessions
        .remove(&session_id)
        .await
        .ok_or_else(|| Error::NotFound("No exam session for this exam".to_string()))?;
    active.runner.teardown().await;
    tracing::info!(%session_id, "Examinee returned to exam selection");
    Ok(StatusCode::NO_CONTENT)
}
