pub mod admin;
pub mod health;
pub mod session;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{auth, rate_limit};
use crate::AppState;

const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

pub fn build_router(state: AppState, public_rps: u32, admin_rps: u32) -> Router {
    let base_routes = Router::new().route("/health", get(health::health));

    let exam_api = Router::new()
        .route("/api/exams", get(session::list_exams))
        .route(
            "/api/exams/:id/session",
            get(session::get_session).delete(session::leave_session),
        )
        .route("/api/exams/:id/session/start", post(session::start_session))
        .route("/api/exams/:id/session/snapshot", post(session::push_snapshot))
        .route("/api/exams/:id/session/camera-denied", post(session::camera_denied))
        .route("/api/exams/:id/session/signal", post(session::report_signal))
        .route("/api/exams/:id/session/answer", patch(session::save_answer))
        .route("/api/exams/:id/session/submit", post(session::submit_session))
        .layer(axum::middleware::from_fn(auth::require_bearer_auth))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(public_rps),
            rate_limit::rps_middleware,
        ));

    let admin_api = Router::new()
        .route(
            "/api/admin/exams",
            get(admin::list_exams).post(admin::create_exam),
        )
        .route("/api/admin/exams/history", get(admin::exam_history))
        .route("/api/admin/exams/:id", delete(admin::delete_exam))
        .route(
            "/api/admin/whitelist",
            get(admin::list_whitelist).post(admin::add_whitelist),
        )
        .route("/api/admin/whitelist/:id", delete(admin::remove_whitelist))
        .route("/api/admin/disqualifications", get(admin::list_disqualifications))
        .route(
            "/api/admin/disqualifications/:id/override",
            post(admin::override_disqualification),
        )
        .route("/api/admin/activity-logs", get(admin::list_activity_logs))
        .route("/api/admin/live-snapshots", get(admin::live_snapshots))
        .layer(axum::middleware::from_fn(auth::require_admin))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit::new_rps_state(admin_rps),
            rate_limit::rps_middleware,
        ));

    base_routes
        .merge(exam_api)
        .merge(admin_api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
