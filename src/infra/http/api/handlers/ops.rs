//! Operational handlers: index rebuild, test email, manual sweep, status dump.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::{info, warn};

use crate::application::error::HttpError;

use super::{ensure_operational, json_body};
use crate::infra::http::api::auth::AuthUser;
use crate::infra::http::api::models::{
    RebuildResponse, SweepResponse, TestEmailRequest, TestEmailResponse,
};
use crate::infra::http::api::state::ApiState;

const SOURCE: &str = "infra::http::api::ops";

pub async fn rebuild_search_index(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, HttpError> {
    let report = state.posts.search_index().rebuild().await;

    info!(
        target = SOURCE,
        user_id = user.id,
        indexed = report.indexed,
        failed = report.failure.is_some(),
        "search index rebuilt"
    );

    Ok(Json(RebuildResponse {
        message: if report.failure.is_some() {
            "Search index rebuilt partially"
        } else {
            "Search index rebuilt successfully"
        },
        indexed_posts: report.indexed,
        error: report.failure,
    }))
}

pub async fn test_published_email(
    State(state): State<ApiState>,
    AuthUser(_user): AuthUser,
    payload: Result<Json<TestEmailRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let request = json_body(payload)?;
    let email = request.email.trim();
    if !is_plausible_email(email) {
        return Err(HttpError::new(
            SOURCE,
            StatusCode::UNPROCESSABLE_ENTITY,
            "The email field must be a valid email address.",
            format!("rejected address `{email}`"),
        ));
    }

    let notice = state
        .notifier
        .send_test(email, state.clock.now())
        .await
        .map_err(|err| {
            warn!(target = SOURCE, error = %err, "failed to enqueue test email");
            HttpError::from_error(
                SOURCE,
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to dispatch email job",
                &err,
            )
        })?;

    Ok(Json(TestEmailResponse {
        message: "Test email job dispatched successfully",
        email: notice.recipient_email,
    }))
}

pub async fn publish_scheduled(
    State(state): State<ApiState>,
    AuthUser(_user): AuthUser,
) -> Result<impl IntoResponse, HttpError> {
    ensure_operational(&state)?;
    let report = state.scheduler.run().await?;
    Ok(Json(SweepResponse {
        message: "Scheduled posts published",
        report,
    }))
}

pub async fn debug_post_status(
    State(state): State<ApiState>,
    AuthUser(_user): AuthUser,
) -> Result<impl IntoResponse, HttpError> {
    ensure_operational(&state)?;
    let report = state.posts.status_report().await?;
    Ok(Json(report))
}

fn is_plausible_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}
