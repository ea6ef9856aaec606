//! Comments handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::error::HttpError;

use super::json_body;
use crate::infra::http::api::auth::AuthUser;
use crate::infra::http::api::models::CommentRequest;
use crate::infra::http::api::state::ApiState;

pub async fn create_comment(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Path(post_id): Path<i64>,
    payload: Result<Json<CommentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let request = json_body(payload)?;
    let comment = state
        .comments
        .add_comment(post_id, &user, &request.content)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpError> {
    state.comments.delete_comment(id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
