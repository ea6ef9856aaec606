//! Posts handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::error::HttpError;

use super::json_body;
use crate::infra::http::api::auth::{AuthUser, MaybeAuthUser};
use crate::infra::http::api::models::{
    CreatePostRequest, MessageResponse, PageQuery, PostEnvelope, SearchQuery, UpdatePostRequest,
};
use crate::infra::http::api::state::ApiState;

pub async fn list_posts(
    State(state): State<ApiState>,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let page = state.posts.index_page(query.page()).await?;
    Ok(Json(page))
}

pub async fn search_posts(
    State(state): State<ApiState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let request = query.request();
    let listing = state
        .posts
        .search(query.query.as_deref(), request.page, request.per_page)
        .await?;
    Ok(Json(listing))
}

pub async fn my_posts(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let request = query.request();
    let page = state
        .posts
        .my_posts(user.id, request.page, request.per_page)
        .await?;
    Ok(Json(page))
}

pub async fn show_post(
    State(state): State<ApiState>,
    viewer: MaybeAuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpError> {
    let view = state.posts.show(id, viewer.id()).await?;
    Ok(Json(PostEnvelope {
        message: None,
        data: view,
    }))
}

pub async fn create_post(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let request = json_body(payload)?;
    let view = state.posts.create_post(request.into_command(user.id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(PostEnvelope {
            message: Some("Blog post created"),
            data: view,
        }),
    ))
}

pub async fn update_post(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, HttpError> {
    let request = json_body(payload)?;
    let view = state
        .posts
        .update_post(request.into_command(id, user.id))
        .await?;

    Ok(Json(PostEnvelope {
        message: Some("Blog post updated"),
        data: view,
    }))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, HttpError> {
    state.posts.delete_post(id, user.id).await?;
    Ok(Json(MessageResponse {
        message: "The post has been deleted successfully",
    }))
}
