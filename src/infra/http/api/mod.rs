pub mod auth;
pub mod handlers;
pub mod models;
pub mod state;

pub use auth::{AuthUser, MaybeAuthUser};
pub use state::ApiState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: ApiState) -> Router {
    let upload_body_limit = state.upload_limit_bytes;

    Router::new()
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route("/api/posts/search", get(handlers::search_posts))
        .route(
            "/api/posts/upload-image",
            post(handlers::upload_image).layer(DefaultBodyLimit::max(upload_body_limit)),
        )
        .route(
            "/api/posts/{id}",
            get(handlers::show_post)
                .put(handlers::update_post)
                .patch(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route(
            "/api/posts/{id}/comments",
            post(handlers::create_comment),
        )
        .route("/api/comments/{id}", delete(handlers::delete_comment))
        .route("/api/my-posts", get(handlers::my_posts))
        .route(
            "/api/rebuild-search-index",
            post(handlers::rebuild_search_index),
        )
        .route(
            "/api/test-published-email",
            post(handlers::test_published_email),
        )
        .route("/api/publish-scheduled", post(handlers::publish_scheduled))
        .route("/api/debug-post-status", get(handlers::debug_post_status))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
